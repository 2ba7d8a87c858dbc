//! Fluent typed query builder rooted at `member`.

use super::field::{Entity, Field, OrderSpec};
use super::plan::{ColumnSpec, QueryPlan, ResultShape};
use super::predicate::Predicate;
use super::select::SelectExpr;
use super::QuerySpecError;
use crate::page::PageRequest;

/// How `team` is joined to `member`.
///
/// Fetch variants also project the team columns so each row carries its
/// team, avoiding one lookup per member afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Fetch,
    LeftFetch,
}

impl JoinKind {
    pub fn is_fetch(self) -> bool {
        matches!(self, Self::Fetch | Self::LeftFetch)
    }

    /// Whether team columns may be `NULL` under this join.
    pub fn is_outer(self) -> bool {
        matches!(self, Self::Left | Self::LeftFetch)
    }

    pub(crate) fn sql(self) -> &'static str {
        if self.is_outer() {
            "LEFT JOIN team t ON t.team_id = m.team_id"
        } else {
            "INNER JOIN team t ON t.team_id = m.team_id"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selection {
    Members,
    Exprs(Vec<SelectExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    selection: Selection,
    join: Option<JoinKind>,
    predicate: Option<Predicate>,
    group_by: Vec<Field>,
    ordering: Vec<OrderSpec>,
    offset: u64,
    limit: Option<u64>,
}

impl QueryBuilder {
    fn with_selection(selection: Selection) -> Self {
        Self {
            selection,
            join: None,
            predicate: None,
            group_by: Vec::new(),
            ordering: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Selects whole member entities.
    pub fn select_members() -> Self {
        Self::with_selection(Selection::Members)
    }

    /// Selects fields and/or aggregates in the given order.
    pub fn select<I, E>(exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SelectExpr>,
    {
        Self::with_selection(Selection::Exprs(
            exprs.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn join(self) -> Self {
        self.join_with(JoinKind::Inner)
    }

    pub fn left_join(self) -> Self {
        self.join_with(JoinKind::Left)
    }

    pub fn fetch_join(self) -> Self {
        self.join_with(JoinKind::Fetch)
    }

    pub fn left_fetch_join(self) -> Self {
        self.join_with(JoinKind::LeftFetch)
    }

    pub fn join_with(mut self, kind: JoinKind) -> Self {
        self.join = Some(kind);
        self
    }

    /// Adds `predicate`, AND-ed with any existing filter.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.group_by.extend(fields);
        self
    }

    /// Appends one ordering term; earlier terms take precedence.
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.ordering.push(order);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies a page request: its window, and its ordering when non-empty.
    pub fn page(mut self, request: &PageRequest) -> Self {
        if !request.ordering().is_empty() {
            self.ordering = request.ordering().to_vec();
        }
        self.offset = request.offset();
        self.limit = Some(request.limit());
        self
    }

    /// Validates the description and produces an executable plan.
    pub fn build(self) -> Result<QueryPlan, QuerySpecError> {
        if let Selection::Exprs(exprs) = &self.selection {
            if exprs.is_empty() {
                return Err(QuerySpecError::EmptyProjection);
            }
        }

        if self.join.is_none() {
            if let Some(field) = self
                .referenced_fields()
                .into_iter()
                .find(|field| field.entity() == Entity::Team)
            {
                return Err(QuerySpecError::MissingJoin { field });
            }
        }

        if let Some(predicate) = &self.predicate {
            predicate.validate()?;
        }

        let fetch = self.join.is_some_and(JoinKind::is_fetch);
        if fetch && self.selection != Selection::Members {
            return Err(QuerySpecError::FetchJoinProjection);
        }

        self.check_grouping()?;

        if self.limit == Some(0) {
            return Err(QuerySpecError::InvalidWindow(
                "limit must be greater than zero".to_string(),
            ));
        }

        let shape = match &self.selection {
            Selection::Members if fetch => ResultShape::MembersWithTeam,
            Selection::Members => ResultShape::Members,
            Selection::Exprs(exprs) => {
                let team_nullable = self.join.is_some_and(JoinKind::is_outer);
                let columns = exprs
                    .iter()
                    .map(|expr| {
                        Ok(ColumnSpec {
                            label: expr.label(),
                            column_type: expr.column_type()?,
                            nullable: expr.nullable(team_nullable),
                        })
                    })
                    .collect::<Result<Vec<_>, QuerySpecError>>()?;
                ResultShape::Columns(columns)
            }
        };

        Ok(QueryPlan {
            selection: self.selection,
            join: self.join,
            predicate: self.predicate,
            group_by: self.group_by,
            ordering: self.ordering,
            offset: self.offset,
            limit: self.limit,
            shape,
        })
    }

    fn check_grouping(&self) -> Result<(), QuerySpecError> {
        let has_aggregate = match &self.selection {
            Selection::Members => false,
            Selection::Exprs(exprs) => exprs.iter().any(SelectExpr::is_aggregate),
        };
        if !has_aggregate && self.group_by.is_empty() {
            return Ok(());
        }

        let exprs = match &self.selection {
            Selection::Members => return Err(QuerySpecError::EntityWithAggregation),
            Selection::Exprs(exprs) => exprs,
        };

        let plain_fields = exprs.iter().filter_map(|expr| match expr {
            SelectExpr::Field(field) => Some(*field),
            SelectExpr::Aggregate { .. } => None,
        });
        let ordered_fields = self.ordering.iter().map(|order| order.field);
        match plain_fields
            .chain(ordered_fields)
            .find(|field| !self.group_by.contains(field))
        {
            Some(field) => Err(QuerySpecError::UngroupedField { field }),
            None => Ok(()),
        }
    }

    fn referenced_fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = match &self.selection {
            Selection::Members => Vec::new(),
            Selection::Exprs(exprs) => exprs.iter().filter_map(SelectExpr::field).collect(),
        };
        if let Some(predicate) = &self.predicate {
            fields.extend(predicate.fields());
        }
        fields.extend(self.group_by.iter().copied());
        fields.extend(self.ordering.iter().map(|order| order.field));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::QueryBuilder;
    use crate::page::PageRequest;
    use crate::query::{ColumnType, Field, QuerySpecError, ResultShape, SelectExpr};

    #[test]
    fn team_field_without_join_fails_at_build() {
        let err = QueryBuilder::select_members()
            .filter(Field::TeamName.eq("teamA"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            QuerySpecError::MissingJoin {
                field: Field::TeamName
            }
        );
    }

    #[test]
    fn fetch_join_requires_entity_selection() {
        let err = QueryBuilder::select([Field::Username])
            .fetch_join()
            .build()
            .unwrap_err();
        assert_eq!(err, QuerySpecError::FetchJoinProjection);
    }

    #[test]
    fn ungrouped_field_is_rejected() {
        let err = QueryBuilder::select([SelectExpr::from(Field::Username), Field::Age.avg()])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            QuerySpecError::UngroupedField {
                field: Field::Username
            }
        );

        let err = QueryBuilder::select([SelectExpr::from(Field::TeamName), Field::Age.avg()])
            .join()
            .group_by([Field::TeamName])
            .order_by(Field::Age.asc())
            .build()
            .unwrap_err();
        assert_eq!(err, QuerySpecError::UngroupedField { field: Field::Age });
    }

    #[test]
    fn entity_selection_cannot_group() {
        let err = QueryBuilder::select_members()
            .group_by([Field::Age])
            .build()
            .unwrap_err();
        assert_eq!(err, QuerySpecError::EntityWithAggregation);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = QueryBuilder::select_members().limit(0).build().unwrap_err();
        assert!(matches!(err, QuerySpecError::InvalidWindow(_)));
    }

    #[test]
    fn left_join_makes_team_columns_nullable() {
        let plan = QueryBuilder::select([Field::MemberId, Field::TeamName])
            .left_join()
            .build()
            .unwrap();
        match plan.shape() {
            ResultShape::Columns(columns) => {
                assert_eq!(columns[0].column_type, ColumnType::Integer);
                assert!(!columns[0].nullable);
                assert_eq!(columns[1].column_type, ColumnType::Text);
                assert!(columns[1].nullable);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn page_request_ordering_overrides_builder_ordering() {
        let request = PageRequest::new(1, 2)
            .unwrap()
            .sorted_by([Field::Username.desc()]);
        let plan = QueryBuilder::select_members()
            .order_by(Field::Age.asc())
            .page(&request)
            .build()
            .unwrap();
        assert_eq!(
            plan.statement().sql,
            "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
             ORDER BY m.username DESC, m.member_id ASC LIMIT ? OFFSET ?"
        );
    }
}
