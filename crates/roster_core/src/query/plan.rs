//! Validated, executable query plans.

use super::builder::{JoinKind, Selection};
use super::field::{Field, OrderSpec};
use super::predicate::Predicate;
use super::select::SelectExpr;
use super::value::{ColumnType, Value};

const MEMBER_COLUMNS: &str = "m.member_id, m.username, m.age, m.team_id";
const TEAM_COLUMNS: &str = "t.team_id, t.name";

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One projected column of a scalar/aggregate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// What each result row looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// `member_id, username, age, team_id`.
    Members,
    /// Member columns followed by `team_id, name` from a fetch join.
    MembersWithTeam,
    Columns(Vec<ColumnSpec>),
}

impl ResultShape {
    pub fn describe(&self) -> String {
        match self {
            Self::Members => "member entity".to_string(),
            Self::MembersWithTeam => "member entity with team".to_string(),
            Self::Columns(columns) => describe_columns(
                columns
                    .iter()
                    .map(|column| (column.label.as_str(), column.column_type)),
            ),
        }
    }
}

/// Renders columns as `[label type, ...]`.
pub(crate) fn describe_columns<'a>(columns: impl Iterator<Item = (&'a str, ColumnType)>) -> String {
    let names: Vec<String> = columns
        .map(|(label, column_type)| format!("{label} {column_type}"))
        .collect();
    format!("[{}]", names.join(", "))
}

/// Output of [`super::QueryBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub(crate) selection: Selection,
    pub(crate) join: Option<JoinKind>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) group_by: Vec<Field>,
    pub(crate) ordering: Vec<OrderSpec>,
    pub(crate) offset: u64,
    pub(crate) limit: Option<u64>,
    pub(crate) shape: ResultShape,
}

impl QueryPlan {
    pub fn shape(&self) -> &ResultShape {
        &self.shape
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// The select statement with the plan's own window.
    pub fn statement(&self) -> Statement {
        self.windowed(self.offset, self.limit)
    }

    /// The select statement with an explicit window.
    pub fn windowed(&self, offset: u64, limit: Option<u64>) -> Statement {
        let (mut sql, mut params) = self.unordered_select();

        let order_terms = self.order_terms();
        if !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_terms.join(", "));
        }

        match limit {
            Some(limit) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(Value::Integer(to_sql_int(limit)));
                params.push(Value::Integer(to_sql_int(offset)));
            }
            None if offset > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(Value::Integer(to_sql_int(offset)));
            }
            None => {}
        }

        Statement { sql, params }
    }

    /// Counts all rows matching the predicate, ignoring ordering and window.
    pub fn count_statement(&self) -> Statement {
        if self.is_aggregated() {
            let (inner, params) = self.unordered_select();
            return Statement {
                sql: format!("SELECT COUNT(*) FROM ({inner})"),
                params,
            };
        }

        let mut sql = String::from("SELECT COUNT(*)");
        let mut params = Vec::new();
        self.push_from_where(&mut sql, &mut params);
        Statement { sql, params }
    }

    fn is_aggregated(&self) -> bool {
        !self.group_by.is_empty()
            || matches!(&self.selection, Selection::Exprs(exprs) if exprs.iter().any(SelectExpr::is_aggregate))
    }

    fn unordered_select(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {}", self.select_list());
        let mut params = Vec::new();
        self.push_from_where(&mut sql, &mut params);
        if !self.group_by.is_empty() {
            let columns: Vec<&str> = self.group_by.iter().map(|field| field.column()).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }
        (sql, params)
    }

    fn push_from_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        sql.push_str(" FROM member m");
        if let Some(join) = self.join {
            sql.push(' ');
            sql.push_str(join.sql());
        }
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            predicate.render(sql, params);
        }
    }

    fn select_list(&self) -> String {
        match &self.selection {
            Selection::Members if self.join.is_some_and(JoinKind::is_fetch) => {
                format!("{MEMBER_COLUMNS}, {TEAM_COLUMNS}")
            }
            Selection::Members => MEMBER_COLUMNS.to_string(),
            Selection::Exprs(exprs) => exprs
                .iter()
                .map(SelectExpr::render)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    // Non-grouped rows get `member_id` as a final tiebreaker so windows over
    // equal sort keys are repeatable.
    fn order_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.ordering.iter().map(OrderSpec::render).collect();
        if !self.group_by.is_empty() {
            if terms.is_empty() {
                terms = self
                    .group_by
                    .iter()
                    .map(|field| format!("{} ASC", field.column()))
                    .collect();
            }
            return terms;
        }
        if self.is_aggregated() {
            return terms;
        }
        if !self
            .ordering
            .iter()
            .any(|order| order.field == Field::MemberId)
        {
            terms.push(format!("{} ASC", Field::MemberId.column()));
        }
        terms
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
