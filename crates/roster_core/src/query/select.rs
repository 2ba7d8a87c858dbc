//! Select-list expressions: plain fields and aggregates.

use super::field::Field;
use super::value::ColumnType;
use super::QuerySpecError;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFn {
    fn sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

impl Display for AggregateFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectExpr {
    Field(Field),
    /// `field = None` counts member rows.
    Aggregate {
        func: AggregateFn,
        field: Option<Field>,
    },
}

impl SelectExpr {
    pub fn aggregate(func: AggregateFn, field: Field) -> Self {
        Self::Aggregate {
            func,
            field: Some(field),
        }
    }

    /// `COUNT` over member rows, the equivalent of counting the entity.
    pub fn count_members() -> Self {
        Self::Aggregate {
            func: AggregateFn::Count,
            field: None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Field(field) => Some(*field),
            Self::Aggregate { field, .. } => *field,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Field(field) => field.label().to_string(),
            Self::Aggregate { func, field: None } => format!("{func}(member)"),
            Self::Aggregate {
                func,
                field: Some(field),
            } => format!("{func}({})", field.label()),
        }
    }

    pub(crate) fn render(&self) -> String {
        let expr = match self {
            Self::Field(field) => field.column().to_string(),
            Self::Aggregate { func, field } => format!(
                "{}({})",
                func.sql(),
                field.map_or(Field::MemberId.column(), Field::column)
            ),
        };
        format!("{expr} AS \"{}\"", self.label())
    }

    /// Result column type; `Sum`/`Avg` over text are rejected.
    pub fn column_type(&self) -> Result<ColumnType, QuerySpecError> {
        match self {
            Self::Field(field) => Ok(field.column_type()),
            Self::Aggregate { func, field } => {
                let source = field.map_or(ColumnType::Integer, Field::column_type);
                match func {
                    AggregateFn::Count => Ok(ColumnType::Integer),
                    AggregateFn::Sum | AggregateFn::Avg if source == ColumnType::Text => {
                        Err(QuerySpecError::AggregateTypeMismatch {
                            func: *func,
                            field: field.unwrap_or(Field::MemberId),
                        })
                    }
                    AggregateFn::Sum => Ok(ColumnType::Integer),
                    AggregateFn::Avg => Ok(ColumnType::Real),
                    AggregateFn::Max | AggregateFn::Min => Ok(source),
                }
            }
        }
    }

    /// Whether the projected column may be `NULL` given the join nullability.
    pub(crate) fn nullable(&self, team_nullable: bool) -> bool {
        match self {
            Self::Field(field) => {
                field.nullable() || (team_nullable && field.entity() == super::Entity::Team)
            }
            Self::Aggregate {
                func: AggregateFn::Count,
                ..
            } => false,
            Self::Aggregate { .. } => true,
        }
    }
}

impl From<Field> for SelectExpr {
    fn from(value: Field) -> Self {
        Self::Field(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregateFn, SelectExpr};
    use crate::query::{ColumnType, Field, QuerySpecError};

    #[test]
    fn aggregates_render_with_labels() {
        assert_eq!(Field::Age.avg().render(), "AVG(m.age) AS \"avg(member.age)\"");
        assert_eq!(
            SelectExpr::count_members().render(),
            "COUNT(m.member_id) AS \"count(member)\""
        );
        assert_eq!(
            SelectExpr::from(Field::TeamName).render(),
            "t.name AS \"team.name\""
        );
    }

    #[test]
    fn aggregate_result_types() {
        assert_eq!(Field::Age.sum().column_type(), Ok(ColumnType::Integer));
        assert_eq!(Field::Age.avg().column_type(), Ok(ColumnType::Real));
        assert_eq!(Field::Username.max().column_type(), Ok(ColumnType::Text));
        assert_eq!(
            Field::Username.avg().column_type(),
            Err(QuerySpecError::AggregateTypeMismatch {
                func: AggregateFn::Avg,
                field: Field::Username,
            })
        );
    }
}
