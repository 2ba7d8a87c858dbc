//! Structured filter predicates.
//!
//! # Invariants
//! - Rendering emits `?` placeholders and pushes params in textual order.
//! - `matches` follows SQL three-valued logic: comparisons against `NULL`
//!   are never true.

use super::field::{Entity, Field};
use super::value::{ColumnType, Value};
use super::QuerySpecError;
use crate::model::member::Member;
use crate::model::team::Team;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: Field,
        op: CompareOp,
        value: Value,
    },
    InSet {
        field: Field,
        values: Vec<Value>,
    },
    Null {
        field: Field,
        negated: bool,
    },
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(field: Field, op: CompareOp, value: Value) -> Self {
        Self::Compare { field, op, value }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        let mut terms = match self {
            Self::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Self::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Self::And(terms)
    }

    /// Conjunction of every predicate in `predicates`.
    ///
    /// An empty input yields an empty `And`, which `validate` rejects.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        predicates
            .into_iter()
            .fold(Self::And(Vec::new()), Predicate::and)
    }

    /// Every field referenced, in textual order.
    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<Field>) {
        match self {
            Self::Compare { field, .. } | Self::InSet { field, .. } | Self::Null { field, .. } => {
                out.push(*field)
            }
            Self::And(terms) => terms.iter().for_each(|term| term.collect_fields(out)),
        }
    }

    pub fn references(&self, entity: Entity) -> bool {
        self.fields().iter().any(|field| field.entity() == entity)
    }

    /// Checks composition rules that would otherwise fail in the store or
    /// silently match nothing.
    pub fn validate(&self) -> Result<(), QuerySpecError> {
        match self {
            Self::Compare { field, value, .. } => check_value(*field, value),
            Self::InSet { field, values } => {
                if values.is_empty() {
                    return Err(QuerySpecError::EmptyInList { field: *field });
                }
                values.iter().try_for_each(|value| check_value(*field, value))
            }
            Self::Null { .. } => Ok(()),
            Self::And(terms) => {
                if terms.is_empty() {
                    return Err(QuerySpecError::EmptyConjunction);
                }
                terms.iter().try_for_each(Predicate::validate)
            }
        }
    }

    pub(crate) fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::Compare { field, op, value } => {
                sql.push_str(field.column());
                sql.push(' ');
                sql.push_str(op.sql());
                sql.push_str(" ?");
                params.push(value.clone());
            }
            Self::InSet { field, values } => {
                sql.push_str(field.column());
                sql.push_str(" IN (");
                sql.push_str(&vec!["?"; values.len()].join(", "));
                sql.push(')');
                params.extend(values.iter().cloned());
            }
            Self::Null { field, negated } => {
                sql.push_str(field.column());
                sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Self::And(terms) => {
                sql.push('(');
                for (index, term) in terms.iter().enumerate() {
                    if index > 0 {
                        sql.push_str(" AND ");
                    }
                    term.render(sql, params);
                }
                sql.push(')');
            }
        }
    }

    /// Evaluates the predicate against an in-memory member and its team.
    pub fn matches(&self, member: &Member, team: Option<&Team>) -> bool {
        match self {
            Self::Compare { field, op, value } => field
                .value_of(member, team)
                .sql_cmp(value)
                .is_some_and(|ordering| op.holds(ordering)),
            Self::InSet { field, values } => {
                let actual = field.value_of(member, team);
                values
                    .iter()
                    .any(|value| actual.sql_cmp(value) == Some(Ordering::Equal))
            }
            Self::Null { field, negated } => field.value_of(member, team).is_null() != *negated,
            Self::And(terms) => terms.iter().all(|term| term.matches(member, team)),
        }
    }
}

fn check_value(field: Field, value: &Value) -> Result<(), QuerySpecError> {
    match value.column_type() {
        None => Err(QuerySpecError::NullComparison { field }),
        Some(found) if found != field.column_type() => {
            // Integer columns may be compared with reals, e.g. an average.
            if field.column_type() == ColumnType::Integer && found == ColumnType::Real {
                return Ok(());
            }
            Err(QuerySpecError::TypeMismatch {
                field,
                expected: field.column_type(),
                found,
            })
        }
        Some(_) => Ok(()),
    }
}
