//! Query construction: typed builder, declarative finders, templates and
//! bulk mutations.
//!
//! # Responsibility
//! - Turn structured query descriptions into parameterized SQL plans.
//! - Reject malformed descriptions at construction time, before any store
//!   round trip.
//!
//! # Invariants
//! - Every user value reaches SQLite as a bound parameter, never inlined.
//! - A built plan is immutable; pagination renders windows from it.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod builder;
mod bulk;
mod field;
mod finder;
mod plan;
mod predicate;
mod select;
mod template;
mod value;

pub use builder::{JoinKind, QueryBuilder};
pub use bulk::{BulkMutation, BulkPlan};
pub use field::{Direction, Entity, Field, NullOrdering, OrderSpec};
pub use finder::{CriterionOp, FinderArg, FinderSpec};
pub use plan::{ColumnSpec, QueryPlan, ResultShape, Statement};
pub(crate) use plan::describe_columns;
pub use predicate::{CompareOp, Predicate};
pub use select::{AggregateFn, SelectExpr};
pub use template::{named_query, BoundQuery, QueryTemplate, TemplateKind};
pub use value::{ColumnType, Value};

/// Malformed query description. Never reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpecError {
    EmptyProjection,
    EmptyConjunction,
    EmptyInList {
        field: Field,
    },
    NullComparison {
        field: Field,
    },
    TypeMismatch {
        field: Field,
        expected: ColumnType,
        found: ColumnType,
    },
    MissingJoin {
        field: Field,
    },
    FetchJoinProjection,
    EntityWithAggregation,
    UngroupedField {
        field: Field,
    },
    AggregateTypeMismatch {
        func: AggregateFn,
        field: Field,
    },
    InvalidWindow(String),
    EmptyAssignment,
    NotUpdatable {
        field: Field,
    },
    ArityMismatch {
        expected: usize,
        found: usize,
    },
    InvalidArgument(String),
    InvalidTemplate(String),
    UnboundParameter(String),
    UnknownParameter(String),
    UnknownNamedQuery(String),
}

impl Display for QuerySpecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyProjection => write!(f, "select list must not be empty"),
            Self::EmptyConjunction => write!(f, "AND predicate must have at least one term"),
            Self::EmptyInList { field } => write!(f, "in-set predicate on `{field}` is empty"),
            Self::NullComparison { field } => write!(
                f,
                "cannot compare `{field}` with NULL; use is_null/is_not_null"
            ),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "`{field}` expects {expected} values, got {found}"),
            Self::MissingJoin { field } => {
                write!(f, "`{field}` requires a join from member to team")
            }
            Self::FetchJoinProjection => {
                write!(f, "fetch join requires selecting the member entity")
            }
            Self::EntityWithAggregation => {
                write!(f, "entity selection cannot be combined with aggregation")
            }
            Self::UngroupedField { field } => {
                write!(f, "`{field}` must appear in group by when aggregating")
            }
            Self::AggregateTypeMismatch { func, field } => {
                write!(f, "`{func}` is not defined for text field `{field}`")
            }
            Self::InvalidWindow(message) => write!(f, "invalid result window: {message}"),
            Self::EmptyAssignment => write!(f, "bulk update must assign at least one field"),
            Self::NotUpdatable { field } => write!(f, "`{field}` cannot be bulk updated"),
            Self::ArityMismatch { expected, found } => {
                write!(f, "finder expects {expected} arguments, got {found}")
            }
            Self::InvalidArgument(message) => write!(f, "invalid finder argument: {message}"),
            Self::InvalidTemplate(message) => write!(f, "invalid query template: {message}"),
            Self::UnboundParameter(name) => write!(f, "parameter `:{name}` is not bound"),
            Self::UnknownParameter(name) => {
                write!(f, "parameter `:{name}` is not declared by the template")
            }
            Self::UnknownNamedQuery(name) => write!(f, "no named query `{name}`"),
        }
    }
}

impl Error for QuerySpecError {}
