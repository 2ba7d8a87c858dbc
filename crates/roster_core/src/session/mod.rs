//! Unit of work: identity map, relationship bookkeeping and query execution.
//!
//! # Responsibility
//! - Scope one SQLite transaction and the entities managed inside it.
//! - Execute query plans, templates and bulk statements, mapping rows into
//!   entities, projections and tuples.
//!
//! # Invariants
//! - Pending entity changes are flushed before any query, count, template or
//!   bulk statement runs.
//! - Bulk statements never refresh cached entities; they mark them stale.
//! - Log lines carry metadata only; bound parameter values are never logged.

use crate::db::DbError;
use crate::model::member::MemberId;
use crate::model::team::TeamId;
use crate::model::ValidationError;
use crate::query::{QuerySpecError, Statement, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

mod execute;
mod identity_map;
mod row;
mod unit_of_work;

pub use execute::BulkOutcome;
pub use identity_map::IdentityMap;
pub use row::FromRow;
pub use unit_of_work::UnitOfWork;

pub type AccessResult<T> = Result<T, AccessError>;

/// Identifies one entity instance in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Member(MemberId),
    Team(TeamId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member#{id}"),
            Self::Team(id) => write!(f, "team#{id}"),
        }
    }
}

/// Store failure with the statement that caused it.
#[derive(Debug)]
pub struct StoreFailure {
    pub statement: Option<String>,
    pub params: Vec<Value>,
    pub source: DbError,
}

#[derive(Debug)]
pub enum AccessError {
    Specification(QuerySpecError),
    Store(StoreFailure),
    /// Rows cannot be mapped into the requested result type.
    ProjectionMismatch {
        expected: String,
        found: String,
    },
    /// A bulk statement changed this entity after it was loaded.
    StaleEntity(EntityRef),
    NotFound(EntityRef),
    Validation(ValidationError),
    NonUniqueResult {
        /// Rows read before giving up; reading stops at two.
        rows: usize,
    },
    InvalidState(String),
}

impl AccessError {
    pub(crate) fn store(statement: &Statement, err: rusqlite::Error) -> Self {
        Self::Store(StoreFailure {
            statement: Some(statement.sql.clone()),
            params: statement.params.clone(),
            source: DbError::Sqlite(err),
        })
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Specification(err) => write!(f, "{err}"),
            Self::Store(failure) => match &failure.statement {
                Some(sql) => write!(
                    f,
                    "store execution failed: {} (statement: {sql}; {} params)",
                    failure.source,
                    failure.params.len()
                ),
                None => write!(f, "store execution failed: {}", failure.source),
            },
            Self::ProjectionMismatch { expected, found } => {
                write!(f, "projection mismatch: expected {expected}, found {found}")
            }
            Self::StaleEntity(entity) => write!(
                f,
                "{entity} was changed by a bulk statement; evict, refresh or clear first"
            ),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NonUniqueResult { rows } => {
                write!(f, "expected at most one result, got at least {rows}")
            }
            Self::InvalidState(message) => write!(f, "invalid unit of work state: {message}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Specification(err) => Some(err),
            Self::Store(failure) => Some(&failure.source),
            Self::Validation(err) => Some(err),
            Self::ProjectionMismatch { .. }
            | Self::StaleEntity(_)
            | Self::NotFound(_)
            | Self::NonUniqueResult { .. }
            | Self::InvalidState(_) => None,
        }
    }
}

impl From<QuerySpecError> for AccessError {
    fn from(value: QuerySpecError) -> Self {
        Self::Specification(value)
    }
}

impl From<ValidationError> for AccessError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for AccessError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreFailure {
            statement: None,
            params: Vec::new(),
            source: value,
        })
    }
}

impl From<rusqlite::Error> for AccessError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

/// Caller identity threaded through a unit of work for log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWorkContext {
    pub id: Uuid,
    pub actor: Option<String>,
}

impl UnitOfWorkContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: None,
        }
    }

    pub fn for_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::new()
        }
    }
}

impl Default for UnitOfWorkContext {
    fn default() -> Self {
        Self::new()
    }
}
