//! Typed entity access and pagination over a SQLite member/team store.
//!
//! # Responsibility
//! - Own the member/team model, query construction, result shaping and
//!   the transaction-scoped unit of work.
//! - Provide the SQLite bootstrap, logging and configuration used by callers.
//!
//! # Invariants
//! - Malformed queries are rejected while being built, never by the store.
//! - Query results always reflect pending changes of the same unit of work.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod page;
pub mod query;
pub mod repo;
pub mod session;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_store, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::member::{Member, MemberId};
pub use model::projection::{MemberDto, MemberWithTeam, Tuple};
pub use model::team::{Team, TeamId};
pub use model::ValidationError;
pub use page::{Page, PageRequest, Slice};
pub use query::{Field, QueryBuilder, QuerySpecError, SelectExpr, Value};
pub use repo::{MemberRepository, SqliteMemberRepository, SqliteTeamRepository, TeamRepository};
pub use session::{
    AccessError, AccessResult, BulkOutcome, EntityRef, UnitOfWork, UnitOfWorkContext,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
