//! Repository layer over a unit of work.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for members and teams.
//! - Keep query construction details out of callers.
//!
//! # Invariants
//! - Repository writes enforce entity validation before persistence.
//! - Repositories borrow a unit of work and never commit it themselves.

pub mod member_repo;
pub mod team_repo;

pub use member_repo::{MemberRepository, SqliteMemberRepository};
pub use team_repo::{SqliteTeamRepository, TeamRepository};
