//! Member/team entity model and read projections.
//!
//! # Responsibility
//! - Define the persisted records (`Member`, `Team`) and their invariants.
//! - Define read-only projection shapes produced by joins.
//!
//! # Invariants
//! - `Member::team_id` is the only authoritative side of the relationship;
//!   a team's member list is derived by the unit of work.
//! - Ids are assigned by the store on first persist and never reused.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod member;
pub mod projection;
pub mod team;

/// Entity invariant violation detected before any store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NegativeAge(i32),
    BlankTeamName,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeAge(age) => write!(f, "member age must be >= 0, got {age}"),
            Self::BlankTeamName => write!(f, "team name must not be blank"),
        }
    }
}

impl Error for ValidationError {}
