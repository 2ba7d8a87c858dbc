//! Member entity.
//!
//! # Invariants
//! - `age >= 0`.
//! - `team_id` changes only through the unit of work so the team's derived
//!   member collection stays in step.

use super::team::TeamId;
use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Store-generated surrogate key for members.
pub type MemberId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// `None` until the member is persisted.
    pub id: Option<MemberId>,
    /// Nullable; queries can order nulls first or last.
    pub username: Option<String>,
    pub age: i32,
    /// Owning side of the member -> team relationship.
    pub team_id: Option<TeamId>,
}

impl Member {
    /// Creates a transient member without a team.
    pub fn new(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: None,
            username: Some(username.into()),
            age,
            team_id: None,
        }
    }

    /// Creates a transient member that will join `team_id` when persisted.
    pub fn with_team(username: impl Into<String>, age: i32, team_id: TeamId) -> Self {
        Self {
            team_id: Some(team_id),
            ..Self::new(username, age)
        }
    }

    /// Creates a transient member with a null username.
    pub fn anonymous(age: i32) -> Self {
        Self {
            id: None,
            username: None,
            age,
            team_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.age < 0 {
            return Err(ValidationError::NegativeAge(self.age));
        }
        Ok(())
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::Member;
    use crate::model::ValidationError;

    #[test]
    fn constructors_leave_identity_unassigned() {
        let member = Member::with_team("member1", 10, 7);
        assert!(!member.is_persisted());
        assert_eq!(member.username.as_deref(), Some("member1"));
        assert_eq!(member.team_id, Some(7));
        assert_eq!(Member::anonymous(100).username, None);
    }

    #[test]
    fn negative_age_is_rejected() {
        let err = Member::new("member1", -1).validate().unwrap_err();
        assert_eq!(err, ValidationError::NegativeAge(-1));
    }
}
