//! Team entity.
//!
//! The member collection is not a field here: it is the relation index kept
//! by [`crate::session::IdentityMap`] and loaded with
//! [`crate::session::UnitOfWork::team_members`].

use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Store-generated surrogate key for teams.
pub type TeamId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<TeamId>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankTeamName);
        }
        Ok(())
    }
}
