//! Team repository contract and SQLite implementation.

use crate::model::member::Member;
use crate::model::team::{Team, TeamId};
use crate::session::{AccessResult, UnitOfWork};

pub trait TeamRepository {
    /// Inserts a new team or renames a managed one.
    fn save(&mut self, team: Team) -> AccessResult<TeamId>;
    fn find_by_id(&mut self, id: TeamId) -> AccessResult<Option<Team>>;
    fn find_all(&mut self) -> AccessResult<Vec<Team>>;
    fn count(&mut self) -> AccessResult<u64>;
    /// Fails while members still reference the team.
    fn delete(&mut self, id: TeamId) -> AccessResult<()>;
    fn members_of(&mut self, id: TeamId) -> AccessResult<Vec<Member>>;
}

pub struct SqliteTeamRepository<'uow, 'conn> {
    uow: &'uow mut UnitOfWork<'conn>,
}

impl<'uow, 'conn> SqliteTeamRepository<'uow, 'conn> {
    pub fn new(uow: &'uow mut UnitOfWork<'conn>) -> Self {
        Self { uow }
    }
}

impl TeamRepository for SqliteTeamRepository<'_, '_> {
    fn save(&mut self, team: Team) -> AccessResult<TeamId> {
        let Some(id) = team.id else {
            return self.uow.persist_team(team);
        };
        team.validate()?;
        if self.uow.get_team(id)?.name != team.name {
            self.uow.rename_team(id, team.name)?;
        }
        Ok(id)
    }

    fn find_by_id(&mut self, id: TeamId) -> AccessResult<Option<Team>> {
        self.uow.find_team(id)
    }

    fn find_all(&mut self) -> AccessResult<Vec<Team>> {
        self.uow.all_teams()
    }

    fn count(&mut self) -> AccessResult<u64> {
        self.uow.count_teams()
    }

    fn delete(&mut self, id: TeamId) -> AccessResult<()> {
        self.uow.remove_team(id)
    }

    fn members_of(&mut self, id: TeamId) -> AccessResult<Vec<Member>> {
        self.uow.team_members(id)
    }
}
