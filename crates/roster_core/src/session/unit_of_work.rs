//! Transaction-scoped entity lifecycle.
//!
//! # Responsibility
//! - Insert and delete entities immediately; defer field updates to flush.
//! - Keep `Member::team_id` and the team member index in step.
//! - Count executed statements so eager loading can be verified.
//!
//! # Invariants
//! - One immediate transaction per unit of work; dropping without commit
//!   rolls back.
//! - Ids are assigned by SQLite on insert and never reused.

use super::row::FromRow;
use super::{AccessError, AccessResult, EntityRef, IdentityMap, UnitOfWorkContext};
use crate::model::member::{Member, MemberId};
use crate::model::team::{Team, TeamId};
use crate::query::{ResultShape, Statement, Value};
use log::{debug, error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

const MEMBER_BY_ID_SQL: &str =
    "SELECT m.member_id, m.username, m.age, m.team_id FROM member m WHERE m.member_id = ?";
const MEMBERS_OF_TEAM_SQL: &str = "SELECT m.member_id, m.username, m.age, m.team_id \
     FROM member m WHERE m.team_id = ? ORDER BY m.member_id ASC";

pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    context: UnitOfWorkContext,
    map: IdentityMap,
    statements: u64,
    started_at: Instant,
}

impl<'conn> UnitOfWork<'conn> {
    /// Opens an immediate transaction on a migrated connection.
    pub fn begin(conn: &'conn mut Connection, context: UnitOfWorkContext) -> AccessResult<Self> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| {
                error!(
                    "event=uow_begin module=session status=error uow_id={} error={err}",
                    context.id
                );
                err
            })?;
        info!(
            "event=uow_begin module=session status=ok uow_id={} actor={}",
            context.id,
            context.actor.as_deref().unwrap_or("-")
        );
        Ok(Self {
            tx,
            context,
            map: IdentityMap::new(),
            statements: 0,
            started_at: Instant::now(),
        })
    }

    pub fn context(&self) -> &UnitOfWorkContext {
        &self.context
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    /// Statements sent to SQLite since `begin`, including flush writes.
    pub fn statements_executed(&self) -> u64 {
        self.statements
    }

    pub fn persist_team(&mut self, mut team: Team) -> AccessResult<TeamId> {
        if team.id.is_some() {
            return Err(AccessError::InvalidState(
                "team is already persisted".to_string(),
            ));
        }
        team.validate()?;
        let statement = Statement {
            sql: "INSERT INTO team (name) VALUES (?)".to_string(),
            params: vec![Value::from(team.name.as_str())],
        };
        self.execute(&statement)?;
        let id = self.tx.last_insert_rowid();
        team.id = Some(id);
        self.map.merge_team(team)?;
        Ok(id)
    }

    /// Inserts `member` and joins it to its team's member collection.
    pub fn persist_member(&mut self, mut member: Member) -> AccessResult<MemberId> {
        if member.id.is_some() {
            return Err(AccessError::InvalidState(
                "member is already persisted".to_string(),
            ));
        }
        member.validate()?;
        if let Some(team_id) = member.team_id {
            self.get_team(team_id)?;
        }
        let statement = Statement {
            sql: "INSERT INTO member (username, age, team_id) VALUES (?, ?, ?)".to_string(),
            params: vec![
                member.username.clone().into(),
                member.age.into(),
                member.team_id.into(),
            ],
        };
        self.execute(&statement)?;
        let id = self.tx.last_insert_rowid();
        member.id = Some(id);
        self.map.merge_member(member)?;
        Ok(id)
    }

    pub fn find_member(&mut self, id: MemberId) -> AccessResult<Option<Member>> {
        if let Some(member) = self.map.member(id)? {
            return Ok(Some(member.clone()));
        }
        let statement = Statement {
            sql: MEMBER_BY_ID_SQL.to_string(),
            params: vec![Value::Integer(id)],
        };
        Ok(self
            .query::<Member>(&statement, &ResultShape::Members)?
            .into_iter()
            .next())
    }

    pub fn get_member(&mut self, id: MemberId) -> AccessResult<Member> {
        self.find_member(id)?
            .ok_or(AccessError::NotFound(EntityRef::Member(id)))
    }

    pub fn find_team(&mut self, id: TeamId) -> AccessResult<Option<Team>> {
        if let Some(team) = self.map.team(id) {
            return Ok(Some(team.clone()));
        }
        let statement = Statement {
            sql: "SELECT t.team_id, t.name FROM team t WHERE t.team_id = ?".to_string(),
            params: vec![Value::Integer(id)],
        };
        let found = {
            let mut stmt = self
                .tx
                .prepare(&statement.sql)
                .map_err(|err| AccessError::store(&statement, err))?;
            let mut rows = stmt
                .query([id])
                .map_err(|err| AccessError::store(&statement, err))?;
            let team = match rows.next().map_err(|err| AccessError::store(&statement, err))? {
                Some(row) => Some(Team {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                }),
                None => None,
            };
            team
        };
        self.statements += 1;
        found.map(|team| self.map.merge_team(team)).transpose()
    }

    pub fn get_team(&mut self, id: TeamId) -> AccessResult<Team> {
        self.find_team(id)?
            .ok_or(AccessError::NotFound(EntityRef::Team(id)))
    }

    /// Every team, ordered by id.
    pub fn all_teams(&mut self) -> AccessResult<Vec<Team>> {
        self.flush()?;
        let statement = Statement {
            sql: "SELECT t.team_id, t.name FROM team t ORDER BY t.team_id ASC".to_string(),
            params: Vec::new(),
        };
        let teams = {
            let mut stmt = self
                .tx
                .prepare(&statement.sql)
                .map_err(|err| AccessError::store(&statement, err))?;
            let teams = stmt
                .query_map([], |row| {
                    Ok(Team {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                    })
                })
                .map_err(|err| AccessError::store(&statement, err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| AccessError::store(&statement, err))?;
            teams
        };
        self.statements += 1;
        teams
            .into_iter()
            .map(|team| self.map.merge_team(team))
            .collect()
    }

    pub fn count_teams(&mut self) -> AccessResult<u64> {
        self.flush()?;
        self.query_count(&Statement {
            sql: "SELECT COUNT(*) FROM team".to_string(),
            params: Vec::new(),
        })
    }

    /// Lazily resolves a member's team: one statement if not yet managed.
    pub fn team_of(&mut self, member_id: MemberId) -> AccessResult<Option<Team>> {
        match self.get_member(member_id)?.team_id {
            Some(team_id) => self.find_team(team_id),
            None => Ok(None),
        }
    }

    /// Members of `team_id`, ordered by id. Loads the collection once.
    pub fn team_members(&mut self, team_id: TeamId) -> AccessResult<Vec<Member>> {
        self.get_team(team_id)?;
        if !self.map.collection_loaded(team_id) {
            self.flush()?;
            let statement = Statement {
                sql: MEMBERS_OF_TEAM_SQL.to_string(),
                params: vec![Value::Integer(team_id)],
            };
            self.query::<Member>(&statement, &ResultShape::Members)?;
            self.map.mark_collection_loaded(team_id);
        }
        self.map.members_of(team_id)
    }

    pub fn set_username(
        &mut self,
        member_id: MemberId,
        username: Option<String>,
    ) -> AccessResult<()> {
        self.get_member(member_id)?;
        self.map.set_username(member_id, username)
    }

    pub fn set_age(&mut self, member_id: MemberId, age: i32) -> AccessResult<()> {
        self.get_member(member_id)?;
        self.map.set_age(member_id, age)
    }

    /// Moves a member to `team_id`. Both sides change or neither does.
    pub fn change_team(&mut self, member_id: MemberId, team_id: TeamId) -> AccessResult<()> {
        self.get_member(member_id)?;
        self.get_team(team_id)?;
        self.map.change_team(member_id, Some(team_id))
    }

    pub fn leave_team(&mut self, member_id: MemberId) -> AccessResult<()> {
        self.get_member(member_id)?;
        self.map.change_team(member_id, None)
    }

    pub fn rename_team(&mut self, team_id: TeamId, name: impl Into<String>) -> AccessResult<()> {
        self.get_team(team_id)?;
        self.map.rename_team(team_id, name.into())
    }

    pub fn remove_member(&mut self, id: MemberId) -> AccessResult<()> {
        self.flush()?;
        let statement = Statement {
            sql: "DELETE FROM member WHERE member_id = ?".to_string(),
            params: vec![Value::Integer(id)],
        };
        if self.execute(&statement)? == 0 {
            return Err(AccessError::NotFound(EntityRef::Member(id)));
        }
        self.map.evict_member(id);
        Ok(())
    }

    /// Deletes a team. Fails with a store error while members still
    /// reference it.
    pub fn remove_team(&mut self, id: TeamId) -> AccessResult<()> {
        self.flush()?;
        let statement = Statement {
            sql: "DELETE FROM team WHERE team_id = ?".to_string(),
            params: vec![Value::Integer(id)],
        };
        if self.execute(&statement)? == 0 {
            return Err(AccessError::NotFound(EntityRef::Team(id)));
        }
        self.map.evict_team(id);
        Ok(())
    }

    /// Writes pending field changes. Returns the number of rows written.
    pub fn flush(&mut self) -> AccessResult<usize> {
        if !self.map.has_pending_changes() {
            return Ok(0);
        }
        let started_at = Instant::now();
        let (members, teams) = self.map.dirty();
        let written = self.write_dirty(&members, &teams).map_err(|err| {
            error!(
                "event=flush module=session status=error uow_id={} duration_ms={} error={err}",
                self.context.id,
                started_at.elapsed().as_millis()
            );
            err
        })?;

        self.map.mark_clean();
        info!(
            "event=flush module=session status=ok uow_id={} members={} teams={} duration_ms={}",
            self.context.id,
            members.len(),
            teams.len(),
            started_at.elapsed().as_millis()
        );
        Ok(written)
    }

    fn write_dirty(&mut self, members: &[Member], teams: &[Team]) -> AccessResult<usize> {
        let mut written = 0;
        for member in members {
            let Some(id) = member.id else { continue };
            written += self.execute(&Statement {
                sql: "UPDATE member SET username = ?, age = ?, team_id = ? WHERE member_id = ?"
                    .to_string(),
                params: vec![
                    member.username.clone().into(),
                    member.age.into(),
                    member.team_id.into(),
                    Value::Integer(id),
                ],
            })?;
        }
        for team in teams {
            let Some(id) = team.id else { continue };
            written += self.execute(&Statement {
                sql: "UPDATE team SET name = ? WHERE team_id = ?".to_string(),
                params: vec![Value::from(team.name.as_str()), Value::Integer(id)],
            })?;
        }
        Ok(written)
    }

    /// Detaches every managed entity. Pending changes are discarded.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn evict_member(&mut self, id: MemberId) {
        self.map.evict_member(id);
    }

    /// Reloads a member from the store, discarding pending changes and any
    /// stale mark.
    pub fn refresh_member(&mut self, id: MemberId) -> AccessResult<Member> {
        self.map.evict_member(id);
        self.get_member(id)
    }

    pub fn is_stale(&self, id: MemberId) -> bool {
        self.map.is_stale(id)
    }

    pub fn commit(mut self) -> AccessResult<()> {
        self.flush()?;
        let uow_id = self.context.id;
        self.tx.commit().map_err(|err| {
            error!("event=uow_commit module=session status=error uow_id={uow_id} error={err}");
            err
        })?;
        info!(
            "event=uow_commit module=session status=ok uow_id={uow_id} statements={} duration_ms={}",
            self.statements,
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn rollback(self) -> AccessResult<()> {
        let uow_id = self.context.id;
        self.tx.rollback()?;
        info!(
            "event=uow_rollback module=session status=ok uow_id={uow_id} duration_ms={}",
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Runs a row-returning statement and registers mapped entities.
    pub(super) fn query<T: FromRow>(
        &mut self,
        statement: &Statement,
        shape: &ResultShape,
    ) -> AccessResult<Vec<T>> {
        super::row::check_shape::<T>(shape)?;
        let started_at = Instant::now();
        let mapped = {
            let mut stmt = self
                .tx
                .prepare(&statement.sql)
                .map_err(|err| AccessError::store(statement, err))?;
            let mut rows = stmt
                .query(rusqlite::params_from_iter(statement.params.iter()))
                .map_err(|err| AccessError::store(statement, err))?;
            let mut mapped = Vec::new();
            while let Some(row) = rows.next().map_err(|err| AccessError::store(statement, err))? {
                let item = T::from_row(row, shape).map_err(|err| {
                    if super::row::is_mapping_error(&err) {
                        AccessError::ProjectionMismatch {
                            expected: T::expected(),
                            found: err.to_string(),
                        }
                    } else {
                        AccessError::store(statement, err)
                    }
                })?;
                mapped.push(item);
            }
            mapped
        };
        self.statements += 1;
        debug!(
            "event=query_exec module=session status=ok uow_id={} rows={} duration_ms={}",
            self.context.id,
            mapped.len(),
            started_at.elapsed().as_millis()
        );

        mapped
            .into_iter()
            .map(|item| item.register(&mut self.map))
            .collect()
    }

    pub(super) fn query_count(&mut self, statement: &Statement) -> AccessResult<u64> {
        let count: i64 = self
            .tx
            .query_row(
                &statement.sql,
                rusqlite::params_from_iter(statement.params.iter()),
                |row| row.get(0),
            )
            .map_err(|err| AccessError::store(statement, err))?;
        self.statements += 1;
        u64::try_from(count).map_err(|_| AccessError::ProjectionMismatch {
            expected: "non-negative count".to_string(),
            found: count.to_string(),
        })
    }

    /// Runs a statement ending in `RETURNING member_id`.
    pub(super) fn query_ids(&mut self, statement: &Statement) -> AccessResult<Vec<MemberId>> {
        let ids = {
            let mut stmt = self
                .tx
                .prepare(&statement.sql)
                .map_err(|err| AccessError::store(statement, err))?;
            let ids = stmt
                .query_map(rusqlite::params_from_iter(statement.params.iter()), |row| {
                    row.get::<_, MemberId>(0)
                })
                .map_err(|err| AccessError::store(statement, err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| AccessError::store(statement, err))?;
            ids
        };
        self.statements += 1;
        Ok(ids)
    }

    pub(super) fn execute(&mut self, statement: &Statement) -> AccessResult<usize> {
        let changed = self
            .tx
            .execute(
                &statement.sql,
                rusqlite::params_from_iter(statement.params.iter()),
            )
            .map_err(|err| AccessError::store(statement, err))?;
        self.statements += 1;
        Ok(changed)
    }

    pub(super) fn identity_map_mut(&mut self) -> &mut IdentityMap {
        &mut self.map
    }
}
