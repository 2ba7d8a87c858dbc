//! Per-unit-of-work cache of managed entities.
//!
//! # Invariants
//! - At most one managed instance per id.
//! - `team_members[t]` contains `m` iff the cached member `m` has
//!   `team_id == Some(t)`. Both sides change in the same call.
//! - Stale members are never handed out; callers must evict, refresh or
//!   clear first.

use super::{AccessError, AccessResult, EntityRef};
use crate::model::member::{Member, MemberId};
use crate::model::team::{Team, TeamId};
use crate::model::ValidationError;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct IdentityMap {
    members: BTreeMap<MemberId, Member>,
    teams: BTreeMap<TeamId, Team>,
    team_members: BTreeMap<TeamId, BTreeSet<MemberId>>,
    loaded_collections: BTreeSet<TeamId>,
    dirty_members: BTreeSet<MemberId>,
    dirty_teams: BTreeSet<TeamId>,
    stale_members: BTreeSet<MemberId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    pub fn contains_team(&self, id: TeamId) -> bool {
        self.teams.contains_key(&id)
    }

    pub fn is_stale(&self, id: MemberId) -> bool {
        self.stale_members.contains(&id)
    }

    /// Managed member, if cached. Stale members are an error.
    pub fn member(&self, id: MemberId) -> AccessResult<Option<&Member>> {
        if self.is_stale(id) {
            return Err(AccessError::StaleEntity(EntityRef::Member(id)));
        }
        Ok(self.members.get(&id))
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Registers a loaded member, or resolves to the already managed one.
    pub fn merge_member(&mut self, member: Member) -> AccessResult<Member> {
        let id = member.id.ok_or_else(|| {
            AccessError::InvalidState("cannot manage a member without an id".to_string())
        })?;
        if let Some(managed) = self.member(id)? {
            return Ok(managed.clone());
        }
        if let Some(team_id) = member.team_id {
            self.team_members.entry(team_id).or_default().insert(id);
        }
        self.members.insert(id, member.clone());
        Ok(member)
    }

    pub fn merge_team(&mut self, team: Team) -> AccessResult<Team> {
        let id = team.id.ok_or_else(|| {
            AccessError::InvalidState("cannot manage a team without an id".to_string())
        })?;
        Ok(self.teams.entry(id).or_insert(team).clone())
    }

    /// Cached members of `team_id`, ordered by id.
    pub fn members_of(&self, team_id: TeamId) -> AccessResult<Vec<Member>> {
        let Some(ids) = self.team_members.get(&team_id) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                self.member(*id)?
                    .cloned()
                    .ok_or(AccessError::NotFound(EntityRef::Member(*id)))
            })
            .collect()
    }

    pub fn collection_loaded(&self, team_id: TeamId) -> bool {
        self.loaded_collections.contains(&team_id)
    }

    pub fn mark_collection_loaded(&mut self, team_id: TeamId) {
        self.loaded_collections.insert(team_id);
    }

    /// Moves a member between teams, updating both sides together.
    ///
    /// Every check runs before any mutation, so a failure leaves the map
    /// untouched.
    pub fn change_team(&mut self, member_id: MemberId, team_id: Option<TeamId>) -> AccessResult<()> {
        let previous = self
            .member(member_id)?
            .ok_or(AccessError::NotFound(EntityRef::Member(member_id)))?
            .team_id;
        if let Some(team_id) = team_id {
            if !self.contains_team(team_id) {
                return Err(AccessError::NotFound(EntityRef::Team(team_id)));
            }
        }
        if previous == team_id {
            return Ok(());
        }

        if let Some(previous) = previous {
            if let Some(ids) = self.team_members.get_mut(&previous) {
                ids.remove(&member_id);
            }
        }
        if let Some(team_id) = team_id {
            self.team_members.entry(team_id).or_default().insert(member_id);
        }
        if let Some(member) = self.members.get_mut(&member_id) {
            member.team_id = team_id;
        }
        self.dirty_members.insert(member_id);
        Ok(())
    }

    pub fn set_username(&mut self, member_id: MemberId, username: Option<String>) -> AccessResult<()> {
        self.member_mut(member_id)?.username = username;
        self.dirty_members.insert(member_id);
        Ok(())
    }

    pub fn set_age(&mut self, member_id: MemberId, age: i32) -> AccessResult<()> {
        if age < 0 {
            return Err(ValidationError::NegativeAge(age).into());
        }
        self.member_mut(member_id)?.age = age;
        self.dirty_members.insert(member_id);
        Ok(())
    }

    pub fn rename_team(&mut self, team_id: TeamId, name: String) -> AccessResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankTeamName.into());
        }
        let team = self
            .teams
            .get_mut(&team_id)
            .ok_or(AccessError::NotFound(EntityRef::Team(team_id)))?;
        team.name = name;
        self.dirty_teams.insert(team_id);
        Ok(())
    }

    fn member_mut(&mut self, member_id: MemberId) -> AccessResult<&mut Member> {
        if self.is_stale(member_id) {
            return Err(AccessError::StaleEntity(EntityRef::Member(member_id)));
        }
        self.members
            .get_mut(&member_id)
            .ok_or(AccessError::NotFound(EntityRef::Member(member_id)))
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.dirty_members.is_empty() || !self.dirty_teams.is_empty()
    }

    /// Snapshot of modified entities awaiting flush.
    pub fn dirty(&self) -> (Vec<Member>, Vec<Team>) {
        let members = self
            .dirty_members
            .iter()
            .filter_map(|id| self.members.get(id).cloned())
            .collect();
        let teams = self
            .dirty_teams
            .iter()
            .filter_map(|id| self.teams.get(id).cloned())
            .collect();
        (members, teams)
    }

    pub fn mark_clean(&mut self) {
        self.dirty_members.clear();
        self.dirty_teams.clear();
    }

    /// Marks the cached subset of `ids` stale and returns it.
    ///
    /// Team collections are no longer known to be complete afterwards.
    pub fn mark_stale(&mut self, ids: &[MemberId]) -> Vec<MemberId> {
        let stale: Vec<MemberId> = ids
            .iter()
            .copied()
            .filter(|id| self.members.contains_key(id))
            .collect();
        self.stale_members.extend(stale.iter().copied());
        self.loaded_collections.clear();
        stale
    }

    /// Marks every cached member stale.
    pub fn mark_all_stale(&mut self) -> Vec<MemberId> {
        let ids: Vec<MemberId> = self.members.keys().copied().collect();
        self.mark_stale(&ids)
    }

    /// Stops managing `id`; pending changes to it are discarded.
    ///
    /// The member still belongs to its stored team, so that team's
    /// collection must be reloaded. A pending team change hides which team
    /// that is, and then every collection is reloaded.
    pub fn evict_member(&mut self, id: MemberId) {
        if let Some(member) = self.members.remove(&id) {
            if let Some(team_id) = member.team_id {
                if let Some(ids) = self.team_members.get_mut(&team_id) {
                    ids.remove(&id);
                }
                self.loaded_collections.remove(&team_id);
            }
        }
        if self.dirty_members.remove(&id) {
            self.loaded_collections.clear();
        }
        self.stale_members.remove(&id);
    }

    pub fn evict_team(&mut self, id: TeamId) {
        self.teams.remove(&id);
        self.team_members.remove(&id);
        self.loaded_collections.remove(&id);
        self.dirty_teams.remove(&id);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::IdentityMap;
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::session::{AccessError, EntityRef};

    fn team(id: i64, name: &str) -> Team {
        Team {
            id: Some(id),
            name: name.to_string(),
        }
    }

    fn member(id: i64, name: &str, team_id: Option<i64>) -> Member {
        Member {
            id: Some(id),
            username: Some(name.to_string()),
            age: 10,
            team_id,
        }
    }

    fn seeded() -> IdentityMap {
        let mut map = IdentityMap::new();
        map.merge_team(team(1, "teamA")).unwrap();
        map.merge_team(team(2, "teamB")).unwrap();
        map.merge_member(member(1, "member1", Some(1))).unwrap();
        map.merge_member(member(2, "member2", Some(1))).unwrap();
        map
    }

    #[test]
    fn change_team_updates_both_sides() {
        let mut map = seeded();
        map.change_team(1, Some(2)).unwrap();

        let names = |team_id| -> Vec<Option<String>> {
            map.members_of(team_id)
                .unwrap()
                .into_iter()
                .map(|m| m.username)
                .collect()
        };
        assert_eq!(names(1), vec![Some("member2".to_string())]);
        assert_eq!(names(2), vec![Some("member1".to_string())]);
        assert_eq!(map.member(1).unwrap().unwrap().team_id, Some(2));
        assert!(map.has_pending_changes());
    }

    #[test]
    fn failed_change_team_leaves_map_untouched() {
        let mut map = seeded();
        let err = map.change_team(1, Some(99)).unwrap_err();
        assert!(matches!(err, AccessError::NotFound(EntityRef::Team(99))));
        assert_eq!(map.member(1).unwrap().unwrap().team_id, Some(1));
        assert_eq!(map.members_of(1).unwrap().len(), 2);
        assert!(!map.has_pending_changes());
    }

    #[test]
    fn merge_resolves_to_managed_instance() {
        let mut map = seeded();
        map.set_age(1, 42).unwrap();
        let resolved = map.merge_member(member(1, "member1", Some(1))).unwrap();
        assert_eq!(resolved.age, 42);
        assert_eq!(map.member_count(), 2);
    }

    #[test]
    fn stale_members_are_not_handed_out() {
        let mut map = seeded();
        assert_eq!(map.mark_stale(&[2, 7]), vec![2]);
        assert!(matches!(
            map.member(2),
            Err(AccessError::StaleEntity(EntityRef::Member(2)))
        ));
        assert!(map.members_of(1).is_err());

        map.evict_member(2);
        assert!(map.member(2).unwrap().is_none());
        assert_eq!(map.members_of(1).unwrap().len(), 1);
    }

    #[test]
    fn evicting_a_member_unloads_its_team_collection() {
        let mut map = seeded();
        map.mark_collection_loaded(1);
        map.mark_collection_loaded(2);

        map.evict_member(1);
        assert!(!map.collection_loaded(1));
        assert!(map.collection_loaded(2));

        map.mark_collection_loaded(1);
        map.change_team(2, Some(2)).unwrap();
        map.evict_member(2);
        assert!(!map.collection_loaded(1));
        assert!(!map.collection_loaded(2));
    }

    #[test]
    fn validation_runs_before_mutation() {
        let mut map = seeded();
        assert!(matches!(map.set_age(1, -1), Err(AccessError::Validation(_))));
        assert!(matches!(
            map.rename_team(1, "  ".to_string()),
            Err(AccessError::Validation(_))
        ));
        assert!(!map.has_pending_changes());
    }
}
