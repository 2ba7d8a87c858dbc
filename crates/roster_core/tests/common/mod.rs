#![allow(dead_code)]

use roster_core::{Member, MemberId, Team, TeamId, UnitOfWork};

pub struct Roster {
    pub team_a: TeamId,
    pub team_b: TeamId,
    /// member1..member4, in insertion order.
    pub members: Vec<MemberId>,
}

/// teamA: member1 (10), member2 (20); teamB: member3 (30), member4 (40).
pub fn seed_roster(uow: &mut UnitOfWork<'_>) -> Roster {
    let team_a = uow.persist_team(Team::new("teamA")).unwrap();
    let team_b = uow.persist_team(Team::new("teamB")).unwrap();
    let members = [
        ("member1", 10, team_a),
        ("member2", 20, team_a),
        ("member3", 30, team_b),
        ("member4", 40, team_b),
    ]
    .into_iter()
    .map(|(name, age, team)| uow.persist_member(Member::with_team(name, age, team)).unwrap())
    .collect();

    Roster {
        team_a,
        team_b,
        members,
    }
}

pub fn usernames(members: &[Member]) -> Vec<Option<&str>> {
    members
        .iter()
        .map(|member| member.username.as_deref())
        .collect()
}
