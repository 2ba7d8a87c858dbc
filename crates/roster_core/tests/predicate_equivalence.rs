use roster_core::db::open_db_in_memory;
use roster_core::query::{Field, Predicate, QueryBuilder};
use roster_core::{Member, MemberId, MemberWithTeam, Team, UnitOfWork, UnitOfWorkContext};

fn seed(uow: &mut UnitOfWork<'_>) {
    let team_a = uow.persist_team(Team::new("teamA")).unwrap();
    let team_b = uow.persist_team(Team::new("teamB")).unwrap();
    let rows: [(Option<&str>, i32, Option<i64>); 8] = [
        (Some("member1"), 10, Some(team_a)),
        (Some("member2"), 20, Some(team_a)),
        (Some("member3"), 30, Some(team_b)),
        (Some("member4"), 40, Some(team_b)),
        (None, 100, None),
        (Some("member5"), 100, None),
        (Some("AAA"), 0, Some(team_b)),
        (None, 25, Some(team_a)),
    ];
    for (username, age, team_id) in rows {
        uow.persist_member(Member {
            id: None,
            username: username.map(str::to_string),
            age,
            team_id,
        })
        .unwrap();
    }
}

fn predicates() -> Vec<Predicate> {
    vec![
        Field::Age.ge(20),
        Field::Age.lt(25).and(Field::Age.gt(0)),
        Field::Username.eq("member1"),
        Field::Username.ne("member1"),
        Field::Username.gt("member2"),
        Field::Username.is_null(),
        Field::Username.is_not_null().and(Field::Age.eq(100)),
        Field::Username.in_set(["AAA", "member4", "nobody"]),
        Field::MemberTeamId.is_null(),
        Field::TeamName.eq("teamA"),
        Field::TeamName.ne("teamA"),
        Field::TeamName.is_null(),
        Field::TeamName.in_set(["teamA", "teamB"]).and(Field::Age.le(20)),
        Field::TeamId.ge(2),
        Field::Age.in_set([10, 40, 100]),
    ]
}

#[test]
fn query_results_match_in_memory_filtering() {
    let mut conn = open_db_in_memory().unwrap();
    let mut uow = UnitOfWork::begin(&mut conn, UnitOfWorkContext::new()).unwrap();
    seed(&mut uow);

    let everything: Vec<MemberWithTeam> = uow
        .fetch(
            &QueryBuilder::select_members()
                .left_fetch_join()
                .build()
                .unwrap(),
        )
        .unwrap();
    assert_eq!(everything.len(), 8);

    for predicate in predicates() {
        let expected: Vec<MemberId> = everything
            .iter()
            .filter(|row| predicate.matches(&row.member, row.team.as_ref()))
            .filter_map(|row| row.member.id)
            .collect();

        let plan = QueryBuilder::select_members()
            .left_join()
            .filter(predicate.clone())
            .build()
            .unwrap();
        let actual: Vec<MemberId> = uow
            .fetch::<Member>(&plan)
            .unwrap()
            .into_iter()
            .filter_map(|member| member.id)
            .collect();

        assert_eq!(actual, expected, "predicate {predicate:?}");
        assert_eq!(uow.count(&plan).unwrap(), expected.len() as u64);
    }
}
