//! CLI smoke entry point.
//!
//! # Responsibility
//! - Seed the configured store (in-memory by default) and print a few query
//!   results to verify `roster_core` linkage end to end.
//! - Keep output deterministic for quick local sanity checks.

use log::info;
use roster_core::query::{Field, SelectExpr};
use roster_core::{
    init_logging_from_config, open_store, Member, MemberRepository, PageRequest, QueryBuilder,
    SqliteMemberRepository, StoreConfig, Team, Tuple, UnitOfWork, UnitOfWorkContext,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::from_env()?;
    init_logging_from_config(&config)?;
    let mut conn = open_store(&config)?;
    let mut uow = UnitOfWork::begin(&mut conn, UnitOfWorkContext::for_actor("roster_cli"))?;

    let team_a = uow.persist_team(Team::new("teamA"))?;
    let team_b = uow.persist_team(Team::new("teamB"))?;
    for (name, age, team) in [
        ("member1", 10, team_a),
        ("member2", 20, team_a),
        ("member3", 30, team_b),
        ("member4", 40, team_b),
    ] {
        uow.persist_member(Member::with_team(name, age, team))?;
    }

    println!("roster_core version={}", roster_core::core_version());

    let averages = QueryBuilder::select([SelectExpr::from(Field::TeamName), Field::Age.avg()])
        .join()
        .group_by([Field::TeamName])
        .build()?;
    for row in uow.fetch::<Tuple>(&averages)? {
        println!(
            "team={} avg_age={}",
            row.get_str(Field::TeamName).unwrap_or("-"),
            row.get_f64(Field::Age.avg()).unwrap_or_default()
        );
    }

    {
        let mut members = SqliteMemberRepository::new(&mut uow);
        for dto in members.find_member_dtos()? {
            println!(
                "member id={} username={} team={}",
                dto.id,
                dto.username.as_deref().unwrap_or("-"),
                dto.team_name
            );
        }
    }

    let request = PageRequest::of(0, 3)?.sorted_by([Field::Username.desc()]);
    let page = uow.fetch_page::<Member>(QueryBuilder::select_members(), &request)?;
    println!(
        "page number={} size={} total_elements={} total_pages={} has_next={}",
        page.number(),
        page.content().len(),
        page.total_elements(),
        page.total_pages(),
        page.has_next()
    );

    info!(
        "event=cli_run module=cli status=ok statements={}",
        uow.statements_executed()
    );
    uow.commit()?;
    Ok(())
}
