//! Member repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose member use cases (derived finders, named and static templates,
//!   projections, paging, bulk age update) over a unit of work.
//!
//! # Invariants
//! - Every method runs inside the borrowed unit of work; nothing commits.
//! - Writes validate the entity before reaching the store.

use crate::model::member::{Member, MemberId};
use crate::model::projection::{MemberDto, MemberWithTeam};
use crate::page::{Page, PageRequest, Slice};
use crate::query::{
    named_query, BulkMutation, CriterionOp, Field, FinderArg, FinderSpec, QueryBuilder,
    QueryTemplate,
};
use crate::session::{AccessResult, BulkOutcome, UnitOfWork};

const FIND_USER_SQL: &str = "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
     WHERE m.username = :username AND m.age = :age ORDER BY m.member_id";

/// Repository interface for member use cases.
pub trait MemberRepository {
    /// Inserts a new member or writes changes to a managed one.
    fn save(&mut self, member: Member) -> AccessResult<MemberId>;
    fn find_by_id(&mut self, id: MemberId) -> AccessResult<Option<Member>>;
    /// All members with their teams loaded in the same statement.
    fn find_all(&mut self) -> AccessResult<Vec<MemberWithTeam>>;
    fn count(&mut self) -> AccessResult<u64>;
    fn delete(&mut self, id: MemberId) -> AccessResult<()>;
    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i32,
    ) -> AccessResult<Vec<Member>>;
    /// Uses the registered `Member.findByUsername` query.
    fn find_by_username_named(&mut self, username: &str) -> AccessResult<Vec<Member>>;
    fn find_user(&mut self, username: &str, age: i32) -> AccessResult<Vec<Member>>;
    fn find_usernames(&mut self) -> AccessResult<Vec<Option<String>>>;
    /// Members that belong to a team, as DTOs.
    fn find_member_dtos(&mut self) -> AccessResult<Vec<MemberDto>>;
    fn find_by_names(&mut self, names: &[&str]) -> AccessResult<Vec<Member>>;
    /// Fails with `NonUniqueResult` when more than one member matches.
    fn find_one_by_username(&mut self, username: &str) -> AccessResult<Option<Member>>;
    fn find_page_by_age(&mut self, age: i32, request: &PageRequest) -> AccessResult<Page<Member>>;
    fn find_slice_by_age(&mut self, age: i32, request: &PageRequest)
        -> AccessResult<Slice<Member>>;
    fn find_list_by_age(&mut self, age: i32, request: &PageRequest) -> AccessResult<Vec<Member>>;
    /// Adds one year to every member aged `age` or older.
    fn bulk_age_plus(&mut self, age: i32) -> AccessResult<BulkOutcome>;
    fn find_with_team(&mut self, username: &str) -> AccessResult<Vec<MemberWithTeam>>;
}

/// SQLite-backed member repository bound to one unit of work.
pub struct SqliteMemberRepository<'uow, 'conn> {
    uow: &'uow mut UnitOfWork<'conn>,
}

impl<'uow, 'conn> SqliteMemberRepository<'uow, 'conn> {
    pub fn new(uow: &'uow mut UnitOfWork<'conn>) -> Self {
        Self { uow }
    }

    fn by_age(age: i32) -> AccessResult<QueryBuilder> {
        Ok(FinderSpec::by(Field::Age, CriterionOp::Equals).bind([FinderArg::from(age)])?)
    }
}

impl MemberRepository for SqliteMemberRepository<'_, '_> {
    fn save(&mut self, member: Member) -> AccessResult<MemberId> {
        let Some(id) = member.id else {
            return self.uow.persist_member(member);
        };
        member.validate()?;
        let current = self.uow.get_member(id)?;
        if current.username != member.username {
            self.uow.set_username(id, member.username)?;
        }
        if current.age != member.age {
            self.uow.set_age(id, member.age)?;
        }
        match member.team_id {
            Some(team_id) if current.team_id != Some(team_id) => {
                self.uow.change_team(id, team_id)?
            }
            None if current.team_id.is_some() => self.uow.leave_team(id)?,
            _ => {}
        }
        Ok(id)
    }

    fn find_by_id(&mut self, id: MemberId) -> AccessResult<Option<Member>> {
        self.uow.find_member(id)
    }

    fn find_all(&mut self) -> AccessResult<Vec<MemberWithTeam>> {
        let plan = QueryBuilder::select_members().left_fetch_join().build()?;
        self.uow.fetch(&plan)
    }

    fn count(&mut self) -> AccessResult<u64> {
        let plan = QueryBuilder::select_members().build()?;
        self.uow.count(&plan)
    }

    fn delete(&mut self, id: MemberId) -> AccessResult<()> {
        self.uow.remove_member(id)
    }

    fn find_by_username_and_age_greater_than(
        &mut self,
        username: &str,
        age: i32,
    ) -> AccessResult<Vec<Member>> {
        let plan = FinderSpec::by(Field::Username, CriterionOp::Equals)
            .and(Field::Age, CriterionOp::GreaterThan)
            .bind([FinderArg::from(username), FinderArg::from(age)])?
            .build()?;
        self.uow.fetch(&plan)
    }

    fn find_by_username_named(&mut self, username: &str) -> AccessResult<Vec<Member>> {
        let query = named_query("Member.findByUsername")?
            .bind("username", username)?
            .build()?;
        self.uow.fetch_template(&query)
    }

    fn find_user(&mut self, username: &str, age: i32) -> AccessResult<Vec<Member>> {
        let query = QueryTemplate::members("Member.findUser", FIND_USER_SQL)?
            .bind("username", username)?
            .bind("age", age)?
            .build()?;
        self.uow.fetch_template(&query)
    }

    fn find_usernames(&mut self) -> AccessResult<Vec<Option<String>>> {
        let query = named_query("Member.findUsernames")?.build()?;
        self.uow.fetch_template(&query)
    }

    fn find_member_dtos(&mut self) -> AccessResult<Vec<MemberDto>> {
        let plan = QueryBuilder::select(MemberDto::projection())
            .join()
            .build()?;
        self.uow.fetch(&plan)
    }

    fn find_by_names(&mut self, names: &[&str]) -> AccessResult<Vec<Member>> {
        let query = named_query("Member.findByNames")?
            .bind_list("names", names.iter().copied())?
            .build()?;
        self.uow.fetch_template(&query)
    }

    fn find_one_by_username(&mut self, username: &str) -> AccessResult<Option<Member>> {
        let plan = FinderSpec::by(Field::Username, CriterionOp::Equals)
            .bind([FinderArg::from(username)])?
            .build()?;
        self.uow.fetch_one(&plan)
    }

    fn find_page_by_age(&mut self, age: i32, request: &PageRequest) -> AccessResult<Page<Member>> {
        self.uow.fetch_page(Self::by_age(age)?, request)
    }

    fn find_slice_by_age(
        &mut self,
        age: i32,
        request: &PageRequest,
    ) -> AccessResult<Slice<Member>> {
        self.uow.fetch_slice(Self::by_age(age)?, request)
    }

    fn find_list_by_age(&mut self, age: i32, request: &PageRequest) -> AccessResult<Vec<Member>> {
        let plan = Self::by_age(age)?.page(request).build()?;
        self.uow.fetch(&plan)
    }

    fn bulk_age_plus(&mut self, age: i32) -> AccessResult<BulkOutcome> {
        let plan = BulkMutation::update_members()
            .increment(Field::Age, 1)
            .filter(Field::Age.ge(age))
            .build()?;
        self.uow.execute_bulk(&plan)
    }

    fn find_with_team(&mut self, username: &str) -> AccessResult<Vec<MemberWithTeam>> {
        let plan = FinderSpec::by(Field::Username, CriterionOp::Equals)
            .fetch_team()
            .bind([FinderArg::from(username)])?
            .build()?;
        self.uow.fetch(&plan)
    }
}
