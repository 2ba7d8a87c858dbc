//! Typed column references and ordering specs.

use super::predicate::{CompareOp, Predicate};
use super::select::{AggregateFn, SelectExpr};
use super::value::{ColumnType, Value};
use crate::model::member::Member;
use crate::model::team::Team;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity a field belongs to. `Team` fields need a join from `member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Member,
    Team,
}

/// Queryable column of the member/team schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    MemberId,
    Username,
    Age,
    MemberTeamId,
    TeamId,
    TeamName,
}

impl Field {
    pub fn entity(self) -> Entity {
        match self {
            Self::MemberId | Self::Username | Self::Age | Self::MemberTeamId => Entity::Member,
            Self::TeamId | Self::TeamName => Entity::Team,
        }
    }

    /// Alias-qualified SQL column (`m` = member, `t` = team).
    pub fn column(self) -> &'static str {
        match self {
            Self::MemberId => "m.member_id",
            Self::Username => "m.username",
            Self::Age => "m.age",
            Self::MemberTeamId => "m.team_id",
            Self::TeamId => "t.team_id",
            Self::TeamName => "t.name",
        }
    }

    /// Unqualified column name, used by bulk `SET` clauses.
    pub fn bare_column(self) -> &'static str {
        match self {
            Self::MemberId => "member_id",
            Self::Username => "username",
            Self::Age => "age",
            Self::MemberTeamId | Self::TeamId => "team_id",
            Self::TeamName => "name",
        }
    }

    /// Stable label used for projected columns and tuple lookup.
    pub fn label(self) -> &'static str {
        match self {
            Self::MemberId => "member.id",
            Self::Username => "member.username",
            Self::Age => "member.age",
            Self::MemberTeamId => "member.team_id",
            Self::TeamId => "team.id",
            Self::TeamName => "team.name",
        }
    }

    pub fn column_type(self) -> ColumnType {
        match self {
            Self::Username | Self::TeamName => ColumnType::Text,
            Self::MemberId | Self::Age | Self::MemberTeamId | Self::TeamId => ColumnType::Integer,
        }
    }

    /// Whether the column itself may hold `NULL` (ignoring outer joins).
    pub fn nullable(self) -> bool {
        matches!(self, Self::Username | Self::MemberTeamId)
    }

    /// Reads this field from an in-memory member/team pair.
    ///
    /// Team fields read as `Null` when the member has no loaded team, which
    /// mirrors a left join.
    pub fn value_of(self, member: &Member, team: Option<&Team>) -> Value {
        match self {
            Self::MemberId => member.id.into(),
            Self::Username => member.username.clone().into(),
            Self::Age => member.age.into(),
            Self::MemberTeamId => member.team_id.into(),
            Self::TeamId => team.and_then(|team| team.id).into(),
            Self::TeamName => team.map(|team| team.name.clone()).into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Eq, value.into())
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Ne, value.into())
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Gt, value.into())
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Ge, value.into())
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Lt, value.into())
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(self, CompareOp::Le, value.into())
    }

    pub fn in_set<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::InSet {
            field: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::Null {
            field: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::Null {
            field: self,
            negated: true,
        }
    }

    pub fn asc(self) -> OrderSpec {
        OrderSpec::new(self, Direction::Asc)
    }

    pub fn desc(self) -> OrderSpec {
        OrderSpec::new(self, Direction::Desc)
    }

    pub fn count(self) -> SelectExpr {
        SelectExpr::aggregate(AggregateFn::Count, self)
    }

    pub fn sum(self) -> SelectExpr {
        SelectExpr::aggregate(AggregateFn::Sum, self)
    }

    pub fn avg(self) -> SelectExpr {
        SelectExpr::aggregate(AggregateFn::Avg, self)
    }

    pub fn max(self) -> SelectExpr {
        SelectExpr::aggregate(AggregateFn::Max, self)
    }

    pub fn min(self) -> SelectExpr {
        SelectExpr::aggregate(AggregateFn::Min, self)
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

/// Placement of `NULL`s, independent of [`Direction`].
///
/// `Default` keeps SQLite's behavior: nulls sort as the smallest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrdering {
    #[default]
    Default,
    First,
    Last,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: Field,
    pub direction: Direction,
    pub nulls: NullOrdering,
}

impl OrderSpec {
    pub fn new(field: Field, direction: Direction) -> Self {
        Self {
            field,
            direction,
            nulls: NullOrdering::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrdering::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrdering::Last;
        self
    }

    pub(crate) fn render(&self) -> String {
        let direction = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        let nulls = match self.nulls {
            NullOrdering::Default => "",
            NullOrdering::First => " NULLS FIRST",
            NullOrdering::Last => " NULLS LAST",
        };
        format!("{} {direction}{nulls}", self.field.column())
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, Field};
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::query::Value;

    #[test]
    fn order_spec_renders_null_policy_after_direction() {
        assert_eq!(Field::Age.desc().render(), "m.age DESC");
        assert_eq!(
            Field::Username.asc().nulls_last().render(),
            "m.username ASC NULLS LAST"
        );
        assert_eq!(
            Field::TeamName.desc().nulls_first().render(),
            "t.name DESC NULLS FIRST"
        );
    }

    #[test]
    fn team_fields_read_null_without_team() {
        let member = Member::new("member1", 10);
        assert_eq!(Field::TeamName.value_of(&member, None), Value::Null);
        let team = Team {
            id: Some(3),
            name: "teamA".to_string(),
        };
        assert_eq!(
            Field::TeamName.value_of(&member, Some(&team)),
            Value::from("teamA")
        );
        assert_eq!(Field::TeamName.entity(), Entity::Team);
    }
}
