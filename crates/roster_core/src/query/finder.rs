//! Declarative finder specifications.
//!
//! A `FinderSpec` is the explicit form of a derived query name such as
//! `findByUsernameAndAgeGreaterThan`: a list of `(field, operator)` criteria
//! joined with AND, bound to arguments at call time.

use super::builder::QueryBuilder;
use super::field::{Entity, Field, OrderSpec};
use super::predicate::{CompareOp, Predicate};
use super::value::Value;
use super::QuerySpecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriterionOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    In,
    IsNull,
    IsNotNull,
}

impl CriterionOp {
    /// Number of arguments consumed by this operator.
    pub fn arity(self) -> usize {
        match self {
            Self::IsNull | Self::IsNotNull => 0,
            _ => 1,
        }
    }
}

/// Argument for one finder criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum FinderArg {
    One(Value),
    Many(Vec<Value>),
}

macro_rules! finder_arg_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FinderArg {
            fn from(value: $ty) -> Self {
                Self::One(value.into())
            }
        })*
    };
}

finder_arg_from!(Value, i64, i32, &str, String);

impl FinderArg {
    pub fn many<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Criterion {
    field: Field,
    op: CriterionOp,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinderSpec {
    criteria: Vec<Criterion>,
    ordering: Vec<OrderSpec>,
    fetch_team: bool,
}

impl FinderSpec {
    pub fn by(field: Field, op: CriterionOp) -> Self {
        Self::default().and(field, op)
    }

    pub fn and(mut self, field: Field, op: CriterionOp) -> Self {
        self.criteria.push(Criterion { field, op });
        self
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.ordering.push(order);
        self
    }

    /// Eagerly loads each member's team in the same statement. Members
    /// without a team are kept.
    pub fn fetch_team(mut self) -> Self {
        self.fetch_team = true;
        self
    }

    /// Total arguments expected by [`FinderSpec::bind`].
    pub fn arity(&self) -> usize {
        self.criteria.iter().map(|criterion| criterion.op.arity()).sum()
    }

    /// Binds `args` positionally and returns a member query.
    ///
    /// A spec that touches team fields gets an inner join, or a left fetch
    /// join when `fetch_team` is set.
    pub fn bind<I>(&self, args: I) -> Result<QueryBuilder, QuerySpecError>
    where
        I: IntoIterator<Item = FinderArg>,
    {
        let args: Vec<FinderArg> = args.into_iter().collect();
        if args.len() != self.arity() {
            return Err(QuerySpecError::ArityMismatch {
                expected: self.arity(),
                found: args.len(),
            });
        }

        let mut args = args.into_iter();
        let mut terms = Vec::with_capacity(self.criteria.len());
        for criterion in &self.criteria {
            let term = match criterion.op.arity() {
                0 => criterion_predicate(criterion, None)?,
                _ => criterion_predicate(criterion, args.next())?,
            };
            terms.push(term);
        }

        let mut builder = QueryBuilder::select_members();
        if self.fetch_team {
            builder = builder.left_fetch_join();
        } else if terms.iter().any(|term| term.references(Entity::Team))
            || self.ordering.iter().any(|o| o.field.entity() == Entity::Team)
        {
            builder = builder.join();
        }
        if !terms.is_empty() {
            builder = builder.filter(Predicate::all(terms));
        }
        for order in &self.ordering {
            builder = builder.order_by(*order);
        }
        Ok(builder)
    }
}

fn criterion_predicate(
    criterion: &Criterion,
    arg: Option<FinderArg>,
) -> Result<Predicate, QuerySpecError> {
    let field = criterion.field;
    let compare = |op: CompareOp, arg: Option<FinderArg>| match arg {
        Some(FinderArg::One(value)) => Ok(Predicate::compare(field, op, value)),
        Some(FinderArg::Many(_)) => Err(QuerySpecError::InvalidArgument(format!(
            "criterion on `{field}` takes a single value, got a list"
        ))),
        None => Err(QuerySpecError::ArityMismatch {
            expected: 1,
            found: 0,
        }),
    };

    match criterion.op {
        CriterionOp::Equals => compare(CompareOp::Eq, arg),
        CriterionOp::NotEquals => compare(CompareOp::Ne, arg),
        CriterionOp::GreaterThan => compare(CompareOp::Gt, arg),
        CriterionOp::GreaterThanEqual => compare(CompareOp::Ge, arg),
        CriterionOp::LessThan => compare(CompareOp::Lt, arg),
        CriterionOp::LessThanEqual => compare(CompareOp::Le, arg),
        CriterionOp::In => match arg {
            Some(FinderArg::Many(values)) => Ok(field.in_set(values)),
            Some(FinderArg::One(value)) => Ok(field.in_set([value])),
            None => Err(QuerySpecError::ArityMismatch {
                expected: 1,
                found: 0,
            }),
        },
        CriterionOp::IsNull => Ok(field.is_null()),
        CriterionOp::IsNotNull => Ok(field.is_not_null()),
    }
}

#[cfg(test)]
mod tests {
    use super::{CriterionOp, FinderArg, FinderSpec};
    use crate::query::{Field, QuerySpecError, Value};

    #[test]
    fn binds_username_and_age_greater_than() {
        let spec = FinderSpec::by(Field::Username, CriterionOp::Equals)
            .and(Field::Age, CriterionOp::GreaterThan);
        let statement = spec
            .bind([FinderArg::from("AAA"), FinderArg::from(10)])
            .unwrap()
            .build()
            .unwrap()
            .statement();
        assert_eq!(
            statement.sql,
            "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
             WHERE (m.username = ? AND m.age > ?) ORDER BY m.member_id ASC"
        );
        assert_eq!(statement.params, vec![Value::from("AAA"), Value::from(10)]);
    }

    #[test]
    fn arity_mismatch_fails_before_execution() {
        let spec = FinderSpec::by(Field::Username, CriterionOp::Equals)
            .and(Field::MemberTeamId, CriterionOp::IsNull);
        assert_eq!(spec.arity(), 1);
        assert_eq!(
            spec.bind([]).unwrap_err(),
            QuerySpecError::ArityMismatch {
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn team_criteria_add_join() {
        let statement = FinderSpec::by(Field::TeamName, CriterionOp::In)
            .bind([FinderArg::many(["teamA", "teamB"])])
            .unwrap()
            .build()
            .unwrap()
            .statement();
        assert!(statement
            .sql
            .contains("INNER JOIN team t ON t.team_id = m.team_id WHERE (t.name IN (?, ?))"));
    }
}
