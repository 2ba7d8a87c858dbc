//! Read-only projection shapes.
//!
//! None of these has a persistence lifecycle; they exist only as query
//! results. Row mapping lives in `session::row`.

use super::member::{Member, MemberId};
use super::team::Team;
use crate::query::{Field, SelectExpr, Value};
use serde::{Deserialize, Serialize};

/// Member id, name and team name from a member/team join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: Option<String>,
    pub team_name: String,
}

impl MemberDto {
    /// Select list matching the positional constructor order.
    pub fn projection() -> Vec<SelectExpr> {
        vec![
            Field::MemberId.into(),
            Field::Username.into(),
            Field::TeamName.into(),
        ]
    }
}

/// Member with its team materialized by a fetch join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWithTeam {
    pub member: Member,
    pub team: Option<Team>,
}

/// Untyped projection row keyed by selected expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    labels: Vec<String>,
    values: Vec<Value>,
}

impl Tuple {
    pub(crate) fn new(labels: Vec<String>, values: Vec<Value>) -> Self {
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at select-list position `index`.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value produced by `expr`, matched by its label.
    pub fn get(&self, expr: impl Into<SelectExpr>) -> Option<&Value> {
        let label = expr.into().label();
        self.labels
            .iter()
            .position(|candidate| *candidate == label)
            .and_then(|index| self.values.get(index))
    }

    pub fn get_i64(&self, expr: impl Into<SelectExpr>) -> Option<i64> {
        self.get(expr).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, expr: impl Into<SelectExpr>) -> Option<f64> {
        self.get(expr).and_then(Value::as_f64)
    }

    pub fn get_str(&self, expr: impl Into<SelectExpr>) -> Option<&str> {
        self.get(expr).and_then(Value::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
