//! Set-based member updates and deletes.
//!
//! # Invariants
//! - Statements run directly against the store; they never consult or
//!   update cached entities. The unit of work marks returned ids stale.
//! - Every statement ends in `RETURNING member_id` so callers learn
//!   exactly which rows changed.

use super::field::{Entity, Field};
use super::plan::Statement;
use super::predicate::Predicate;
use super::value::{ColumnType, Value};
use super::QuerySpecError;

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Set(Field, Value),
    Increment(Field, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkKind {
    Update,
    Delete,
}

/// Builder for a bulk statement over `member`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkMutation {
    kind: BulkKind,
    assignments: Vec<Assignment>,
    predicate: Option<Predicate>,
}

impl BulkMutation {
    pub fn update_members() -> Self {
        Self {
            kind: BulkKind::Update,
            assignments: Vec::new(),
            predicate: None,
        }
    }

    pub fn delete_members() -> Self {
        Self {
            kind: BulkKind::Delete,
            assignments: Vec::new(),
            predicate: None,
        }
    }

    /// `field = value`. Only nullable fields accept `NULL`.
    pub fn set(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment::Set(field, value.into()));
        self
    }

    /// `field = field + delta` on an integer field.
    pub fn increment(mut self, field: Field, delta: i64) -> Self {
        self.assignments.push(Assignment::Increment(field, delta));
        self
    }

    /// Adds a filter, AND-ed with any existing one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn build(self) -> Result<BulkPlan, QuerySpecError> {
        if self.kind == BulkKind::Update && self.assignments.is_empty() {
            return Err(QuerySpecError::EmptyAssignment);
        }
        self.assignments.iter().try_for_each(check_assignment)?;
        if let Some(predicate) = &self.predicate {
            predicate.validate()?;
        }

        Ok(BulkPlan {
            kind: self.kind,
            assignments: self.assignments,
            predicate: self.predicate,
        })
    }
}

fn check_assignment(assignment: &Assignment) -> Result<(), QuerySpecError> {
    let field = match assignment {
        Assignment::Set(field, _) | Assignment::Increment(field, _) => *field,
    };
    if !matches!(field, Field::Username | Field::Age | Field::MemberTeamId) {
        return Err(QuerySpecError::NotUpdatable { field });
    }

    match assignment {
        Assignment::Increment(field, _) if field.column_type() != ColumnType::Integer => {
            Err(QuerySpecError::TypeMismatch {
                field: *field,
                expected: ColumnType::Integer,
                found: field.column_type(),
            })
        }
        Assignment::Increment(..) => Ok(()),
        Assignment::Set(field, value) => match value.column_type() {
            None if field.nullable() => Ok(()),
            None => Err(QuerySpecError::NullComparison { field: *field }),
            Some(found) if found != field.column_type() => Err(QuerySpecError::TypeMismatch {
                field: *field,
                expected: field.column_type(),
                found,
            }),
            Some(_) => Ok(()),
        },
    }
}

/// Validated bulk statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkPlan {
    kind: BulkKind,
    assignments: Vec<Assignment>,
    predicate: Option<Predicate>,
}

impl BulkPlan {
    pub fn is_delete(&self) -> bool {
        self.kind == BulkKind::Delete
    }

    pub fn statement(&self) -> Statement {
        let mut sql = String::new();
        let mut params = Vec::new();

        match self.kind {
            BulkKind::Delete => sql.push_str("DELETE FROM member"),
            BulkKind::Update => {
                sql.push_str("UPDATE member SET ");
                let mut first = true;
                for assignment in &self.assignments {
                    if !first {
                        sql.push_str(", ");
                    }
                    first = false;
                    match assignment {
                        Assignment::Set(field, value) => {
                            sql.push_str(field.bare_column());
                            sql.push_str(" = ?");
                            params.push(value.clone());
                        }
                        Assignment::Increment(field, delta) => {
                            let column = field.bare_column();
                            sql.push_str(&format!("{column} = {column} + ?"));
                            params.push(Value::Integer(*delta));
                        }
                    }
                }
            }
        }

        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE member_id IN (SELECT m.member_id FROM member m");
            if predicate.references(Entity::Team) {
                sql.push_str(" LEFT JOIN team t ON t.team_id = m.team_id");
            }
            sql.push_str(" WHERE ");
            predicate.render(&mut sql, &mut params);
            sql.push(')');
        }
        sql.push_str(" RETURNING member_id");

        Statement { sql, params }
    }
}

#[cfg(test)]
mod tests {
    use super::BulkMutation;
    use crate::query::{ColumnType, Field, QuerySpecError, Value};

    #[test]
    fn increment_with_filter_renders_subselect() {
        let statement = BulkMutation::update_members()
            .increment(Field::Age, 1)
            .filter(Field::Age.ge(20))
            .build()
            .unwrap()
            .statement();
        assert_eq!(
            statement.sql,
            "UPDATE member SET age = age + ? WHERE member_id IN \
             (SELECT m.member_id FROM member m WHERE m.age >= ?) RETURNING member_id"
        );
        assert_eq!(statement.params, vec![Value::Integer(1), Value::from(20)]);
    }

    #[test]
    fn team_filter_joins_inside_subselect() {
        let plan = BulkMutation::delete_members()
            .filter(Field::TeamName.eq("teamA"))
            .build()
            .unwrap();
        assert!(plan.is_delete());
        assert_eq!(
            plan.statement().sql,
            "DELETE FROM member WHERE member_id IN (SELECT m.member_id FROM member m \
             LEFT JOIN team t ON t.team_id = m.team_id WHERE t.name = ?) RETURNING member_id"
        );
    }

    #[test]
    fn unfiltered_update_touches_every_row() {
        let statement = BulkMutation::update_members()
            .set(Field::Username, "renamed")
            .set(Field::MemberTeamId, None::<i64>)
            .build()
            .unwrap()
            .statement();
        assert_eq!(
            statement.sql,
            "UPDATE member SET username = ?, team_id = ? RETURNING member_id"
        );
    }

    #[test]
    fn rejects_invalid_assignments() {
        assert_eq!(
            BulkMutation::update_members().build().unwrap_err(),
            QuerySpecError::EmptyAssignment
        );
        assert_eq!(
            BulkMutation::update_members()
                .set(Field::TeamName, "x")
                .build()
                .unwrap_err(),
            QuerySpecError::NotUpdatable {
                field: Field::TeamName
            }
        );
        assert_eq!(
            BulkMutation::update_members()
                .increment(Field::Username, 1)
                .build()
                .unwrap_err(),
            QuerySpecError::TypeMismatch {
                field: Field::Username,
                expected: ColumnType::Integer,
                found: ColumnType::Text,
            }
        );
        assert_eq!(
            BulkMutation::update_members()
                .set(Field::Age, None::<i64>)
                .build()
                .unwrap_err(),
            QuerySpecError::NullComparison { field: Field::Age }
        );
    }
}
