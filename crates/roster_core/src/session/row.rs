//! Mapping result rows into entities, projections and scalars.

use super::{AccessError, AccessResult, IdentityMap};
use crate::model::member::Member;
use crate::model::projection::{MemberDto, MemberWithTeam, Tuple};
use crate::model::team::Team;
use crate::query::{describe_columns, ColumnType, ResultShape, Value};
use rusqlite::Row;

/// A type that result rows of some [`ResultShape`] map into.
pub trait FromRow: Sized {
    /// Row shape this type needs, for mismatch errors.
    fn expected() -> String;

    fn accepts(shape: &ResultShape) -> bool;

    fn from_row(row: &Row<'_>, shape: &ResultShape) -> rusqlite::Result<Self>;

    /// Hands entities to the identity map. Projections pass through.
    fn register(self, _map: &mut IdentityMap) -> AccessResult<Self> {
        Ok(self)
    }
}

pub(crate) fn check_shape<T: FromRow>(shape: &ResultShape) -> AccessResult<()> {
    if T::accepts(shape) {
        return Ok(());
    }
    Err(AccessError::ProjectionMismatch {
        expected: T::expected(),
        found: shape.describe(),
    })
}

/// Value-level conversion failures are projection errors, not store errors.
pub(crate) fn is_mapping_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnIndex(_)
    )
}

fn member_at(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: Some(row.get(0)?),
        username: row.get(1)?,
        age: row.get(2)?,
        team_id: row.get(3)?,
    })
}

fn single_column(shape: &ResultShape) -> Option<ColumnType> {
    match shape {
        ResultShape::Columns(columns) if columns.len() == 1 => Some(columns[0].column_type),
        _ => None,
    }
}

impl FromRow for Member {
    fn expected() -> String {
        ResultShape::Members.describe()
    }

    fn accepts(shape: &ResultShape) -> bool {
        matches!(shape, ResultShape::Members | ResultShape::MembersWithTeam)
    }

    fn from_row(row: &Row<'_>, _shape: &ResultShape) -> rusqlite::Result<Self> {
        member_at(row)
    }

    fn register(self, map: &mut IdentityMap) -> AccessResult<Self> {
        map.merge_member(self)
    }
}

impl FromRow for MemberWithTeam {
    fn expected() -> String {
        ResultShape::MembersWithTeam.describe()
    }

    fn accepts(shape: &ResultShape) -> bool {
        *shape == ResultShape::MembersWithTeam
    }

    fn from_row(row: &Row<'_>, _shape: &ResultShape) -> rusqlite::Result<Self> {
        let team_id: Option<i64> = row.get(4)?;
        let team_name: Option<String> = row.get(5)?;
        let team = match (team_id, team_name) {
            (Some(id), Some(name)) => Some(Team { id: Some(id), name }),
            _ => None,
        };
        Ok(Self {
            member: member_at(row)?,
            team,
        })
    }

    fn register(self, map: &mut IdentityMap) -> AccessResult<Self> {
        let team = self.team.map(|team| map.merge_team(team)).transpose()?;
        let member = map.merge_member(self.member)?;
        Ok(Self { member, team })
    }
}

// Positional mapping: both order and types must line up with the fields.
const MEMBER_DTO_COLUMNS: [(&str, ColumnType); 3] = [
    ("member.id", ColumnType::Integer),
    ("member.username", ColumnType::Text),
    ("team.name", ColumnType::Text),
];

impl FromRow for MemberDto {
    fn expected() -> String {
        describe_columns(MEMBER_DTO_COLUMNS.into_iter())
    }

    fn accepts(shape: &ResultShape) -> bool {
        match shape {
            ResultShape::Columns(columns) => columns
                .iter()
                .map(|column| (column.label.as_str(), column.column_type))
                .eq(MEMBER_DTO_COLUMNS),
            _ => false,
        }
    }

    fn from_row(row: &Row<'_>, _shape: &ResultShape) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            team_name: row.get(2)?,
        })
    }
}

impl FromRow for Tuple {
    fn expected() -> String {
        "scalar columns".to_string()
    }

    fn accepts(shape: &ResultShape) -> bool {
        matches!(shape, ResultShape::Columns(_))
    }

    fn from_row(row: &Row<'_>, shape: &ResultShape) -> rusqlite::Result<Self> {
        let ResultShape::Columns(columns) = shape else {
            return Err(rusqlite::Error::InvalidColumnIndex(0));
        };
        let mut labels = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let raw: rusqlite::types::Value = row.get(index)?;
            labels.push(column.label.clone());
            values.push(Value::from(raw));
        }
        Ok(Tuple::new(labels, values))
    }
}

// Single-column scalars. Reals also accept integer columns, which SQLite
// widens on read.
macro_rules! scalar_from_row {
    ($($ty:ty => [$first:ident $(| $rest:ident)*]),* $(,)?) => {
        $(impl FromRow for $ty {
            fn expected() -> String {
                format!("[{}]", ColumnType::$first)
            }

            fn accepts(shape: &ResultShape) -> bool {
                matches!(
                    single_column(shape),
                    Some(ColumnType::$first $(| ColumnType::$rest)*)
                )
            }

            fn from_row(row: &Row<'_>, _shape: &ResultShape) -> rusqlite::Result<Self> {
                row.get(0)
            }
        })*
    };
}

scalar_from_row!(
    String => [Text],
    Option<String> => [Text],
    i64 => [Integer],
    Option<i64> => [Integer],
    f64 => [Real | Integer],
    Option<f64> => [Real | Integer],
);

#[cfg(test)]
mod tests {
    use super::{check_shape, FromRow};
    use crate::model::member::Member;
    use crate::model::projection::{MemberDto, MemberWithTeam, Tuple};
    use crate::query::{ColumnSpec, ColumnType, ResultShape};
    use crate::session::AccessError;

    fn columns(types: &[ColumnType]) -> ResultShape {
        labelled(
            &types
                .iter()
                .enumerate()
                .map(|(index, column_type)| (format!("c{index}"), *column_type))
                .collect::<Vec<_>>(),
        )
    }

    fn labelled(columns: &[(String, ColumnType)]) -> ResultShape {
        ResultShape::Columns(
            columns
                .iter()
                .map(|(label, column_type)| ColumnSpec {
                    label: label.clone(),
                    column_type: *column_type,
                    nullable: true,
                })
                .collect(),
        )
    }

    fn dto_columns(labels: [&str; 3]) -> ResultShape {
        let types = [ColumnType::Integer, ColumnType::Text, ColumnType::Text];
        labelled(
            &labels
                .iter()
                .zip(types)
                .map(|(label, column_type)| (label.to_string(), column_type))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn dto_requires_fields_in_declared_order() {
        let exact = dto_columns(["member.id", "member.username", "team.name"]);
        assert!(MemberDto::accepts(&exact));

        let swapped = dto_columns(["member.id", "team.name", "member.username"]);
        assert!(!MemberDto::accepts(&swapped));

        let short = columns(&[ColumnType::Integer, ColumnType::Text]);
        match check_shape::<MemberDto>(&short).unwrap_err() {
            AccessError::ProjectionMismatch { expected, found } => {
                assert_eq!(
                    expected,
                    "[member.id integer, member.username text, team.name text]"
                );
                assert_eq!(found, "[c0 integer, c1 text]");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn entity_and_scalar_shapes_do_not_mix() {
        assert!(Member::accepts(&ResultShape::MembersWithTeam));
        assert!(!MemberWithTeam::accepts(&ResultShape::Members));
        assert!(!Tuple::accepts(&ResultShape::Members));
        assert!(!i64::accepts(&columns(&[ColumnType::Text])));
        assert!(f64::accepts(&columns(&[ColumnType::Integer])));
        assert!(!String::accepts(&columns(&[ColumnType::Text, ColumnType::Text])));
    }
}
