//! Static and named query templates with `:name` parameters.
//!
//! # Invariants
//! - Parameters are discovered once, when the template is constructed.
//! - A template only renders once every declared parameter is bound.
//! - List parameters expand to a parenthesized placeholder list, so
//!   templates write `IN :names`, not `IN (:names)`.
//! - `:name` inside a single-quoted string literal is literal text.

use super::plan::{ColumnSpec, ResultShape, Statement};
use super::value::{ColumnType, Value};
use super::QuerySpecError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

// Quoted literals match the first branch and carry no capture groups.
static PARAMETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'(?:[^']|'')*'|(^|[^:\w]):([A-Za-z_][A-Za-z0-9_]*)")
        .expect("parameter pattern is valid")
});

/// What executing a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Rows of `member_id, username, age, team_id`.
    Members,
    /// Rows matching a declared column list.
    Columns,
    /// `UPDATE`/`DELETE` returning an affected-row count.
    Update,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Binding {
    One(Value),
    Many(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    name: String,
    kind: TemplateKind,
    shape: Option<ResultShape>,
    segments: Vec<Segment>,
    parameters: Vec<String>,
    bindings: BTreeMap<String, Binding>,
}

impl QueryTemplate {
    /// A template selecting member entity columns.
    pub fn members(name: impl Into<String>, sql: &str) -> Result<Self, QuerySpecError> {
        Self::parse(name.into(), TemplateKind::Members, Some(ResultShape::Members), sql)
    }

    /// A template whose select list is described by `columns`.
    pub fn columns(
        name: impl Into<String>,
        sql: &str,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self, QuerySpecError> {
        if columns.is_empty() {
            return Err(QuerySpecError::EmptyProjection);
        }
        Self::parse(
            name.into(),
            TemplateKind::Columns,
            Some(ResultShape::Columns(columns)),
            sql,
        )
    }

    /// A bulk `UPDATE`/`DELETE` template.
    pub fn update(name: impl Into<String>, sql: &str) -> Result<Self, QuerySpecError> {
        Self::parse(name.into(), TemplateKind::Update, None, sql)
    }

    fn parse(
        name: String,
        kind: TemplateKind,
        shape: Option<ResultShape>,
        sql: &str,
    ) -> Result<Self, QuerySpecError> {
        if sql.trim().is_empty() {
            return Err(QuerySpecError::InvalidTemplate(format!(
                "template `{name}` has no SQL"
            )));
        }
        if sql.contains('?') {
            return Err(QuerySpecError::InvalidTemplate(format!(
                "template `{name}` must use :name parameters, not `?`"
            )));
        }

        let mut segments = Vec::new();
        let mut parameters: Vec<String> = Vec::new();
        let mut cursor = 0;
        for captures in PARAMETER.captures_iter(sql) {
            let (Some(prefix), Some(param)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let colon = prefix.end();
            segments.push(Segment::Text(sql[cursor..colon].to_string()));
            let param_name = param.as_str().to_string();
            if !parameters.contains(&param_name) {
                parameters.push(param_name.clone());
            }
            segments.push(Segment::Param(param_name));
            cursor = param.end();
        }
        segments.push(Segment::Text(sql[cursor..].to_string()));

        Ok(Self {
            name,
            kind,
            shape,
            segments,
            parameters,
            bindings: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Declared parameter names in first-appearance order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn bind(self, name: &str, value: impl Into<Value>) -> Result<Self, QuerySpecError> {
        self.bind_as(name, Binding::One(value.into()))
    }

    pub fn bind_list<I, V>(self, name: &str, values: I) -> Result<Self, QuerySpecError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(QuerySpecError::InvalidArgument(format!(
                "list parameter `:{name}` is empty"
            )));
        }
        self.bind_as(name, Binding::Many(values))
    }

    fn bind_as(mut self, name: &str, binding: Binding) -> Result<Self, QuerySpecError> {
        if !self.parameters.iter().any(|declared| declared == name) {
            return Err(QuerySpecError::UnknownParameter(name.to_string()));
        }
        self.bindings.insert(name.to_string(), binding);
        Ok(self)
    }

    /// Renders positional SQL once every parameter is bound.
    pub fn build(&self) -> Result<BoundQuery, QuerySpecError> {
        let mut sql = String::new();
        let mut params = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Param(name) => match self.bindings.get(name) {
                    Some(Binding::One(value)) => {
                        sql.push('?');
                        params.push(value.clone());
                    }
                    Some(Binding::Many(values)) => {
                        sql.push('(');
                        sql.push_str(&vec!["?"; values.len()].join(", "));
                        sql.push(')');
                        params.extend(values.iter().cloned());
                    }
                    None => return Err(QuerySpecError::UnboundParameter(name.clone())),
                },
            }
        }

        Ok(BoundQuery {
            name: self.name.clone(),
            kind: self.kind,
            shape: self.shape.clone(),
            statement: Statement { sql, params },
        })
    }
}

/// A fully bound template ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    name: String,
    kind: TemplateKind,
    shape: Option<ResultShape>,
    statement: Statement,
}

impl BoundQuery {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// `None` for update templates.
    pub fn shape(&self) -> Option<&ResultShape> {
        self.shape.as_ref()
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

struct NamedQuery {
    name: &'static str,
    kind: TemplateKind,
    sql: &'static str,
    columns: &'static [(&'static str, ColumnType, bool)],
}

const NAMED_QUERIES: &[NamedQuery] = &[
    NamedQuery {
        name: "Member.findByUsername",
        kind: TemplateKind::Members,
        sql: "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
              WHERE m.username = :username ORDER BY m.member_id",
        columns: &[],
    },
    NamedQuery {
        name: "Member.findUser",
        kind: TemplateKind::Members,
        sql: "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
              WHERE m.username = :username AND m.age = :age ORDER BY m.member_id",
        columns: &[],
    },
    NamedQuery {
        name: "Member.findByNames",
        kind: TemplateKind::Members,
        sql: "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
              WHERE m.username IN :names ORDER BY m.member_id",
        columns: &[],
    },
    NamedQuery {
        name: "Member.findUsernames",
        kind: TemplateKind::Columns,
        sql: "SELECT m.username FROM member m ORDER BY m.member_id",
        columns: &[("member.username", ColumnType::Text, true)],
    },
    NamedQuery {
        name: "Member.findMemberDto",
        kind: TemplateKind::Columns,
        sql: "SELECT m.member_id, m.username, t.name FROM member m \
              INNER JOIN team t ON t.team_id = m.team_id ORDER BY m.member_id",
        columns: &[
            ("member.id", ColumnType::Integer, false),
            ("member.username", ColumnType::Text, true),
            ("team.name", ColumnType::Text, false),
        ],
    },
    NamedQuery {
        name: "Member.bulkAgePlus",
        kind: TemplateKind::Update,
        sql: "UPDATE member SET age = age + 1 WHERE age >= :age",
        columns: &[],
    },
];

/// Looks up a registered template by name, e.g. `Member.findByUsername`.
pub fn named_query(name: &str) -> Result<QueryTemplate, QuerySpecError> {
    let query = NAMED_QUERIES
        .iter()
        .find(|query| query.name == name)
        .ok_or_else(|| QuerySpecError::UnknownNamedQuery(name.to_string()))?;

    match query.kind {
        TemplateKind::Members => QueryTemplate::members(query.name, query.sql),
        TemplateKind::Update => QueryTemplate::update(query.name, query.sql),
        TemplateKind::Columns => QueryTemplate::columns(
            query.name,
            query.sql,
            query
                .columns
                .iter()
                .map(|(label, column_type, nullable)| ColumnSpec {
                    label: (*label).to_string(),
                    column_type: *column_type,
                    nullable: *nullable,
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{named_query, QueryTemplate, TemplateKind};
    use crate::query::{QuerySpecError, Value};

    #[test]
    fn parses_parameters_once_and_reuses_repeats() {
        let template = QueryTemplate::members(
            "adhoc",
            "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
             WHERE m.username = :name OR m.username = :name AND m.age = :age",
        )
        .unwrap();
        assert_eq!(template.parameters(), ["name", "age"]);

        let bound = template
            .bind("name", "member1")
            .unwrap()
            .bind("age", 10)
            .unwrap()
            .build()
            .unwrap();
        assert!(bound
            .statement()
            .sql
            .ends_with("WHERE m.username = ? OR m.username = ? AND m.age = ?"));
        assert_eq!(
            bound.statement().params,
            vec![Value::from("member1"), Value::from("member1"), Value::from(10)]
        );
    }

    #[test]
    fn list_parameters_expand() {
        let bound = named_query("Member.findByNames")
            .unwrap()
            .bind_list("names", ["AAA", "BBB"])
            .unwrap()
            .build()
            .unwrap();
        assert!(bound
            .statement()
            .sql
            .contains("WHERE m.username IN (?, ?) ORDER BY"));
        assert_eq!(bound.statement().params.len(), 2);
    }

    #[test]
    fn unbound_and_unknown_parameters_fail_at_construction() {
        let template = named_query("Member.findUser").unwrap();
        let err = template
            .clone()
            .bind("username", "member1")
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err, QuerySpecError::UnboundParameter("age".to_string()));

        let err = template.bind("nickname", "x").unwrap_err();
        assert_eq!(err, QuerySpecError::UnknownParameter("nickname".to_string()));
    }

    #[test]
    fn colon_names_inside_string_literals_are_not_parameters() {
        let template = QueryTemplate::members(
            "adhoc",
            "SELECT m.member_id, m.username, m.age, m.team_id FROM member m \
             WHERE m.username <> 'a :b' AND m.username <> 'it''s :c' AND m.age > :age",
        )
        .unwrap();
        assert_eq!(template.parameters(), ["age"]);

        let bound = template.bind("age", 5).unwrap().build().unwrap();
        assert!(bound
            .statement()
            .sql
            .ends_with("WHERE m.username <> 'a :b' AND m.username <> 'it''s :c' AND m.age > ?"));
    }

    #[test]
    fn rejects_positional_placeholders_and_unknown_names() {
        assert!(matches!(
            QueryTemplate::members("bad", "SELECT * FROM member WHERE age = ?"),
            Err(QuerySpecError::InvalidTemplate(_))
        ));
        assert_eq!(
            named_query("Member.nope").unwrap_err(),
            QuerySpecError::UnknownNamedQuery("Member.nope".to_string())
        );
        assert_eq!(
            named_query("Member.bulkAgePlus").unwrap().kind(),
            TemplateKind::Update
        );
    }
}
