//! Builds parameterized COUNT, SELECT, INSERT, UPDATE, DELETE from a resolved resource and a selector.

use crate::config::{IdType, ResolvedResource};
use crate::criteria::{Criterion, Op, Selector};
use crate::error::AppError;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// `$n` or `$n::type` when the column has a PostgreSQL type.
    fn placeholder(&mut self, pg_type: Option<&str>, v: Value) -> String {
        match pg_type {
            Some(t) => {
                let n = self.push_param(cast_input(t, v));
                format!("${}::{}", n, t)
            }
            None => format!("${}", self.push_param(v)),
        }
    }
}

/// Lower-cased type name without modifiers: `NUMERIC(10,2)` -> `numeric`.
fn base_type(pg_type: &str) -> String {
    pg_type
        .split(['(', '['])
        .next()
        .unwrap_or(pg_type)
        .trim()
        .to_ascii_lowercase()
}

fn is_array_type(pg_type: &str) -> bool {
    pg_type.starts_with('_') || pg_type.ends_with("[]")
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// JSON array to a PostgreSQL array literal: `["a", null, 1]` -> `{"a",NULL,1}`.
fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::Array(inner) => array_literal(inner),
            Value::String(s) => quote_element(s),
            Value::Object(_) => quote_element(&v.to_string()),
            other => other.to_string(),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn is_json_type(pg_type: &str) -> bool {
    matches!(base_type(pg_type).as_str(), "json" | "jsonb")
}

/// Scalars bound against a cast go over the wire as text, so PostgreSQL parses them with the
/// column type's input function (`'3'::int4`, `'true'::bool`). JSON columns take the JSON text.
fn cast_input(pg_type: &str, v: Value) -> Value {
    match v {
        Value::Array(items) if is_array_type(pg_type) => Value::String(array_literal(&items)),
        Value::Null | Value::Array(_) | Value::Object(_) => v,
        _ if is_json_type(pg_type) => Value::String(v.to_string()),
        Value::String(_) => v,
        other => Value::String(other.to_string()),
    }
}

/// Types sqlx cannot decode into JSON directly; selected as text instead.
const TEXT_SELECTED: [&str; 20] = [
    "numeric", "decimal", "money", "time", "timetz", "interval", "inet", "cidr", "macaddr",
    "macaddr8", "bit", "varbit", "xml", "bytea", "tsvector", "tsquery", "point", "box", "citext",
    "pg_lsn",
];

enum SelectAs {
    Plain,
    Text,
    Json,
}

/// User-defined types (`schema.typename`) and the `TEXT_SELECTED` types come back as text,
/// arrays (`_int4`, `text[]`) as JSON.
fn select_as(pg_type: Option<&str>) -> SelectAs {
    let Some(t) = pg_type else {
        return SelectAs::Plain;
    };
    if is_array_type(t) {
        SelectAs::Json
    } else if t.contains('.') || TEXT_SELECTED.contains(&base_type(t).as_str()) {
        SelectAs::Text
    } else {
        SelectAs::Plain
    }
}

fn select_expr(resource: &ResolvedResource, column: &str) -> String {
    let q = quoted(column);
    match select_as(column_pg_type(resource, column)) {
        SelectAs::Plain => q,
        SelectAs::Text => format!("{}::text AS {}", q, q),
        SelectAs::Json => format!("to_jsonb({}) AS {}", q, q),
    }
}

/// Cast for the id column: its declared type, else one derived from `id_type`.
fn id_pg_type(resource: &ResolvedResource) -> Option<&str> {
    resource.pg_type(&resource.id_column).or(match resource.id_type {
        IdType::Uuid => Some("uuid"),
        IdType::Int | IdType::Text => None,
    })
}

fn column_pg_type<'a>(resource: &'a ResolvedResource, column: &str) -> Option<&'a str> {
    if column == resource.id_column {
        id_pg_type(resource)
    } else {
        resource.pg_type(column)
    }
}

fn scalar(c: &Criterion) -> Result<Value, AppError> {
    match &c.v {
        Value::Array(_) | Value::Object(_) => Err(AppError::BadRequest(format!(
            "criterion '{}' value must be a scalar",
            c.k
        ))),
        v => Ok(v.clone()),
    }
}

fn non_null_scalar(c: &Criterion) -> Result<Value, AppError> {
    let v = scalar(c)?;
    if v.is_null() {
        return Err(AppError::BadRequest(format!(
            "criterion '{}' with {} needs a value",
            c.k, c.o
        )));
    }
    Ok(v)
}

/// One criterion as a SQL predicate. `None` means the criterion does not constrain the result.
fn predicate(resource: &ResolvedResource, c: &Criterion, q: &mut QueryBuf) -> Result<Option<String>, AppError> {
    if resource.column(&c.k).is_none() {
        return Err(AppError::BadRequest(format!("unknown criterion key '{}'", c.k)));
    }
    let col = quoted(&c.k);
    let pg_type = column_pg_type(resource, &c.k);
    let sql = match c.o {
        Op::Eq => match scalar(c)? {
            Value::Null => format!("{} IS NULL", col),
            v => format!("{} = {}", col, q.placeholder(pg_type, v)),
        },
        Op::Neq => match scalar(c)? {
            Value::Null => format!("{} IS NOT NULL", col),
            v => format!("{} <> {}", col, q.placeholder(pg_type, v)),
        },
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let sign = match c.o {
                Op::Gt => ">",
                Op::Gte => ">=",
                Op::Lt => "<",
                _ => "<=",
            };
            let v = non_null_scalar(c)?;
            format!("{} {} {}", col, sign, q.placeholder(pg_type, v))
        }
        Op::Nil => format!("{} IS NULL", col),
        Op::NotNil => format!("{} IS NOT NULL", col),
        Op::Like | Op::ILike => {
            let keyword = if c.o == Op::Like { "LIKE" } else { "ILIKE" };
            let v = non_null_scalar(c)?;
            let v = match v {
                Value::String(_) => v,
                other => Value::String(other.to_string()),
            };
            format!("{}::text {} {}", col, keyword, q.placeholder(None, v))
        }
        Op::In | Op::NotIn => {
            if c.vlist.is_empty() {
                return Ok(match c.o {
                    Op::In => Some("1 = 0".to_string()),
                    _ => None,
                });
            }
            let mut placeholders = Vec::with_capacity(c.vlist.len());
            for v in &c.vlist {
                if v.is_array() || v.is_object() {
                    return Err(AppError::BadRequest(format!(
                        "criterion '{}' list values must be scalars",
                        c.k
                    )));
                }
                placeholders.push(q.placeholder(pg_type, v.clone()));
            }
            let keyword = if c.o == Op::In { "IN" } else { "NOT IN" };
            format!("{} {} ({})", col, keyword, placeholders.join(", "))
        }
    };
    Ok(Some(sql))
}

/// ` WHERE p1 AND p2 ...`, or empty when nothing constrains the result.
pub fn where_clause(resource: &ResolvedResource, criteria: &[Criterion], q: &mut QueryBuf) -> Result<String, AppError> {
    let mut parts = Vec::with_capacity(criteria.len());
    for c in criteria {
        if let Some(p) = predicate(resource, c, q)? {
            parts.push(p);
        }
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// Selected columns, restricted to the selectable allow-list.
fn select_column_list(resource: &ResolvedResource, columns: &[String]) -> String {
    let cols: Vec<String> = columns
        .iter()
        .filter(|c| resource.is_selectable(c))
        .map(|c| select_expr(resource, c))
        .collect();
    if cols.is_empty() {
        resource
            .selectable
            .iter()
            .map(|c| select_expr(resource, c))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        cols.join(", ")
    }
}

/// ORDER BY the selector column, then the id column as tie-break for stable pages.
fn order_clause(resource: &ResolvedResource, selector: &Selector) -> String {
    let order_by = if resource.is_selectable(&selector.order_by) {
        selector.order_by.as_str()
    } else {
        resource.id_column.as_str()
    };
    // A column selected under a cast shares its name with the output alias; qualify it so rows
    // sort by the stored value, not its text.
    let order_col = match select_as(column_pg_type(resource, order_by)) {
        SelectAs::Plain => quoted(order_by),
        _ => format!("{}.{}", quoted(&resource.table_name), quoted(order_by)),
    };
    let mut clause = format!(" ORDER BY {} {}", order_col, selector.order_dir.as_sql());
    if order_by != resource.id_column {
        clause.push_str(&format!(", {} ASC", quoted(&resource.id_column)));
    }
    clause
}

pub fn select_count(resource: &ResolvedResource, criteria: &[Criterion]) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, criteria, &mut q)?;
    q.sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM {}{}",
        quoted(&resource.table_name),
        where_sql
    );
    Ok(q)
}

pub fn select_many(resource: &ResolvedResource, selector: &Selector) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, &selector.criteria, &mut q)?;
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(resource, &selector.columns),
        quoted(&resource.table_name),
        where_sql,
        order_clause(resource, selector),
        selector.limit.min(resource.limit_max),
        selector.offset
    );
    Ok(q)
}

/// First row matching the selector.
pub fn select_one(resource: &ResolvedResource, selector: &Selector) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, &selector.criteria, &mut q)?;
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT 1",
        select_column_list(resource, &selector.columns),
        quoted(&resource.table_name),
        where_sql,
        order_clause(resource, selector)
    );
    Ok(q)
}

/// INSERT of the known columns present in `row`, returning the id.
pub fn insert_one(resource: &ResolvedResource, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&resource.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &resource.columns {
        let Some(v) = row.get(&c.name) else { continue };
        let ph = q.placeholder(column_pg_type(resource, &c.name), v.clone());
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    let id = quoted(&resource.id_column);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, id)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            id
        )
    };
    q
}

/// UPDATE by id: SET only known, non-id columns present in `change`.
/// With nothing to set the statement still matches the row so the affected count reports existence.
pub fn update_one(resource: &ResolvedResource, id: &Value, change: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_col = quoted(&resource.id_column);
    let mut sets = Vec::new();
    for c in &resource.columns {
        if c.name == resource.id_column {
            continue;
        }
        let Some(v) = change.get(&c.name) else { continue };
        let rhs = q.placeholder(c.pg_type.as_deref(), v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        sets.push(format!("{} = {}", id_col, id_col));
    }
    let id_ph = q.placeholder(id_pg_type(resource), id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&resource.table_name),
        sets.join(", "),
        id_col,
        id_ph
    );
    q
}

/// DELETE by id.
pub fn delete_one(resource: &ResolvedResource, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_ph = q.placeholder(id_pg_type(resource), id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(&resource.table_name),
        quoted(&resource.id_column),
        id_ph
    );
    q
}
