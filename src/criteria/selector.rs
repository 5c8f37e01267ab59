//! Selector: allow-listed columns, criteria, ordering and clamped pagination.

use super::{Criterion, OrderDir};
use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::response::Page;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub columns: Vec<String>,
    pub criteria: Vec<Criterion>,
    pub order_by: String,
    pub order_dir: OrderDir,
    pub limit: u32,
    pub offset: u64,
}

/// Requested columns (array, or one comma-separated string) kept only when selectable.
/// Order follows the request, duplicates are dropped, and an empty result means every selectable column.
pub fn select_columns(requested: Option<&Value>, resource: &ResolvedResource) -> Vec<String> {
    let names: Vec<&str> = match requested {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => s.split(',').map(str::trim).collect(),
        _ => Vec::new(),
    };
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if resource.is_selectable(name) && !out.iter().any(|c| c == name) {
            out.push(name.to_string());
        }
    }
    if out.is_empty() {
        resource.selectable.clone()
    } else {
        out
    }
}

fn parse_int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Selector {
    /// Build a selector from a raw search-params object (see `parse_query_pairs`).
    pub fn from_query(query: &Value, resource: &ResolvedResource) -> Result<Self, AppError> {
        let columns = select_columns(query.get("columns"), resource);

        let criteria = match query.get("criteria") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let mut c: Criterion = serde_json::from_value(item.clone())
                        .map_err(|e| AppError::BadRequest(format!("invalid criterion: {}", e)))?;
                    // `{"o":"$in","v":[..]}` is read as a vlist.
                    if c.o.takes_list() && c.vlist.is_empty() && c.v.is_array() {
                        if let Value::Array(items) = std::mem::take(&mut c.v) {
                            c.vlist = items;
                        }
                    }
                    out.push(c);
                }
                out
            }
            Some(_) => return Err(AppError::BadRequest("criteria must be an array".into())),
        };
        for c in &criteria {
            if !resource.is_selectable(&c.k) {
                return Err(AppError::BadRequest(format!("unknown criterion key '{}'", c.k)));
            }
        }

        let limit = match parse_int(query.get("limit")) {
            Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX).min(resource.limit_max),
            _ => resource.limit_default,
        };
        // PostgreSQL OFFSET is a bigint, so any non-negative i64 passes through unchanged.
        let offset = match parse_int(query.get("offset")) {
            Some(n) => u64::try_from(n).unwrap_or(0),
            None => 0,
        };
        let order_by = query
            .get("orderBy")
            .and_then(Value::as_str)
            .filter(|c| resource.is_selectable(c))
            .unwrap_or(resource.id_column.as_str())
            .to_string();
        let order_dir = query
            .get("orderDir")
            .and_then(Value::as_str)
            .map(OrderDir::parse_or_default)
            .unwrap_or_default();

        Ok(Selector {
            columns,
            criteria,
            order_by,
            order_dir,
            limit,
            offset,
        })
    }

    /// Selector for a single row by id.
    pub fn by_id(resource: &ResolvedResource, id: Value) -> Self {
        Selector {
            columns: resource.selectable.clone(),
            criteria: vec![Criterion::eq(resource.id_column.clone(), id)],
            order_by: resource.id_column.clone(),
            order_dir: OrderDir::Asc,
            limit: 1,
            offset: 0,
        }
    }

    pub fn page(&self, count: u64) -> Page {
        Page {
            count,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::criteria::Op;
    use serde_json::json;

    fn users() -> ResolvedResource {
        let c: ResourceConfig = serde_json::from_value(json!({
            "table_name": "User",
            "columns": ["id", "name", "email", "password"],
            "no_select": ["password"],
            "limit_default": 20,
            "limit_max": 50
        }))
        .unwrap();
        ResolvedResource::from_config(&c)
    }

    #[test]
    fn empty_query_uses_defaults() {
        let s = Selector::from_query(&json!({}), &users()).unwrap();
        assert_eq!(s.columns, ["id", "name", "email"]);
        assert!(s.criteria.is_empty());
        assert_eq!(s.order_by, "id");
        assert_eq!(s.order_dir, OrderDir::Asc);
        assert_eq!((s.limit, s.offset), (20, 0));
    }

    #[test]
    fn clamps_limit_and_offset() {
        let r = users();
        let s = Selector::from_query(&json!({"limit": "5000", "offset": "-3"}), &r).unwrap();
        assert_eq!((s.limit, s.offset), (50, 0));
        let s = Selector::from_query(&json!({"limit": "0", "offset": "abc"}), &r).unwrap();
        assert_eq!((s.limit, s.offset), (20, 0));
        let s = Selector::from_query(&json!({"limit": 7, "offset": 14}), &r).unwrap();
        assert_eq!((s.limit, s.offset), (7, 14));
        let s = Selector::from_query(&json!({"offset": "5000000000"}), &r).unwrap();
        assert_eq!(s.offset, 5_000_000_000);
        assert_eq!(s.page(0).offset, 5_000_000_000);
    }

    #[test]
    fn list_operators_read_array_values_as_vlist() {
        let q = json!({"criteria": [{"k": "name", "o": "$in", "v": ["a", "b"]}, {"k": "email", "v": "x"}]});
        let s = Selector::from_query(&q, &users()).unwrap();
        assert_eq!(s.criteria[0].vlist, vec![json!("a"), json!("b")]);
        assert!(s.criteria[0].v.is_null());
        assert_eq!(s.criteria[1].v, json!("x"));
    }

    #[test]
    fn drops_columns_outside_allow_list() {
        let s = Selector::from_query(&json!({"columns": ["password", "name", "name", "nope"]}), &users()).unwrap();
        assert_eq!(s.columns, ["name"]);
        let s = Selector::from_query(&json!({"columns": "password"}), &users()).unwrap();
        assert_eq!(s.columns, ["id", "name", "email"]);
    }

    #[test]
    fn order_by_must_be_selectable() {
        let r = users();
        let s = Selector::from_query(&json!({"orderBy": "password", "orderDir": "desc"}), &r).unwrap();
        assert_eq!(s.order_by, "id");
        assert_eq!(s.order_dir, OrderDir::Desc);
        let s = Selector::from_query(&json!({"orderBy": "name", "orderDir": "up"}), &r).unwrap();
        assert_eq!(s.order_by, "name");
        assert_eq!(s.order_dir, OrderDir::Asc);
    }

    #[test]
    fn criteria_keys_are_allow_listed() {
        let r = users();
        let s = Selector::from_query(&json!({"criteria": [{"k": "name", "o": "$like", "v": "A%"}]}), &r).unwrap();
        assert_eq!(s.criteria, vec![Criterion::new("name", Op::Like, "A%")]);
        let err = Selector::from_query(&json!({"criteria": [{"k": "password", "v": "x"}]}), &r).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn by_id_targets_the_id_column() {
        let s = Selector::by_id(&users(), json!(7));
        assert_eq!(s.criteria, vec![Criterion::eq("id", 7)]);
        assert_eq!(s.limit, 1);
    }

    #[test]
    fn page_echoes_pagination() {
        let s = Selector::from_query(&json!({"limit": "10", "offset": "30"}), &users()).unwrap();
        assert_eq!(s.page(42), Page { count: 42, limit: 10, offset: 30 });
    }
}
