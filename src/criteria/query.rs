//! Raw query-string pairs to a search-params object.
//!
//! Accepted forms:
//! - `columns=a,b`, `columns=a&columns=b`, `columns[]=a`, `columns[0]=a`
//! - `criteria=[{"k":"name","o":"$like","v":"A%"}]` (JSON)
//! - `criteria[0][k]=name&criteria[0][o]=$in&criteria[0][vlist][]=a&criteria[0][vlist][]=b`
//! - `limit`, `offset`, `orderBy`, `orderDir`
//! - `<column>=<value>` for any selectable column, as an `$eq` criterion.
//!
//! Leaf values stay strings so the object can be checked against a search-params JSON schema.

use crate::config::ResolvedResource;
use crate::error::AppError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SCALAR_KEYS: [&str; 4] = ["limit", "offset", "orderBy", "orderDir"];

/// Split `criteria[3][vlist][]` into (3, "vlist", true).
fn parse_criteria_key(key: &str) -> Option<(usize, &str, bool)> {
    let rest = key.strip_prefix("criteria[")?;
    let (index, rest) = rest.split_once(']')?;
    let index: usize = index.parse().ok()?;
    let rest = rest.strip_prefix('[')?;
    let (field, rest) = rest.split_once(']')?;
    let is_list = rest.starts_with('[');
    Some((index, field, is_list))
}

pub fn parse_query_pairs(pairs: &[(String, String)], resource: &ResolvedResource) -> Result<Value, AppError> {
    let mut out = Map::new();
    let mut columns: Vec<Value> = Vec::new();
    let mut indexed: BTreeMap<usize, Map<String, Value>> = BTreeMap::new();
    let mut json_criteria: Vec<Value> = Vec::new();
    let mut shorthand: Vec<Value> = Vec::new();

    for (key, value) in pairs {
        let key = key.as_str();
        if key == "columns" || key == "columns[]" || (key.starts_with("columns[") && key.ends_with(']')) {
            columns.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string())),
            );
        } else if key == "criteria" {
            match serde_json::from_str::<Value>(value) {
                Ok(Value::Array(items)) => json_criteria.extend(items),
                Ok(item @ Value::Object(_)) => json_criteria.push(item),
                _ => return Err(AppError::BadRequest("criteria must be a JSON array".into())),
            }
        } else if let Some((index, field, is_list)) = parse_criteria_key(key) {
            let entry = indexed.entry(index).or_default();
            if field == "vlist" || is_list {
                let list = entry
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = list {
                    items.push(Value::String(value.clone()));
                }
            } else {
                entry.insert(field.to_string(), Value::String(value.clone()));
            }
        } else if key.starts_with("criteria[") {
            return Err(AppError::BadRequest(format!("malformed criteria key '{}'", key)));
        } else if SCALAR_KEYS.contains(&key) {
            out.insert(key.to_string(), Value::String(value.clone()));
        } else if resource.is_selectable(key) {
            shorthand.push(serde_json::json!({ "k": key, "o": "$eq", "v": value }));
        }
    }

    if !columns.is_empty() {
        out.insert("columns".into(), Value::Array(columns));
    }
    let mut criteria = json_criteria;
    criteria.extend(indexed.into_values().map(Value::Object));
    criteria.extend(shorthand);
    if !criteria.is_empty() {
        out.insert("criteria".into(), Value::Array(criteria));
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use serde_json::json;

    fn pets() -> ResolvedResource {
        let c: ResourceConfig = serde_json::from_value(json!({
            "table_name": "Pet",
            "columns": ["id", "name", "status", "secret"],
            "no_select": ["secret"]
        }))
        .unwrap();
        ResolvedResource::from_config(&c)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn collects_columns_in_every_form() {
        let q = parse_query_pairs(
            &pairs(&[("columns", "id,name"), ("columns[]", "status"), ("columns[3]", "x")]),
            &pets(),
        )
        .unwrap();
        assert_eq!(q["columns"], json!(["id", "name", "status", "x"]));
    }

    #[test]
    fn parses_bracket_criteria_in_index_order() {
        let q = parse_query_pairs(
            &pairs(&[
                ("criteria[1][k]", "status"),
                ("criteria[1][o]", "$in"),
                ("criteria[1][vlist][]", "sold"),
                ("criteria[1][vlist][]", "pending"),
                ("criteria[0][k]", "name"),
                ("criteria[0][o]", "$like"),
                ("criteria[0][v]", "R%"),
            ]),
            &pets(),
        )
        .unwrap();
        assert_eq!(
            q["criteria"],
            json!([
                {"k": "name", "o": "$like", "v": "R%"},
                {"k": "status", "o": "$in", "vlist": ["sold", "pending"]}
            ])
        );
    }

    #[test]
    fn accepts_json_criteria() {
        let q = parse_query_pairs(&pairs(&[("criteria", r#"[{"k":"name","v":"Rex"}]"#)]), &pets()).unwrap();
        assert_eq!(q["criteria"], json!([{"k": "name", "v": "Rex"}]));
        let err = parse_query_pairs(&pairs(&[("criteria", "nope")]), &pets()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn column_shorthand_only_for_selectable_columns() {
        let q = parse_query_pairs(
            &pairs(&[("status", "sold"), ("secret", "x"), ("utm_source", "mail"), ("limit", "5")]),
            &pets(),
        )
        .unwrap();
        assert_eq!(q["criteria"], json!([{"k": "status", "o": "$eq", "v": "sold"}]));
        assert_eq!(q["limit"], "5");
    }

    #[test]
    fn rejects_malformed_bracket_key() {
        let err = parse_query_pairs(&pairs(&[("criteria[x][k]", "name")]), &pets()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
