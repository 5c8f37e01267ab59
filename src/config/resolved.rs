//! Resolved resource: config validated and flattened into column allow-lists for runtime use.

use crate::config::{IdType, ResourceConfig, SchemaNames};
use crate::error::ConfigError;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name for SQL casts (e.g. "int4", "timestamptz") when binding values.
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub table_name: String,
    pub path: String,
    pub id_column: String,
    pub id_type: IdType,
    pub generate_id: bool,
    pub created_at_column: Option<String>,
    pub updated_at_column: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub selectable: Vec<String>,
    pub creatable: Vec<String>,
    pub updatable: Vec<String>,
    pub limit_default: u32,
    pub limit_max: u32,
    pub schemas: Option<SchemaNames>,
}

/// Columns minus the excluded ones, keeping the configured order.
pub fn filter_column_names(columns: &[String], exclude: &[String]) -> Vec<String> {
    columns.iter().filter(|c| !exclude.contains(c)).cloned().collect()
}

impl ResolvedResource {
    /// Flatten one resource config. Call after `validate`.
    pub fn from_config(config: &ResourceConfig) -> Self {
        let names: Vec<String> = config.columns.iter().map(|c| c.name().to_string()).collect();
        let path = match config.path.as_deref() {
            Some(p) if p.starts_with('/') => p.trim_end_matches('/').to_string(),
            Some(p) => format!("/{}", p.trim_end_matches('/')),
            None => format!("/{}", config.table_name),
        };
        ResolvedResource {
            table_name: config.table_name.clone(),
            path,
            id_column: config.id_column.clone(),
            id_type: config.id_type,
            generate_id: config.generate_id,
            created_at_column: config.created_at_column.clone(),
            updated_at_column: config.updated_at_column.clone(),
            columns: config
                .columns
                .iter()
                .map(|c| {
                    let is_stamp = [&config.created_at_column, &config.updated_at_column]
                        .into_iter()
                        .flatten()
                        .any(|s| s == c.name());
                    let pg_type = match c.pg_type() {
                        Some(t) => Some(t.to_string()),
                        None if is_stamp => Some("timestamptz".to_string()),
                        None => None,
                    };
                    ColumnInfo {
                        name: c.name().to_string(),
                        pg_type,
                    }
                })
                .collect(),
            selectable: filter_column_names(&names, &config.no_select),
            creatable: filter_column_names(&names, &config.no_create),
            updatable: filter_column_names(&names, &config.no_update),
            limit_default: config.limit_default,
            limit_max: config.limit_max,
            schemas: config.schemas.clone(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pg_type(&self, name: &str) -> Option<&str> {
        self.column(name).and_then(|c| c.pg_type.as_deref())
    }

    pub fn is_selectable(&self, name: &str) -> bool {
        self.selectable.iter().any(|c| c == name)
    }

    /// Give every column the config left untyped the type the table reports for it.
    /// A configured column missing from the table is an error; declared types are kept.
    pub fn apply_column_types(&mut self, table_types: &HashMap<String, String>) -> Result<(), ConfigError> {
        for c in &mut self.columns {
            let Some(actual) = table_types.get(&c.name) else {
                return Err(ConfigError::Validation(format!(
                    "{}: column '{}' does not exist in the table",
                    self.table_name, c.name
                )));
            };
            if c.pg_type.is_none() {
                c.pg_type = Some(actual.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_config() -> ResourceConfig {
        serde_json::from_value(serde_json::json!({
            "table_name": "User",
            "columns": ["id", "name", "email", "password", "userStatus"],
            "no_select": ["password"],
            "no_create": ["id"],
            "no_update": ["id", "email"]
        }))
        .unwrap()
    }

    #[test]
    fn splits_columns_into_allow_lists() {
        let r = ResolvedResource::from_config(&user_config());
        assert_eq!(r.selectable, ["id", "name", "email", "userStatus"]);
        assert_eq!(r.creatable, ["name", "email", "password", "userStatus"]);
        assert_eq!(r.updatable, ["name", "password", "userStatus"]);
        assert!(!r.is_selectable("password"));
    }

    #[test]
    fn timestamp_columns_default_to_timestamptz() {
        let mut c = user_config();
        c.columns.push(crate::config::ColumnConfig::Name("updatedAtUtc".into()));
        c.updated_at_column = Some("updatedAtUtc".into());
        let r = ResolvedResource::from_config(&c);
        assert_eq!(r.pg_type("updatedAtUtc"), Some("timestamptz"));
        assert_eq!(r.pg_type("name"), None);
    }

    #[test]
    fn table_types_fill_untyped_columns() {
        let mut c = user_config();
        c.columns[4] = crate::config::ColumnConfig::Typed {
            name: "userStatus".into(),
            pg_type: Some("int2".into()),
        };
        let mut r = ResolvedResource::from_config(&c);
        let types: HashMap<String, String> = [
            ("id", "uuid"),
            ("name", "text"),
            ("email", "varchar"),
            ("password", "text"),
            ("userStatus", "int4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        r.apply_column_types(&types).unwrap();
        assert_eq!(r.pg_type("id"), Some("uuid"));
        assert_eq!(r.pg_type("email"), Some("varchar"));
        assert_eq!(r.pg_type("userStatus"), Some("int2"));

        let mut missing = types.clone();
        missing.remove("email");
        let mut r = ResolvedResource::from_config(&user_config());
        assert!(matches!(r.apply_column_types(&missing), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn path_defaults_to_table_name() {
        let r = ResolvedResource::from_config(&user_config());
        assert_eq!(r.path, "/User");

        let mut c = user_config();
        c.path = Some("users/".into());
        assert_eq!(ResolvedResource::from_config(&c).path, "/users");
    }
}
