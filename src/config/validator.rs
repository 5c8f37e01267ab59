//! Config validation: identifiers, allow-list consistency and unique mount paths.

use crate::config::{AppConfig, IdType, ResourceConfig, ResolvedResource};
use crate::error::ConfigError;
use crate::routes::common::COMMON_PATHS;
use regex::Regex;
use std::collections::HashSet;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const PATH_PATTERN: &str = r"^(/[A-Za-z0-9_.\-]+)+$";
/// `int4`, `numeric(10,2)`, `timestamp with time zone`, `text[]`, `"public"."status"`.
const PG_TYPE_PATTERN: &str = r#"^([A-Za-z_][A-Za-z0-9_ ]*|"[^"]+"\."[^"]+")(\([0-9, ]+\))?(\[\])?$"#;

fn check_identifier(kind: &str, name: &str) -> Result<(), ConfigError> {
    let re = Regex::new(IDENTIFIER_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("invalid {} name '{}'", kind, name)))
    }
}

pub fn validate_resource(r: &ResourceConfig) -> Result<(), ConfigError> {
    check_identifier("table", &r.table_name)?;
    if r.columns.is_empty() {
        return Err(ConfigError::Validation(format!("{}: columns must not be empty", r.table_name)));
    }
    let pg_type_re = Regex::new(PG_TYPE_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut names = HashSet::new();
    for c in &r.columns {
        check_identifier("column", c.name())?;
        if let Some(t) = c.pg_type() {
            if !pg_type_re.is_match(t) {
                return Err(ConfigError::Validation(format!(
                    "{}: invalid pg_type '{}' for column '{}'",
                    r.table_name,
                    t,
                    c.name()
                )));
            }
        }
        if !names.insert(c.name()) {
            return Err(ConfigError::Validation(format!(
                "{}: duplicate column '{}'",
                r.table_name,
                c.name()
            )));
        }
    }
    if !names.contains(r.id_column.as_str()) {
        return Err(ConfigError::Validation(format!(
            "{}: id column '{}' is not in columns",
            r.table_name, r.id_column
        )));
    }
    let stamps = [r.created_at_column.as_deref(), r.updated_at_column.as_deref()];
    let listed = [("no_select", &r.no_select), ("no_create", &r.no_create), ("no_update", &r.no_update)];
    for (list, cols) in listed {
        for c in cols {
            if !names.contains(c.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: {} names unknown column '{}'",
                    r.table_name, list, c
                )));
            }
        }
    }
    for c in stamps.into_iter().flatten() {
        if !names.contains(c) {
            return Err(ConfigError::Validation(format!(
                "{}: timestamp column '{}' is not in columns",
                r.table_name, c
            )));
        }
    }
    if r.no_select.contains(&r.id_column) {
        return Err(ConfigError::Validation(format!(
            "{}: id column must stay selectable",
            r.table_name
        )));
    }
    if r.generate_id && r.id_type == IdType::Int {
        return Err(ConfigError::Validation(format!(
            "{}: generate_id creates uuids and needs id_type uuid or text",
            r.table_name
        )));
    }
    if r.limit_default == 0 || r.limit_default > r.limit_max {
        return Err(ConfigError::Validation(format!(
            "{}: limit_default must be between 1 and limit_max ({})",
            r.table_name, r.limit_max
        )));
    }
    Ok(())
}

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let mut paths = HashSet::new();
    for r in &config.resources {
        validate_resource(r)?;
        let path = ResolvedResource::from_config(r).path;
        let path_re = Regex::new(PATH_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
        if !path_re.is_match(&path) {
            return Err(ConfigError::Validation(format!("{}: invalid path '{}'", r.table_name, path)));
        }
        if COMMON_PATHS.contains(&path.as_str()) || !paths.insert(path.clone()) {
            return Err(ConfigError::DuplicatePath(path));
        }
    }
    if config.resources.iter().any(|r| r.schemas.is_some()) && config.openapi_path.is_none() {
        return Err(ConfigError::Validation(
            "resources with schemas require openapi_path".into(),
        ));
    }
    Ok(())
}
