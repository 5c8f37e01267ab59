//! Load the app config and the OpenAPI document from disk, apply env overrides, resolve resources.

use crate::config::{validate, AppConfig, ResolvedResource};
use crate::error::ConfigError;
use serde_json::Value;
use std::path::Path;

/// Read a JSON config file. Env overrides are applied separately by `apply_env_overrides`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// `DATABASE_URL`, `READ_DATABASE_URL`, `BIND_ADDR` and `OPENAPI_PATH` win over the file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    if let Ok(url) = std::env::var("READ_DATABASE_URL") {
        config.read_database_url = Some(url);
    }
    if let Ok(addr) = std::env::var("BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(path) = std::env::var("OPENAPI_PATH") {
        config.openapi_path = Some(path);
    }
}

/// Validate and flatten every resource.
pub fn resolve(config: &AppConfig) -> Result<Vec<ResolvedResource>, ConfigError> {
    validate(config)?;
    Ok(config.resources.iter().map(ResolvedResource::from_config).collect())
}

/// Load an OpenAPI document; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
pub async fn load_openapi(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
    } else {
        serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_yaml_openapi() {
        let dir = std::env::temp_dir().join(format!("table-crud-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file = dir.join("api.yaml");
        tokio::fs::write(
            &file,
            "components:\n  schemas:\n    Pet:\n      type: object\n      required: [name]\n",
        )
        .await
        .unwrap();
        let doc = load_openapi(&file).await.unwrap();
        assert_eq!(doc["components"]["schemas"]["Pet"]["required"][0], "name");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let err = load_from_path("/nonexistent/table-crud.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
