//! Lifecycle hooks around insert, update and delete.

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::service::Row;
use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use std::sync::Arc;

/// What a hook knows about the request that triggered it.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub resource: String,
    pub method: Method,
    pub headers: HeaderMap,
}

impl HookContext {
    pub fn new(resource: impl Into<String>, method: Method, headers: HeaderMap) -> Self {
        HookContext {
            resource: resource.into(),
            method,
            headers,
        }
    }
}

/// Before-hooks may rewrite the row or reject the request with an error.
/// After-hooks run once the write succeeded; their errors are logged and do not change the response.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn before_insert(&self, row: Row, _ctx: &HookContext) -> Result<Row, AppError> {
        Ok(row)
    }

    async fn after_insert(&self, _id: Option<&Value>, _row: &Row, _ctx: &HookContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn before_update(&self, change: Row, _old: &Row, _ctx: &HookContext) -> Result<Row, AppError> {
        Ok(change)
    }

    async fn after_update(&self, _change: &Row, _old: &Row, _ctx: &HookContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn before_delete(&self, _old: &Row, _ctx: &HookContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn after_delete(&self, _old: &Row, _ctx: &HookContext) -> Result<(), AppError> {
        Ok(())
    }
}

/// Hooks that do nothing.
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Id generation and timestamp stamping, driven by the resource config.
pub struct DefaultHooks {
    resource: Arc<ResolvedResource>,
}

impl DefaultHooks {
    pub fn new(resource: Arc<ResolvedResource>) -> Self {
        DefaultHooks { resource }
    }

    fn now() -> Value {
        Value::String(chrono::Utc::now().to_rfc3339())
    }
}

#[async_trait]
impl Hooks for DefaultHooks {
    async fn before_insert(&self, mut row: Row, _ctx: &HookContext) -> Result<Row, AppError> {
        let r = &self.resource;
        let has_id = row.get(&r.id_column).is_some_and(|v| !v.is_null());
        if r.generate_id && !has_id {
            row.insert(r.id_column.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        let now = Self::now();
        for col in [&r.created_at_column, &r.updated_at_column].into_iter().flatten() {
            row.insert(col.clone(), now.clone());
        }
        Ok(row)
    }

    async fn before_update(&self, mut change: Row, _old: &Row, _ctx: &HookContext) -> Result<Row, AppError> {
        let r = &self.resource;
        change.remove(&r.id_column);
        if let Some(col) = &r.created_at_column {
            change.remove(col);
        }
        if let Some(col) = &r.updated_at_column {
            change.insert(col.clone(), Self::now());
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use serde_json::json;

    fn ctx() -> HookContext {
        HookContext::new("pet", Method::POST, HeaderMap::new())
    }

    fn resource(extra: Value) -> Arc<ResolvedResource> {
        let mut v = json!({
            "table_name": "pet",
            "columns": ["id", "name", "created_at", "updated_at"]
        });
        if let (Some(base), Some(extra)) = (v.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        let c: ResourceConfig = serde_json::from_value(v).unwrap();
        Arc::new(ResolvedResource::from_config(&c))
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn no_hooks_pass_rows_through() {
        let r = row(json!({"name": "Rex"}));
        assert_eq!(NoHooks.before_insert(r.clone(), &ctx()).await.unwrap(), r);
        assert_eq!(NoHooks.before_update(r.clone(), &Row::new(), &ctx()).await.unwrap(), r);
        assert!(NoHooks.before_delete(&r, &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn generates_id_and_timestamps_on_insert() {
        let hooks = DefaultHooks::new(resource(json!({
            "generate_id": true,
            "created_at_column": "created_at",
            "updated_at_column": "updated_at"
        })));
        let out = hooks.before_insert(row(json!({"name": "Rex"})), &ctx()).await.unwrap();
        let id = out["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert!(out["created_at"].is_string());
        assert_eq!(out["created_at"], out["updated_at"]);
    }

    #[tokio::test]
    async fn keeps_client_id_and_skips_unconfigured_stamps() {
        let hooks = DefaultHooks::new(resource(json!({"generate_id": true})));
        let out = hooks.before_insert(row(json!({"id": "mine"})), &ctx()).await.unwrap();
        assert_eq!(out, row(json!({"id": "mine"})));
    }

    #[tokio::test]
    async fn update_strips_id_and_created_at() {
        let hooks = DefaultHooks::new(resource(json!({
            "created_at_column": "created_at",
            "updated_at_column": "updated_at"
        })));
        let change = row(json!({"id": "x", "created_at": "then", "name": "Tom"}));
        let out = hooks.before_update(change, &Row::new(), &ctx()).await.unwrap();
        assert!(out.get("id").is_none());
        assert!(out.get("created_at").is_none());
        assert_eq!(out["name"], "Tom");
        assert!(out["updated_at"].is_string());
    }
}
