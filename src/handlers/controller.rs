//! Controller: binds repository operations to request input, with allow-listing, pagination and hooks.

use crate::config::{IdType, ResolvedResource};
use crate::criteria::{parse_query_pairs, select_columns, Selector};
use crate::error::AppError;
use crate::handlers::hooks::{DefaultHooks, HookContext, Hooks};
use crate::response::Paginated;
use crate::service::{Repository, ResourceValidator, Row};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn parse_id(id_str: &str, id_type: IdType) -> Result<Value, AppError> {
    Ok(match id_type {
        IdType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        IdType::Int => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        IdType::Text => {
            if id_str.is_empty() {
                return Err(AppError::BadRequest("invalid id".into()));
            }
            Value::String(id_str.to_string())
        }
    })
}

/// Keep only the allowed keys of a JSON object body.
pub fn body_to_row(body: &Value, allowed: &[String]) -> Result<Row, AppError> {
    let Value::Object(map) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    Ok(allowed
        .iter()
        .filter_map(|k| map.get(k).map(|v| (k.clone(), v.clone())))
        .collect())
}

pub struct Controller {
    repo: Arc<dyn Repository>,
    hooks: Arc<dyn Hooks>,
    validator: Option<ResourceValidator>,
}

impl Controller {
    /// Controller with `DefaultHooks` and no schema validation.
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        let resource = Arc::new(repo.resource().clone());
        Controller {
            repo,
            hooks: Arc::new(DefaultHooks::new(resource)),
            validator: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_validator(mut self, validator: Option<ResourceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn resource(&self) -> &ResolvedResource {
        self.repo.resource()
    }

    async fn load(&self, id: &Value) -> Result<Row, AppError> {
        let resource = self.resource();
        self.repo
            .select_one(&Selector::by_id(resource, id.clone()))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", resource.table_name, id)))
    }

    /// One page plus the total count for the same criteria.
    pub async fn select_many(&self, query: &[(String, String)]) -> Result<Paginated<Row>, AppError> {
        let resource = self.resource();
        let raw = parse_query_pairs(query, resource)?;
        if let Some(v) = &self.validator {
            v.select_many.validate(&raw)?;
        }
        let selector = Selector::from_query(&raw, resource)?;
        let count = self.repo.count(&selector.criteria).await?;
        let data = self.repo.select_many(&selector).await?;
        Ok(Paginated {
            data,
            page: selector.page(count),
        })
    }

    pub async fn select_one(&self, id_str: &str, query: &[(String, String)]) -> Result<Row, AppError> {
        let resource = self.resource();
        let id = parse_id(id_str, resource.id_type)?;
        let raw = parse_query_pairs(query, resource)?;
        let mut selector = Selector::by_id(resource, id.clone());
        selector.columns = select_columns(raw.get("columns"), resource);
        self.repo
            .select_one(&selector)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", resource.table_name, id_str)))
    }

    /// Returns `{"id": ...}`, or `null` when the store reports no id.
    pub async fn insert_one(&self, body: &Value, ctx: &HookContext) -> Result<Value, AppError> {
        if let Some(v) = &self.validator {
            v.insert_one.validate(body)?;
        }
        let raw = body_to_row(body, &self.resource().creatable)?;
        let row = self.hooks.before_insert(raw, ctx).await?;
        let id = self.repo.insert_one(&row).await?;
        tracing::info!(resource = %ctx.resource, id = ?id, "inserted");
        if let Err(e) = self.hooks.after_insert(id.as_ref(), &row, ctx).await {
            tracing::error!(resource = %ctx.resource, error = %e, "after_insert failed");
        }
        Ok(match id {
            Some(id) => json!({ "id": id }),
            None => Value::Null,
        })
    }

    /// Returns the number of rows changed.
    pub async fn update_one(&self, id_str: &str, body: &Value, ctx: &HookContext) -> Result<u64, AppError> {
        if let Some(v) = &self.validator {
            v.update_one.validate(body)?;
        }
        let resource = self.resource();
        let id = parse_id(id_str, resource.id_type)?;
        let raw = body_to_row(body, &resource.updatable)?;
        let old = self.load(&id).await?;
        let change = self.hooks.before_update(raw, &old, ctx).await?;
        let affected = self.repo.update_one(&id, &change).await?;
        tracing::info!(resource = %ctx.resource, id = %id, affected, "updated");
        if let Err(e) = self.hooks.after_update(&change, &old, ctx).await {
            tracing::error!(resource = %ctx.resource, id = %id, error = %e, "after_update failed");
        }
        Ok(affected)
    }

    /// Returns the number of rows deleted.
    pub async fn delete_one(&self, id_str: &str, ctx: &HookContext) -> Result<u64, AppError> {
        let id = parse_id(id_str, self.resource().id_type)?;
        let old = self.load(&id).await?;
        self.hooks.before_delete(&old, ctx).await?;
        let affected = self.repo.delete_one(&id).await?;
        tracing::info!(resource = %ctx.resource, id = %id, affected, "deleted");
        if let Err(e) = self.hooks.after_delete(&old, ctx).await {
            tracing::error!(resource = %ctx.resource, id = %id, error = %e, "after_delete failed");
        }
        Ok(affected)
    }
}
