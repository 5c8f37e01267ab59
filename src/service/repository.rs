//! Table-scoped repository: the contract the controller talks to, and its PostgreSQL implementation.

use crate::config::ResolvedResource;
use crate::criteria::{Criterion, Selector};
use crate::db::Database;
use crate::error::AppError;
use crate::service::rows::row_to_json;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, Row as _};
use std::sync::Arc;

/// A row is a JSON object keyed by column name.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait Repository: Send + Sync {
    fn resource(&self) -> &ResolvedResource;

    /// Rows matching `criteria`, ignoring pagination.
    async fn count(&self, criteria: &[Criterion]) -> Result<u64, AppError>;

    async fn select_many(&self, selector: &Selector) -> Result<Vec<Row>, AppError>;

    /// First row matching the selector.
    async fn select_one(&self, selector: &Selector) -> Result<Option<Row>, AppError>;

    /// Insert one row and return its id.
    async fn insert_one(&self, row: &Row) -> Result<Option<Value>, AppError>;

    /// Returns the number of rows changed.
    async fn update_one(&self, id: &Value, change: &Row) -> Result<u64, AppError>;

    /// Returns the number of rows deleted.
    async fn delete_one(&self, id: &Value) -> Result<u64, AppError>;
}

/// Holds the pool handles rather than the `Database`, whose cache owns the repository.
pub struct PgRepository {
    rw: PgPool,
    ro: PgPool,
    resource: Arc<ResolvedResource>,
}

impl PgRepository {
    pub fn new(db: &Database, resource: Arc<ResolvedResource>) -> Self {
        PgRepository {
            rw: db.rw().clone(),
            ro: db.ro().clone(),
            resource,
        }
    }

    /// Repository for `resource`, shared through the database's per-table cache.
    pub fn cached(db: &Database, resource: Arc<ResolvedResource>) -> Arc<dyn Repository> {
        let table = resource.table_name.clone();
        db.repo(&table, move |db| Arc::new(PgRepository::new(db, resource)))
    }

    fn bind(q: &QueryBuf) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(Self::bind(q).fetch_all(pool).await?)
    }

    async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(Self::bind(q).fetch_optional(pool).await?)
    }

    async fn execute(pool: &PgPool, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        Ok(Self::bind(q).execute(pool).await?.rows_affected())
    }
}

#[async_trait]
impl Repository for PgRepository {
    fn resource(&self) -> &ResolvedResource {
        &self.resource
    }

    async fn count(&self, criteria: &[Criterion]) -> Result<u64, AppError> {
        let q = sql::select_count(&self.resource, criteria)?;
        let row = Self::fetch_optional(&self.ro, &q).await?;
        let count: i64 = match row {
            Some(r) => r.try_get("count")?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn select_many(&self, selector: &Selector) -> Result<Vec<Row>, AppError> {
        let q = sql::select_many(&self.resource, selector)?;
        let rows = Self::fetch_all(&self.ro, &q).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn select_one(&self, selector: &Selector) -> Result<Option<Row>, AppError> {
        let q = sql::select_one(&self.resource, selector)?;
        let row = Self::fetch_optional(&self.ro, &q).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn insert_one(&self, row: &Row) -> Result<Option<Value>, AppError> {
        let q = sql::insert_one(&self.resource, row);
        let returned = Self::fetch_optional(&self.rw, &q).await?;
        Ok(returned
            .as_ref()
            .map(row_to_json)
            .and_then(|mut r| r.remove(&self.resource.id_column)))
    }

    async fn update_one(&self, id: &Value, change: &Row) -> Result<u64, AppError> {
        let q = sql::update_one(&self.resource, id, change);
        Self::execute(&self.rw, &q).await
    }

    async fn delete_one(&self, id: &Value) -> Result<u64, AppError> {
        let q = sql::delete_one(&self.resource, id);
        Self::execute(&self.rw, &q).await
    }
}
