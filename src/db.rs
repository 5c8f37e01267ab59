//! Read-write and read-only pools, startup checks, and the per-table repository cache.

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::service::Repository;
use crate::sql::quoted;
use sqlx::postgres::PgPoolOptions;
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct Database {
    rw: PgPool,
    ro: PgPool,
    repos: Arc<RwLock<HashMap<String, Arc<dyn Repository>>>>,
}

impl Database {
    /// Reads and writes share one pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_replica(pool.clone(), pool)
    }

    pub fn with_replica(rw: PgPool, ro: PgPool) -> Self {
        Database {
            rw,
            ro,
            repos: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Connect lazily-validated pools; `read_url` falls back to `write_url`.
    pub async fn connect(write_url: &str, read_url: Option<&str>, max_connections: u32) -> Result<Self, AppError> {
        let rw = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(write_url)
            .await?;
        let ro = match read_url {
            Some(url) if url != write_url => PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await?,
            _ => rw.clone(),
        };
        Ok(Self::with_replica(rw, ro))
    }

    pub fn rw(&self) -> &PgPool {
        &self.rw
    }

    pub fn ro(&self) -> &PgPool {
        &self.ro
    }

    /// Ping both pools.
    pub async fn start(&self) -> Result<(), AppError> {
        let (rw,): (i32,) = sqlx::query_as("SELECT 1+1 AS result").fetch_one(&self.rw).await?;
        tracing::info!(result = rw, "read-write database ready");
        let (ro,): (i32,) = sqlx::query_as("SELECT 1+1 AS result").fetch_one(&self.ro).await?;
        tracing::info!(result = ro, "read-only database ready");
        Ok(())
    }

    pub async fn stop(&self) {
        self.rw.close().await;
        self.ro.close().await;
    }

    /// Column name to PostgreSQL type for `table` in the current schema; empty when the table does not exist.
    pub async fn column_types(&self, table: &str) -> Result<HashMap<String, String>, AppError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT column_name::text, data_type::text, udt_schema::text, udt_name::text \
             FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(table)
        .fetch_all(&self.ro)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(column, data_type, udt_schema, udt_name)| {
                (column, pg_type_name(&data_type, &udt_schema, &udt_name))
            })
            .collect())
    }

    /// Read column types from the database for every column the config left untyped, so
    /// filters and writes cast their parameters to the real column type.
    pub async fn resolve_column_types(&self, resources: &mut [ResolvedResource]) -> Result<(), AppError> {
        for r in resources.iter_mut() {
            let types = self.column_types(&r.table_name).await?;
            if types.is_empty() {
                tracing::warn!(table = %r.table_name, "table not found; using configured column types only");
                continue;
            }
            r.apply_column_types(&types)?;
            tracing::debug!(table = %r.table_name, columns = types.len(), "column types resolved");
        }
        Ok(())
    }

    /// Repository for `table_name`, created by `make` on first use and cached afterwards.
    pub fn repo<F>(&self, table_name: &str, make: F) -> Arc<dyn Repository>
    where
        F: FnOnce(&Database) -> Arc<dyn Repository>,
    {
        if let Some(r) = self.repos.read().ok().and_then(|m| m.get(table_name).cloned()) {
            return r;
        }
        let created = make(self);
        match self.repos.write() {
            Ok(mut m) => m.entry(table_name.to_string()).or_insert(created).clone(),
            Err(_) => created,
        }
    }
}

/// Create the database named in `database_url` when it does not exist yet.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", crate::sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Type name usable in a `$n::type` cast: user-defined types as `"schema"."name"`, arrays as `_elem`.
fn pg_type_name(data_type: &str, udt_schema: &str, udt_name: &str) -> String {
    if data_type == "USER-DEFINED" {
        format!("{}.{}", quoted(udt_schema), quoted(udt_name))
    } else {
        udt_name.to_string()
    }
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}
