//! Raw config types as read from the JSON config file.

use serde::{Deserialize, Serialize};

/// A column is either a bare name or a name plus the PostgreSQL type used to cast bound values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnConfig {
    Name(String),
    Typed {
        name: String,
        #[serde(default)]
        pg_type: Option<String>,
    },
}

impl ColumnConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnConfig::Name(n) => n,
            ColumnConfig::Typed { name, .. } => name,
        }
    }

    pub fn pg_type(&self) -> Option<&str> {
        match self {
            ColumnConfig::Name(_) => None,
            ColumnConfig::Typed { pg_type, .. } => pg_type.as_deref(),
        }
    }
}

/// How the `:id` path segment is parsed before it reaches the database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    Uuid,
    Int,
    #[default]
    Text,
}

/// OpenAPI schema names per operation. Unset names default to `RequestTo<Op><table_name>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaNames {
    #[serde(default)]
    pub insert_one: Option<String>,
    #[serde(default)]
    pub update_one: Option<String>,
    #[serde(default)]
    pub select_many: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub table_name: String,
    /// Mount path; `/<table_name>` when absent.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default)]
    pub id_type: IdType,
    /// Fill a UUID v4 id on insert when the body has none.
    #[serde(default)]
    pub generate_id: bool,
    #[serde(default)]
    pub created_at_column: Option<String>,
    #[serde(default)]
    pub updated_at_column: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub no_select: Vec<String>,
    #[serde(default)]
    pub no_create: Vec<String>,
    #[serde(default)]
    pub no_update: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit_default: u32,
    #[serde(default = "max_limit")]
    pub limit_max: u32,
    /// Enables request validation against the OpenAPI document for this resource.
    #[serde(default)]
    pub schemas: Option<SchemaNames>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Replica used for count and select; falls back to `database_url`.
    #[serde(default)]
    pub read_database_url: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// OpenAPI document (JSON or YAML) holding `components.schemas` for request validation.
    #[serde(default)]
    pub openapi_path: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

fn default_id_column() -> String {
    "id".into()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn max_limit() -> u32 {
    MAX_LIMIT
}

fn default_database_url() -> String {
    "postgres://localhost/table_crud".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_body_limit() -> usize {
    1024 * 1024
}
