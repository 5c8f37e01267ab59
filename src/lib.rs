//! table-crud: configuration-driven CRUD resources over PostgreSQL.
//!
//! Each configured table becomes a REST resource with a search DSL (criteria, ordering,
//! clamped pagination), column allow-lists, lifecycle hooks and optional JSON-schema validation.

pub mod config;
pub mod criteria;
pub mod db;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{apply_env_overrides, load_from_path, load_openapi, resolve, AppConfig, ResolvedResource, ResourceConfig};
pub use criteria::{Criterion, Op, OrderDir, Selector};
pub use db::{ensure_database_exists, Database};
pub use error::{AppError, ConfigError};
pub use handlers::{Controller, DefaultHooks, HookContext, Hooks, NoHooks};
pub use response::{error_body, Page, Paginated};
pub use routes::{build_controllers, common_routes, common_routes_with_ready, fallback, mount, resource_routes, resources_router};
pub use service::{PgRepository, Repository, ResourceValidator, Row, SchemaValidator, ValidationErrorHandler};
pub use state::AppState;
