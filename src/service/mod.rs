//! Repository contract, its PostgreSQL implementation, and request schema validation.

mod repository;
mod rows;
mod validation;
pub use repository::{PgRepository, Repository, Row};
pub use validation::{
    change_refs_to_defs, search_criterion_schema, search_params_schema, ResourceValidator, SchemaValidator,
    ValidationErrorHandler,
};
