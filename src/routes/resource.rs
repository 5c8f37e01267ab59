//! Resource CRUD routes: one controller per resource, nested under the resource path.

use crate::config::ResolvedResource;
use crate::db::Database;
use crate::error::ConfigError;
use crate::handlers::resource::{delete_one, insert_one, select_many, select_one, update_one};
use crate::handlers::Controller;
use crate::service::{PgRepository, ResourceValidator};
use axum::{routing::get, Router};
use serde_json::Value;
use std::sync::Arc;

/// `GET /` list, `POST /` create, `GET|PATCH|DELETE /:id`.
pub fn resource_routes(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/", get(select_many).post(insert_one))
        .route("/:id", get(select_one).patch(update_one).delete(delete_one))
        .with_state(controller)
}

/// Nest the controller's routes under its resource path.
pub fn mount(router: Router, controller: Arc<Controller>) -> Router {
    let path = controller.resource().path.clone();
    tracing::info!(path = %path, table = %controller.resource().table_name, "mounting resource");
    router.nest(&path, resource_routes(controller))
}

/// A PostgreSQL-backed controller per resource. Validators are compiled when `openapi` is given
/// and the resource names schemas.
pub fn build_controllers(
    db: &Database,
    resources: Vec<ResolvedResource>,
    openapi: Option<&Value>,
) -> Result<Vec<Arc<Controller>>, ConfigError> {
    let mut out = Vec::with_capacity(resources.len());
    for resource in resources {
        let validator = match openapi {
            Some(doc) => ResourceValidator::for_resource(doc, &resource)?,
            None if resource.schemas.is_some() => {
                return Err(ConfigError::Validation(format!(
                    "{}: schemas configured without an OpenAPI document",
                    resource.table_name
                )))
            }
            None => None,
        };
        let repo = PgRepository::cached(db, Arc::new(resource));
        out.push(Arc::new(Controller::new(repo).with_validator(validator)));
    }
    Ok(out)
}

/// Mount every controller on one router.
pub fn resources_router(controllers: Vec<Arc<Controller>>) -> Router {
    controllers.into_iter().fold(Router::new(), mount)
}
