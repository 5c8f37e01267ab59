//! Common routes: health, readiness, version, and the JSON fallback for unknown routes.

use crate::response::error_body;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, http::Uri, routing::get, Json, Router};
use serde::Serialize;

/// Paths served by the common routes; no resource may be mounted on them.
pub const COMMON_PATHS: [&str; 3] = ["/health", "/ready", "/version"];

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

/// Per-pool readiness; both entries point at the same pool when no replica is configured.
#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    read_write: &'static str,
    read_only: &'static str,
}

async fn ping(pool: &sqlx::PgPool) -> &'static str {
    match sqlx::query("SELECT 1").fetch_optional(pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "readiness ping failed");
            "unavailable"
        }
    }
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    let read_write = ping(state.db.rw()).await;
    let read_only = ping(state.db.ro()).await;
    let healthy = read_write == "ok" && read_only == "ok";
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadyBody {
            status: if healthy { "ok" } else { "degraded" },
            read_write,
            read_only,
        }),
    )
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn fallback(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    tracing::warn!(path = %uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(error_body("not_found", format!("no route for {}", uri.path()), None)),
    )
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// Common routes including readiness with DB check. Requires AppState.
pub fn common_routes_with_ready(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}
