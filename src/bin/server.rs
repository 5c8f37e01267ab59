//! Server: loads the resource config, connects the read-write and read-only pools, mounts common and resource routes.

use axum::Router;
use table_crud::{
    apply_env_overrides, build_controllers, common_routes_with_ready, ensure_database_exists, fallback,
    load_from_path, load_openapi, resolve, resources_router, AppState, Database,
};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("table_crud=info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "demos/petstore.json".into());
    let mut config = load_from_path(&config_path).await?;
    apply_env_overrides(&mut config);
    let mut resources = resolve(&config)?;
    let openapi = match &config.openapi_path {
        Some(path) => Some(load_openapi(path).await?),
        None => None,
    };

    ensure_database_exists(&config.database_url).await?;
    let db = Database::connect(
        &config.database_url,
        config.read_database_url.as_deref(),
        config.max_connections,
    )
    .await?;
    db.start().await?;
    db.resolve_column_types(&mut resources).await?;

    let controllers = build_controllers(&db, resources, openapi.as_ref())?;
    let state = AppState { db: db.clone() };
    let app = Router::new()
        .merge(common_routes_with_ready(state))
        .merge(resources_router(controllers))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(config.body_limit));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    db.stop().await;
    Ok(())
}
