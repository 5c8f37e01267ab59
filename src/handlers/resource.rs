//! Resource CRUD handlers: list, read, create, update, delete.

use crate::error::AppError;
use crate::handlers::controller::Controller;
use crate::handlers::hooks::HookContext;
use crate::response::{success_created, success_one, success_page};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

fn context(controller: &Controller, method: Method, headers: HeaderMap) -> HookContext {
    HookContext::new(controller.resource().table_name.clone(), method, headers)
}

pub async fn select_many(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let page = controller.select_many(&query).await?;
    Ok(success_page(page.data, page.page))
}

pub async fn select_one(
    State(controller): State<Arc<Controller>>,
    Path(id): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let row = controller.select_one(&id, &query).await?;
    Ok(success_one(row))
}

pub async fn insert_one(
    State(controller): State<Arc<Controller>>,
    method: Method,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = context(&controller, method, headers);
    let data = controller.insert_one(&body, &ctx).await?;
    Ok(success_created(data))
}

pub async fn update_one(
    State(controller): State<Arc<Controller>>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = context(&controller, method, headers);
    let affected = controller.update_one(&id, &body, &ctx).await?;
    Ok(success_one(affected))
}

pub async fn delete_one(
    State(controller): State<Arc<Controller>>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = context(&controller, method, headers);
    let affected = controller.delete_one(&id, &ctx).await?;
    Ok(success_one(affected))
}
