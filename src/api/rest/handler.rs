use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::rest::types::{ApiResponse, SetRequest};
use crate::storage::ShardedStore;

pub async fn set_handler(
    State(store): State<Arc<ShardedStore>>,
    payload: Result<Json<SetRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::InvalidBody)?;
    store.set(&req.key, &req.value, req.ttl).await;
    Ok(Json(ApiResponse::ok_empty()))
}

pub async fn get_handler(
    State(store): State<Arc<ShardedStore>>,
    Path(key): Path<String>,
) -> Json<ApiResponse> {
    match store.get(&key).await {
        Some(value) => Json(ApiResponse::ok(value.into())),
        None => Json(ApiResponse::err("Key not found or expired")),
    }
}

pub async fn delete_handler(
    State(store): State<Arc<ShardedStore>>,
    Path(key): Path<String>,
) -> Json<ApiResponse> {
    store.delete(&key).await;
    Json(ApiResponse::ok_empty())
}
