use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::cluster::ClusterApiState;
use crate::api::error::ApiError;
use crate::api::rest::types::{AddNodeRequest, ApiResponse, SetRequest};

pub async fn set_handler(
    State(state): State<ClusterApiState>,
    payload: Result<Json<Vec<SetRequest>>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(requests) = payload.map_err(|_| ApiError::InvalidBody)?;

    let mut data = HashMap::new();
    let mut ttl = 0i64;
    for req in requests {
        data.insert(req.key, req.value);
        ttl = req.ttl;
    }

    state.service.set_data(&data, ttl).await?;

    Ok(Json(ApiResponse::ok(serde_json::json!(data))))
}

pub async fn get_handler(
    State(state): State<ClusterApiState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let value = state.service.get_data(&key).await?;
    Ok(Json(ApiResponse::ok(value.into())))
}

pub async fn delete_handler(
    State(state): State<ClusterApiState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    state.service.delete_data(&key).await?;
    Ok(Json(ApiResponse::ok_empty()))
}

pub async fn nodes_handler(State(state): State<ClusterApiState>) -> Json<ApiResponse> {
    let active = state.service.manager().get_active_nodes();
    Json(ApiResponse::ok(serde_json::json!(active)))
}

pub async fn add_node_handler(
    State(state): State<ClusterApiState>,
    payload: Result<Json<AddNodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::InvalidBody)?;

    state.nodes_file.append(&req.address).map_err(|e| {
        tracing::error!(error = %e, "failed to update nodes file");
        ApiError::Internal
    })?;
    state.service.manager().add_node(&req.address);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(serde_json::json!(req.address))),
    ))
}
