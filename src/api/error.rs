use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::rest::types::ApiResponse;
use crate::cluster::ClusterError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request body")]
    InvalidBody,

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            // A clean miss is not a server failure; answer 200 with the
            // envelope carrying the error, everything else is a 500.
            ApiError::Cluster(ClusterError::KeyNotFound) => StatusCode::OK,
            ApiError::Cluster(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ApiResponse::err(self.to_string());
        (status, axum::Json(body)).into_response()
    }
}
