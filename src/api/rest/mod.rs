pub mod handler;
pub mod types;

use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::api::auth_middleware::{AuthState, AuthenticatedClient};
use crate::storage::ShardedStore;

pub fn router(store: Arc<ShardedStore>, auth: AuthState) -> Router {
    Router::new()
        .route("/set", post(handler::set_handler))
        .route("/get/:key", get(handler::get_handler))
        .route("/delete/:key", delete(handler::delete_handler))
        .layer(axum::middleware::from_extractor_with_state::<
            AuthenticatedClient,
            AuthState,
        >(auth))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(store)
}

/// Serve the store-level gateway until the task is aborted.
pub async fn serve(addr: SocketAddr, store: Arc<ShardedStore>, auth: AuthState) {
    tracing::info!(%addr, "starting http server");

    axum::Server::bind(&addr)
        .serve(router(store, auth).into_make_service())
        .await
        .unwrap();
}
