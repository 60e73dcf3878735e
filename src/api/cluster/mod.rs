pub mod handler;

use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::api::auth_middleware::{AuthState, AuthenticatedClient};
use crate::cluster::{NodeService, NodesFile};

/// Everything the cluster router's handlers reach for.
#[derive(Clone)]
pub struct ClusterApiState {
    pub service: Arc<NodeService>,
    pub nodes_file: Arc<NodesFile>,
}

pub fn router(state: ClusterApiState, auth: AuthState) -> Router {
    Router::new()
        .route("/set", post(handler::set_handler))
        .route("/get/:key", get(handler::get_handler))
        .route("/delete/:key", delete(handler::delete_handler))
        .route("/nodes", get(handler::nodes_handler))
        .route("/nodes/add", post(handler::add_node_handler))
        .layer(axum::middleware::from_extractor_with_state::<
            AuthenticatedClient,
            AuthState,
        >(auth))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "cluster_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Serve the cluster router until the task is aborted.
pub async fn serve(addr: SocketAddr, state: ClusterApiState, auth: AuthState) {
    tracing::info!(%addr, "starting cluster router");

    axum::Server::bind(&addr)
        .serve(router(state, auth).into_make_service())
        .await
        .unwrap();
}
