pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod queue;
pub mod reconcile;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod store;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::queue::LocalQueue;
use crate::state::{AppState, SharedState};
use crate::storage::BlobStore;
use crate::store::StoreClient;

pub fn build_app(config: Config) -> (Router, SharedState) {
    let store = StoreClient::new(config.store.clone(), config.request_timeout_secs);
    let blobs = BlobStore::new(config.store.clone(), config.request_timeout_secs);
    let queue = LocalQueue::new(config.queue_dir.clone());

    if !store.is_configured() {
        tracing::warn!(
            "Remote store credentials not set (FORMGATE_STORE_URL / FORMGATE_STORE_KEY); \
             submissions will queue locally until configured"
        );
    }

    let max_body_size = config.max_body_size;
    let state: SharedState = Arc::new(AppState {
        config,
        store,
        blobs,
        queue,
    });

    let app = Router::new()
        // Public form endpoints are called cross-origin from the site.
        .merge(routes::public_routes().layer(CorsLayer::permissive()))
        .merge(routes::admin_routes())
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
