//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::distribution::urls::{
    AGENT_CONFIRM_PATH, AGENT_PROMPT_PATH, CONFERENCE_CALLBACK_PATH, DISTRIBUTION_START_PATH,
    INBOUND_PATH, STATUS_CALLBACK_PATH,
};
use crate::kernel::ServerDeps;
use crate::server::routes::{
    agent_confirm_handler, agent_prompt_handler, conference_callback_handler,
    distribution_start_handler, health_handler, inbound_call_handler, status_callback_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router
pub fn build_app(deps: Arc<ServerDeps>) -> Router {
    let app_state = AxumAppState { deps };

    // Provider webhooks are server-to-server; CORS only matters for tooling
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        // Caller leg
        .route(INBOUND_PATH, post(inbound_call_handler))
        .route(DISTRIBUTION_START_PATH, post(distribution_start_handler))
        // Agent legs
        .route(
            AGENT_PROMPT_PATH,
            get(agent_prompt_handler).post(agent_prompt_handler),
        )
        .route(AGENT_CONFIRM_PATH, post(agent_confirm_handler))
        // Provider callbacks
        .route(STATUS_CALLBACK_PATH, post(status_callback_handler))
        .route(CONFERENCE_CALLBACK_PATH, post(conference_callback_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
