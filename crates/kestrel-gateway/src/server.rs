// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use dashmap::DashMap;
use kestrel_core::{InboundMessage, KestrelError};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers::{self, MailboxEntry};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Queue feeding `GatewayChannel::receive`.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    /// Replies waiting to be fetched, per chat id.
    pub mailboxes: Arc<DashMap<String, Vec<MailboxEntry>>>,
    /// Sender ids allowed to post. Empty allows everyone.
    pub allowed_senders: Arc<Vec<String>>,
    pub start_time: Instant,
}

/// Builds the router:
/// - GET /health (public)
/// - POST /v1/messages (with auth)
/// - GET /v1/chats/{chat_id}/messages (with auth)
pub fn build_router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route("/v1/chats/{chat_id}/messages", get(handlers::get_chat_messages))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Binds the listener up front so the caller learns the real address
/// (port 0 picks a free port).
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, KestrelError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| KestrelError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), KestrelError> {
    axum::serve(listener, app)
        .await
        .map_err(|e| KestrelError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}
