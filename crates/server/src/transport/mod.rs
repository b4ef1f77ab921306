// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the dispatch gateway.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with every route the gateway exposes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/tickets", post(http::create_ticket).get(http::list_tickets))
        .route("/tickets/{id}", get(http::get_ticket).delete(http::delete_ticket))
        .route("/tickets/{id}/complete", post(http::complete_ticket))
        .route("/tickets/{id}/priority", put(http::update_priority))
        .route("/agents", get(http::list_agents))
        .route("/agents/register", post(http::register_agent))
        .route("/agents/stats", get(http::agent_stats))
        .route("/agents/history", get(http::agent_history))
        .route("/preemption/history", get(http::preemption_history))
        .route("/circuit-breaker/stats", get(http::circuit_breaker_stats))
        .route("/ml/circuit-breaker/toggle", post(http::toggle_circuit_breaker))
        .route("/ml/classify", post(http::classify))
        .route("/broker/stats", get(http::broker_stats))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
