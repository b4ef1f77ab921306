// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin `axum` adapter around `dispatch-core`: an illustrative HTTP
//! ingest/listing surface, not a policy engine. All routing, dedup,
//! circuit-breaking, and preemption logic lives in `dispatch_core`; this
//! crate only translates HTTP requests into core operations and core
//! outcomes into JSON.

pub mod config;
pub mod error;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the gateway until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState::new(config, shutdown.clone()));

    tracing::info!(addr = %addr, "dispatch-server listening");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
