// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds surfaced by the routing core.
//!
//! Per the propagation policy: `NotFound`/`InvalidInput` are the only
//! variants a caller should treat as an exception. Everything else
//! (`CircuitOpen`, `UpstreamTransient`, `WorkerFatal`) is absorbed by the
//! worker pipeline and reported through statistics or the dead-letter list,
//! never thrown across a component boundary.

use thiserror::Error;

/// Errors the core can report synchronously to a caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("upstream transient failure: {0}")]
    UpstreamTransient(String),

    #[error("worker fatal error: {0}")]
    WorkerFatal(String),
}

impl CoreError {
    /// Machine-readable code, used by the HTTP layer to pick a status and by
    /// logs/metrics to tag the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::CircuitOpen(_) => "CIRCUIT_OPEN",
            Self::UpstreamTransient(_) => "UPSTREAM_TRANSIENT",
            Self::WorkerFatal(_) => "WORKER_FATAL",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
