// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use dispatch_core::DispatchConfig;

/// Process-boundary configuration for the dispatch HTTP gateway: host/port,
/// the optional bearer token gate, and every routing/classification tunable.
/// `clap` layers CLI flags and env-var overrides on top of `DispatchConfig`'s
/// `Default`.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "dispatch-server", about = "Intelligent ticket-routing engine")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "DISPATCH_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "DISPATCH_PORT")]
    pub port: u16,

    /// Bearer token for API auth. If unset, auth is disabled (spec's "no
    /// authorization" non-goal — this is transport plumbing, not a policy).
    #[arg(long, env = "DISPATCH_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Urgency above which the notifier is invoked (`H`).
    #[arg(long, default_value_t = 0.8, env = "HIGH_URGENCY_THRESHOLD")]
    pub high_urgency_threshold: f64,

    /// Classifier circuit breaker latency threshold, in ms.
    #[arg(long, default_value_t = 500, env = "CIRCUIT_BREAKER_LATENCY_MS")]
    pub circuit_breaker_latency_ms: u64,

    /// Cosine-similarity threshold for the dedup index (`θ`).
    #[arg(long, default_value_t = 0.9, env = "SIMILARITY_THRESHOLD")]
    pub similarity_threshold: f64,

    /// Sliding dedup window, in minutes (`W`).
    #[arg(long, default_value_t = 5, env = "DUPLICATE_TIME_WINDOW_MINUTES")]
    pub duplicate_time_window_minutes: u64,

    /// Cluster size that escalates into a Master Incident (`N`).
    #[arg(long, default_value_t = 10, env = "DUPLICATE_COUNT_THRESHOLD")]
    pub duplicate_count_threshold: usize,

    /// Constant ETA seconds handed to every accepted ticket.
    #[arg(long, default_value_t = 60, env = "ETA_BASE_SECONDS")]
    pub eta_base_seconds: u64,

    /// Floor used if a non-constant ETA function is substituted.
    #[arg(long, default_value_t = 15, env = "ETA_MIN_SECONDS")]
    pub eta_min_seconds: u64,

    /// Minimum per-category proficiency to count as a generalist (`G`).
    #[arg(long, default_value_t = 0.5, env = "GENERALIST_THRESHOLD")]
    pub generalist_threshold: f64,

    /// Urgency at/above which preemption is authorized (`P`).
    #[arg(long, default_value_t = 0.85, env = "PREEMPTION_URGENCY_THRESHOLD")]
    pub preemption_urgency_threshold: f64,

    /// Circuit breaker: consecutive failures to trip Closed → Open (`F`).
    #[arg(long, default_value_t = 5, env = "CIRCUIT_FAILURE_THRESHOLD")]
    pub circuit_failure_threshold: u32,

    /// Circuit breaker: consecutive successes to close from HalfOpen (`S`).
    #[arg(long, default_value_t = 2, env = "CIRCUIT_SUCCESS_THRESHOLD")]
    pub circuit_success_threshold: u32,

    /// Circuit breaker: seconds in Open before probing HalfOpen (`T`).
    #[arg(long, default_value_t = 30, env = "CIRCUIT_RESET_TIMEOUT_SECONDS")]
    pub circuit_reset_timeout_seconds: u64,

    /// Circuit breaker: capacity of the latency ring (`R`).
    #[arg(long, default_value_t = 100, env = "CIRCUIT_LATENCY_RING_CAPACITY")]
    pub circuit_latency_ring_capacity: usize,

    /// Embedding dimension used by the hashing-trick embedder (`D`).
    #[arg(long, default_value_t = 256, env = "EMBEDDING_DIMENSION")]
    pub embedding_dimension: usize,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "DISPATCH_LOG_FORMAT")]
    pub log_format: String,
}

impl ServerConfig {
    /// Project the process-boundary config down to the core's plain
    /// `DispatchConfig`, leaving `host`/`port`/`auth_token`/`log_format`
    /// (transport concerns) behind.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            high_urgency_threshold: self.high_urgency_threshold,
            circuit_breaker_latency_ms: self.circuit_breaker_latency_ms,
            similarity_threshold: self.similarity_threshold,
            duplicate_time_window: Duration::from_secs(self.duplicate_time_window_minutes * 60),
            duplicate_count_threshold: self.duplicate_count_threshold,
            eta_base_seconds: self.eta_base_seconds,
            eta_min_seconds: self.eta_min_seconds,
            generalist_threshold: self.generalist_threshold,
            preemption_urgency_threshold: self.preemption_urgency_threshold,
            circuit_failure_threshold: self.circuit_failure_threshold,
            circuit_success_threshold: self.circuit_success_threshold,
            circuit_reset_timeout: Duration::from_secs(self.circuit_reset_timeout_seconds),
            circuit_latency_ring_capacity: self.circuit_latency_ring_capacity,
            embedding_dimension: self.embedding_dimension,
        }
    }
}
