// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables for the routing core.
//!
//! This struct carries no CLI/env parsing itself — that lives at the
//! `dispatch-server` process boundary, which layers `clap` on top and
//! passes the resolved values in here. Keeping the core free of `clap`
//! keeps it embeddable in non-HTTP hosts.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Urgency above which the notifier is invoked.
    pub high_urgency_threshold: f64,
    /// Latency, in ms, above which the classifier circuit breaker trips.
    pub circuit_breaker_latency_ms: u64,
    /// Cosine-similarity threshold for the dedup index (`θ`).
    pub similarity_threshold: f64,
    /// Sliding window for dedup matches (`W`).
    pub duplicate_time_window: Duration,
    /// Cluster size that escalates into a Master Incident (`N`).
    pub duplicate_count_threshold: usize,
    /// Constant ETA seconds handed to every accepted ticket.
    pub eta_base_seconds: u64,
    /// Floor used if a non-constant ETA function is substituted.
    pub eta_min_seconds: u64,
    /// Minimum per-category proficiency to count as a generalist (`G`).
    pub generalist_threshold: f64,
    /// Urgency at/above which preemption is authorized (`P`).
    pub preemption_urgency_threshold: f64,

    /// Circuit breaker: consecutive failures to trip Closed → Open (`F`).
    pub circuit_failure_threshold: u32,
    /// Circuit breaker: consecutive successes to close from HalfOpen (`S`).
    pub circuit_success_threshold: u32,
    /// Circuit breaker: time in Open before probing HalfOpen (`T`).
    pub circuit_reset_timeout: Duration,
    /// Circuit breaker: capacity of the latency ring (`R`).
    pub circuit_latency_ring_capacity: usize,

    /// Embedding dimension used by the hashing-trick embedder (`D`).
    pub embedding_dimension: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            high_urgency_threshold: 0.8,
            circuit_breaker_latency_ms: 500,
            similarity_threshold: 0.9,
            duplicate_time_window: Duration::from_secs(5 * 60),
            duplicate_count_threshold: 10,
            eta_base_seconds: 60,
            eta_min_seconds: 15,
            generalist_threshold: 0.5,
            preemption_urgency_threshold: 0.85,
            circuit_failure_threshold: 5,
            circuit_success_threshold: 2,
            circuit_reset_timeout: Duration::from_secs(30),
            circuit_latency_ring_capacity: 100,
            embedding_dimension: 256,
        }
    }
}
