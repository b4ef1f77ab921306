// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state: one instance of every core component,
//! constructed once at startup and handed to every handler behind an
//! `Arc<AppState>` — explicit values constructed once, not hidden globals,
//! the same shape as a single struct owning every shared collaborator plus
//! a `CancellationToken` for graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use dispatch_core::{
    AgentRegistry, Broker, Category, CircuitBreaker, CircuitBreakerConfig, Classifier, Clock,
    Deduplicator, DispatchConfig, HashingEmbedder, InMemoryBroker, KeywordClassifier,
    LoggingNotifier, Notifier, PriorityQueue, RoutingCoordinator, SystemClock, TicketStatus,
    WorkerPipeline,
};

use crate::config::ServerConfig;

/// A merged, HTTP-facing view of one ticket's lifecycle. The core does not
/// keep a single "ticket" table of its own — identity lives across the
/// queue, the agent registry's assignment tables, and the dedup index —
/// so the gateway keeps this denormalized record for listing/lookup, kept
/// in sync from the handlers that mutate ticket state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TicketRecord {
    pub id: String,
    pub subject: String,
    pub description: String,
    pub customer_id: String,
    pub category: Category,
    pub urgency: f64,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub master_incident_id: Option<String>,
    pub assigned_agent: Option<String>,
    pub eta_seconds: Option<u64>,
}

/// In-process ticket index, the HTTP layer's own bookkeeping on top of the
/// core's per-component truth. Single `parking_lot::Mutex`, matching the
/// "own mutex per component, never held across a suspension point"
/// discipline the rest of the system follows.
#[derive(Default)]
pub struct TicketStore {
    tickets: Mutex<HashMap<String, TicketRecord>>,
}

impl TicketStore {
    pub fn insert(&self, record: TicketRecord) {
        self.tickets.lock().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<TicketRecord> {
        self.tickets.lock().get(id).cloned()
    }

    pub fn list(&self, status: Option<TicketStatus>) -> Vec<TicketRecord> {
        let tickets = self.tickets.lock();
        let mut out: Vec<TicketRecord> = tickets
            .values()
            .filter(|t| status.map(|s| s == t.status).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.urgency.partial_cmp(&a.urgency).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut TicketRecord)) -> bool {
        let mut tickets = self.tickets.lock();
        match tickets.get_mut(id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }
}

/// Every core component the HTTP gateway drives, constructed once in
/// `AppState::new` and shared via `Arc` with every worker loop and handler.
pub struct AppState {
    pub config: ServerConfig,
    pub dispatch_config: DispatchConfig,
    pub shutdown: CancellationToken,

    pub clock: Arc<dyn Clock>,
    pub queue: Arc<PriorityQueue>,
    pub agents: Arc<AgentRegistry>,
    pub routing: Arc<RoutingCoordinator>,
    pub dedup: Arc<Deduplicator>,
    pub classifier_circuit: Arc<CircuitBreaker>,
    pub primary_classifier: Arc<dyn Classifier>,
    pub fallback_classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub broker: Arc<dyn Broker>,
    pub pipeline: WorkerPipeline,
    pub tickets: TicketStore,
}

impl AppState {
    pub fn new(config: ServerConfig, shutdown: CancellationToken) -> Self {
        let dispatch_config = config.dispatch_config();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let queue = Arc::new(PriorityQueue::new());
        let agents = Arc::new(AgentRegistry::new());
        let routing = Arc::new(RoutingCoordinator::new(agents.clone(), clock.clone(), dispatch_config.clone()));

        let embedder = Arc::new(HashingEmbedder::new(dispatch_config.embedding_dimension));
        let dedup = Arc::new(Deduplicator::new(embedder, clock.clone(), dispatch_config.clone()));

        let circuit_config = CircuitBreakerConfig {
            failure_threshold: dispatch_config.circuit_failure_threshold,
            success_threshold: dispatch_config.circuit_success_threshold,
            reset_timeout: dispatch_config.circuit_reset_timeout,
            latency_threshold_ms: dispatch_config.circuit_breaker_latency_ms,
            latency_ring_capacity: dispatch_config.circuit_latency_ring_capacity,
        };
        let classifier_circuit = Arc::new(CircuitBreaker::new("classifier", circuit_config, clock.clone()));

        // No concrete ML classifier backend is wired up here; the keyword
        // classifier is both the ambient default and its own fallback.
        let primary_classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier::new());
        let fallback_classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier::new());
        let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier::new());
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());

        let pipeline = WorkerPipeline::new(
            broker.clone(),
            primary_classifier.clone(),
            fallback_classifier.clone(),
            classifier_circuit.clone(),
            dedup.clone(),
            routing.clone(),
            notifier.clone(),
            queue.clone(),
            dispatch_config.clone(),
        );

        Self {
            config,
            dispatch_config,
            shutdown,
            clock,
            queue,
            agents,
            routing,
            dedup,
            classifier_circuit,
            primary_classifier,
            fallback_classifier,
            notifier,
            broker,
            pipeline,
            tickets: TicketStore::default(),
        }
    }
}

/// Return current epoch millis, for response timestamps that don't warrant
/// a full `DateTime<Utc>`.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
