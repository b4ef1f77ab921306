// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pipeline: consume → classify → deduplicate → route → notify →
//! ack/fail. Classification is circuit-breaker-gated, with a keyword
//! fallback engaged whenever the primary classifier's breaker is open.

use std::sync::Arc;

use crate::broker::{Broker, TicketMessage};
use crate::circuit::{CircuitBreaker, CircuitError};
use crate::classifier::Classifier;
use crate::config::DispatchConfig;
use crate::dedup::Deduplicator;
use crate::error::{CoreError, CoreResult};
use crate::notifier::Notifier;
use crate::queue::PriorityQueue;
use crate::routing::{RoutingCoordinator, RouteRequest};
use crate::ticket::{Category, Ticket, TicketStatus};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessOutcome {
    pub ticket_id: String,
    pub category: Category,
    pub urgency: f64,
    pub model_used: &'static str,
    pub is_master_incident: bool,
    pub master_incident_id: Option<String>,
    pub notified: bool,
    pub agent_id: Option<String>,
    pub eta_seconds: Option<u64>,
    pub preempted_ticket_id: Option<String>,
}

/// The single-ticket processing pipeline shared by the HTTP ingest path and
/// any background consume loop.
pub struct WorkerPipeline {
    broker: Arc<dyn Broker>,
    primary_classifier: Arc<dyn Classifier>,
    fallback_classifier: Arc<dyn Classifier>,
    classifier_circuit: Arc<CircuitBreaker>,
    dedup: Arc<Deduplicator>,
    routing: Arc<RoutingCoordinator>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<PriorityQueue>,
    config: DispatchConfig,
}

impl WorkerPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn Broker>,
        primary_classifier: Arc<dyn Classifier>,
        fallback_classifier: Arc<dyn Classifier>,
        classifier_circuit: Arc<CircuitBreaker>,
        dedup: Arc<Deduplicator>,
        routing: Arc<RoutingCoordinator>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<PriorityQueue>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            broker,
            primary_classifier,
            fallback_classifier,
            classifier_circuit,
            dedup,
            routing,
            notifier,
            queue,
            config,
        }
    }

    /// Pop one message from the broker and run it through the pipeline.
    /// Returns `Ok(None)` when the broker has nothing pending.
    pub async fn process_next(&self) -> CoreResult<Option<ProcessOutcome>> {
        let Some(message) = self.broker.consume().await else {
            return Ok(None);
        };
        match self.process_message(message.clone()).await {
            Ok(outcome) => {
                self.broker.ack(&message.ticket_id).await;
                Ok(Some(outcome))
            }
            Err(err) => {
                self.broker.fail(&message.ticket_id, Some(err.to_string())).await;
                Err(err)
            }
        }
    }

    /// Processing order: classify, dedup, route, notify.
    pub async fn process_message(&self, message: TicketMessage) -> CoreResult<ProcessOutcome> {
        let text = format!("{} {}", message.subject, message.description);
        let (category, urgency, model_used) = self.classify(&text)?;

        let dedup_outcome = self.dedup.add_ticket(&message.ticket_id, &message.subject, &message.description);

        let route_request = RouteRequest {
            ticket_id: message.ticket_id.clone(),
            category: category.clone(),
            urgency,
            description: message.description.clone(),
            required_skills: Vec::new(),
        };
        let route_outcome = self.routing.route(route_request);

        if route_outcome.is_none() {
            let mut ticket = Ticket::new(&message.ticket_id, &message.subject, &message.description, "unknown");
            ticket.category = category.clone();
            ticket.urgency = urgency;
            ticket.status = TicketStatus::Queued;
            self.queue.enqueue(ticket);
        }

        let notified = if !dedup_outcome.is_duplicate && urgency > self.config.high_urgency_threshold {
            let mut ticket = Ticket::new(&message.ticket_id, &message.subject, &message.description, "unknown");
            ticket.category = category.clone();
            ticket.urgency = urgency;
            self.notifier.notify(&ticket);
            true
        } else {
            false
        };

        let (agent_id, eta_seconds, preempted_ticket_id) = match route_outcome {
            Some(o) => (Some(o.agent_id), Some(o.eta_seconds), o.preempted_ticket_id),
            None => (None, None, None),
        };

        Ok(ProcessOutcome {
            ticket_id: message.ticket_id,
            category,
            urgency,
            model_used,
            is_master_incident: dedup_outcome.is_duplicate,
            master_incident_id: dedup_outcome.master_id,
            notified,
            agent_id,
            eta_seconds,
            preempted_ticket_id,
        })
    }

    /// Try the circuit-gated primary classifier; fall back to the keyword
    /// classifier (outside the breaker) on an open circuit or a failed call.
    fn classify(&self, text: &str) -> CoreResult<(Category, f64, &'static str)> {
        let result: Result<(Category, f64), CircuitError<CoreError>> =
            self.classifier_circuit.execute(|| self.primary_classifier.classify(text));

        match result {
            Ok((category, urgency)) => Ok((category, urgency, "primary")),
            Err(_) => {
                let (category, urgency) = self
                    .fallback_classifier
                    .classify(text)
                    .map_err(|e| CoreError::WorkerFatal(format!("fallback classifier failed: {e}")))?;
                Ok((category, urgency, "fallback"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRegistry;
    use crate::broker::InMemoryBroker;
    use crate::circuit::CircuitBreakerConfig;
    use crate::classifier::KeywordClassifier;
    use crate::clock::ManualClock;
    use crate::embedding::HashingEmbedder;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;

    fn pipeline() -> (WorkerPipeline, Arc<InMemoryBroker>, Arc<AgentRegistry>) {
        let clock = Arc::new(ManualClock::new());
        let config = DispatchConfig::default();
        let broker = Arc::new(InMemoryBroker::new());
        let classifier = Arc::new(KeywordClassifier::new());
        let circuit = Arc::new(CircuitBreaker::new("classifier", CircuitBreakerConfig::default(), clock.clone()));
        let embedder = Arc::new(HashingEmbedder::new(config.embedding_dimension));
        let dedup = Arc::new(Deduplicator::new(embedder, clock.clone(), config.clone()));
        let registry = Arc::new(AgentRegistry::new());
        let routing = Arc::new(RoutingCoordinator::new(registry.clone(), clock.clone(), config.clone()));
        let notifier = Arc::new(crate::notifier::NullNotifier::new());
        let queue = Arc::new(PriorityQueue::new());

        let pipeline = WorkerPipeline::new(
            broker.clone(),
            classifier.clone(),
            classifier,
            circuit,
            dedup,
            routing,
            notifier,
            queue,
            config,
        );
        (pipeline, broker, registry)
    }

    fn message(id: &str, subject: &str, description: &str) -> TicketMessage {
        TicketMessage {
            ticket_id: id.to_owned(),
            subject: subject.to_owned(),
            description: description.to_owned(),
            category: Category::General,
            urgency: 0.5,
            sentiment_score: 0.5,
            created_at: Utc::now(),
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn process_message_routes_to_a_registered_agent() {
        let (pipeline, _broker, registry) = pipeline();
        let agent_id = registry.register_agent("Alice", HashMap::from([("technical".to_owned(), 0.9)]), 3);

        let outcome = pipeline
            .process_message(message("t1", "Server down", "API returning errors, system crash"))
            .await
            .expect("processes");

        assert_eq!(outcome.category, Category::Technical);
        assert_eq!(outcome.agent_id, Some(agent_id));
    }

    #[tokio::test]
    async fn process_next_acks_on_success() {
        let (pipeline, broker, registry) = pipeline();
        registry.register_agent("Alice", HashMap::from([("billing".to_owned(), 0.9)]), 3);
        broker.publish(message("t1", "Invoice issue", "payment refund needed")).await;

        let outcome = pipeline.process_next().await.expect("processes").expect("has message");
        assert_eq!(outcome.ticket_id, "t1");
        assert_eq!(broker.stats().await.completed_count, 1);
    }

    #[tokio::test]
    async fn unrouted_ticket_falls_back_to_the_priority_queue() {
        let (pipeline, _broker, _registry) = pipeline();
        let outcome = pipeline
            .process_message(message("t1", "General question", "just checking in"))
            .await
            .expect("processes");
        assert!(outcome.agent_id.is_none());
    }

    #[tokio::test]
    async fn high_urgency_not_duplicate_triggers_notification() {
        let (pipeline, _broker, registry) = pipeline();
        registry.register_agent("Alice", HashMap::from([("technical".to_owned(), 0.9)]), 3);

        let outcome = pipeline
            .process_message(message(
                "t1",
                "URGENT critical emergency",
                "the server is down completely blocked hacked vulnerability",
            ))
            .await
            .expect("processes");
        assert!(outcome.notified);
    }
}
