// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker contract: a thin push/pop/ack/fail queue sitting in front of the
//! worker pipeline. This crate ships an in-memory implementation of a
//! four-queue shape (pending, processing, completed, dead letter) behind a
//! trait, so a Redis- or NATS-backed implementation can be swapped in
//! without touching the worker pipeline.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ticket::Category;

/// Wire message handed from the HTTP/ingest boundary to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub ticket_id: String,
    pub subject: String,
    pub description: String,
    pub category: Category,
    pub urgency: f64,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// A dead-lettered message with the failure that sent it there.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub ticket_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerStats {
    pub queue_size: usize,
    pub processing_count: usize,
    pub completed_count: usize,
    pub dead_letter_count: usize,
}

/// Push/pop/ack/fail contract the worker pipeline depends on. Kept
/// deliberately thin — no retries, no priority, no visibility timeout —
/// those concerns live in the priority queue and the worker loop.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: TicketMessage);
    /// Atomically move one message from pending to processing.
    async fn consume(&self) -> Option<TicketMessage>;
    async fn ack(&self, ticket_id: &str);
    async fn fail(&self, ticket_id: &str, error: Option<String>);
    async fn stats(&self) -> BrokerStats;
}

struct Inner {
    queue: VecDeque<TicketMessage>,
    processing: HashSet<String>,
    completed: HashSet<String>,
    dead_letter: Vec<DeadLetter>,
}

/// In-memory stand-in for the Redis-backed broker. Single mutex guards all
/// four collections so `consume` (dequeue + mark-processing) is atomic.
pub struct InMemoryBroker {
    inner: Mutex<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                processing: HashSet::new(),
                completed: HashSet::new(),
                dead_letter: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, message: TicketMessage) {
        let mut inner = self.inner.lock().await;
        inner.queue.push_back(message);
    }

    async fn consume(&self) -> Option<TicketMessage> {
        let mut inner = self.inner.lock().await;
        let message = inner.queue.pop_front()?;
        inner.processing.insert(message.ticket_id.clone());
        Some(message)
    }

    async fn ack(&self, ticket_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(ticket_id);
        inner.completed.insert(ticket_id.to_owned());
    }

    async fn fail(&self, ticket_id: &str, error: Option<String>) {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(ticket_id);
        if let Some(error) = error {
            inner.dead_letter.push(DeadLetter {
                ticket_id: ticket_id.to_owned(),
                error,
                timestamp: Utc::now(),
            });
        }
    }

    async fn stats(&self) -> BrokerStats {
        let inner = self.inner.lock().await;
        BrokerStats {
            queue_size: inner.queue.len(),
            processing_count: inner.processing.len(),
            completed_count: inner.completed.len(),
            dead_letter_count: inner.dead_letter.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> TicketMessage {
        TicketMessage {
            ticket_id: id.to_owned(),
            subject: "subject".to_owned(),
            description: "description".to_owned(),
            category: Category::General,
            urgency: 0.5,
            sentiment_score: 0.5,
            created_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn publish_then_consume_moves_to_processing() {
        let broker = InMemoryBroker::new();
        broker.publish(message("t1")).await;
        assert_eq!(broker.stats().await.queue_size, 1);

        let consumed = broker.consume().await.expect("message available");
        assert_eq!(consumed.ticket_id, "t1");
        assert_eq!(broker.stats().await.queue_size, 0);
        assert_eq!(broker.stats().await.processing_count, 1);
    }

    #[tokio::test]
    async fn ack_moves_from_processing_to_completed() {
        let broker = InMemoryBroker::new();
        broker.publish(message("t1")).await;
        broker.consume().await;
        broker.ack("t1").await;

        let stats = broker.stats().await;
        assert_eq!(stats.processing_count, 0);
        assert_eq!(stats.completed_count, 1);
    }

    #[tokio::test]
    async fn fail_with_error_dead_letters_the_message() {
        let broker = InMemoryBroker::new();
        broker.publish(message("t1")).await;
        broker.consume().await;
        broker.fail("t1", Some("classifier timeout".to_owned())).await;

        let stats = broker.stats().await;
        assert_eq!(stats.processing_count, 0);
        assert_eq!(stats.dead_letter_count, 1);
    }

    #[tokio::test]
    async fn consume_on_empty_queue_returns_none() {
        let broker = InMemoryBroker::new();
        assert!(broker.consume().await.is_none());
    }
}
