// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-and-suppress policy layered over the embedding index, producing
//! Master Incidents once enough near-duplicate tickets land in the same
//! time window.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::embedding::{cosine_similarity, Embedder, EmbeddingEntry, EmbeddingIndex};
use crate::ticket::Category;

#[derive(Debug, Clone)]
pub struct MasterIncident {
    pub master_id: String,
    pub member_ticket_ids: Vec<String>,
    pub average_similarity: f64,
    pub category: Category,
    pub created_at: Instant,
}

impl MasterIncident {
    pub fn suppressed_count(&self) -> usize {
        self.member_ticket_ids.len().saturating_sub(1)
    }
}

pub struct DedupOutcome {
    pub is_duplicate: bool,
    pub master_id: Option<String>,
}

struct Inner {
    index: EmbeddingIndex,
    master_incidents: Vec<MasterIncident>,
    next_master_sequence: u64,
}

/// Stateful deduplicator. Owns the embedding index and master-incident
/// table under one mutex so cluster creation is serialized and a cluster
/// is never materialized twice.
pub struct Deduplicator {
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    inner: Mutex<Inner>,
}

impl Deduplicator {
    pub fn new(embedder: Arc<dyn Embedder>, clock: Arc<dyn Clock>, config: DispatchConfig) -> Self {
        Self {
            embedder,
            clock,
            config,
            inner: Mutex::new(Inner {
                index: EmbeddingIndex::new(),
                master_incidents: Vec::new(),
                next_master_sequence: 0,
            }),
        }
    }

    pub fn add_ticket(&self, ticket_id: &str, subject: &str, description: &str) -> DedupOutcome {
        let text = format!("{subject} {description}");
        let vector = self.embedder.embed(&text);
        let now = self.clock.now();

        let mut inner = self.inner.lock();

        let candidates: Vec<(String, bool)> = inner
            .index
            .within_window(now, self.config.duplicate_time_window)
            .filter(|e| cosine_similarity(&vector, &e.vector) > self.config.similarity_threshold)
            .map(|e| (e.ticket_id.clone(), e.processed))
            .collect();

        let already_clustered = candidates.iter().find(|(_, processed)| *processed).map(|(id, _)| id.clone());

        let outcome = if let Some(member_ticket_id) = already_clustered {
            let existing = inner
                .master_incidents
                .iter()
                .position(|mi| mi.member_ticket_ids.contains(&member_ticket_id))
                .expect("a clustered embedding entry always belongs to a master incident");
            inner.master_incidents[existing].member_ticket_ids.push(ticket_id.to_owned());
            let master_id = inner.master_incidents[existing].master_id.clone();
            inner.index.insert(EmbeddingEntry {
                ticket_id: ticket_id.to_owned(),
                subject: subject.to_owned(),
                description: description.to_owned(),
                vector,
                created_at: now,
                processed: true,
            });
            DedupOutcome { is_duplicate: true, master_id: Some(master_id) }
        } else {
            let matches: Vec<String> = candidates.into_iter().map(|(id, _)| id).collect();
            // The new ticket itself counts toward the cluster: 9 prior
            // matches plus the incoming ticket is 10 members, so the
            // threshold compares against `matches.len() + 1`.
            if matches.len() + 1 >= self.config.duplicate_count_threshold {
                let master_id = self.create_master_incident(&mut inner, ticket_id, &vector, &matches, now);
                inner.index.insert(EmbeddingEntry {
                    ticket_id: ticket_id.to_owned(),
                    subject: subject.to_owned(),
                    description: description.to_owned(),
                    vector,
                    created_at: now,
                    processed: true,
                });
                DedupOutcome { is_duplicate: true, master_id: Some(master_id) }
            } else {
                inner.index.insert(EmbeddingEntry {
                    ticket_id: ticket_id.to_owned(),
                    subject: subject.to_owned(),
                    description: description.to_owned(),
                    vector,
                    created_at: now,
                    processed: false,
                });
                DedupOutcome { is_duplicate: false, master_id: None }
            }
        };

        inner.index.evict_older_than(now, self.config.duplicate_time_window * 2);
        outcome
    }

    fn create_master_incident(
        &self,
        inner: &mut Inner,
        new_ticket_id: &str,
        new_vector: &[f64],
        matches: &[String],
        now: Instant,
    ) -> String {
        let similarities: Vec<f64> = matches
            .iter()
            .filter_map(|m| inner.index.within_window(now, self.config.duplicate_time_window * 2).find(|e| &e.ticket_id == m))
            .map(|e| cosine_similarity(new_vector, &e.vector))
            .collect();
        let average_similarity = if similarities.is_empty() {
            0.0
        } else {
            similarities.iter().sum::<f64>() / similarities.len() as f64
        };

        let descriptions: Vec<String> = matches
            .iter()
            .filter_map(|m| inner.index.within_window(now, self.config.duplicate_time_window * 2).find(|e| &e.ticket_id == m))
            .map(|e| format!("{} {}", e.subject, e.description))
            .collect();
        let category = infer_category(&descriptions);

        let mut member_ticket_ids = matches.to_vec();
        member_ticket_ids.push(new_ticket_id.to_owned());

        let sequence = inner.next_master_sequence;
        inner.next_master_sequence += 1;
        let master_id = format!("MASTER-{sequence:08X}");

        for m in matches {
            inner.index.mark_processed(m);
        }

        inner.master_incidents.push(MasterIncident {
            master_id: master_id.clone(),
            member_ticket_ids,
            average_similarity,
            category,
            created_at: now,
        });

        tracing::info!(
            master_id = %master_id,
            suppressed = matches.len(),
            avg_similarity = average_similarity,
            "master incident created"
        );

        master_id
    }

    pub fn get_master_incident(&self, master_id: &str) -> Option<MasterIncident> {
        self.inner.lock().master_incidents.iter().find(|m| m.master_id == master_id).cloned()
    }

    pub fn get_all_master_incidents(&self) -> Vec<MasterIncident> {
        self.inner.lock().master_incidents.clone()
    }

    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.lock();
        DedupStats {
            tracked_tickets: inner.index.len(),
            master_incidents: inner.master_incidents.len(),
            total_suppressed: inner.master_incidents.iter().map(|m| m.suppressed_count()).sum(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DedupStats {
    pub tracked_tickets: usize,
    pub master_incidents: usize,
    pub total_suppressed: usize,
}

/// Majority-vote keyword categorization across member descriptions, ties
/// broken by `Category::KNOWN`'s stable order.
fn infer_category(descriptions: &[String]) -> Category {
    const KEYWORDS: &[(Category, &[&str])] = &[
        (Category::Billing, &["invoice", "payment", "bill", "charge", "refund"]),
        (Category::Technical, &["error", "bug", "crash", "broken", "api", "server"]),
        (Category::Legal, &["legal", "compliance", "gdpr", "privacy", "contract"]),
    ];

    let mut counts = std::collections::HashMap::new();
    for text in descriptions {
        let lower = text.to_lowercase();
        for (category, keywords) in KEYWORDS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                *counts.entry(category.clone()).or_insert(0usize) += 1;
            }
        }
    }

    Category::KNOWN
        .into_iter()
        .max_by_key(|c| counts.get(c).copied().unwrap_or(0))
        .filter(|c| counts.get(c).copied().unwrap_or(0) > 0)
        .unwrap_or(Category::General)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::embedding::HashingEmbedder;
    use std::time::Duration;

    fn dedup() -> (Deduplicator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let embedder = Arc::new(HashingEmbedder::new(256));
        let dedup = Deduplicator::new(embedder, clock.clone(), DispatchConfig::default());
        (dedup, clock)
    }

    #[test]
    fn nine_similar_tickets_do_not_create_master_tenth_does() {
        let (dedup, _clock) = dedup();
        for i in 0..9 {
            let outcome = dedup.add_ticket(&format!("t{i}"), "Login page down", "error 500 on login");
            assert!(!outcome.is_duplicate, "ticket {i} should not yet be a duplicate");
        }
        let tenth = dedup.add_ticket("t9", "Login page down", "error 500 on login");
        assert!(tenth.is_duplicate);
        let master_id = tenth.master_id.expect("master id");
        let incident = dedup.get_master_incident(&master_id).expect("incident exists");
        assert_eq!(incident.member_ticket_ids.len(), 10);
        assert_eq!(incident.suppressed_count(), 9);
    }

    #[test]
    fn eleventh_similar_ticket_appends_no_new_incident() {
        let (dedup, _clock) = dedup();
        for i in 0..10 {
            dedup.add_ticket(&format!("t{i}"), "Login page down", "error 500 on login");
        }
        let before = dedup.get_all_master_incidents().len();
        let outcome = dedup.add_ticket("t10", "Login page down", "error 500 on login");
        assert!(outcome.is_duplicate);
        assert_eq!(dedup.get_all_master_incidents().len(), before);
        let incident = dedup.get_master_incident(&outcome.master_id.unwrap()).unwrap();
        assert_eq!(incident.member_ticket_ids.len(), 11);
    }

    #[test]
    fn distinct_tickets_never_cluster() {
        let (dedup, _clock) = dedup();
        let a = dedup.add_ticket("a", "Invoice overcharge", "please refund my payment");
        let b = dedup.add_ticket("b", "Server crash", "kernel panic on boot");
        assert!(!a.is_duplicate);
        assert!(!b.is_duplicate);
    }

    #[test]
    fn entries_older_than_2w_are_purged() {
        let (dedup, clock) = dedup();
        dedup.add_ticket("old", "Login page down", "error 500 on login");
        assert_eq!(dedup.stats().tracked_tickets, 1);

        clock.advance(Duration::from_secs(11 * 60));
        dedup.add_ticket("new", "Unrelated subject", "totally different text");
        assert_eq!(dedup.stats().tracked_tickets, 1);
    }
}
