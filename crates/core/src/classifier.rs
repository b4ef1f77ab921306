// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyword/regex classifier capability, gated by the circuit breaker in the
//! worker pipeline and used as its own fallback when the breaker trips.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::CoreResult;
use crate::ticket::Category;

/// Produces a `(Category, urgency)` pair for ticket text. A production
/// deployment would plug in a trained model here; this crate ships the
/// deterministic heuristic. Returns `Result` so a fallible primary
/// classifier can be gated by the circuit breaker in the worker pipeline.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> CoreResult<(Category, f64)>;
}

struct CategoryPatterns {
    category: Category,
    patterns: Vec<Regex>,
}

static CATEGORY_KEYWORDS: LazyLock<Vec<CategoryPatterns>> = LazyLock::new(|| {
    vec![
        CategoryPatterns {
            category: Category::Billing,
            patterns: compile(&[
                "invoice", "payment", "refund", "billing", "finance", "charge", "subscription",
                "pricing", "transaction", "bank", "receipt", "visa", "card", "overcharge",
                "checkout", "cost", "money", "bill", "pay", "credit", "debit",
            ]),
        },
        CategoryPatterns {
            category: Category::Technical,
            patterns: compile(&[
                "install", "pip", "npm", "bug", "crash", "error", "api", "server", "down",
                "setup", "python", "node", "build", "deployment", "code", "system", "dashboard",
                "loading", "failed", "connection", "timeout", "database", "mysql", "postgre",
            ]),
        },
        CategoryPatterns {
            category: Category::Legal,
            patterns: compile(&[
                "privacy", "gdpr", "terms", "legal", "compliance", "license", "agreement",
                "violation", "policy", "contract", "law", "court", "sue", "identity", "theft",
                "security", "audit",
            ]),
        },
    ]
});

struct UrgencyPattern {
    regex: Regex,
    weight: f64,
}

// Patterns below are fixed string literals checked in by hand; a failure to
// compile one is a programmer error caught by the classifier tests, not a
// runtime condition to propagate.
#[allow(clippy::expect_used)]
static URGENCY_PATTERNS: LazyLock<Vec<UrgencyPattern>> = LazyLock::new(|| {
    vec![
        (r"\b(urgent|asap|critical|emergency|immediately|breakdown|down|dead|blocking|catastrophic)\b", 0.5),
        (r"\b(blocked|cannot|can't|unable|stuck|preventing|hacked|broken|crashed)\b", 0.3),
        (r"\b(security|vulnerability|exploit|access denied)\b", 0.4),
        (r"\b(failed|money|finance|invoice error|refund|overcharge)\b", 0.2),
        (r"\b(please help|help needed|assistance|outage)\b", 0.1),
        (r"\b(whenever|when you can|low priority|no rush|fyi|question)\b", -0.2),
    ]
    .into_iter()
    .map(|(pattern, weight)| UrgencyPattern { regex: Regex::new(pattern).expect("static urgency pattern"), weight })
    .collect()
});

#[allow(clippy::expect_used)]
fn compile(words: &[&str]) -> Vec<Regex> {
    words.iter().map(|w| Regex::new(w).expect("static category keyword")).collect()
}

/// Heuristic classifier: regex category voting plus an additive urgency
/// score. No model artifact, no network call — safe to run inline on the
/// worker's hot path as a classifier-circuit-open fallback.
#[derive(Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn detect_urgency(&self, text: &str, category: &Category) -> f64 {
        let lower = text.to_lowercase();
        let mut score = 0.2;

        for pattern in URGENCY_PATTERNS.iter() {
            if pattern.regex.is_match(&lower) {
                score += pattern.weight;
            }
        }

        if text.contains("!!!") || text.to_uppercase().contains("URGENT") {
            score += 0.1;
        }

        if matches!(category, Category::Technical | Category::Billing) {
            score += 0.05;
        }

        (score * 100.0).round() / 100.0
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> CoreResult<(Category, f64)> {
        let lower = text.to_lowercase();

        let mut best_category = Category::General;
        let mut best_score = 0usize;
        for entry in CATEGORY_KEYWORDS.iter() {
            let hits = entry.patterns.iter().filter(|p| p.is_match(&lower)).count();
            if hits > best_score {
                best_score = hits;
                best_category = entry.category.clone();
            }
        }

        let urgency = self.detect_urgency(text, &best_category);
        let urgency = urgency.clamp(0.0, 1.0);
        Ok((best_category, urgency))
    }
}
