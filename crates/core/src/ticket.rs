// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Ticket` state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of built-in categories, with an escape hatch for tags the
/// classifier corpus hasn't been trained on yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Billing,
    Technical,
    Legal,
    General,
    Other(String),
}

impl Category {
    /// Lowercase key used for skill-vector lookups (`A.skills[category.lower()]`).
    pub fn skill_key(&self) -> String {
        match self {
            Self::Billing => "billing".to_owned(),
            Self::Technical => "technical".to_owned(),
            Self::Legal => "legal".to_owned(),
            Self::General => "general".to_owned(),
            Self::Other(tag) => tag.to_lowercase(),
        }
    }

    /// Stable iteration order for tie-breaking category majority votes.
    pub const KNOWN: [Category; 4] =
        [Category::Billing, Category::Technical, Category::Legal, Category::General];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Billing => write!(f, "Billing"),
            Self::Technical => write!(f, "Technical"),
            Self::Legal => write!(f, "Legal"),
            Self::General => write!(f, "General"),
            Self::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// Ticket lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Queued,
    Assigned,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

/// A support ticket as tracked by the core. Ownership of the mutable
/// routing/queue state (assignment, pause accounting) lives in `Agent`'s
/// `AssignedTicket` and the priority queue's `QueueEntry` — this struct is
/// the identity and classification record shared across components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub subject: String,
    pub description: String,
    pub customer_id: String,
    pub category: Category,
    pub urgency: f64,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub master_incident_id: Option<String>,
}

impl Ticket {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
        customer_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            description: description.into(),
            customer_id: customer_id.into(),
            category: Category::General,
            urgency: 0.5,
            created_at: Utc::now(),
            status: TicketStatus::Pending,
            master_incident_id: None,
        }
    }

    /// Validate the fields a caller can get wrong, reporting `InvalidInput`.
    pub fn validate(&self) -> Result<(), crate::error::CoreError> {
        if self.subject.is_empty() || self.subject.chars().count() > 500 {
            return Err(crate::error::CoreError::InvalidInput(
                "subject must be 1..500 chars".into(),
            ));
        }
        if self.description.is_empty() {
            return Err(crate::error::CoreError::InvalidInput(
                "description must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.urgency) {
            return Err(crate::error::CoreError::InvalidInput(
                "urgency must be in [0,1]".into(),
            ));
        }
        Ok(())
    }

    /// Combined text fed to the classifier and embedder.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.description)
    }
}
