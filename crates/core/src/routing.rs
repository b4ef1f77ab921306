// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing coordinator: scores available agents for a ticket, falls back to
//! preemption when none are free, and keeps the assignment and preemption
//! histories.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::agent::{Agent, AgentRegistry, AssignedTicket};
use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::ticket::Category;

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub ticket_id: String,
    pub category: Category,
    pub urgency: f64,
    pub description: String,
    pub required_skills: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub agent_id: String,
    pub preempted_ticket_id: Option<String>,
    pub eta_seconds: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AssignmentRecord {
    pub ticket_id: String,
    pub agent_id: String,
    pub score: f64,
    pub eta_seconds: u64,
    pub preempted: bool,
    pub preempted_ticket: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PreemptionRecord {
    pub urgent_ticket_id: String,
    pub urgent_urgency: f64,
    pub paused_ticket_id: String,
    pub paused_urgency: f64,
    pub agent_id: String,
    pub agent_name: String,
}

struct History {
    assignments: Vec<AssignmentRecord>,
    preemptions: Vec<PreemptionRecord>,
}

/// Stateless scoring logic plus the bounded assignment/preemption
/// histories, composed on top of a shared `AgentRegistry`.
pub struct RoutingCoordinator {
    registry: Arc<AgentRegistry>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    history: Mutex<History>,
}

/// Cap on retained history entries so a long-running process doesn't grow
/// these vectors without bound.
const HISTORY_CAPACITY: usize = 500;

impl RoutingCoordinator {
    pub fn new(registry: Arc<AgentRegistry>, clock: Arc<dyn Clock>, config: DispatchConfig) -> Self {
        Self {
            registry,
            clock,
            config,
            history: Mutex::new(History { assignments: Vec::new(), preemptions: Vec::new() }),
        }
    }

    /// Constant ETA, in seconds. Kept as a function of urgency (rather than
    /// a bare config read) so a future non-constant policy can slot in
    /// without changing call sites.
    pub fn compute_eta(&self, _urgency: f64) -> u64 {
        self.config.eta_base_seconds
    }

    /// Auto-complete expired tickets, then score available agents, then
    /// fall back to preemption if none are free and urgency clears the
    /// preemption threshold.
    pub fn route(&self, request: RouteRequest) -> Option<RouteOutcome> {
        let now = self.clock.now();
        self.registry.auto_complete_expired(now);

        let available = self.registry.get_available_agents();
        if !available.is_empty() {
            if let Some((agent, score)) = self.best_agent(&available, &request) {
                let eta = self.compute_eta(request.urgency);
                let assigned = AssignedTicket::new(
                    request.ticket_id.clone(),
                    request.category.clone(),
                    request.urgency,
                    request.description.clone(),
                    eta,
                    now,
                );
                if self.registry.accept_ticket(&agent.agent_id, assigned) {
                    self.record_assignment(AssignmentRecord {
                        ticket_id: request.ticket_id.clone(),
                        agent_id: agent.agent_id.clone(),
                        score,
                        eta_seconds: eta,
                        preempted: false,
                        preempted_ticket: None,
                    });
                    return Some(RouteOutcome {
                        agent_id: agent.agent_id,
                        preempted_ticket_id: None,
                        eta_seconds: eta,
                    });
                }
            }
        }

        if request.urgency >= self.config.preemption_urgency_threshold {
            return self.preempt(request, now);
        }

        None
    }

    fn best_agent(&self, available: &[Agent], request: &RouteRequest) -> Option<(Agent, f64)> {
        available
            .iter()
            .map(|a| (a.clone(), self.score(a, request)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// `score = w*skill_match + (1-w)*load_factor`, `w = 0.7 + 0.3*urgency`.
    /// Generalist agents are floored at the generalist threshold.
    fn score(&self, agent: &Agent, request: &RouteRequest) -> f64 {
        let mut skill_score = if !request.required_skills.is_empty() {
            request.required_skills.iter().map(|s| agent.skills.get(s).copied().unwrap_or(0.0)).sum::<f64>()
                / request.required_skills.len() as f64
        } else {
            agent.skills.get(&request.category.skill_key()).copied().unwrap_or(0.5)
        };

        if agent.is_generalist(self.config.generalist_threshold) && skill_score < self.config.generalist_threshold {
            skill_score = self.config.generalist_threshold;
        }

        let load_factor = 1.0 - (agent.current_load as f64 / agent.capacity as f64);
        let w = 0.7 + 0.3 * request.urgency;

        w * skill_score + (1.0 - w) * load_factor
    }

    /// Global-minimum victim selection: the lowest-urgency active ticket
    /// across every non-Offline agent, not merely the first agent found
    /// with a candidate (spec's resolution of the victim-selection question).
    fn preempt(&self, request: RouteRequest, now: Instant) -> Option<RouteOutcome> {
        let candidates: Vec<Agent> = self
            .registry
            .get_all_agents()
            .into_iter()
            .filter(|a| a.status != crate::agent::AgentStatus::Offline)
            .collect();

        let mut victim: Option<(Agent, AssignedTicket)> = None;
        for agent in &candidates {
            if let Some(ticket) = agent.lowest_urgency_active_ticket() {
                if ticket.urgency >= request.urgency {
                    continue;
                }
                let replace = match &victim {
                    None => true,
                    Some((_, current)) => {
                        ticket.urgency < current.urgency
                            || (ticket.urgency == current.urgency && ticket.started_at < current.started_at)
                    }
                };
                if replace {
                    victim = Some((agent.clone(), ticket.clone()));
                }
            }
        }

        let (agent, lowest_ticket) = victim?;

        let eta = self.compute_eta(request.urgency);
        let incoming = AssignedTicket::new(
            request.ticket_id.clone(),
            request.category.clone(),
            request.urgency,
            request.description.clone(),
            eta,
            now,
        );
        if !self.registry.swap_in_ticket(&agent.agent_id, &lowest_ticket.ticket_id, incoming, now) {
            return None;
        }

        self.record_preemption(PreemptionRecord {
            urgent_ticket_id: request.ticket_id.clone(),
            urgent_urgency: request.urgency,
            paused_ticket_id: lowest_ticket.ticket_id.clone(),
            paused_urgency: lowest_ticket.urgency,
            agent_id: agent.agent_id.clone(),
            agent_name: agent.name.clone(),
        });

        self.record_assignment(AssignmentRecord {
            ticket_id: request.ticket_id.clone(),
            agent_id: agent.agent_id.clone(),
            score: 0.0,
            eta_seconds: eta,
            preempted: true,
            preempted_ticket: Some(lowest_ticket.ticket_id.clone()),
        });

        tracing::info!(
            ticket_id = %request.ticket_id,
            urgency = request.urgency,
            paused_ticket_id = %lowest_ticket.ticket_id,
            agent = %agent.name,
            "preemption"
        );

        Some(RouteOutcome {
            agent_id: agent.agent_id,
            preempted_ticket_id: Some(lowest_ticket.ticket_id),
            eta_seconds: eta,
        })
    }

    pub fn complete(&self, agent_id: &str, ticket_id: &str) -> bool {
        self.registry.release_ticket(agent_id, ticket_id, self.clock.now())
    }

    fn record_assignment(&self, record: AssignmentRecord) {
        let mut history = self.history.lock();
        if history.assignments.len() >= HISTORY_CAPACITY {
            history.assignments.remove(0);
        }
        history.assignments.push(record);
    }

    fn record_preemption(&self, record: PreemptionRecord) {
        let mut history = self.history.lock();
        if history.preemptions.len() >= HISTORY_CAPACITY {
            history.preemptions.remove(0);
        }
        history.preemptions.push(record);
    }

    pub fn assignment_history(&self) -> Vec<AssignmentRecord> {
        self.history.lock().assignments.clone()
    }

    pub fn preemption_history(&self, limit: usize) -> Vec<PreemptionRecord> {
        let history = self.history.lock();
        let start = history.preemptions.len().saturating_sub(limit);
        history.preemptions[start..].to_vec()
    }
}
