// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of agents and the tickets assigned to them. Scoring and
//! preemption decisions are split out into `routing`, which composes on top
//! of this registry — the two share one lock domain but stay separate
//! components.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::ticket::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedStatus {
    Active,
    Paused,
    Completed,
}

/// A ticket assigned to an agent, with its own ETA/pause accounting.
#[derive(Debug, Clone)]
pub struct AssignedTicket {
    pub ticket_id: String,
    pub category: Category,
    pub urgency: f64,
    pub description: String,
    pub status: AssignedStatus,
    pub eta_seconds: u64,
    pub started_at: Instant,
    pub elapsed_before_pause: std::time::Duration,
}

impl AssignedTicket {
    pub fn new(ticket_id: impl Into<String>, category: Category, urgency: f64, description: impl Into<String>, eta_seconds: u64, now: Instant) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            category,
            urgency,
            description: description.into(),
            status: AssignedStatus::Active,
            eta_seconds,
            started_at: now,
            elapsed_before_pause: std::time::Duration::ZERO,
        }
    }

    /// Seconds of ETA remaining, clamped to zero.
    pub fn remaining_eta(&self, now: Instant) -> f64 {
        if self.status == AssignedStatus::Completed {
            return 0.0;
        }
        let elapsed = if self.status == AssignedStatus::Paused {
            self.elapsed_before_pause
        } else {
            self.elapsed_before_pause + now.saturating_duration_since(self.started_at)
        };
        (self.eta_seconds as f64 - elapsed.as_secs_f64()).max(0.0)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.status == AssignedStatus::Active && self.remaining_eta(now) <= 0.0
    }
}

/// An agent's per-category proficiency vector and capacity.
#[derive(Debug, Clone)]
pub struct Agent {
    pub agent_id: String,
    pub name: String,
    pub skills: HashMap<String, f64>,
    pub capacity: u32,
    pub current_load: u32,
    pub status: AgentStatus,
    pub assigned_tickets: HashMap<String, AssignedTicket>,
}

impl Agent {
    pub fn can_accept_ticket(&self) -> bool {
        self.status == AgentStatus::Available && self.current_load < self.capacity
    }

    /// `is_generalist`: proficiency >= threshold in every known category.
    pub fn is_generalist(&self, threshold: f64) -> bool {
        Category::KNOWN
            .iter()
            .filter(|c| !matches!(c, Category::General))
            .all(|c| self.skills.get(&c.skill_key()).copied().unwrap_or(0.0) >= threshold)
    }

    fn accept_ticket(&mut self, ticket: AssignedTicket) -> bool {
        if self.can_accept_ticket() {
            self.current_load += 1;
            self.assigned_tickets.insert(ticket.ticket_id.clone(), ticket);
            true
        } else {
            false
        }
    }

    fn release_ticket(&mut self, ticket_id: &str) -> bool {
        if let Some(mut t) = self.assigned_tickets.remove(ticket_id) {
            t.status = AssignedStatus::Completed;
            self.current_load = self.current_load.saturating_sub(1);
            true
        } else {
            false
        }
    }

    fn pause_ticket(&mut self, ticket_id: &str, now: Instant) -> bool {
        if let Some(t) = self.assigned_tickets.get_mut(ticket_id) {
            if t.status == AssignedStatus::Active {
                t.elapsed_before_pause += now.saturating_duration_since(t.started_at);
                t.status = AssignedStatus::Paused;
                return true;
            }
        }
        false
    }

    fn resume_ticket(&mut self, ticket_id: &str, now: Instant) -> bool {
        if let Some(t) = self.assigned_tickets.get_mut(ticket_id) {
            if t.status == AssignedStatus::Paused {
                t.started_at = now;
                t.status = AssignedStatus::Active;
                return true;
            }
        }
        false
    }

    /// Active ticket with the lowest urgency, the preemption candidate.
    pub fn lowest_urgency_active_ticket(&self) -> Option<&AssignedTicket> {
        self.assigned_tickets
            .values()
            .filter(|t| t.status == AssignedStatus::Active)
            .min_by(|a, b| a.urgency.partial_cmp(&b.urgency).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Highest-urgency paused ticket, auto-resumed once capacity frees up.
    fn highest_urgency_paused_ticket(&self) -> Option<&AssignedTicket> {
        self.assigned_tickets
            .values()
            .filter(|t| t.status == AssignedStatus::Paused)
            .max_by(|a, b| a.urgency.partial_cmp(&b.urgency).unwrap_or(std::cmp::Ordering::Equal))
    }
}

struct Inner {
    agents: HashMap<String, Agent>,
}

/// Stateful registry of agents. All mutation goes through one mutex;
/// `routing::RoutingCoordinator` composes on top of this for scoring and
/// preemption decisions.
pub struct AgentRegistry {
    inner: Mutex<Inner>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { agents: HashMap::new() }) }
    }

    pub fn register_agent(&self, name: impl Into<String>, skills: HashMap<String, f64>, capacity: u32) -> String {
        let agent_id = Uuid::new_v4().to_string();
        let agent = Agent {
            agent_id: agent_id.clone(),
            name: name.into(),
            skills,
            capacity,
            current_load: 0,
            status: AgentStatus::Available,
            assigned_tickets: HashMap::new(),
        };
        self.inner.lock().agents.insert(agent_id.clone(), agent);
        agent_id
    }

    pub fn update_status(&self, agent_id: &str, status: AgentStatus) -> bool {
        let mut inner = self.inner.lock();
        match inner.agents.get_mut(agent_id) {
            Some(a) => {
                a.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.inner.lock().agents.get(agent_id).cloned()
    }

    pub fn get_available_agents(&self) -> Vec<Agent> {
        self.inner.lock().agents.values().filter(|a| a.can_accept_ticket()).cloned().collect()
    }

    pub fn get_all_agents(&self) -> Vec<Agent> {
        self.inner.lock().agents.values().cloned().collect()
    }

    /// Accept `ticket` onto `agent_id` if it has capacity. Returns false if
    /// the agent is unknown or already full.
    pub fn accept_ticket(&self, agent_id: &str, ticket: AssignedTicket) -> bool {
        let mut inner = self.inner.lock();
        match inner.agents.get_mut(agent_id) {
            Some(a) => a.accept_ticket(ticket),
            None => false,
        }
    }

    pub fn release_ticket(&self, agent_id: &str, ticket_id: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.agents.get_mut(agent_id) {
            Some(a) => {
                let released = a.release_ticket(ticket_id);
                if released {
                    Self::resume_next_paused(a, now);
                }
                released
            }
            None => false,
        }
    }

    pub fn pause_ticket(&self, agent_id: &str, ticket_id: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.agents.get_mut(agent_id) {
            Some(a) => a.pause_ticket(ticket_id, now),
            None => false,
        }
    }

    /// Pause `paused_ticket_id`, free the capacity slot it held, and accept
    /// `incoming` in one locked step — the preemption swap as a single
    /// atomic primitive rather than pause-then-separately-accept.
    pub fn swap_in_ticket(&self, agent_id: &str, paused_ticket_id: &str, incoming: AssignedTicket, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        let Some(agent) = inner.agents.get_mut(agent_id) else {
            return false;
        };
        if !agent.pause_ticket(paused_ticket_id, now) {
            return false;
        }
        agent.current_load = agent.current_load.saturating_sub(1);
        agent.accept_ticket(incoming)
    }

    pub fn resume_ticket(&self, agent_id: &str, ticket_id: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.agents.get_mut(agent_id) {
            Some(a) => a.resume_ticket(ticket_id, now),
            None => false,
        }
    }

    fn resume_next_paused(agent: &mut Agent, now: Instant) {
        if let Some(ticket_id) = agent.highest_urgency_paused_ticket().map(|t| t.ticket_id.clone()) {
            agent.resume_ticket(&ticket_id, now);
        }
    }

    /// Release every ticket whose ETA has elapsed, then auto-resume the
    /// highest-urgency paused ticket freed up on each affected agent.
    pub fn auto_complete_expired(&self, now: Instant) -> Vec<(String, String)> {
        let mut inner = self.inner.lock();
        let mut completed = Vec::new();
        for agent in inner.agents.values_mut() {
            let expired: Vec<String> = agent
                .assigned_tickets
                .values()
                .filter(|t| t.is_expired(now))
                .map(|t| t.ticket_id.clone())
                .collect();
            for ticket_id in expired {
                agent.release_ticket(&ticket_id);
                Self::resume_next_paused(agent, now);
                completed.push((agent.agent_id.clone(), ticket_id));
            }
        }
        completed
    }

    pub fn stats(&self) -> AgentRegistryStats {
        let inner = self.inner.lock();
        let total_agents = inner.agents.len();
        let available = inner.agents.values().filter(|a| a.can_accept_ticket()).count();
        let total_current_load: u32 = inner.agents.values().map(|a| a.current_load).sum();
        let total_capacity: u32 = inner.agents.values().map(|a| a.capacity).sum();
        let active_tickets: usize = inner
            .agents
            .values()
            .map(|a| a.assigned_tickets.values().filter(|t| t.status == AssignedStatus::Active).count())
            .sum();
        let paused_tickets: usize = inner
            .agents
            .values()
            .map(|a| a.assigned_tickets.values().filter(|t| t.status == AssignedStatus::Paused).count())
            .sum();

        AgentRegistryStats {
            total_agents,
            available_agents: available,
            total_current_load,
            total_capacity,
            utilization: if total_capacity > 0 { total_current_load as f64 / total_capacity as f64 } else { 0.0 },
            active_tickets,
            paused_tickets,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentRegistryStats {
    pub total_agents: usize,
    pub available_agents: usize,
    pub total_current_load: u32,
    pub total_capacity: u32,
    pub utilization: f64,
    pub active_tickets: usize,
    pub paused_tickets: usize,
}
