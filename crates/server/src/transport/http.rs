// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the dispatch gateway — one request/response struct
//! pair per route, a thin translation into `dispatch_core` calls
//! (`State<Arc<_>>` extraction, `impl IntoResponse`, manual
//! `to_http_response` on error).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dispatch_core::{Broker, Category, CircuitError, Classifier, CoreError, Ticket, TicketStatus};

use crate::error::ApiError;
use crate::state::{AppState, TicketRecord};

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub customer_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTicketResponse {
    pub ticket_id: String,
    pub category: Category,
    pub urgency: f64,
    pub eta_seconds: Option<u64>,
    pub assigned_agent: Option<String>,
    pub preempted_ticket: Option<String>,
    pub is_master_incident: bool,
    pub master_incident_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteTicketResponse {
    pub ticket_id: String,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteTicketResponse {
    pub ticket_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriorityRequest {
    pub urgency: f64,
}

#[derive(Debug, Serialize)]
pub struct UpdatePriorityResponse {
    pub ticket_id: String,
    pub urgency: f64,
    pub updated_in_queue: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub name: String,
    pub skills: HashMap<String, f64>,
    pub capacity: u32,
    pub current_load: u32,
    pub status: dispatch_core::AgentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    #[serde(default)]
    pub skills: HashMap<String, f64>,
    pub capacity: u32,
}

#[derive(Debug, Serialize)]
pub struct RegisterAgentResponse {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PreemptionHistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleCircuitBreakerRequest {
    pub open: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleCircuitBreakerResponse {
    pub state: dispatch_core::CircuitState,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub category: Category,
    pub urgency: f64,
    pub model_used: &'static str,
}

// -- Helpers ------------------------------------------------------------------

/// Parse the `status` query filter, matching `TicketStatus`'s snake_case
/// serde rendering. `InvalidInput` for anything else.
fn parse_status(raw: &str) -> Result<TicketStatus, ApiError> {
    match raw {
        "pending" => Ok(TicketStatus::Pending),
        "queued" => Ok(TicketStatus::Queued),
        "assigned" => Ok(TicketStatus::Assigned),
        "paused" => Ok(TicketStatus::Paused),
        "completed" => Ok(TicketStatus::Completed),
        "cancelled" => Ok(TicketStatus::Cancelled),
        "failed" => Ok(TicketStatus::Failed),
        _ => Err(ApiError::BadRequest),
    }
}

fn error_response(err: ApiError, message: impl Into<String>) -> axum::response::Response {
    err.to_http_response(message).into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), queue_size: state.queue.size() })
}

/// `POST /tickets` — ingest one ticket and drive it through the worker
/// pipeline synchronously over the broker→pipeline data flow.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> impl IntoResponse {
    let ticket_id = Uuid::new_v4().to_string();
    let draft = Ticket::new(&ticket_id, &req.subject, &req.description, &req.customer_id);
    if let Err(err) = draft.validate() {
        let api_err: ApiError = err.clone().into();
        return error_response(api_err, err.to_string());
    }

    let message = dispatch_core::TicketMessage {
        ticket_id: ticket_id.clone(),
        subject: req.subject.clone(),
        description: req.description.clone(),
        category: Category::General,
        urgency: draft.urgency,
        sentiment_score: 0.5,
        created_at: draft.created_at,
        metadata: serde_json::json!({}),
    };
    state.broker.publish(message).await;

    let outcome = match state.pipeline.process_next().await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => return error_response(ApiError::Internal, "broker returned no message"),
        Err(err) => return error_response(ApiError::Internal, err.to_string()),
    };

    let status = if outcome.agent_id.is_some() { TicketStatus::Assigned } else { TicketStatus::Queued };
    state.tickets.insert(TicketRecord {
        id: ticket_id.clone(),
        subject: req.subject,
        description: req.description,
        customer_id: req.customer_id,
        category: outcome.category.clone(),
        urgency: outcome.urgency,
        created_at: draft.created_at,
        status,
        master_incident_id: outcome.master_incident_id.clone(),
        assigned_agent: outcome.agent_id.clone(),
        eta_seconds: outcome.eta_seconds,
    });

    Json(CreateTicketResponse {
        ticket_id,
        category: outcome.category,
        urgency: outcome.urgency,
        eta_seconds: outcome.eta_seconds,
        assigned_agent: outcome.agent_id,
        preempted_ticket: outcome.preempted_ticket_id,
        is_master_incident: outcome.is_master_incident,
        master_incident_id: outcome.master_incident_id,
    })
    .into_response()
}

/// `GET /tickets?status=…` — sorted by urgency descending.
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTicketsQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        Some(raw) => match parse_status(raw) {
            Ok(s) => Some(s),
            Err(err) => return error_response(err, format!("unknown status filter: {raw}")),
        },
        None => None,
    };
    Json(state.tickets.list(status)).into_response()
}

/// `GET /tickets/{id}`
pub async fn get_ticket(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.tickets.get(&id) {
        Some(record) => Json(record).into_response(),
        None => error_response(ApiError::NotFound, format!("ticket '{id}' not found")),
    }
}

/// `DELETE /tickets/{id}` — cancels the gateway's record. The core priority
/// queue exposes enqueue/dequeue/peek/get_by_id/update_priority/size/
/// is_empty/clear/get_all, but no direct removal; an in-flight assignment
/// is left to finish or expire on its own.
pub async fn delete_ticket(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let updated = state.tickets.update(&id, |record| record.status = TicketStatus::Cancelled);
    if updated {
        Json(DeleteTicketResponse { ticket_id: id, cancelled: true }).into_response()
    } else {
        error_response(ApiError::NotFound, format!("ticket '{id}' not found"))
    }
}

/// `POST /tickets/{id}/complete`
pub async fn complete_ticket(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Some(record) = state.tickets.get(&id) else {
        return error_response(ApiError::NotFound, format!("ticket '{id}' not found"));
    };
    let Some(agent_id) = record.assigned_agent.clone() else {
        return error_response(ApiError::InvalidInput, "ticket has no assigned agent".to_owned());
    };

    let completed = state.routing.complete(&agent_id, &id);
    if completed {
        state.tickets.update(&id, |record| record.status = TicketStatus::Completed);
    }
    Json(CompleteTicketResponse { ticket_id: id, completed }).into_response()
}

/// `PUT /tickets/{id}/priority`
pub async fn update_priority(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePriorityRequest>,
) -> impl IntoResponse {
    if !(0.0..=1.0).contains(&req.urgency) {
        return error_response(ApiError::BadRequest, "urgency must be in [0,1]".to_owned());
    }
    if state.tickets.get(&id).is_none() {
        return error_response(ApiError::NotFound, format!("ticket '{id}' not found"));
    }

    let updated_in_queue = state.queue.update_priority(&id, req.urgency);
    state.tickets.update(&id, |record| record.urgency = req.urgency);

    Json(UpdatePriorityResponse { ticket_id: id, urgency: req.urgency, updated_in_queue }).into_response()
}

/// `GET /agents`
pub async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents: Vec<AgentSummary> = state
        .agents
        .get_all_agents()
        .into_iter()
        .map(|a| AgentSummary {
            agent_id: a.agent_id,
            name: a.name,
            skills: a.skills,
            capacity: a.capacity,
            current_load: a.current_load,
            status: a.status,
        })
        .collect();
    Json(agents)
}

/// `POST /agents/register`
pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAgentRequest>,
) -> impl IntoResponse {
    let agent_id = state.agents.register_agent(req.name, req.skills, req.capacity);
    Json(RegisterAgentResponse { agent_id })
}

/// `GET /agents/stats`
pub async fn agent_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.agents.stats())
}

/// `GET /agents/history`
pub async fn agent_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.routing.assignment_history())
}

/// `GET /preemption/history?limit=…`
pub async fn preemption_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreemptionHistoryQuery>,
) -> impl IntoResponse {
    Json(state.routing.preemption_history(query.limit.unwrap_or(50)))
}

/// `GET /circuit-breaker/stats`
pub async fn circuit_breaker_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.classifier_circuit.stats())
}

/// `POST /ml/circuit-breaker/toggle` — operator escape hatch: force Open or
/// reset to Closed, the mirror images `CircuitBreaker::force_open`/`reset`.
pub async fn toggle_circuit_breaker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToggleCircuitBreakerRequest>,
) -> impl IntoResponse {
    if req.open {
        state.classifier_circuit.force_open();
    } else {
        state.classifier_circuit.reset();
    }
    Json(ToggleCircuitBreakerResponse { state: state.classifier_circuit.state() })
}

/// `POST /ml/classify` — direct, circuit-gated classifier invocation,
/// mirroring the fallback logic in `WorkerPipeline::classify`.
pub async fn classify(State(state): State<Arc<AppState>>, Json(req): Json<ClassifyRequest>) -> impl IntoResponse {
    let result: Result<(Category, f64), CircuitError<CoreError>> =
        state.classifier_circuit.execute(|| state.primary_classifier.classify(&req.text));

    match result {
        Ok((category, urgency)) => Json(ClassifyResponse { category, urgency, model_used: "primary" }).into_response(),
        Err(_) => match state.fallback_classifier.classify(&req.text) {
            Ok((category, urgency)) => {
                Json(ClassifyResponse { category, urgency, model_used: "fallback" }).into_response()
            }
            Err(err) => error_response(ApiError::Internal, err.to_string()),
        },
    }
}

/// `GET /broker/stats`
pub async fn broker_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.broker.stats().await)
}
