// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the dispatch HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use dispatch_server::config::ServerConfig;
use dispatch_server::state::AppState;
use dispatch_server::transport::build_router;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        auth_token: None,
        high_urgency_threshold: 0.8,
        circuit_breaker_latency_ms: 500,
        similarity_threshold: 0.9,
        duplicate_time_window_minutes: 5,
        duplicate_count_threshold: 10,
        eta_base_seconds: 60,
        eta_min_seconds: 15,
        generalist_threshold: 0.5,
        preemption_urgency_threshold: 0.85,
        circuit_failure_threshold: 5,
        circuit_success_threshold: 2,
        circuit_reset_timeout_seconds: 30,
        circuit_latency_ring_capacity: 100,
        embedding_dimension: 256,
        log_format: "text".into(),
    }
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), CancellationToken::new()))
}

fn test_server(state: Arc<AppState>) -> TestServer {
    let router = build_router(state);
    TestServer::new(router).expect("failed to create test server")
}

#[tokio::test]
async fn health_reports_queue_size() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let resp = server.get("/health").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["queue_size"], 0);
    Ok(())
}

#[tokio::test]
async fn create_ticket_classifies_and_returns_eta() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let resp = server
        .post("/tickets")
        .json(&serde_json::json!({
            "subject": "Invoice issue",
            "description": "payment failed, please refund",
            "customer_id": "C1"
        }))
        .await;
    resp.assert_status(axum::http::StatusCode::OK);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["category"], "Billing");
    assert!(body["eta_seconds"].is_null() == body["assigned_agent"].is_null());
    Ok(())
}

#[tokio::test]
async fn create_ticket_rejects_empty_subject() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let resp = server
        .post("/tickets")
        .json(&serde_json::json!({"subject": "", "description": "x", "customer_id": "C1"}))
        .await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn routes_billing_and_technical_to_the_right_specialist() -> anyhow::Result<()> {
    let state = test_state();
    let server_for_setup = test_server(Arc::clone(&state));

    let register_a = server_for_setup
        .post("/agents/register")
        .json(&serde_json::json!({
            "name": "A",
            "skills": {"billing": 0.9, "technical": 0.3, "legal": 0.1},
            "capacity": 3
        }))
        .await;
    register_a.assert_status_ok();
    let agent_a: serde_json::Value = register_a.json();
    let agent_a_id = agent_a["agent_id"].as_str().unwrap().to_owned();

    let register_b = server_for_setup
        .post("/agents/register")
        .json(&serde_json::json!({
            "name": "B",
            "skills": {"billing": 0.2, "technical": 0.95, "legal": 0.1},
            "capacity": 3
        }))
        .await;
    register_b.assert_status_ok();
    let agent_b: serde_json::Value = register_b.json();
    let agent_b_id = agent_b["agent_id"].as_str().unwrap().to_owned();

    let billing_ticket = server_for_setup
        .post("/tickets")
        .json(&serde_json::json!({
            "subject": "Invoice overcharge",
            "description": "billing payment refund charge invoice",
            "customer_id": "C1"
        }))
        .await;
    billing_ticket.assert_status_ok();
    let billing_body: serde_json::Value = billing_ticket.json();
    assert_eq!(billing_body["assigned_agent"], agent_a_id);

    let technical_ticket = server_for_setup
        .post("/tickets")
        .json(&serde_json::json!({
            "subject": "API errors",
            "description": "server error api crash bug code system",
            "customer_id": "C2"
        }))
        .await;
    technical_ticket.assert_status_ok();
    let technical_body: serde_json::Value = technical_ticket.json();
    assert_eq!(technical_body["assigned_agent"], agent_b_id);
    Ok(())
}

#[tokio::test]
async fn get_ticket_roundtrips_through_listing() -> anyhow::Result<()> {
    let server = test_server(test_state());
    let create = server
        .post("/tickets")
        .json(&serde_json::json!({"subject": "General question", "description": "just checking in", "customer_id": "C1"}))
        .await;
    create.assert_status_ok();
    let created: serde_json::Value = create.json();
    let ticket_id = created["ticket_id"].as_str().unwrap().to_owned();

    let get = server.get(&format!("/tickets/{ticket_id}")).await;
    get.assert_status_ok();
    let fetched: serde_json::Value = get.json();
    assert_eq!(fetched["id"], ticket_id);

    let missing = server.get("/tickets/does-not-exist").await;
    missing.assert_status(axum::http::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn circuit_breaker_toggle_forces_open_then_resets() -> anyhow::Result<()> {
    let server = test_server(test_state());

    let open = server.post("/ml/circuit-breaker/toggle").json(&serde_json::json!({"open": true})).await;
    open.assert_status_ok();
    let open_body: serde_json::Value = open.json();
    assert_eq!(open_body["state"], "open");

    let stats = server.get("/circuit-breaker/stats").await;
    stats.assert_status_ok();
    let stats_body: serde_json::Value = stats.json();
    assert_eq!(stats_body["state"], "open");

    let reset = server.post("/ml/circuit-breaker/toggle").json(&serde_json::json!({"open": false})).await;
    reset.assert_status_ok();
    let reset_body: serde_json::Value = reset.json();
    assert_eq!(reset_body["state"], "closed");
    Ok(())
}

#[tokio::test]
async fn unauthorized_without_bearer_token_when_configured() -> anyhow::Result<()> {
    let mut config = test_config();
    config.auth_token = Some("secret".into());
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = test_server(state);

    let resp = server.get("/agents").await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);

    let health = server.get("/health").await;
    health.assert_status_ok();

    let authorized = server.get("/agents").add_header(axum::http::HeaderName::from_static("authorization"), axum::http::HeaderValue::from_static("Bearer secret")).await;
    authorized.assert_status_ok();
    Ok(())
}
