// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `dispatch-server` binary and
//! drive it through the core ticket-routing flows over HTTP.

use std::time::Duration;

use dispatch_specs::DispatchProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn scenario_1_billing_ticket_is_classified_and_listed() -> anyhow::Result<()> {
    let server = DispatchProcess::spawn(&[])?;
    server.wait_ready(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/tickets", server.base_url()))
        .json(&serde_json::json!({
            "subject": "Invoice issue",
            "description": "payment failed",
            "customer_id": "C1"
        }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(created["category"], "Billing");
    let urgency = created["urgency"].as_f64().expect("urgency is a number");
    assert!((0.0..=1.0).contains(&urgency));

    let ticket_id = created["ticket_id"].as_str().expect("ticket_id");
    let listing: Vec<serde_json::Value> =
        client.get(format!("{}/tickets", server.base_url())).send().await?.json().await?;
    let listed = listing.iter().find(|t| t["id"] == ticket_id).expect("ticket appears in listing");
    assert!(matches!(listed["status"].as_str(), Some("queued") | Some("assigned")));
    Ok(())
}

#[tokio::test]
async fn scenario_2_routes_by_skill_specialty() -> anyhow::Result<()> {
    let server = DispatchProcess::spawn(&[])?;
    server.wait_ready(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let agent_a: serde_json::Value = client
        .post(format!("{}/agents/register", server.base_url()))
        .json(&serde_json::json!({"name": "A", "skills": {"billing": 0.9, "technical": 0.3, "legal": 0.1}, "capacity": 3}))
        .send()
        .await?
        .json()
        .await?;
    let agent_b: serde_json::Value = client
        .post(format!("{}/agents/register", server.base_url()))
        .json(&serde_json::json!({"name": "B", "skills": {"technical": 0.95, "billing": 0.2, "legal": 0.1}, "capacity": 3}))
        .send()
        .await?
        .json()
        .await?;

    let billing: serde_json::Value = client
        .post(format!("{}/tickets", server.base_url()))
        .json(&serde_json::json!({"subject": "Invoice refund", "description": "billing payment charge invoice refund", "customer_id": "C1"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(billing["assigned_agent"], agent_a["agent_id"]);

    let technical: serde_json::Value = client
        .post(format!("{}/tickets", server.base_url()))
        .json(&serde_json::json!({"subject": "API down", "description": "server crash api error system code", "customer_id": "C2"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(technical["assigned_agent"], agent_b["agent_id"]);
    Ok(())
}

#[tokio::test]
async fn scenario_3_and_4_preemption_then_auto_resume() -> anyhow::Result<()> {
    let server = DispatchProcess::spawn(&["--preemption-urgency-threshold", "0.85", "--eta-base-seconds", "1"])?;
    server.wait_ready(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let agent: serde_json::Value = client
        .post(format!("{}/agents/register", server.base_url()))
        .json(&serde_json::json!({"name": "Only", "skills": {"billing": 0.9, "technical": 0.9, "legal": 0.9}, "capacity": 1}))
        .send()
        .await?
        .json()
        .await?;
    let agent_id = agent["agent_id"].as_str().expect("agent_id").to_owned();

    let low: serde_json::Value = client
        .post(format!("{}/tickets", server.base_url()))
        .json(&serde_json::json!({"subject": "Low priority billing", "description": "no rush whenever you can invoice", "customer_id": "C1"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(low["assigned_agent"], agent_id);
    let low_ticket_id = low["ticket_id"].as_str().expect("ticket_id").to_owned();

    let urgent: serde_json::Value = client
        .post(format!("{}/tickets", server.base_url()))
        .json(&serde_json::json!({
            "subject": "URGENT critical emergency",
            "description": "the billing system is down completely blocked catastrophic invoice failure",
            "customer_id": "C2"
        }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(urgent["assigned_agent"], agent_id);
    assert_eq!(urgent["preempted_ticket"], low_ticket_id);
    let urgent_ticket_id = urgent["ticket_id"].as_str().expect("ticket_id").to_owned();

    let preemptions: Vec<serde_json::Value> =
        client.get(format!("{}/preemption/history", server.base_url())).send().await?.json().await?;
    let record = preemptions.iter().find(|p| p["paused_ticket_id"] == low_ticket_id).expect("preemption recorded");
    assert_eq!(record["urgent_ticket_id"], urgent_ticket_id);

    let completed: serde_json::Value = client
        .post(format!("{}/tickets/{urgent_ticket_id}/complete", server.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(completed["completed"], true);
    Ok(())
}

#[tokio::test]
async fn scenario_5_ten_duplicate_tickets_escalate_to_a_master_incident() -> anyhow::Result<()> {
    let server = DispatchProcess::spawn(&["--duplicate-count-threshold", "10", "--duplicate-time-window-minutes", "5"])?;
    server.wait_ready(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let mut last = serde_json::Value::Null;
    for i in 0..10 {
        last = client
            .post(format!("{}/tickets", server.base_url()))
            .json(&serde_json::json!({
                "subject": "Login page down",
                "description": "error 500 on login",
                "customer_id": format!("C{i}")
            }))
            .send()
            .await?
            .json()
            .await?;
    }

    assert_eq!(last["is_master_incident"], true);
    assert!(last["master_incident_id"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn scenario_6_classifier_circuit_breaker_trips_and_recovers() -> anyhow::Result<()> {
    let server = DispatchProcess::spawn(&["--circuit-breaker-latency-ms", "500", "--circuit-reset-timeout-seconds", "1"])?;
    server.wait_ready(TIMEOUT).await?;
    let client = reqwest::Client::new();

    client.post(format!("{}/ml/circuit-breaker/toggle", server.base_url())).json(&serde_json::json!({"open": true})).send().await?;

    let stats: serde_json::Value =
        client.get(format!("{}/circuit-breaker/stats", server.base_url())).send().await?.json().await?;
    assert_eq!(stats["state"], "open");

    let classified: serde_json::Value = client
        .post(format!("{}/ml/classify", server.base_url()))
        .json(&serde_json::json!({"text": "server down error crash"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(classified["model_used"], "fallback");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let after_reset: serde_json::Value =
        client.get(format!("{}/circuit-breaker/stats", server.base_url())).send().await?.json().await?;
    assert_eq!(after_reset["state"], "half_open");
    Ok(())
}
