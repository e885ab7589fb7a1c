/// HTTP API tests through the router.
///
/// Requests go through [`dispatch`] exactly as the server loop sends them,
/// minus the socket. LLM calls hit a canned backend, and the sustainability
/// tests read the sample dataset shipped in `public/data/`.
use anyhow::{Result, bail};
use serde_json::Value;
use tiny_http::Method;

use wastemeter::analytics::logger::EventLog;
use wastemeter::config::WastemeterConfig;
use wastemeter::config::schema::LlmEndpointConfig;
use wastemeter::llm::client::{ChatBackend, ChatMessage, Completion};
use wastemeter::web::{AppState, Reply, dispatch};

struct Scripted {
    reply: Option<String>,
}

impl ChatBackend for Scripted {
    fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        assert!(messages.len() >= 2, "system and user messages expected");
        match &self.reply {
            Some(content) => Ok(Completion {
                content: content.clone(),
                usage: Some(serde_json::json!({ "total_tokens": 42 })),
                model: "scripted-model".to_string(),
            }),
            None => bail!("connection refused"),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

fn state(reply: Option<&str>) -> AppState {
    let reply = reply.map(str::to_string);
    AppState::with_backends(
        WastemeterConfig::default(),
        EventLog::disabled(),
        Box::new(move |_: &LlmEndpointConfig, _: u64| -> Result<Box<dyn ChatBackend>> {
            Ok(Box::new(Scripted {
                reply: reply.clone(),
            }))
        }),
    )
}

fn send(state: &AppState, method: Method, url: &str, body: Option<&str>) -> Reply {
    dispatch(state, &method, url, body).unwrap()
}

fn json(reply: &Reply) -> Value {
    serde_json::from_str(reply.body_text()).unwrap()
}

// ---------------------------------------------------------------------------
// Records and metrics
// ---------------------------------------------------------------------------

#[test]
fn posted_records_show_up_in_metrics() {
    let state = state(None);
    for text in ["explain rust ownership", "explain rust ownership please"] {
        let reply = send(
            &state,
            Method::Post,
            "/api/records",
            Some(&format!(r#"{{"type":"prompt","text":"{text}"}}"#)),
        );
        assert_eq!(reply.status, 201);
    }

    let metrics = json(&send(&state, Method::Get, "/api/metrics", None));
    assert_eq!(metrics["metrics"]["totalPrompts"], 2);
    assert_eq!(metrics["redundancyAnalysis"]["redundantPrompts"], 1);
    assert_eq!(metrics["redundancyAnalysis"]["tier"], "waste");
}

#[test]
fn flat_metric_fields_are_measured() {
    let state = state(None);
    let reply = send(
        &state,
        Method::Post,
        "/api/records",
        Some(
            r#"{"kind":"interaction","text":"hello there","actualTokens":150,"expectedTokens":50,"latencyMs":900}"#,
        ),
    );
    assert_eq!(reply.status, 201);

    let snapshot = &json(&reply)["snapshot"];
    assert_eq!(snapshot["excessAnalysis"]["measuredOutputs"], 1);
    assert_eq!(snapshot["excessAnalysis"]["averageRatio"], 3.0);
    assert_eq!(snapshot["latencyAnalysis"]["totalInteractions"], 1);
}

#[test]
fn interacting_with_an_output_engages_it() {
    let state = state(None);
    let created = json(&send(
        &state,
        Method::Post,
        "/api/records",
        Some(r#"{"type":"output","text":"an answer"}"#),
    ));
    let id = created["id"].as_u64().unwrap();

    let reply = send(
        &state,
        Method::Post,
        "/api/records/interact",
        Some(&format!(r#"{{"id":{id}}}"#)),
    );
    assert_eq!(reply.status, 200);

    let missing = send(
        &state,
        Method::Post,
        "/api/records/interact",
        Some(r#"{"id":1}"#),
    );
    assert_eq!(missing.status, 404);
}

#[test]
fn empty_record_text_is_rejected() {
    let state = state(None);
    let reply = send(&state, Method::Post, "/api/records", Some(r#"{"text":"  "}"#));
    assert_eq!(reply.status, 400);
    let reply = send(&state, Method::Post, "/api/records", Some("not json"));
    assert_eq!(reply.status, 400);
}

#[test]
fn score_endpoint_matches_composite() {
    let state = state(None);
    let reply = send(
        &state,
        Method::Post,
        "/api/score",
        Some(r#"{"redundancyRate":0,"reuseRate":1,"refinementLoops":0,"excessRatio":1}"#),
    );
    let value = json(&reply);
    assert!((value["score"].as_f64().unwrap() - 0.9333).abs() < 1e-3);
    assert_eq!(value["level"], "High Efficiency");
}

// ---------------------------------------------------------------------------
// Sustainability dataset
// ---------------------------------------------------------------------------

#[test]
fn sustainability_rows_and_aggregates() {
    let state = state(None);
    let reply = send(&state, Method::Get, "/api/sustainability", None);
    assert_eq!(reply.status, 200);
    assert!(reply.cors);

    let value = json(&reply);
    assert_eq!(value["count"], 8);
    assert_eq!(value["rows"].as_array().unwrap().len(), 8);
    assert_eq!(value["rows"][7]["Company"], "Proseware, Inc.");
    assert_eq!(value["aggregates"]["aiQueries"], 8);
    assert_eq!(value["aggregates"]["co2Kg"], 5_671_800.0);
    assert_eq!(value["aggregates"]["adoptionAvg"], 61.0);
}

#[test]
fn sustainability_csv_passthrough() {
    let state = state(None);
    let reply = send(&state, Method::Get, "/api/sustainability?format=csv", None);
    assert_eq!(reply.status, 200);
    assert!(reply.cors);
    assert!(reply.body_text().starts_with("Company,AI Application Area"));
}

#[test]
fn sustainability_report_ranks_by_impact() {
    let state = state(None);
    let value = json(&send(&state, Method::Get, "/api/sustainability/report", None));
    let top = value["topInitiatives"].as_array().unwrap();
    assert_eq!(top[0]["area"], "Data Center Cooling");
    assert_eq!(top[1]["area"], "Smart Grids");
}

// ---------------------------------------------------------------------------
// LLM proxies
// ---------------------------------------------------------------------------

#[test]
fn analysis_returns_parsed_json() {
    let state = state(Some(r#"{"redundancy_score": 3, "optimized_prompt": "List Rust traits"}"#));
    let reply = send(
        &state,
        Method::Post,
        "/api/analysis",
        Some(r#"{"prompt":"Could you maybe list some Rust traits?","analysisType":"redundancy"}"#),
    );
    assert_eq!(reply.status, 200);
    assert_eq!(reply.model.as_deref(), Some("scripted-model"));

    let value = json(&reply);
    assert_eq!(value["success"], true);
    assert_eq!(value["analysis"]["redundancy_score"], 3);
    assert_eq!(value["usage"]["total_tokens"], 42);
}

#[test]
fn analysis_without_prompt_is_400() {
    let state = state(Some("{}"));
    let reply = send(&state, Method::Post, "/api/analysis", Some("{}"));
    assert_eq!(reply.status, 400);
    assert_eq!(json(&reply)["error"], "Prompt is required");
}

#[test]
fn chat_failure_is_500_with_details() {
    let state = state(None);
    let reply = send(
        &state,
        Method::Post,
        "/api/chat",
        Some(r#"{"message":"How much water do data centers use?"}"#),
    );
    assert_eq!(reply.status, 500);
    let value = json(&reply);
    assert_eq!(value["error"], "Failed to get AI response. Please try again.");
    assert!(value["details"].as_str().unwrap().contains("connection refused"));
}

#[test]
fn chat_success_trims_the_response() {
    let state = state(Some("  Roughly two liters per kWh.  "));
    let reply = send(
        &state,
        Method::Post,
        "/api/chat",
        Some(r#"{"message":"Water per kWh?","conversationHistory":[]}"#),
    );
    assert_eq!(reply.status, 200);
    assert_eq!(json(&reply)["response"], "Roughly two liters per kWh.");
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[test]
fn health_sees_the_sample_dataset() {
    let state = state(None);
    let value = json(&send(&state, Method::Get, "/api/health", None));
    assert_eq!(value["status"], "ok");
    assert_eq!(value["datasetAvailable"], true);
}
