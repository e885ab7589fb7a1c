//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a [`Reply`]. The
//! server loop in the parent module turns replies into `tiny_http` responses
//! and records one request event per reply.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analytics::logger::EventLog;
use crate::config::{self, WastemeterConfig, schema::LlmEndpointConfig};
use crate::llm::client::{ChatBackend, ChatClient, ChatMessage, UpstreamStatus};
use crate::llm::{self, prompts::AnalysisType};
use crate::metrics::MetricsSnapshot;
use crate::metrics::score::{self, ScoreInputs};
use crate::monitor::{self, MonitorReport, MonitorRequest};
use crate::scheduler::{Scheduler, Subscription};
use crate::store::RecordStore;
use crate::store::record::{MetricFields, RecordKind, TimestampedRecord, now_millis};
use crate::sustainability::{self, Dataset};

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A finished response, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Attach the public CORS headers.
    pub cors: bool,
    /// Upstream model that served the request, for the event log.
    pub model: Option<String>,
}

pub(crate) const JSON: &str = "application/json; charset=utf-8";
pub(crate) const HTML: &str = "text/html; charset=utf-8";
const CSV: &str = "text/csv; charset=utf-8";

impl Reply {
    pub fn json<T: Serialize>(status: u16, data: &T) -> Result<Self> {
        let body = serde_json::to_vec(data).context("failed to serialize JSON response")?;
        Ok(Self {
            status,
            content_type: JSON,
            body,
            cors: false,
            model: None,
        })
    }

    pub fn ok<T: Serialize>(data: &T) -> Result<Self> {
        Self::json(200, data)
    }

    /// `{ "error": ..., "details": ... }` with the given status.
    pub fn error(status: u16, error: &str, details: Option<String>) -> Self {
        let value = match details {
            Some(details) => json!({ "error": error, "details": details }),
            None => json!({ "error": error }),
        };
        Self {
            status,
            content_type: JSON,
            body: value.to_string().into_bytes(),
            cors: false,
            model: None,
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: HTML,
            body: body.as_bytes().to_vec(),
            cors: false,
            model: None,
        }
    }

    fn with_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn body_text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Builds a chat backend for one configured endpoint.
pub type BackendFactory =
    dyn Fn(&LlmEndpointConfig, u64) -> Result<Box<dyn ChatBackend>> + Send + Sync;

/// Everything the handlers share: the record store, the live config, the
/// event log, and how to reach the LLM.
pub struct AppState {
    pub store: Arc<Mutex<RecordStore>>,
    config: Mutex<WastemeterConfig>,
    pub events: EventLog,
    backends: Box<BackendFactory>,
    started: Instant,
}

impl AppState {
    pub fn new(config: WastemeterConfig) -> Self {
        let events = EventLog::from_config(&config.logging);
        Self::with_backends(
            config,
            events,
            Box::new(
                |endpoint: &LlmEndpointConfig, timeout_ms: u64| -> Result<Box<dyn ChatBackend>> {
                    Ok(Box::new(ChatClient::from_endpoint(endpoint, timeout_ms)?))
                },
            ),
        )
    }

    pub fn with_backends(
        config: WastemeterConfig,
        events: EventLog,
        backends: Box<BackendFactory>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(RecordStore::new(config.general.window_ms))),
            config: Mutex::new(config),
            events,
            backends,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> Result<WastemeterConfig> {
        Ok(self.lock_config()?.clone())
    }

    fn lock_config(&self) -> Result<MutexGuard<'_, WastemeterConfig>> {
        self.config
            .lock()
            .map_err(|_| anyhow!("config lock poisoned"))
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, RecordStore>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("record store lock poisoned"))
    }

    /// Register the periodic window sweep with `scheduler`.
    pub fn subscribe_sweep(&self, scheduler: &Scheduler, interval_ms: u64) -> Subscription {
        let store = Arc::clone(&self.store);
        scheduler.subscribe(interval_ms, move |now| match store.lock() {
            Ok(mut store) => {
                let evicted = store.sweep(now);
                if evicted > 0 {
                    tracing::debug!(evicted, "window sweep");
                }
            }
            Err(_) => tracing::warn!("sweep: record store lock poisoned"),
        })
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewRecordRequest {
    #[serde(default, alias = "type")]
    kind: RecordKind,
    #[serde(alias = "content", alias = "prompt")]
    text: String,
    category: Option<String>,
    #[serde(flatten)]
    fields: MetricFields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRecordResponse {
    id: u64,
    snapshot: MetricsSnapshot,
}

#[derive(Deserialize)]
struct InteractRequest {
    id: u64,
}

#[derive(Serialize)]
struct MonitorResponse {
    #[serde(flatten)]
    report: MonitorReport,
    timestamp: String,
}

#[derive(Serialize)]
struct SustainabilityResponse<'a> {
    rows: &'a [sustainability::Row],
    count: usize,
    aggregates: sustainability::Aggregates,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest {
    #[serde(default)]
    prompt: String,
    analysis_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
}

/// Config API response: the full config as a JSON value + the raw TOML.
#[derive(Serialize)]
struct ConfigResponse {
    config: WastemeterConfig,
    toml_text: String,
}

/// Config update request: a list of key-value pairs.
#[derive(Deserialize)]
struct ConfigUpdateRequest {
    updates: Vec<ConfigKeyValue>,
    /// Also write the keys to `~/.wastemeter/config.toml`.
    #[serde(default)]
    persist: bool,
}

#[derive(Deserialize)]
struct ConfigKeyValue {
    key: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    window_ms: u64,
    prompts: usize,
    outputs: usize,
    interactions: usize,
    dataset_available: bool,
    analysis_model: String,
    analysis_key_set: bool,
    chat_model: String,
    chat_key_set: bool,
    config_exists: bool,
    event_log: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a JSON body, mapping failures to a 400 reply.
fn parse_body<'a, T: Deserialize<'a>>(body: &'a str) -> std::result::Result<T, Reply> {
    serde_json::from_str(body)
        .map_err(|e| Reply::error(400, "Invalid JSON body", Some(e.to_string())))
}

/// Parse the `?format=...` query parameter from a URL.
fn parse_format_param(url: &str) -> Option<String> {
    url.split('?').nth(1)?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == "format").then(|| v.to_ascii_lowercase())
    })
}

fn key_is_set(endpoint: &LlmEndpointConfig) -> bool {
    std::env::var(&endpoint.api_key_env).is_ok_and(|k| !k.trim().is_empty())
}

/// Map an LLM failure to a reply: upstream statuses pass through, anything
/// else is a 500 carrying `fallback` as the error text.
fn llm_error(err: &anyhow::Error, fallback: &str) -> Reply {
    match err.downcast_ref::<UpstreamStatus>() {
        Some(upstream) => Reply::error(upstream.status, &upstream.message, None),
        None => Reply::error(500, fallback, Some(format!("{err:#}"))),
    }
}

// ---------------------------------------------------------------------------
// Metrics and records
// ---------------------------------------------------------------------------

/// `GET /api/metrics`: live snapshot of every metric.
pub fn get_metrics(state: &AppState) -> Result<Reply> {
    let config = state.config()?;
    let snapshot = state.lock_store()?.snapshot(&config, now_millis());
    Reply::ok(&snapshot)
}

/// `POST /api/records`: append a record, stamped with the server clock.
pub fn post_record(state: &AppState, body: &str) -> Result<Reply> {
    let req: NewRecordRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    if req.text.trim().is_empty() {
        return Ok(Reply::error(400, "Record text is required", None));
    }

    let config = state.config()?;
    let now = now_millis();
    let mut record = TimestampedRecord::new(req.kind, req.text, now);
    if let Some(category) = req.category.filter(|c| !c.trim().is_empty()) {
        record = record.with_category(category);
    }
    record.metadata = req.fields.into_metadata();

    let mut store = state.lock_store()?;
    let id = store.insert(record, now);
    let snapshot = store.snapshot(&config, now);
    tracing::debug!(id, kind = %req.kind, "record appended");

    Reply::json(201, &NewRecordResponse { id, snapshot })
}

/// `POST /api/records/interact`: mark an output as interacted with.
pub fn post_interact(state: &AppState, body: &str) -> Result<Reply> {
    let req: InteractRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    match state.lock_store()?.mark_interacted(req.id) {
        Ok(()) => Reply::ok(&json!({ "success": true, "id": req.id })),
        Err(e) => Ok(Reply::error(404, &e.to_string(), None)),
    }
}

/// `POST /api/monitor`: heuristic waste score for one prompt.
pub fn post_monitor(body: &str) -> Result<Reply> {
    let req: MonitorRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    Reply::ok(&MonitorResponse {
        report: monitor::evaluate(&req),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /api/score`: composite score from caller-supplied sub-metrics.
pub fn post_score(body: &str) -> Result<Reply> {
    let inputs: ScoreInputs = match parse_body(body) {
        Ok(inputs) => inputs,
        Err(reply) => return Ok(reply),
    };
    Reply::ok(&score::composite(&inputs))
}

// ---------------------------------------------------------------------------
// Sustainability dataset
// ---------------------------------------------------------------------------

const DATASET_MISSING: &str = "Dataset not found. Place ai_sustainability_dataset.csv in public/data.";

/// `GET /api/sustainability[?format=csv]`: rows and coarse aggregates, or
/// the raw file. Every reply carries CORS headers.
pub fn get_sustainability(state: &AppState, url: &str) -> Result<Reply> {
    Ok(sustainability_reply(state, url).with_cors())
}

fn sustainability_reply(state: &AppState, url: &str) -> Reply {
    let path = match state.config() {
        Ok(config) => sustainability::resolve_path(&config.dataset.path),
        Err(e) => return Reply::error(500, "Failed to read dataset", Some(e.to_string())),
    };

    let loaded = match sustainability::load(&path) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => return Reply::error(404, DATASET_MISSING, None),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "dataset read failed");
            return Reply::error(500, "Failed to read dataset", Some(format!("{e:#}")));
        }
    };
    let (raw, dataset): (String, Dataset) = loaded;

    if parse_format_param(url).as_deref() == Some("csv") {
        return Reply {
            status: 200,
            content_type: CSV,
            body: raw.into_bytes(),
            cors: false,
            model: None,
        };
    }

    let response = SustainabilityResponse {
        rows: &dataset.rows,
        count: dataset.len(),
        aggregates: dataset.aggregates(),
    };
    Reply::ok(&response)
        .unwrap_or_else(|e| Reply::error(500, "Failed to read dataset", Some(e.to_string())))
}

/// `OPTIONS /api/sustainability`: CORS preflight.
pub fn options_sustainability() -> Reply {
    Reply {
        status: 204,
        content_type: JSON,
        body: Vec::new(),
        cors: true,
        model: None,
    }
}

/// `GET /api/sustainability/report`: extended aggregates and top initiatives.
pub fn get_sustainability_report(state: &AppState) -> Result<Reply> {
    let config = state.config()?;
    let path = sustainability::resolve_path(&config.dataset.path);
    match sustainability::load(&path) {
        Ok(Some((_, dataset))) => Reply::ok(&dataset.report(config.dataset.top_initiatives)),
        Ok(None) => Ok(Reply::error(404, DATASET_MISSING, None)),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "dataset read failed");
            Ok(Reply::error(500, "Failed to read dataset", Some(format!("{e:#}"))))
        }
    }
}

// ---------------------------------------------------------------------------
// LLM proxies
// ---------------------------------------------------------------------------

/// `POST /api/analysis`: prompt analysis through the analysis endpoint.
pub fn post_analysis(state: &AppState, body: &str) -> Result<Reply> {
    let req: AnalysisRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    if req.prompt.trim().is_empty() {
        return Ok(Reply::error(400, "Prompt is required", None));
    }

    let config = state.config()?;
    let analysis_type = AnalysisType::parse(req.analysis_type.as_deref());
    let result = (state.backends)(&config.llm.analysis, config.llm.timeout_ms)
        .and_then(|backend| llm::analyze_prompt(backend.as_ref(), &req.prompt, analysis_type));

    match result {
        Ok(result) => {
            tracing::info!(model = %result.model, latency_ms = result.latency_ms, %analysis_type, "analysis served");
            let model = result.model.clone();
            Ok(Reply::ok(&json!({
                "success": true,
                "analysis": result.analysis,
                "model": result.model,
                "usage": result.usage,
            }))?
            .with_model(model))
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "analysis failed");
            Ok(llm_error(&e, "Failed to analyze prompt").with_model(config.llm.analysis.model))
        }
    }
}

/// `POST /api/chat`: one turn with the sustainability assistant.
pub fn post_chat(state: &AppState, body: &str) -> Result<Reply> {
    let req: ChatRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    if req.message.trim().is_empty() {
        return Ok(Reply::error(400, "Message is required", None));
    }

    let config = state.config()?;
    let result = (state.backends)(&config.llm.chat, config.llm.timeout_ms).and_then(|backend| {
        llm::chat(backend.as_ref(), &req.message, req.conversation_history)
    });

    match result {
        Ok(result) => {
            tracing::info!(model = %result.model, latency_ms = result.latency_ms, "chat served");
            let model = result.model.clone();
            Ok(Reply::ok(&json!({
                "success": true,
                "response": result.response,
                "usage": result.usage,
            }))?
            .with_model(model))
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "chat failed");
            Ok(llm_error(&e, "Failed to get AI response. Please try again.")
                .with_model(config.llm.chat.model))
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration and health
// ---------------------------------------------------------------------------

/// `GET /api/config`: the configuration the server is running with.
pub fn get_config(state: &AppState) -> Result<Reply> {
    let cfg = state.config()?;
    let toml_text = toml::to_string_pretty(&cfg).unwrap_or_default();
    Reply::ok(&ConfigResponse {
        config: cfg,
        toml_text,
    })
}

/// `PUT /api/config`: update configuration keys in the running server.
///
/// Expects JSON body:
/// `{ "updates": [{ "key": "thresholds.reuse_similarity", "value": "0.75" }], "persist": false }`
pub fn put_config(state: &AppState, body: &str) -> Result<Reply> {
    let req: ConfigUpdateRequest = match parse_body(body) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };

    let mut errors: Vec<String> = Vec::new();
    let mut applied: Vec<String> = Vec::new();

    let window_ms = {
        let mut cfg = state.lock_config()?;
        for kv in &req.updates {
            let result = config::apply_update(&mut cfg, &kv.key, &kv.value).and_then(|()| {
                if req.persist {
                    config::set_config_value(&kv.key, &kv.value)
                } else {
                    Ok(())
                }
            });
            match result {
                Ok(()) => applied.push(format!("{} = {}", kv.key, kv.value)),
                Err(e) => errors.push(format!("{}: {e:#}", kv.key)),
            }
        }
        cfg.general.window_ms
    };
    state.lock_store()?.set_window_ms(window_ms);

    if !applied.is_empty() {
        tracing::info!(keys = applied.len(), persist = req.persist, "config updated");
    }

    Reply::ok(&json!({
        "applied": applied,
        "errors": errors,
        "success": errors.is_empty(),
    }))
}

/// `POST /api/config/reset`: reset the global config file and reload.
pub fn post_config_reset(state: &AppState) -> Result<Reply> {
    config::reset_config().context("failed to reset config")?;
    let fresh = config::load();
    let window_ms = fresh.general.window_ms;
    *state.lock_config()? = fresh;
    state.lock_store()?.set_window_ms(window_ms);

    Reply::ok(&json!({
        "success": true,
        "message": "Configuration reset to defaults",
    }))
}

/// `GET /api/health`: server and dependency summary.
pub fn get_health(state: &AppState) -> Result<Reply> {
    let cfg = state.config()?;
    let (prompts, outputs, interactions) = {
        let store = state.lock_store()?;
        (
            store.records(RecordKind::Prompt).len(),
            store.records(RecordKind::Output).len(),
            store.records(RecordKind::Interaction).len(),
        )
    };

    let resp = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        window_ms: cfg.general.window_ms,
        prompts,
        outputs,
        interactions,
        dataset_available: sustainability::resolve_path(&cfg.dataset.path).exists(),
        analysis_key_set: key_is_set(&cfg.llm.analysis),
        analysis_model: cfg.llm.analysis.model,
        chat_key_set: key_is_set(&cfg.llm.chat),
        chat_model: cfg.llm.chat.model,
        config_exists: config::global_config_file().is_some_and(|p| p.exists()),
        event_log: state.events.path().map(|p| p.display().to_string()),
    };

    Reply::ok(&resp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
