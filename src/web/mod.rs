//! Embedded web dashboard for wastemeter.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page efficiency dashboard
//! - JSON API endpoints for metrics, records, the sustainability dataset,
//!   the LLM proxies, and config management
//!
//! Launched via `wastemeter serve` (default: `http://127.0.0.1:9747`).

pub mod api;
mod frontend;

use std::io::Cursor;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::analytics::events::RequestEvent;
use crate::config::WastemeterConfig;
use crate::demo::DemoFeed;
use crate::scheduler::Scheduler;

pub use api::{AppState, Reply};

/// How often the scheduler driver wakes up.
const DRIVER_RESOLUTION: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the dashboard server with the given configuration.
///
/// Blocks the current thread. Requests are handled sequentially (sufficient
/// for a local single-user dashboard); periodic work (window sweep, demo
/// feed) runs on the scheduler's driver thread. Errors are handled
/// per-request without stopping the server.
pub fn serve(config: WastemeterConfig) -> Result<()> {
    let addr = config.web.addr.clone();
    let server = Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let scheduler = Scheduler::new();
    let state = AppState::new(config.clone());

    let _sweep = state.subscribe_sweep(&scheduler, config.general.sweep_interval_ms);
    let _demo = config.demo.enabled.then(|| {
        DemoFeed::new(config.demo.interaction_chance).subscribe(
            &scheduler,
            state.store.clone(),
            &config.demo,
        )
    });
    let _driver = scheduler.spawn_driver(DRIVER_RESOLUTION)?;

    println!("wastemeter dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");
    tracing::info!(%addr, demo = config.demo.enabled, window_ms = config.general.window_ms, "server started");

    if config.web.open_browser
        && let Err(e) = open_browser(&format!("http://{addr}"))
    {
        tracing::debug!(error = %e, "could not open browser");
    }

    for mut request in server.incoming_requests() {
        let started = Instant::now();
        let method = request.method().clone();
        let url = request.url().to_string();

        // Read body up-front for methods that carry one
        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            Some(buf)
        } else {
            None
        };

        let reply = dispatch(&state, &method, &url, body.as_deref()).unwrap_or_else(|e| {
            tracing::error!(%method, %url, error = %format!("{e:#}"), "handler failed");
            Reply::error(500, "Internal server error", Some(format!("{e:#}")))
        });

        let status = reply.status;
        let model = reply.model.clone();
        if let Err(e) = request.respond(into_response(reply)) {
            tracing::debug!(error = %e, "client went away before the response was sent");
        }

        let elapsed = started.elapsed();
        let path = url.split('?').next().unwrap_or(&url);
        tracing::info!(%method, path, status, duration_ms = elapsed.as_millis() as u64, "request");
        state
            .events
            .record(&RequestEvent::new(method.as_str(), path, status, elapsed).with_model(model));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Every routed path, for telling 405 from 404.
const KNOWN_PATHS: &[&str] = &[
    "/",
    "/index.html",
    "/api/metrics",
    "/api/records",
    "/api/records/interact",
    "/api/monitor",
    "/api/score",
    "/api/sustainability",
    "/api/sustainability/report",
    "/api/analysis",
    "/api/chat",
    "/api/config",
    "/api/config/reset",
    "/api/health",
];

/// Dispatch an incoming request to the appropriate handler.
pub fn dispatch(state: &AppState, method: &Method, url: &str, body: Option<&str>) -> Result<Reply> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);
    let body = body.unwrap_or("{}");

    match (method, path) {
        // Frontend
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(Reply::html(frontend::INDEX_HTML)),

        // API: Metrics and records
        (&Method::Get, "/api/metrics") => api::get_metrics(state),
        (&Method::Post, "/api/records") => api::post_record(state, body),
        (&Method::Post, "/api/records/interact") => api::post_interact(state, body),
        (&Method::Post, "/api/monitor") => api::post_monitor(body),
        (&Method::Post, "/api/score") => api::post_score(body),

        // API: Sustainability dataset
        (&Method::Get, "/api/sustainability") => api::get_sustainability(state, url),
        (&Method::Options, "/api/sustainability") => Ok(api::options_sustainability()),
        (&Method::Get, "/api/sustainability/report") => api::get_sustainability_report(state),

        // API: LLM proxies
        (&Method::Post, "/api/analysis") => api::post_analysis(state, body),
        (&Method::Post, "/api/chat") => api::post_chat(state, body),

        // API: Configuration
        (&Method::Get, "/api/config") => api::get_config(state),
        (&Method::Put, "/api/config") => api::put_config(state, body),
        (&Method::Post, "/api/config/reset") => api::post_config_reset(state),

        // API: Health
        (&Method::Get, "/api/health") => api::get_health(state),

        (_, path) if KNOWN_PATHS.contains(&path) => Ok(method_not_allowed(path)),

        // 404
        _ => Ok(Reply::error(404, "not found", None)),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// 405 response. The sustainability endpoint keeps its CORS headers.
fn method_not_allowed(path: &str) -> Reply {
    let mut reply = Reply::error(405, "Method not allowed", None);
    reply.cors = path == "/api/sustainability";
    reply
}

fn into_response(reply: Reply) -> Response<Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    if let Some(header) = header("Content-Type", reply.content_type) {
        response.add_header(header);
    }
    if reply.cors {
        for (name, value) in [
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET,OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type"),
        ] {
            if let Some(header) = header(name, value) {
                response.add_header(header);
            }
        }
    }
    response
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
