use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::AppState;

/// Probe and scrape paths are hit every few seconds by the orchestrator;
/// they are logged at debug so they don't drown the access log.
const QUIET_PATHS: &[&str] = &["/healthz", "/readyz", "/metrics"];

/// Outermost middleware: times every request and folds it into the
/// shared `MetricsRecorder`.
///
/// The observation guard is created before the handler runs and records on
/// drop, so the sample is taken even if the inner service panics or the
/// request future is dropped mid-flight. The response itself is passed
/// through untouched apart from two headers:
///
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
pub async fn record_metrics(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();

    let mut guard = state.metrics.observe(method.as_str(), path.as_str());
    let mut response = next.run(req).await;

    let status = response.status().as_u16();
    guard.set_status(status);
    let elapsed = guard.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // ── Access log ──────────────────────────────────────────────
    if QUIET_PATHS.contains(&path.as_str()) {
        tracing::debug!(%method, %path, status, elapsed_us = us as u64, "request");
    } else {
        tracing::info!(%method, %path, status, elapsed_us = us as u64, "request");
    }

    response
}
