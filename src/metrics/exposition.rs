use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::fmt::Write;
use std::sync::Arc;

use super::collector::MetricsSnapshot;
use crate::AppState;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const REQUESTS_NAME: &str = "http_requests_total";
const REQUESTS_HELP: &str = "Total HTTP requests";
const LATENCY_NAME: &str = "http_request_duration_seconds";
const LATENCY_HELP: &str = "Request latency";

// ─── GET /metrics ────────────────────────────────────────────────
/// Prometheus scrape target. The lock is held only while the snapshot is
/// copied; formatting happens afterwards.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = render(&state.metrics.snapshot());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// Render a snapshot in the Prometheus text exposition format.
pub fn render(snap: &MetricsSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# HELP {REQUESTS_NAME} {REQUESTS_HELP}");
    let _ = writeln!(out, "# TYPE {REQUESTS_NAME} counter");
    for r in &snap.requests {
        let _ = writeln!(
            out,
            "{REQUESTS_NAME}{{method=\"{}\",path=\"{}\",status=\"{}\"}} {}",
            escape_label(&r.key.method),
            escape_label(&r.key.path),
            r.key.status,
            r.count,
        );
    }

    let _ = writeln!(out, "# HELP {LATENCY_NAME} {LATENCY_HELP}");
    let _ = writeln!(out, "# TYPE {LATENCY_NAME} histogram");
    for s in &snap.latency {
        let path = escape_label(&s.path);
        for (le, count) in &s.buckets {
            let _ = writeln!(
                out,
                "{LATENCY_NAME}_bucket{{le=\"{}\",path=\"{path}\"}} {count}",
                format_float(*le),
            );
        }
        let _ = writeln!(
            out,
            "{LATENCY_NAME}_bucket{{le=\"+Inf\",path=\"{path}\"}} {}",
            s.count
        );
        let _ = writeln!(out, "{LATENCY_NAME}_count{{path=\"{path}\"}} {}", s.count);
        let _ = writeln!(
            out,
            "{LATENCY_NAME}_sum{{path=\"{path}\"}} {}",
            format_float(s.sum_secs)
        );
    }

    out
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Whole numbers keep a trailing `.0` so bucket bounds read `1.0`, not `1`.
fn format_float(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}
