use axum::{
    handler::Handler,
    middleware as axum_mw,
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

use crate::handlers;
use crate::metrics::exposition;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        // ── Probes ──────────────────────────────────────────────
        .route("/healthz", get_only(handlers::probes::healthz))
        .route("/readyz", get_only(handlers::probes::readyz))
        // ── Demo endpoints ──────────────────────────────────────
        .route("/", get_only(handlers::root::index))
        .route("/work", get_only(handlers::work::work))
        // ── Metrics ─────────────────────────────────────────────
        .route("/metrics", get_only(exposition::get_metrics));

    instrument(routes, state)
}

/// `GET` route whose other methods answer with the JSON 405 instead of
/// axum's empty-bodied default.
fn get_only<H, T>(handler: H) -> MethodRouter<Arc<AppState>>
where
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    get(handler).fallback(handlers::method_not_allowed)
}

/// Attach the fallback, shared state and global middleware.
///
/// Layers apply bottom-up: the metrics recorder is outermost so it sees the
/// 500 that `CatchPanicLayer` produces for a panicking handler.
fn instrument(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    routes
        .fallback(handlers::not_found)
        .with_state(state.clone())
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(axum_mw::from_fn_with_state(state, timing::record_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state_with_fail_rate(fail_rate: f64) -> Arc<AppState> {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.app_name = "probe-test".into();
        config.environment = "ci".into();
        config.fail_rate = fail_rate;
        Arc::new(AppState::new(config))
    }

    async fn get_path(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = get_path(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn healthz_ignores_fail_rate() {
        let state = state_with_fail_rate(1.0);
        let app = create_router(state.clone());

        let (status, body) = get_json(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["app"], "probe-test");
        assert_eq!(body["env"], "ci");
    }

    #[tokio::test]
    async fn readyz_reports_ready_without_failures() {
        let app = create_router(state_with_fail_rate(0.0));

        let (status, body) = get_json(&app, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["app"], "probe-test");
        assert_eq!(body["env"], "ci");
    }

    #[tokio::test]
    async fn readyz_injects_failure_at_full_rate() {
        let state = state_with_fail_rate(1.0);
        let app = create_router(state.clone());

        let (status, body) = get_json(&app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "detail": "Injected failure" }));
        assert_eq!(state.metrics.request_count("GET", "/readyz", 503), 1);
    }

    #[tokio::test]
    async fn root_reports_uptime_and_message() {
        let app = create_router(state_with_fail_rate(0.0));

        let (status, body) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["app"], "probe-test");
        assert_eq!(body["env"], "ci");
        assert_eq!(body["message"], "Hello from Kubernetes!");
        let uptime = body["uptime_seconds"].as_f64().unwrap();
        assert!(uptime >= 0.0);
        assert_eq!((uptime * 100.0).round() / 100.0, uptime);
    }

    #[tokio::test(start_paused = true)]
    async fn work_clamps_long_sleeps() {
        let app = create_router(state_with_fail_rate(0.0));

        let started = tokio::time::Instant::now();
        let (status, body) = get_json(&app, "/work?ms=5000").await;
        let slept = started.elapsed();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slept_ms"], 2000);
        assert!(slept >= std::time::Duration::from_millis(2000));
        assert!(slept < std::time::Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn work_treats_negative_as_zero() {
        let app = create_router(state_with_fail_rate(0.0));

        let started = tokio::time::Instant::now();
        let (status, body) = get_json(&app, "/work?ms=-10").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slept_ms"], 0);
        assert!(started.elapsed() < std::time::Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn work_defaults_to_fifty_ms() {
        let app = create_router(state_with_fail_rate(0.0));

        let (status, body) = get_json(&app, "/work").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slept_ms"], 50);
    }

    #[tokio::test]
    async fn work_rejects_non_numeric_ms() {
        let state = state_with_fail_rate(0.0);
        let app = create_router(state.clone());

        let (status, body) = get_json(&app, "/work?ms=lots").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!body["detail"].as_str().unwrap().is_empty());
        assert_eq!(state.metrics.request_count("GET", "/work", 422), 1);
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_counted() {
        let state = state_with_fail_rate(0.0);
        let app = create_router(state.clone());

        let (status, body) = get_json(&app, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not Found");
        assert_eq!(state.metrics.request_count("GET", "/nope", 404), 1);
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_detail() {
        let state = state_with_fail_rate(0.0);
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "detail": "Method Not Allowed" }));
        assert_eq!(state.metrics.request_count("POST", "/healthz", 405), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn work_saturates_out_of_range_integers() {
        let app = create_router(state_with_fail_rate(0.0));

        let (status, body) = get_json(&app, "/work?ms=99999999999999999999").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slept_ms"], 2000);

        let (status, body) = get_json(&app, "/work?ms=-99999999999999999999").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slept_ms"], 0);
    }

    #[tokio::test]
    async fn every_request_is_counted_once() {
        let state = state_with_fail_rate(0.5);
        let app = create_router(state.clone());

        for _ in 0..7 {
            get_path(&app, "/healthz").await;
        }
        for _ in 0..5 {
            get_path(&app, "/readyz").await;
        }

        assert_eq!(state.metrics.request_count("GET", "/healthz", 200), 7);
        // Either outcome depending on the wall clock, but never lost
        let ready = state.metrics.request_count("GET", "/readyz", 200)
            + state.metrics.request_count("GET", "/readyz", 503);
        assert_eq!(ready, 5);

        let snap = state.metrics.snapshot();
        let readyz = snap.latency.iter().find(|s| s.path == "/readyz").unwrap();
        assert_eq!(readyz.count, 5);
    }

    #[tokio::test]
    async fn responses_carry_timing_headers() {
        let app = create_router(state_with_fail_rate(0.0));

        let (_, headers, _) = get_path(&app, "/healthz").await;
        assert!(headers.contains_key("x-response-time-us"));
        let timing = headers.get("server-timing").unwrap().to_str().unwrap();
        assert!(timing.starts_with("total;dur="));
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_recorded_requests() {
        let app = create_router(state_with_fail_rate(0.0));

        get_path(&app, "/healthz").await;
        get_path(&app, "/healthz").await;

        let (status, headers, body) = get_path(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get("content-type").unwrap(),
            exposition::CONTENT_TYPE
        );

        let text = String::from_utf8(body).unwrap();
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/healthz\",status=\"200\"} 2\n"
        ));
        assert!(text.contains("http_request_duration_seconds_count{path=\"/healthz\"} 2\n"));
        // The scrape itself is recorded after its body is rendered
        assert!(!text.contains("path=\"/metrics\""));
    }

    #[tokio::test]
    async fn panicking_handler_is_counted_as_500() {
        let state = state_with_fail_rate(0.0);
        async fn boom() -> &'static str {
            panic!("handler fault")
        }

        let routes = Router::new().route("/boom", get(boom));
        let app = instrument(routes, state.clone());

        let (status, body) = get_json(&app, "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal Server Error");
        assert_eq!(state.metrics.request_count("GET", "/boom", 500), 1);
    }
}
