use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct ProbeStatus {
    pub status: &'static str,
    pub app: String,
    pub env: String,
}

impl ProbeStatus {
    fn new(status: &'static str, state: &AppState) -> Self {
        Self {
            status,
            app: state.config.app_name.clone(),
            env: state.config.environment.clone(),
        }
    }
}

// ─── GET /healthz ────────────────────────────────────────────────
/// Liveness: the process is up. Never consults the failure policy.
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<ProbeStatus> {
    Json(ProbeStatus::new("ok", &state))
}

// ─── GET /readyz ─────────────────────────────────────────────────
/// Readiness: 503 for the failing part of each `FAIL_RATE` duty cycle.
pub async fn readyz(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProbeStatus>, AppError> {
    if state.policy.should_fail_now() {
        tracing::info!(fail_rate = state.policy.ratio(), "readiness failure injected");
        return Err(AppError::InjectedFailure);
    }
    Ok(Json(ProbeStatus::new("ready", &state)))
}
