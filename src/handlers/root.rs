use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub app: String,
    pub env: String,
    pub message: String,
    pub uptime_seconds: f64,
}

// ─── GET / ───────────────────────────────────────────────────────

pub async fn index(State(state): State<Arc<AppState>>) -> Json<Welcome> {
    let uptime = state.started_at.elapsed().as_secs_f64();
    Json(Welcome {
        app: state.config.app_name.clone(),
        env: state.config.environment.clone(),
        message: state.config.welcome_message.clone(),
        uptime_seconds: round_2dp(uptime),
    })
}

fn round_2dp(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_2dp;

    #[test]
    fn uptime_has_two_decimals() {
        assert_eq!(round_2dp(0.0), 0.0);
        assert_eq!(round_2dp(1.234), 1.23);
        assert_eq!(round_2dp(1.235_1), 1.24);
        assert_eq!(round_2dp(3600.999), 3601.0);
    }
}
