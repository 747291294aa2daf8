use axum::{
    extract::{rejection::QueryRejection, Query},
    Json,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::time::Duration;

use super::AppError;

/// Upper bound on a single synthetic sleep.
pub const MAX_SLEEP_MS: i64 = 2_000;

#[derive(Debug, Deserialize)]
pub struct WorkParams {
    #[serde(default = "default_ms", deserialize_with = "saturating_ms")]
    pub ms: i64,
}

fn default_ms() -> i64 {
    50
}

/// Any integer is accepted; values past the `i64` range saturate, since
/// they are clamped to the sleep bounds anyway.
fn saturating_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_saturating(&raw)
        .ok_or_else(|| de::Error::custom(format!("ms: {raw:?} is not a valid integer")))
}

fn parse_saturating(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

#[derive(Debug, Serialize)]
pub struct WorkDone {
    pub slept_ms: i64,
}

// ─── GET /work?ms=N ──────────────────────────────────────────────
/// Simulates handler latency so it shows up in the duration histogram.
/// The sleep is a timer await; no lock is held while waiting.
pub async fn work(
    params: Result<Query<WorkParams>, QueryRejection>,
) -> Result<Json<WorkDone>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;

    let ms = clamp_sleep(params.ms);
    tokio::time::sleep(Duration::from_millis(ms as u64)).await;

    Ok(Json(WorkDone { slept_ms: ms }))
}

fn clamp_sleep(ms: i64) -> i64 {
    ms.clamp(0, MAX_SLEEP_MS)
}
