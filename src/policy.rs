use chrono::Utc;

/// Length of one failure duty cycle, in seconds.
const WINDOW_SECS: i64 = 10;

/// Deterministic failure injection for the readiness probe.
///
/// Within every 10-second window the first `floor(10 × ratio)` seconds
/// report failure and the rest report healthy. No randomness is involved,
/// so an operator can predict exactly when `/readyz` will flap.
#[derive(Debug, Clone, Copy)]
pub struct FailurePolicy {
    ratio: f64,
}

impl FailurePolicy {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Decide for an explicit point in time (whole seconds since the epoch).
    pub fn should_fail_at(&self, now: i64) -> bool {
        should_fail(now, self.ratio)
    }

    /// Decide against the wall clock.
    pub fn should_fail_now(&self) -> bool {
        self.should_fail_at(Utc::now().timestamp())
    }
}

/// `true` iff `now mod 10 < floor(10 × ratio)`.
///
/// Ratios at or below zero (and NaN) never fail. Ratios above one are
/// treated as one.
pub fn should_fail(now: i64, ratio: f64) -> bool {
    if ratio.is_nan() || ratio <= 0.0 {
        return false;
    }
    let failing_secs = (WINDOW_SECS as f64 * ratio.min(1.0)).floor() as i64;
    now.rem_euclid(WINDOW_SECS) < failing_secs
}
