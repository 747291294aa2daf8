use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::Observation;

// ─── Configuration ───────────────────────────────────────────────

/// Upper bounds (seconds) of the exported latency buckets. These are the
/// stock Prometheus client buckets; `+Inf` is implied.
pub const LATENCY_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0,
    7.5, 10.0,
];

/// Status recorded when the handler never produced a response.
const FALLBACK_STATUS: u16 = 500;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe request metrics aggregate.
/// The middleware calls `observe()`, `/metrics` calls `snapshot()`.
pub struct MetricsRecorder {
    inner: Mutex<Inner>,
}

/// Identity of one `http_requests_total` series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestKey {
    pub method: String,
    pub path: String,
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct RequestCount {
    pub key: RequestKey,
    pub count: u64,
}

/// One `http_request_duration_seconds` series, already bucketed.
#[derive(Debug, Clone)]
pub struct LatencySeries {
    pub path: String,
    /// `(upper bound in seconds, cumulative count)` per `LATENCY_BUCKETS`
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum_secs: f64,
}

/// Point-in-time copy of the aggregate, taken under the lock and rendered
/// after it is released.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests: Vec<RequestCount>,
    pub latency: Vec<LatencySeries>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // BTreeMaps keep the exposition order stable between scrapes
    requests: BTreeMap<RequestKey, u64>,
    latency: BTreeMap<String, PathLatency>,
}

/// Exact cumulative counts: a sample lands in every bucket whose bound it
/// does not exceed.
struct PathLatency {
    buckets: [u64; LATENCY_BUCKETS.len()],
    count: u64,
    sum_secs: f64,
}

// ─── MetricsRecorder impl ────────────────────────────────────────

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Start timing a request. The returned guard records exactly one
    /// observation when it is dropped, whatever way the request ends.
    pub fn observe(
        &self,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> ObservationGuard<'_> {
        ObservationGuard {
            recorder: self,
            method: method.into(),
            path: path.into(),
            status: FALLBACK_STATUS,
            completed: false,
            start: Instant::now(),
        }
    }

    /// Fold a finished observation into the aggregate.
    pub fn record(&self, obs: Observation) {
        self.inner.lock().record(obs);
    }

    /// Current value of a single counter series.
    #[cfg(test)]
    pub fn request_count(&self, method: &str, path: &str, status: u16) -> u64 {
        let key = RequestKey {
            method: method.to_owned(),
            path: path.to_owned(),
            status,
        };
        self.inner.lock().requests.get(&key).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── ObservationGuard ────────────────────────────────────────────

/// Scoped timer for one request.
///
/// Recording happens in `Drop`, so a handler that panics or a request
/// future that is cancelled still yields one sample, counted with status
/// 500 unless `set_status` was reached first.
pub struct ObservationGuard<'a> {
    recorder: &'a MetricsRecorder,
    method: String,
    path: String,
    status: u16,
    completed: bool,
    start: Instant,
}

impl ObservationGuard<'_> {
    /// Record the handler's outcome.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
        self.completed = true;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ObservationGuard<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();

        if !self.completed {
            tracing::warn!(
                method = %self.method,
                path = %self.path,
                elapsed_us = duration.as_micros() as u64,
                "request ended without a response"
            );
        }

        self.recorder.record(Observation {
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            status: self.status,
            duration,
        });
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            latency: BTreeMap::new(),
        }
    }

    fn record(&mut self, obs: Observation) {
        self.latency
            .entry(obs.path.clone())
            .or_insert_with(PathLatency::new)
            .observe(obs.duration);

        let key = RequestKey {
            method: obs.method,
            path: obs.path,
            status: obs.status,
        };
        *self.requests.entry(key).or_insert(0) += 1;
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let requests = self
            .requests
            .iter()
            .map(|(key, &count)| RequestCount {
                key: key.clone(),
                count,
            })
            .collect();

        let latency = self
            .latency
            .iter()
            .map(|(path, series)| series.to_series(path))
            .collect();

        MetricsSnapshot { requests, latency }
    }
}

impl PathLatency {
    fn new() -> Self {
        Self {
            buckets: [0; LATENCY_BUCKETS.len()],
            count: 0,
            sum_secs: 0.0,
        }
    }

    fn observe(&mut self, duration: Duration) {
        // Compare in nanoseconds so a sample a hair over a bound stays out
        let nanos = duration.as_nanos();
        for (i, &le) in LATENCY_BUCKETS.iter().enumerate() {
            if nanos <= bound_nanos(le) {
                self.buckets[i] += 1;
            }
        }
        self.count += 1;
        self.sum_secs += duration.as_secs_f64();
    }

    fn to_series(&self, path: &str) -> LatencySeries {
        LatencySeries {
            path: path.to_owned(),
            buckets: LATENCY_BUCKETS.iter().copied().zip(self.buckets).collect(),
            count: self.count,
            sum_secs: self.sum_secs,
        }
    }
}

fn bound_nanos(le: f64) -> u128 {
    (le * 1_000_000_000.0).round() as u128
}
