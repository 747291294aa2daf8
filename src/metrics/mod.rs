pub mod collector;
pub mod exposition;

use std::time::Duration;

pub use collector::MetricsRecorder;

/// One finished request, folded into the aggregate and then discarded.
#[derive(Debug, Clone)]
pub struct Observation {
    pub method: String,
    /// Raw request path, e.g. "/work"
    pub path: String,
    pub status: u16,
    /// Wall-clock time from request start to handler exit
    pub duration: Duration,
}
