use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

mod config;
mod handlers;
mod metrics;
mod middleware;
mod policy;
mod server;

use config::Config;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Immutable settings read from the environment at startup.
    pub config: Config,

    /// Readiness failure injection, built from `FAIL_RATE`.
    pub policy: policy::FailurePolicy,

    /// Request counters and latency histograms — the middleware writes,
    /// `/metrics` reads.
    pub metrics: Arc<metrics::MetricsRecorder>,

    /// Anchor for `uptime_seconds`.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            policy: policy::FailurePolicy::new(config.fail_rate),
            config,
            metrics: Arc::new(metrics::MetricsRecorder::new()),
            started_at: Instant::now(),
        }
    }
}

#[tokio::main]
async fn main() {
    // ── 1. Configuration ─────────────────────────────────────────
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging isn't up yet; LOG_LEVEL may be the thing that failed
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // ── 2. Logging ───────────────────────────────────────────────
    // RUST_LOG wins when set, LOG_LEVEL otherwise
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::default().add_directive(LevelFilter::from_level(config.log_level).into())
        });
    fmt().with_env_filter(filter).init();

    if config.fail_rate_out_of_range() {
        tracing::warn!(
            fail_rate = config.fail_rate,
            "FAIL_RATE outside 0.0-1.0; readiness treats it as clamped"
        );
    }

    // ── 3. Build shared state + router ───────────────────────────
    let listen = config.listen;
    tracing::info!(
        app = %config.app_name,
        env = %config.environment,
        fail_rate = config.fail_rate,
        %listen,
        "starting"
    );

    let state = Arc::new(AppState::new(config));
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%listen, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }

    tracing::info!("shutdown complete");
}

/// Resolves on Ctrl-C or SIGTERM (what the kubelet sends on pod deletion).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
