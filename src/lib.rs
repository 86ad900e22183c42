pub mod cache;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod export;
pub mod metrics;
pub mod models;
pub mod query_store;
pub mod report;

pub use crate::config::AppConfig;
pub use crate::dashboard::{Dashboard, DashboardView, QueryRun};
pub use crate::errors::{AppError, AppResult};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// JSON logs to a daily rolling file under `log_dir`, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "ride-insights.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

/// Message shown to the user in place of a failed action.
pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
