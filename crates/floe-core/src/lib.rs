//! floe-core: shared plumbing for the floe ingestion runner.
//!
//! - `config/` - YAML loading across files and directories, env interpolation, CLI paths
//! - `metrics/` - Prometheus metrics infrastructure and internal events
//! - `topology` - running several jobs under one shutdown token
//! - `signal` - signal handling for graceful shutdown
//! - `tracing` - subscriber initialisation
//! - `app` - application entry point that reduces main.rs to one call
//! - `error` - config, metrics and setup errors

pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod topology;
pub mod tracing;

// Re-export commonly used items
pub use crate::app::{AppConfig, Application};
pub use crate::config::{
    CliArgs, ComponentKey, ConfigPath, Mergeable, MetricsConfig, load_from_paths,
};
pub use crate::error::{ConfigError, MetricsError, SetupError};
pub use crate::metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use crate::signal::shutdown_signal;
pub use crate::topology::{Job, JobRunner, JobStatus, JobsReport, run_jobs};
pub use crate::tracing::init_tracing;
