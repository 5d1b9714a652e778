//! Application entry point shared by floe binaries.
//!
//! Reduces `main.rs` to `Application::<Config>::run()`: tracing, CLI parsing,
//! config loading, job execution and the exit code.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{CliArgs, ConfigPath, Mergeable};
use crate::error::ConfigError;
use crate::topology::{Job, run_jobs};
use crate::tracing::init_tracing;

/// Configurations that can be loaded from paths and turned into jobs.
pub trait AppConfig: Mergeable + Sized {
    /// The job type this config produces.
    type Job: Job;

    /// Human-readable name for components in logs (e.g., "job").
    const COMPONENT_NAME: &'static str;

    /// Load config from paths with validation.
    fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError>;

    /// Create jobs from this config. All jobs share `shutdown`.
    fn create_jobs(&self, shutdown: CancellationToken) -> Vec<Self::Job>;

    /// Log what is about to run.
    fn log_startup_info(&self);
}

/// Application runner that handles the full startup lifecycle.
pub struct Application<C: AppConfig> {
    config: C,
}

impl<C: AppConfig> Application<C> {
    /// Parse args, load config, run every job, and map the result to an exit code.
    pub fn run() -> ExitCode {
        init_tracing();

        let args = CliArgs::parse();
        let paths = args.config_paths();

        if paths.is_empty() {
            eprintln!("Error: no config files or directories specified");
            return ExitCode::FAILURE;
        }

        info!("Loading config from {} source(s)", paths.len());

        match Self::from_paths(&paths) {
            Ok(app) => app.execute(),
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                ExitCode::FAILURE
            }
        }
    }

    /// Load config from paths (useful for testing).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config = C::from_paths(paths)?;
        Ok(Self { config })
    }

    /// Access the loaded configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    fn execute(self) -> ExitCode {
        self.config.log_startup_info();

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                eprintln!("Failed to start async runtime: {e}");
                return ExitCode::FAILURE;
            }
        };

        let result = runtime.block_on(run_jobs(
            self.config.metrics(),
            C::COMPONENT_NAME,
            |shutdown| self.config.create_jobs(shutdown),
        ));

        match result {
            Ok(report) if report.all_succeeded() => ExitCode::SUCCESS,
            Ok(report) => {
                error!(
                    failed = report.failed_count(),
                    "{} {}(s) did not complete",
                    report.failed_count(),
                    C::COMPONENT_NAME
                );
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{} setup failed: {e}", C::COMPONENT_NAME);
                ExitCode::FAILURE
            }
        }
    }
}
