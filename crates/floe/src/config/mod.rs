//! Configuration for the floe ingestion runner.
//!
//! A config file holds a `jobs:` map and an optional `metrics:` block. Several
//! files and directories can be merged; a job key may only appear once.

mod job_key;

pub use job_key::JobKey;

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use floe_core::config::{ConfigPath, Mergeable, MetricsConfig, load_from_paths};
use floe_core::{AppConfig, ConfigError};

use crate::job::IngestJob;
use crate::pool::PoolConfig;
use crate::record::Target;
use crate::runner::RunSettings;
use crate::sink::{ConnectionStrategy, Credentials};
use crate::source::{Compression, InputFormat};

/// Where records come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Path to the input document.
    pub path: String,
    #[serde(default)]
    pub format: InputFormat,
    #[serde(default)]
    pub compression: Compression,
}

/// Where records go.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Sink endpoint, e.g. `ws://localhost:8000` or `memory://`.
    pub address: String,
    pub namespace: String,
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub connection: ConnectionStrategy,
    /// Timeout for each HTTP request to the sink.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl SinkConfig {
    pub fn target(&self) -> Target {
        Target {
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            table: self.table.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Concurrency settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum concurrent writes.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Decoded records buffered ahead of the writers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-record write timeout. Unset means no timeout.
    #[serde(default)]
    pub write_timeout_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            write_timeout_secs: None,
        }
    }
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

/// Failure limits and the dead-letter log.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    /// Stop after this many failed records (0 = unlimited).
    #[serde(default)]
    pub max_failures: u64,
    /// Stop after this many failed records in a row (0 = unlimited).
    #[serde(default)]
    pub max_consecutive_failures: u64,
    /// Directory for failure NDJSON files. Unset disables the DLQ.
    #[serde(default)]
    pub dlq_path: Option<String>,
}

/// Progress logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Seconds between progress lines (0 = off).
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// Failures logged individually before sampling kicks in.
    #[serde(default = "default_log_failures")]
    pub log_failures: u64,
    /// Log a progress line every this many records (0 = off).
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            progress_interval_secs: default_progress_interval(),
            log_failures: default_log_failures(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_progress_interval() -> u64 {
    5
}

fn default_log_failures() -> u64 {
    20
}

fn default_progress_every() -> u64 {
    10_000
}

/// One ingestion job.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl JobConfig {
    /// Settings for one run of this job.
    pub fn run_settings(&self, job: &str) -> RunSettings {
        let mut settings = RunSettings::new(
            job,
            &self.source.path,
            &self.sink.address,
            self.sink.target(),
        );
        settings.format = self.source.format;
        settings.compression = self.source.compression;
        settings.credentials = self.sink.credentials.clone();
        settings.strategy = self.sink.connection;
        settings.pool = PoolConfig {
            workers: self.dispatch.workers,
            max_failures: self.error_handling.max_failures,
            max_consecutive_failures: self.error_handling.max_consecutive_failures,
        };
        settings.queue_capacity = self.dispatch.queue_capacity;
        settings.write_timeout = self.dispatch.write_timeout_secs.map(Duration::from_secs);
        settings.progress_interval = match self.report.progress_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        settings
    }

    fn validate(&self, job: &str, errors: &mut Vec<ConfigError>) {
        if self.source.path.trim().is_empty() {
            errors.push(ConfigError::EmptySourcePath {
                job: job.to_string(),
            });
        }
        if self.sink.address.trim().is_empty() {
            errors.push(ConfigError::EmptySinkAddress {
                job: job.to_string(),
            });
        }

        let target_fields = [
            ("namespace", &self.sink.namespace),
            ("database", &self.sink.database),
            ("table", &self.sink.table),
        ];
        for (field, value) in target_fields {
            if value.trim().is_empty() {
                errors.push(ConfigError::EmptyTarget {
                    job: job.to_string(),
                    field,
                });
            }
        }

        let positive = [
            ("dispatch.workers", self.dispatch.workers),
            ("dispatch.queue_capacity", self.dispatch.queue_capacity),
        ];
        for (field, value) in positive {
            if value == 0 {
                errors.push(ConfigError::ZeroSetting {
                    job: job.to_string(),
                    field,
                });
            }
        }
    }
}

/// Top-level floe configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub jobs: IndexMap<JobKey, JobConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Parse and validate a single YAML document (no env interpolation).
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every job, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }

        let mut errors = Vec::new();
        for (key, job) in &self.jobs {
            job.validate(key.id(), &mut errors);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleErrors {
                errors: errors.iter().map(|e| e.to_string()).collect(),
            }),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&JobKey, &JobConfig)> {
        self.jobs.iter()
    }
}

impl Mergeable for Config {
    type Key = JobKey;
    type Component = JobConfig;

    fn components(&self) -> &IndexMap<JobKey, JobConfig> {
        &self.jobs
    }

    fn components_mut(&mut self) -> &mut IndexMap<JobKey, JobConfig> {
        &mut self.jobs
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsConfig {
        &mut self.metrics
    }

    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
    }
}

impl AppConfig for Config {
    type Job = IngestJob;

    const COMPONENT_NAME: &'static str = "job";

    fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    fn create_jobs(&self, shutdown: CancellationToken) -> Vec<IngestJob> {
        self.jobs
            .iter()
            .map(|(key, job)| IngestJob::new(key.clone(), job.clone(), shutdown.clone()))
            .collect()
    }

    fn log_startup_info(&self) {
        info!("Starting floe with {} job(s)", self.job_count());
        for (key, job) in self.jobs() {
            info!(
                "  Job: {} ({} -> {} {}/{}/{})",
                key,
                job.source.path,
                job.sink.address,
                job.sink.namespace,
                job.sink.database,
                job.sink.table
            );
        }
    }
}
