//! Running several configured jobs under one shutdown token.
//!
//! Each job runs to completion on its own task; the runner only collects
//! how each one ended so the process can pick an exit code.

use std::fmt::Display;
use std::future::Future;

use snafu::ResultExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::MetricsConfig;
use crate::error::{AddressParseSnafu, MetricsSnafu, SetupError};
use crate::signal::cancel_on_signal;

/// A self-contained unit of work, such as one ingestion run.
pub trait Job: Send + 'static {
    /// The key type used to identify this job.
    type Key: Clone + Display + Send + 'static;

    /// The error type returned by this job.
    type Error: std::error::Error + Send + 'static;

    fn key(&self) -> &Self::Key;

    /// Run this job to completion.
    fn run(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
    Panicked,
}

/// Final status of every job, in completion order.
#[derive(Debug, Default)]
pub struct JobsReport {
    pub statuses: Vec<(String, JobStatus)>,
}

impl JobsReport {
    pub fn all_succeeded(&self) -> bool {
        self.statuses
            .iter()
            .all(|(_, status)| *status == JobStatus::Succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, status)| *status != JobStatus::Succeeded)
            .count()
    }
}

/// Runs jobs concurrently with shared shutdown handling.
pub struct JobRunner<J: Job> {
    jobs: Vec<J>,
    shutdown: CancellationToken,
    typetag: &'static str,
}

impl<J: Job> JobRunner<J> {
    pub fn new(jobs: Vec<J>, shutdown: CancellationToken, typetag: &'static str) -> Self {
        Self {
            jobs,
            shutdown,
            typetag,
        }
    }

    /// Cancel the shared token when the process receives a shutdown signal.
    pub fn spawn_shutdown_handler(&self) {
        cancel_on_signal(self.shutdown.clone());
    }

    /// Run all jobs to completion.
    pub async fn run(self) -> JobsReport {
        let mut handles: JoinSet<(String, Result<(), J::Error>)> = JoinSet::new();
        let typetag = self.typetag;

        for job in self.jobs {
            let key = job.key().to_string();
            handles.spawn(async move { (key, job.run().await) });
        }

        info!("Spawned {} {} tasks", handles.len(), typetag);

        let mut report = JobsReport::default();
        while let Some(result) = handles.join_next().await {
            match result {
                Ok((key, Ok(()))) => {
                    info!(target = %key, "{} completed", typetag);
                    report.statuses.push((key, JobStatus::Succeeded));
                }
                Ok((key, Err(e))) => {
                    error!(target = %key, error = %e, "{} failed", typetag);
                    report.statuses.push((key, JobStatus::Failed));
                }
                Err(e) => {
                    error!(error = %e, "{} task panicked", typetag);
                    report.statuses.push(("<unknown>".to_string(), JobStatus::Panicked));
                }
            }
        }

        // Stop the signal handler task.
        self.shutdown.cancel();

        info!("All {}s finished", typetag);
        report
    }
}

/// Start metrics, build jobs, and run them with signal-driven shutdown.
pub async fn run_jobs<J, F>(
    metrics: &MetricsConfig,
    typetag: &'static str,
    create_jobs: F,
) -> Result<JobsReport, SetupError>
where
    J: Job,
    F: FnOnce(CancellationToken) -> Vec<J>,
{
    if metrics.enabled {
        let addr = metrics.address.parse().context(AddressParseSnafu)?;
        crate::init_metrics(addr).context(MetricsSnafu)?;
    }

    let shutdown = CancellationToken::new();
    let jobs = create_jobs(shutdown.clone());

    let runner = JobRunner::new(jobs, shutdown, typetag);
    runner.spawn_shutdown_handler();
    Ok(runner.run().await)
}
