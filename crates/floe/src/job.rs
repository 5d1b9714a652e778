//! One configured job as a floe-core `Job`.

use std::future::Future;
use std::sync::Arc;

use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use floe_core::Job;

use crate::config::{JobConfig, JobKey};
use crate::dlq::DeadLetterQueue;
use crate::error::{DlqSetupSnafu, JobError, SinkSetupSnafu};
use crate::report::TracingReporter;
use crate::runner::IngestionRunner;
use crate::sink::connector_for;

/// Runs one ingestion job from its config.
pub struct IngestJob {
    key: JobKey,
    config: JobConfig,
    shutdown: CancellationToken,
}

impl IngestJob {
    pub fn new(key: JobKey, config: JobConfig, shutdown: CancellationToken) -> Self {
        Self {
            key,
            config,
            shutdown,
        }
    }

    async fn execute(self) -> Result<(), JobError> {
        let job = self.key.to_string();
        let sink = &self.config.sink;

        let connector =
            connector_for(&sink.address, sink.request_timeout()).context(SinkSetupSnafu)?;

        let dlq = DeadLetterQueue::from_config(&self.config.error_handling, &job)
            .await
            .context(DlqSetupSnafu)?
            .map(Arc::new);

        let reporter = Arc::new(TracingReporter::new(
            job.clone(),
            self.config.report.log_failures,
            self.config.report.progress_every,
        ));

        let report = IngestionRunner::new(self.config.run_settings(&job), connector)
            .with_reporter(reporter)
            .with_dlq(dlq)
            .with_shutdown(self.shutdown)
            .run()
            .await?;

        info!(
            target = %job,
            cancelled = report.cancelled,
            "Summary: {}",
            report.summary
        );
        Ok(())
    }
}

impl Job for IngestJob {
    type Key = JobKey;
    type Error = JobError;

    fn key(&self) -> &JobKey {
        &self.key
    }

    fn run(self) -> impl Future<Output = Result<(), JobError>> + Send {
        self.execute()
    }
}
