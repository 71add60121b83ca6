//! Sequential job runner.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::rpc::OdooRpc;
use crate::storage::{Job, JobKind, JobState, SqliteStorage};
use crate::sync::{
    import_field, Exporter, FieldImportRequest, FieldImportStats, Importer, Registry, SyncError,
    SyncOutcome, SyncResult,
};

/// What a job produced.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum JobOutput {
    Record(SyncOutcome),
    Field(FieldImportStats),
}

/// Result of one processed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: i64,
    pub kind: JobKind,
    pub model: String,
    pub record_id: i64,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkerStats {
    pub done: usize,
    pub failed: usize,
    pub jobs: Vec<JobReport>,
}

/// Drains the pending jobs of one backend.
pub struct Worker<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a Registry,
    backend: &'a BackendConfig,
    remote: &'a dyn OdooRpc,
    local: &'a dyn OdooRpc,
    actor: &'a str,
}

impl<'a> Worker<'a> {
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a Registry,
        backend: &'a BackendConfig,
        remote: &'a dyn OdooRpc,
        local: &'a dyn OdooRpc,
        actor: &'a str,
    ) -> Self {
        Self {
            storage,
            registry,
            backend,
            remote,
            local,
            actor,
        }
    }

    /// Run pending jobs in priority order until none are left, or `limit`
    /// jobs have been processed. Jobs enqueued while running are picked up
    /// too.
    ///
    /// A failing job is recorded as `failed` and the run continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if the job table itself cannot be read or
    /// updated.
    pub fn run(&mut self, limit: Option<usize>) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();

        while limit.is_none_or(|max| stats.jobs.len() < max) {
            let Some(job) = self.storage.next_pending_job(Some(&self.backend.name))? else {
                break;
            };
            let report = self.process(&job)?;
            match report.state {
                JobState::Done => stats.done += 1,
                _ => stats.failed += 1,
            }
            stats.jobs.push(report);
        }

        info!(
            backend = %self.backend.name,
            done = stats.done,
            failed = stats.failed,
            "worker finished"
        );
        Ok(stats)
    }

    /// Start, execute and close one pending job.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not pending or belongs to another
    /// backend, or if its state cannot be updated.
    pub fn process(&mut self, job: &Job) -> Result<JobReport> {
        if job.backend != self.backend.name {
            return Err(Error::InvalidArgument(format!(
                "job {} belongs to backend '{}', not '{}'",
                job.id, job.backend, self.backend.name
            )));
        }

        self.storage.start_job(job.id, self.actor)?;
        debug!(job = job.id, kind = %job.kind, model = %job.model, record_id = job.record_id, "job started");

        let mut report = JobReport {
            job_id: job.id,
            kind: job.kind,
            model: job.model.clone(),
            record_id: job.record_id,
            state: JobState::Done,
            result: None,
            error: None,
        };

        match self.execute(job) {
            Ok(output) => {
                let result = serde_json::to_string(&output)?;
                self.storage.finish_job(job.id, Some(&result), self.actor)?;
                report.result = Some(result);
            }
            Err(err) => {
                warn!(job = job.id, model = %job.model, record_id = job.record_id, error = %err, "job failed");
                let message = err.to_string();
                self.storage.fail_job(job.id, &message, self.actor)?;
                report.state = JobState::Failed;
                report.error = Some(message);
            }
        }
        Ok(report)
    }

    fn execute(&mut self, job: &Job) -> SyncResult<JobOutput> {
        match job.kind {
            JobKind::ImportRecord => Importer::new(
                self.storage,
                self.registry,
                self.backend,
                self.remote,
                self.local,
                self.actor,
            )
            .import_record(&job.model, job.record_id, job.force)
            .map(JobOutput::Record),
            JobKind::ExportRecord => Exporter::new(
                self.storage,
                self.registry,
                self.backend,
                self.remote,
                self.local,
                self.actor,
            )
            .export_record(&job.model, job.record_id, job.force)
            .map(JobOutput::Record),
            JobKind::ImportField => {
                let payload = job.payload.as_deref().ok_or_else(|| {
                    SyncError::Config(format!("import_field job {} has no payload", job.id))
                })?;
                let request: FieldImportRequest = serde_json::from_str(payload)
                    .map_err(|e| SyncError::Config(format!("invalid import_field payload: {e}")))?;
                import_field(self.storage, self.registry, self.backend, self.remote, self.local, &request)
                    .map(JobOutput::Field)
            }
        }
    }
}
