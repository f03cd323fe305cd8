//! In-process render job queue.
//!
//! `submit` records a `pending` job and spawns a runner task without waiting
//! on it; callers poll with `lookup`. Job state lives only in memory.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use uuid::Uuid;

use crate::models::design::DesignPlan;
use crate::models::job::RenderJob;
use crate::services::ai_provider::{DesignRenderer, ProviderError};
use crate::services::job_store::{JobStore, JobStoreError};
use crate::services::storage::{ArtifactStorage, StorageError};

/// Extension of every stored render.
pub const RENDER_EXTENSION: &str = "png";

/// Deterministic artifact name for a job.
pub fn artifact_filename(job_id: &str) -> String {
    format!("{job_id}.{RENDER_EXTENSION}")
}

pub struct RenderQueue {
    store: JobStore,
    storage: Arc<dyn ArtifactStorage>,
}

impl RenderQueue {
    pub fn new(storage: Arc<dyn ArtifactStorage>) -> Self {
        Self::with_store(JobStore::new(), storage)
    }

    pub fn with_store(store: JobStore, storage: Arc<dyn ArtifactStorage>) -> Self {
        Self { store, storage }
    }

    /// Register a `pending` job and start rendering it in the background.
    ///
    /// `job_id` pins the identifier so an external record can share it; a
    /// fresh UUID is used otherwise. Only a duplicate `job_id` fails; anything
    /// that goes wrong while rendering ends up in the job's `error` field.
    /// Must be called from within a Tokio runtime.
    pub fn submit<R>(
        &self,
        design_id: &str,
        design: DesignPlan,
        renderer: Arc<R>,
        job_id: Option<String>,
    ) -> Result<RenderJob, QueueError>
    where
        R: DesignRenderer + ?Sized + 'static,
    {
        let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let snapshot = self.store.insert(RenderJob::new(job_id, design_id))?;

        let runner = JobRunner {
            store: self.store.clone(),
            storage: Arc::clone(&self.storage),
            job_id: snapshot.job_id.clone(),
        };
        tokio::spawn(runner.supervise(design, renderer));

        metrics::counter!("render_jobs_submitted_total").increment(1);
        tracing::info!(
            job_id = %snapshot.job_id,
            design_id = %snapshot.design_id,
            "Render job submitted"
        );

        Ok(snapshot)
    }

    /// Current snapshot of a job.
    pub fn lookup(&self, job_id: &str) -> Result<RenderJob, QueueError> {
        Ok(self.store.get(job_id)?)
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}

/// Why a render did not produce an artifact. Displays as the underlying error.
#[derive(Debug, thiserror::Error)]
enum RenderFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Drives a single job from `processing` to a terminal status.
struct JobRunner {
    store: JobStore,
    storage: Arc<dyn ArtifactStorage>,
    job_id: String,
}

impl JobRunner {
    /// Run the job, converting a panic into a `failed` record.
    async fn supervise<R>(self, design: DesignPlan, renderer: Arc<R>)
    where
        R: DesignRenderer + ?Sized,
    {
        let store = self.store.clone();
        let job_id = self.job_id.clone();

        if AssertUnwindSafe(self.run(design, renderer))
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!(job_id = %job_id, "Render job panicked");
            if record_panic(&store, &job_id) {
                metrics::counter!("render_jobs_failed_total").increment(1);
            } else {
                tracing::warn!(job_id = %job_id, "Render job panicked after reaching a terminal state");
            }
        }
    }

    async fn run<R>(self, design: DesignPlan, renderer: Arc<R>)
    where
        R: DesignRenderer + ?Sized,
    {
        let started = Instant::now();

        if let Err(e) = self.store.update(&self.job_id, RenderJob::mark_processing) {
            tracing::warn!(job_id = %self.job_id, error = %e, "Render job could not start");
            return;
        }
        tracing::debug!(job_id = %self.job_id, "Render job processing");

        let outcome = self.execute(&design, renderer.as_ref()).await;
        let elapsed = started.elapsed();
        metrics::histogram!("render_processing_seconds").record(elapsed.as_secs_f64());

        match outcome {
            Ok(image_url) => {
                let update = self
                    .store
                    .update(&self.job_id, |job| job.mark_done(image_url.clone()));
                match update {
                    Ok(_) => {
                        metrics::counter!("render_jobs_completed_total").increment(1);
                        tracing::info!(
                            job_id = %self.job_id,
                            image_url = %image_url,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Render job completed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(job_id = %self.job_id, error = %e, "Render job completion not recorded");
                    }
                }
            }
            Err(e) => {
                metrics::counter!("render_jobs_failed_total").increment(1);
                tracing::error!(job_id = %self.job_id, error = %e, "Render job failed");
                if let Err(update_err) = self
                    .store
                    .update(&self.job_id, |job| job.mark_failed(e.to_string()))
                {
                    tracing::error!(job_id = %self.job_id, error = %update_err, "Render job failure not recorded");
                }
            }
        }
    }

    /// Render, store the artifact and return its public URL.
    async fn execute<R>(&self, design: &DesignPlan, renderer: &R) -> Result<String, RenderFailure>
    where
        R: DesignRenderer + ?Sized,
    {
        let bytes = renderer.render_design(design).await?;

        let filename = artifact_filename(&self.job_id);
        self.storage.ensure_directory().await?;
        self.storage.write(&filename, &bytes).await?;

        Ok(self.storage.public_url(&filename))
    }
}

/// Mark a panicked job failed. False if it was already terminal.
fn record_panic(store: &JobStore, job_id: &str) -> bool {
    store
        .update(job_id, |job| job.mark_failed("render job panicked".to_string()))
        .is_ok()
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

impl QueueError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::Store(JobStoreError::NotFound { .. }))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::Store(JobStoreError::DuplicateKey { .. }))
    }
}
