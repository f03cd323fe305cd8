use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::job::{InvalidTransition, RenderJob};

/// Concurrency-safe registry of render jobs keyed by job id.
///
/// Each entry is guarded by its shard lock only for the duration of a single
/// insert, read or transition; no lock is held across an `.await`. Readers
/// always receive an owned snapshot taken under that lock, so a terminal
/// status is never observed without its `image_url` or `error`.
///
/// Entries are never evicted.
#[derive(Debug, Default, Clone)]
pub struct JobStore {
    jobs: Arc<DashMap<String, RenderJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Insert a new record, refusing to overwrite an existing job id.
    pub fn insert(&self, job: RenderJob) -> Result<RenderJob, JobStoreError> {
        match self.jobs.entry(job.job_id.clone()) {
            Entry::Occupied(occupied) => Err(JobStoreError::DuplicateKey {
                job_id: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                let snapshot = job.clone();
                vacant.insert(job);
                Ok(snapshot)
            }
        }
    }

    /// Snapshot of the current record.
    pub fn get(&self, job_id: &str) -> Result<RenderJob, JobStoreError> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| JobStoreError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Apply a transition to one record and return the resulting snapshot.
    ///
    /// The mutation and the snapshot happen under the same entry lock. A
    /// rejected transition leaves the record untouched.
    pub fn update<F>(&self, job_id: &str, apply: F) -> Result<RenderJob, JobStoreError>
    where
        F: FnOnce(&mut RenderJob) -> Result<(), InvalidTransition>,
    {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobStoreError::NotFound {
                job_id: job_id.to_string(),
            })?;

        let mut next = entry.value().clone();
        apply(&mut next)?;
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("render job {job_id} already exists")]
    DuplicateKey { job_id: String },

    #[error("render job {job_id} not found")]
    NotFound { job_id: String },

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}
