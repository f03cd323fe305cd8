use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status of a render job in the in-process queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// `done` and `failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid render job transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One render job tracked from submission to a terminal status.
///
/// Fields are only changed through the `mark_*` transitions, which keep
/// `image_url` and `error` mutually exclusive and unset until terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderJob {
    pub job_id: String,
    pub design_id: String,
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(job_id: impl Into<String>, design_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            design_id: design_id.into(),
            status: JobStatus::Pending,
            image_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Processing)
    }

    pub fn mark_done(&mut self, image_url: String) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Done)?;
        self.image_url = Some(image_url);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        let allowed = match (self.status, to) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Done | JobStatus::Failed) => true,
            _ => false,
        };
        if !allowed {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Response body for render submission and polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJobResponse {
    pub job_id: String,
    pub design_id: String,
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RenderJob> for RenderJobResponse {
    fn from(job: RenderJob) -> Self {
        Self {
            job_id: job.job_id,
            design_id: job.design_id,
            status: job.status,
            image_url: job.image_url,
            error: job.error,
            created_at: job.created_at,
        }
    }
}
