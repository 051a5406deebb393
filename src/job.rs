//! In-memory upload job tracking.
//!
//! Jobs live only as long as the owning orchestrator; nothing is persisted.
//! Finished jobs stay pollable until removed or pruned.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::UploadError;
use crate::registry::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadJob {
    pub id: String,
    pub file_name: String,
    pub source: SourceType,
    /// SHA-256 of the uploaded bytes, set once the bytes are staged.
    pub checksum: Option<String>,
    pub total_rows: usize,
    pub processed_rows: usize,
    /// Rows removed by replace-on-reupload.
    pub deleted_rows: usize,
    pub status: JobStatus,
    pub message: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

impl UploadJob {
    pub fn new(source: SourceType, file_name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            source,
            checksum: None,
            total_rows: 0,
            processed_rows: 0,
            deleted_rows: 0,
            status: JobStatus::Processing,
            message: Some("Upload accepted".to_string()),
            error: None,
            started_at: Local::now(),
            finished_at: None,
        }
    }

    /// Completion percentage in `0.0..=100.0`.
    pub fn progress(&self) -> f64 {
        match self.status {
            JobStatus::Completed => 100.0,
            _ if self.total_rows == 0 => 0.0,
            _ => (self.processed_rows as f64 * 100.0 / self.total_rows as f64).min(100.0),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::Processing
    }

    pub(crate) fn complete(&mut self, message: String) {
        self.status = JobStatus::Completed;
        self.message = Some(message);
        self.finished_at = Some(Local::now());
    }

    pub(crate) fn fail(&mut self, error: &UploadError) {
        self.status = JobStatus::Error;
        self.message = Some("Upload failed".to_string());
        self.error = Some(error.to_string());
        self.finished_at = Some(Local::now());
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, UploadJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job: UploadJob) -> String {
        let id = job.id.clone();
        self.jobs.insert(id.clone(), job);
        id
    }

    pub fn get(&self, id: &str) -> Result<&UploadJob, UploadError> {
        self.jobs
            .get(id)
            .ok_or_else(|| UploadError::JobNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut UploadJob, UploadError> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| UploadError::JobNotFound(id.to_string()))
    }

    /// Jobs ordered by start time.
    pub fn list(&self) -> Vec<&UploadJob> {
        let mut jobs = self.jobs.values().collect::<Vec<_>>();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    pub fn remove(&mut self, id: &str) -> Result<UploadJob, UploadError> {
        self.jobs
            .remove(id)
            .ok_or_else(|| UploadError::JobNotFound(id.to_string()))
    }

    /// Drops completed and failed jobs, keeping those still processing.
    /// Returns how many were removed.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.is_finished());
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
