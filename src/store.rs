//! In-memory job state store
//!
//! One `RwLock<HashMap>` shared behind an `Arc`. Readers always see whole records;
//! a record that reached `completed` or `error` is frozen and further writes are
//! rejected with [`Error::InvalidState`].

use crate::error::{Error, Result};
use crate::types::{JobId, JobRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Table of job id to status record
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the `queued` state
    pub async fn create(&self) -> JobId {
        let id = JobId::new();
        self.jobs.write().await.insert(id, JobRecord::queued());
        id
    }

    /// Get a snapshot of one record
    pub async fn get(&self, id: JobId) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("download {id}")))
    }

    /// Replace a record
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown id
    /// - [`Error::InvalidState`] if the current record is terminal
    pub async fn set(&self, id: JobId, record: JobRecord) -> Result<()> {
        self.update(id, |current| *current = record).await
    }

    /// Modify a record in place under the write lock
    ///
    /// Same errors as [`JobStore::set`]; `f` is not called when the write is rejected.
    pub async fn update<F>(&self, id: JobId, f: F) -> Result<()>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("download {id}")))?;

        if current.status.is_terminal() {
            return Err(Error::InvalidState {
                id: id.to_string(),
                operation: "update".into(),
                current_state: current.status.to_string(),
            });
        }

        f(current);
        Ok(())
    }

    /// Number of known jobs, terminal ones included
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}
