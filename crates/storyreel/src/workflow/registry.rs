//! In-memory job registry.
//!
//! Jobs are stored as `Arc<Job>` snapshots. Readers clone the `Arc` and never hold
//! the lock while inspecting a record; writers build a complete replacement record
//! and swap it in under the write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::{Result, StoryreelError};
use crate::workflow::job::Job;
use crate::workflow::phase::{self, Operation};

#[derive(Default)]
pub struct WorkflowRegistry {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Job>>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Workflow registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Job>>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Workflow registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.write().insert(job.id.clone(), Arc::clone(&job));
        log::debug!("Registered job {}", job.id);
        job
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.read().get(id).cloned()
    }

    /// Like [`get`](Self::get) but reports a missing job as an error.
    pub fn require(&self, id: &str) -> Result<Arc<Job>> {
        self.get(id)
            .ok_or_else(|| StoryreelError::JobNotFound(id.to_string()))
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Arc<Job>> {
        let mut jobs: Vec<Arc<Job>> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Job>> {
        let removed = self.write().remove(id);
        if removed.is_some() {
            log::debug!("Removed job {}", id);
        }
        removed
    }

    /// Applies `operation` to a job.
    ///
    /// The phase check, the edit and the replacement all happen under one write lock,
    /// so two racing operations on the same job cannot both pass the check. `edit`
    /// receives a private copy of the record; if it fails, the stored record is
    /// left untouched. Phase, status and `updated_at` are set here.
    pub fn apply<F>(&self, id: &str, operation: Operation, edit: F) -> Result<Arc<Job>>
    where
        F: FnOnce(&mut Job) -> Result<()>,
    {
        let mut jobs = self.write();
        let current = jobs
            .get(id)
            .ok_or_else(|| StoryreelError::JobNotFound(id.to_string()))?;

        let target = phase::transition(id, current.phase, operation)?;

        let mut next = Job::clone(current);
        edit(&mut next)?;
        next.phase = target;
        next.status = phase::status_for(target, next.generation_started);
        next.updated_at = Utc::now();

        if current.phase != target {
            log::info!("Job {} moved {} -> {}", id, current.phase, target);
        }

        let next = Arc::new(next);
        jobs.insert(id.to_string(), Arc::clone(&next));
        Ok(next)
    }

    /// Checks that `operation` is allowed without changing anything.
    pub fn check(&self, id: &str, operation: Operation) -> Result<Arc<Job>> {
        let job = self.require(id)?;
        phase::transition(id, job.phase, operation)?;
        Ok(job)
    }
}
