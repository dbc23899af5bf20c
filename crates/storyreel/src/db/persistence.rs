use crate::collab::{ArtifactRef, PersistenceSink};
use crate::workflow::job::{ArtifactKind, Job};

use super::workflow_repo::{self, WorkflowRow};
use super::{Database, DatabaseError};

/// Records jobs and their artifacts in SQLite.
#[derive(Clone)]
pub struct SqlitePersistence {
    db: Database,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl PersistenceSink for SqlitePersistence {
    fn record_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let row = WorkflowRow::from_job(job)?;
        workflow_repo::upsert(&self.db, &row)
    }

    fn record_artifact(
        &self,
        job_id: &str,
        kind: ArtifactKind,
        reference: &ArtifactRef,
    ) -> Result<(), DatabaseError> {
        workflow_repo::insert_file(&self.db, job_id, kind.as_str(), reference.as_str())
    }
}
