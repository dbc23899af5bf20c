//! Workflow repository: rows in the `workflows` and `generated_files` tables.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::workflow::job::Job;

#[derive(Debug, Clone)]
pub struct WorkflowRow {
    pub id: String,
    pub original_prompt: String,
    pub enhanced_story: String,
    pub story_title: String,
    pub max_scenes: i64,
    pub current_phase: String,
    pub status: String,
    /// JSON-encoded scene list.
    pub scenes: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub total_processing_time: Option<f64>,
}

impl WorkflowRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_prompt: row.get("original_prompt")?,
            enhanced_story: row.get("enhanced_story")?,
            story_title: row.get("story_title")?,
            max_scenes: row.get("max_scenes")?,
            current_phase: row.get("current_phase")?,
            status: row.get("status")?,
            scenes: row.get("scenes")?,
            failure_reason: row.get("failure_reason")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
            total_processing_time: row.get("total_processing_time")?,
        })
    }

    pub fn from_job(job: &Job) -> Result<Self, DatabaseError> {
        let scenes = if job.scenes.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&job.scenes).map_err(|e| DatabaseError::Encode {
                    column: "scenes",
                    source: e,
                })?,
            )
        };

        Ok(Self {
            id: job.id.clone(),
            original_prompt: job.original_prompt.clone(),
            enhanced_story: job.enhanced_story.clone(),
            story_title: job.story_title.clone(),
            max_scenes: job.max_scenes as i64,
            current_phase: job.phase.as_str().to_string(),
            status: job.status.as_str().to_string(),
            scenes,
            failure_reason: job.failure_reason.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            total_processing_time: job.total_processing_time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFileRow {
    pub workflow_id: String,
    pub file_type: String,
    pub reference: String,
    pub created_at: String,
}

/// Inserts the row, or replaces every mutable column if it already exists.
pub fn upsert(db: &Database, row: &WorkflowRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO workflows (id, original_prompt, enhanced_story, story_title, max_scenes,
             current_phase, status, scenes, failure_reason, created_at, updated_at, completed_at,
             total_processing_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                original_prompt = excluded.original_prompt,
                enhanced_story = excluded.enhanced_story,
                story_title = excluded.story_title,
                max_scenes = excluded.max_scenes,
                current_phase = excluded.current_phase,
                status = excluded.status,
                scenes = excluded.scenes,
                failure_reason = excluded.failure_reason,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at,
                total_processing_time = excluded.total_processing_time",
            params![
                row.id,
                row.original_prompt,
                row.enhanced_story,
                row.story_title,
                row.max_scenes,
                row.current_phase,
                row.status,
                row.scenes,
                row.failure_reason,
                row.created_at,
                row.updated_at,
                row.completed_at,
                row.total_processing_time,
            ],
        )?;
        Ok(())
    })
}

pub fn get(db: &Database, id: &str) -> Result<Option<WorkflowRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM workflows WHERE id = ?1",
                params![id],
                WorkflowRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn insert_file(
    db: &Database,
    workflow_id: &str,
    file_type: &str,
    reference: &str,
) -> Result<(), DatabaseError> {
    let created_at = chrono::Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO generated_files (workflow_id, file_type, reference, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![workflow_id, file_type, reference, created_at],
        )?;
        Ok(())
    })
}

/// Files recorded for a workflow, in insertion order.
pub fn files_for(db: &Database, workflow_id: &str) -> Result<Vec<GeneratedFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT workflow_id, file_type, reference, created_at FROM generated_files
             WHERE workflow_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![workflow_id], |r| {
                Ok(GeneratedFileRow {
                    workflow_id: r.get(0)?,
                    file_type: r.get(1)?,
                    reference: r.get(2)?,
                    created_at: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
