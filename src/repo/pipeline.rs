use rusqlite::{Connection, OptionalExtension};
use crate::models::{Pipeline, PipelineDraft};
use crate::repo::StageRepo;
use anyhow::{Context, Result};

/// Pipeline repository for database operations
///
/// Reads always return full snapshots: every pipeline comes back with its
/// stages in order and each stage with its deals.
///
/// # Example
///
/// ```no_run
/// use pipeboard::db::DbConnection;
/// use pipeboard::repo::PipelineRepo;
///
/// let conn = DbConnection::connect_in_memory().unwrap();
/// let pipeline = PipelineRepo::create(&conn, "Sales").unwrap();
/// let snapshot = PipelineRepo::list(&conn).unwrap();
/// assert_eq!(snapshot[0].id, pipeline.id);
/// ```
pub struct PipelineRepo;

impl PipelineRepo {
    /// Create a new, empty pipeline
    pub fn create(conn: &Connection, name: &str) -> Result<Pipeline> {
        PipelineDraft { name: name.to_string() }
            .validate()
            .map_err(anyhow::Error::msg)?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO pipelines (name, created_ts, modified_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![name.trim(), now, now],
        )
        .with_context(|| format!("Failed to create pipeline: {}", name))?;

        let id = conn.last_insert_rowid();
        log::debug!("Created pipeline {} ({})", id, name);
        Ok(Pipeline {
            id,
            name: name.trim().to_string(),
            stages: Vec::new(),
        })
    }

    /// Get a pipeline snapshot by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Pipeline>> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, name FROM pipelines WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((id, name)) => Ok(Some(Pipeline {
                id,
                name,
                stages: StageRepo::list_for_pipeline(conn, id)?,
            })),
            None => Ok(None),
        }
    }

    /// List all pipeline snapshots ordered by id
    pub fn list(conn: &Connection) -> Result<Vec<Pipeline>> {
        let mut stmt = conn.prepare("SELECT id, name FROM pipelines ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut pipelines = Vec::new();
        for row in rows {
            let (id, name) = row?;
            pipelines.push(Pipeline {
                id,
                name,
                stages: StageRepo::list_for_pipeline(conn, id)?,
            });
        }
        Ok(pipelines)
    }

    /// Update pipeline modified timestamp
    pub(crate) fn touch(conn: &Connection, id: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE pipelines SET modified_ts = ?1 WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::StageDraft;

    #[test]
    fn test_create_and_get() {
        let conn = DbConnection::connect_in_memory().unwrap();

        let pipeline = PipelineRepo::create(&conn, "  Sales ").unwrap();
        assert_eq!(pipeline.name, "Sales");

        let loaded = PipelineRepo::get_by_id(&conn, pipeline.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Sales");
        assert!(loaded.stages.is_empty());

        assert!(PipelineRepo::get_by_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let conn = DbConnection::connect_in_memory().unwrap();

        let err = PipelineRepo::create(&conn, "   ").unwrap_err();
        assert_eq!(err.to_string(), "Pipeline name cannot be empty");
        assert!(PipelineRepo::list(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_list_returns_nested_stages() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let sales = PipelineRepo::create(&conn, "Sales").unwrap();
        let renewals = PipelineRepo::create(&conn, "Renewals").unwrap();

        StageRepo::create(&conn, sales.id, &StageDraft::new("Lead")).unwrap();
        StageRepo::create(&conn, sales.id, &StageDraft::new("Proposal")).unwrap();
        StageRepo::create(&conn, renewals.id, &StageDraft::new("Due")).unwrap();

        let pipelines = PipelineRepo::list(&conn).unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].stages.len(), 2);
        assert_eq!(pipelines[0].stages[1].name, "Proposal");
        assert_eq!(pipelines[1].stages.len(), 1);
    }
}
