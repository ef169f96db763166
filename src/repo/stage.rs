use rusqlite::{Connection, OptionalExtension};
use crate::models::{Stage, StageDraft, StageType, StageUpdate};
use crate::repo::{DealRepo, PipelineRepo};
use anyhow::{Context, Result};

/// Stage repository for database operations
///
/// Owns the ordering contract of a pipeline: after every create, update or
/// delete the pipeline's `stage_order` values are exactly 1..=N.
///
/// - Create: requested order is clamped to 1..=N+1 (absent appends); later
///   stages shift down by one.
/// - Update: a changed order is clamped to 1..=N; the stage is removed and
///   reinserted there and the whole pipeline renumbered.
/// - Delete: refused while the stage still holds deals; the rest renumber.
pub struct StageRepo;

const STAGE_COLUMNS: &str =
    "id, pipeline_id, name, stage_order, stage_type, win_probability";

fn stage_from_row(row: &rusqlite::Row) -> rusqlite::Result<Stage> {
    let stage_type: String = row.get(4)?;
    Ok(Stage {
        id: row.get(0)?,
        pipeline_id: row.get(1)?,
        name: row.get(2)?,
        stage_order: row.get(3)?,
        stage_type: StageType::from_str(&stage_type).unwrap_or_default(),
        win_probability: row.get(5)?,
        deals: Vec::new(),
    })
}

impl StageRepo {
    /// List a pipeline's stages in order, each with its deals
    pub fn list_for_pipeline(conn: &Connection, pipeline_id: i64) -> Result<Vec<Stage>> {
        let mut stages = Self::list_rows(conn, pipeline_id)?;
        for stage in &mut stages {
            stage.deals = DealRepo::list_for_stage(conn, stage.id)?;
        }
        Ok(stages)
    }

    /// Get a stage (with deals) by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Stage>> {
        let stage = conn
            .query_row(
                &format!("SELECT {} FROM stages WHERE id = ?1", STAGE_COLUMNS),
                [id],
                stage_from_row,
            )
            .optional()?;

        match stage {
            Some(mut stage) => {
                stage.deals = DealRepo::list_for_stage(conn, stage.id)?;
                Ok(Some(stage))
            }
            None => Ok(None),
        }
    }

    /// Create a stage at the requested position
    pub fn create(conn: &Connection, pipeline_id: i64, draft: &StageDraft) -> Result<Stage> {
        draft.validate().map_err(anyhow::Error::msg)?;
        if PipelineRepo::get_by_id(conn, pipeline_id)?.is_none() {
            anyhow::bail!("Pipeline {} not found", pipeline_id);
        }

        let tx = conn.unchecked_transaction()?;
        let count = Self::count(&tx, pipeline_id)?;
        let position = draft.stage_order.unwrap_or(count + 1).clamp(1, count + 1);

        // Move stages at or after the slot out of the way (negative, shifted by one)
        tx.execute(
            "UPDATE stages SET stage_order = -(stage_order + 1)
             WHERE pipeline_id = ?1 AND stage_order >= ?2",
            rusqlite::params![pipeline_id, position],
        )?;

        let now = chrono::Utc::now().timestamp();
        tx.execute(
            "INSERT INTO stages (pipeline_id, name, stage_order, stage_type, win_probability, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                pipeline_id,
                draft.name.trim(),
                position,
                draft.stage_type.as_str(),
                draft.win_probability,
                now,
                now
            ],
        )
        .with_context(|| format!("Failed to create stage: {}", draft.name))?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE stages SET stage_order = -stage_order WHERE pipeline_id = ?1 AND stage_order < 0",
            [pipeline_id],
        )?;
        PipelineRepo::touch(&tx, pipeline_id)?;
        tx.commit()?;

        log::debug!("Created stage {} in pipeline {} at order {}", id, pipeline_id, position);
        Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} vanished after insert", id))
    }

    /// Update a stage, moving it when `stage_order` changes
    pub fn update(conn: &Connection, id: i64, update: &StageUpdate) -> Result<Stage> {
        update.validate().map_err(anyhow::Error::msg)?;
        let existing = Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", id))?;
        if existing.pipeline_id != update.pipeline_id {
            anyhow::bail!(
                "Stage {} does not belong to pipeline {}",
                id, update.pipeline_id
            );
        }

        let tx = conn.unchecked_transaction()?;
        let now = chrono::Utc::now().timestamp();
        tx.execute(
            "UPDATE stages SET name = ?1, stage_type = ?2, win_probability = ?3, modified_ts = ?4
             WHERE id = ?5",
            rusqlite::params![
                update.name.trim(),
                update.stage_type.as_str(),
                update.win_probability,
                now,
                id
            ],
        )
        .with_context(|| format!("Failed to update stage id={}", id))?;

        if update.stage_order != existing.stage_order {
            let mut ids = Self::ordered_ids(&tx, existing.pipeline_id)?;
            ids.retain(|stage_id| *stage_id != id);
            let slot = (update.stage_order - 1).clamp(0, ids.len() as i64) as usize;
            ids.insert(slot, id);
            Self::renumber(&tx, existing.pipeline_id, &ids)?;
            log::debug!(
                "Moved stage {} from order {} to {}",
                id, existing.stage_order, slot + 1
            );
        }

        PipelineRepo::touch(&tx, existing.pipeline_id)?;
        tx.commit()?;

        Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", id))
    }

    /// Delete an empty stage and close the gap it leaves
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let existing = Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", id))?;
        if !existing.deals.is_empty() {
            anyhow::bail!(
                "Cannot delete stage '{}': it still holds {} deal(s). Move them first.",
                existing.name,
                existing.deals.len()
            );
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM stages WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete stage id={}", id))?;
        let ids = Self::ordered_ids(&tx, existing.pipeline_id)?;
        Self::renumber(&tx, existing.pipeline_id, &ids)?;
        PipelineRepo::touch(&tx, existing.pipeline_id)?;
        tx.commit()?;

        log::debug!("Deleted stage {} from pipeline {}", id, existing.pipeline_id);
        Ok(())
    }

    /// Number of stages in a pipeline
    pub fn count(conn: &Connection, pipeline_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM stages WHERE pipeline_id = ?1",
            [pipeline_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_rows(conn: &Connection, pipeline_id: i64) -> Result<Vec<Stage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stages WHERE pipeline_id = ?1 ORDER BY stage_order",
            STAGE_COLUMNS
        ))?;
        let rows = stmt.query_map([pipeline_id], stage_from_row)?;

        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    fn ordered_ids(conn: &Connection, pipeline_id: i64) -> Result<Vec<i64>> {
        Ok(Self::list_rows(conn, pipeline_id)?.into_iter().map(|s| s.id).collect())
    }

    /// Assign orders 1..=N following `ordered_ids`
    fn renumber(conn: &Connection, pipeline_id: i64, ordered_ids: &[i64]) -> Result<()> {
        // Park everything on negative values first so the UNIQUE index never trips
        conn.execute(
            "UPDATE stages SET stage_order = -stage_order WHERE pipeline_id = ?1",
            [pipeline_id],
        )?;
        for (index, stage_id) in ordered_ids.iter().enumerate() {
            conn.execute(
                "UPDATE stages SET stage_order = ?1 WHERE id = ?2",
                rusqlite::params![index as i64 + 1, stage_id],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::DealDraft;

    fn setup(names: &[&str]) -> (Connection, i64, Vec<i64>) {
        let conn = DbConnection::connect_in_memory().unwrap();
        let pipeline = PipelineRepo::create(&conn, "Sales").unwrap();
        let ids = names
            .iter()
            .map(|name| StageRepo::create(&conn, pipeline.id, &StageDraft::new(name)).unwrap().id)
            .collect();
        (conn, pipeline.id, ids)
    }

    fn order_of(conn: &Connection, pipeline_id: i64) -> Vec<(String, i64)> {
        StageRepo::list_for_pipeline(conn, pipeline_id)
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.stage_order))
            .collect()
    }

    fn names(conn: &Connection, pipeline_id: i64) -> Vec<String> {
        order_of(conn, pipeline_id).into_iter().map(|(name, _)| name).collect()
    }

    fn assert_contiguous(conn: &Connection, pipeline_id: i64) {
        let orders: Vec<i64> = order_of(conn, pipeline_id).into_iter().map(|(_, o)| o).collect();
        let expected: Vec<i64> = (1..=orders.len() as i64).collect();
        assert_eq!(orders, expected);
    }

    #[test]
    fn test_create_appends() {
        let (conn, pipeline_id, _) = setup(&["A", "B", "C"]);
        assert_eq!(names(&conn, pipeline_id), vec!["A", "B", "C"]);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_create_at_position_shifts_others() {
        let (conn, pipeline_id, _) = setup(&["A", "B", "C"]);
        let mut draft = StageDraft::new("X");
        draft.stage_order = Some(2);
        let created = StageRepo::create(&conn, pipeline_id, &draft).unwrap();

        assert_eq!(created.stage_order, 2);
        assert_eq!(names(&conn, pipeline_id), vec!["A", "X", "B", "C"]);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_create_with_order_past_end_stays_contiguous() {
        let (conn, pipeline_id, _) = setup(&["A", "B"]);
        let mut draft = StageDraft::new("Z");
        draft.stage_order = Some(10);
        let created = StageRepo::create(&conn, pipeline_id, &draft).unwrap();

        assert_eq!(created.stage_order, 3);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_create_rejects_unknown_pipeline_and_empty_name() {
        let conn = DbConnection::connect_in_memory().unwrap();
        assert!(StageRepo::create(&conn, 42, &StageDraft::new("A")).is_err());

        let pipeline = PipelineRepo::create(&conn, "Sales").unwrap();
        assert!(StageRepo::create(&conn, pipeline.id, &StageDraft::new("")).is_err());
    }

    #[test]
    fn test_update_moves_stage_to_front() {
        let (conn, pipeline_id, ids) = setup(&["A", "B", "C"]);
        let c = StageRepo::get_by_id(&conn, ids[2]).unwrap().unwrap();
        let mut update = StageUpdate::from_stage(&c);
        update.stage_order = 1;

        let moved = StageRepo::update(&conn, c.id, &update).unwrap();

        assert_eq!(moved.stage_order, 1);
        assert_eq!(names(&conn, pipeline_id), vec!["C", "A", "B"]);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_update_moves_stage_back() {
        let (conn, pipeline_id, ids) = setup(&["A", "B", "C", "D"]);
        let a = StageRepo::get_by_id(&conn, ids[0]).unwrap().unwrap();
        let mut update = StageUpdate::from_stage(&a);
        update.stage_order = 3;

        StageRepo::update(&conn, a.id, &update).unwrap();

        assert_eq!(names(&conn, pipeline_id), vec!["B", "C", "A", "D"]);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_update_clamps_order() {
        let (conn, pipeline_id, ids) = setup(&["A", "B", "C"]);
        let a = StageRepo::get_by_id(&conn, ids[0]).unwrap().unwrap();
        let mut update = StageUpdate::from_stage(&a);
        update.stage_order = 99;

        let moved = StageRepo::update(&conn, a.id, &update).unwrap();

        assert_eq!(moved.stage_order, 3);
        assert_eq!(names(&conn, pipeline_id), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_update_fields_without_reorder() {
        let (conn, pipeline_id, ids) = setup(&["A", "B"]);
        let b = StageRepo::get_by_id(&conn, ids[1]).unwrap().unwrap();
        let mut update = StageUpdate::from_stage(&b);
        update.name = "Closed Won".to_string();
        update.stage_type = StageType::Won;
        update.win_probability = 100;

        let updated = StageRepo::update(&conn, b.id, &update).unwrap();

        assert_eq!(updated.name, "Closed Won");
        assert_eq!(updated.stage_type, StageType::Won);
        assert_eq!(updated.win_probability, 100);
        assert_eq!(updated.stage_order, 2);
        assert_contiguous(&conn, pipeline_id);
    }

    #[test]
    fn test_update_rejects_foreign_pipeline() {
        let (conn, _, ids) = setup(&["A"]);
        let other = PipelineRepo::create(&conn, "Other").unwrap();
        let a = StageRepo::get_by_id(&conn, ids[0]).unwrap().unwrap();
        let mut update = StageUpdate::from_stage(&a);
        update.pipeline_id = other.id;

        assert!(StageRepo::update(&conn, a.id, &update).is_err());
    }

    #[test]
    fn test_delete_renumbers() {
        let (conn, pipeline_id, ids) = setup(&["A", "B", "C"]);
        StageRepo::delete(&conn, ids[0]).unwrap();

        assert_eq!(order_of(&conn, pipeline_id), vec![("B".to_string(), 1), ("C".to_string(), 2)]);
    }

    #[test]
    fn test_delete_refuses_stage_with_deals() {
        let (conn, pipeline_id, ids) = setup(&["A", "B"]);
        DealRepo::create(&conn, &DealDraft {
            stage_id: ids[0],
            name: "D1".to_string(),
            amount: 100.0,
            owner: None,
        }).unwrap();

        let err = StageRepo::delete(&conn, ids[0]).unwrap_err();
        assert!(err.to_string().contains("still holds 1 deal"));
        assert_eq!(names(&conn, pipeline_id), vec!["A", "B"]);
    }
}
