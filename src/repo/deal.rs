use rusqlite::{Connection, OptionalExtension};
use crate::models::{Deal, DealDraft, StageChange};
use crate::repo::PipelineRepo;
use anyhow::{Context, Result};

/// Deal repository for database operations
///
/// A deal is always in exactly one stage: creation requires an existing
/// stage, and a move rewrites `stage_id` in a single statement. Every
/// assignment is appended to `deal_stage_history`.
pub struct DealRepo;

const DEAL_COLUMNS: &str = "id, name, amount, stage_id, owner";

fn deal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Deal> {
    Ok(Deal {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        stage_id: row.get(3)?,
        owner: row.get(4)?,
    })
}

impl DealRepo {
    /// List a stage's deals in board order
    pub fn list_for_stage(conn: &Connection, stage_id: i64) -> Result<Vec<Deal>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM deals WHERE stage_id = ?1 ORDER BY position, id",
            DEAL_COLUMNS
        ))?;
        let rows = stmt.query_map([stage_id], deal_from_row)?;

        let mut deals = Vec::new();
        for row in rows {
            deals.push(row?);
        }
        Ok(deals)
    }

    /// Get deal by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Deal>> {
        let deal = conn
            .query_row(
                &format!("SELECT {} FROM deals WHERE id = ?1", DEAL_COLUMNS),
                [id],
                deal_from_row,
            )
            .optional()?;
        Ok(deal)
    }

    /// Create a deal at the bottom of its stage
    pub fn create(conn: &Connection, draft: &DealDraft) -> Result<Deal> {
        draft.validate().map_err(anyhow::Error::msg)?;
        let pipeline_id = Self::pipeline_of_stage(conn, draft.stage_id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", draft.stage_id))?;

        let tx = conn.unchecked_transaction()?;
        let now = chrono::Utc::now().timestamp();
        let position = Self::next_position(&tx, draft.stage_id)?;
        tx.execute(
            "INSERT INTO deals (name, amount, stage_id, owner, position, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                draft.name.trim(),
                draft.amount,
                draft.stage_id,
                draft.owner,
                position,
                now,
                now
            ],
        )
        .with_context(|| format!("Failed to create deal: {}", draft.name))?;
        let id = tx.last_insert_rowid();
        Self::record_change(&tx, id, None, draft.stage_id, now)?;
        PipelineRepo::touch(&tx, pipeline_id)?;
        tx.commit()?;

        log::debug!("Created deal {} in stage {}", id, draft.stage_id);
        Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Deal {} vanished after insert", id))
    }

    /// Move a deal to another stage of the same pipeline
    ///
    /// Moving a deal onto the stage it already occupies changes nothing.
    pub fn move_to_stage(conn: &Connection, deal_id: i64, new_stage_id: i64) -> Result<Deal> {
        let deal = Self::get_by_id(conn, deal_id)?
            .ok_or_else(|| anyhow::anyhow!("Deal {} not found", deal_id))?;
        if deal.stage_id == new_stage_id {
            return Ok(deal);
        }

        let current_pipeline = Self::pipeline_of_stage(conn, deal.stage_id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", deal.stage_id))?;
        let target_pipeline = Self::pipeline_of_stage(conn, new_stage_id)?
            .ok_or_else(|| anyhow::anyhow!("Stage {} not found", new_stage_id))?;
        if current_pipeline != target_pipeline {
            anyhow::bail!(
                "Cannot move deal {} to stage {}: stage belongs to a different pipeline",
                deal_id, new_stage_id
            );
        }

        let tx = conn.unchecked_transaction()?;
        let now = chrono::Utc::now().timestamp();
        let position = Self::next_position(&tx, new_stage_id)?;
        tx.execute(
            "UPDATE deals SET stage_id = ?1, position = ?2, modified_ts = ?3 WHERE id = ?4",
            rusqlite::params![new_stage_id, position, now, deal_id],
        )
        .with_context(|| format!("Failed to move deal id={}", deal_id))?;
        Self::record_change(&tx, deal_id, Some(deal.stage_id), new_stage_id, now)?;
        PipelineRepo::touch(&tx, current_pipeline)?;
        tx.commit()?;

        log::debug!("Moved deal {} from stage {} to {}", deal_id, deal.stage_id, new_stage_id);
        Ok(Deal {
            stage_id: new_stage_id,
            ..deal
        })
    }

    /// Stage assignments of a deal, oldest first
    pub fn history(conn: &Connection, deal_id: i64) -> Result<Vec<StageChange>> {
        let mut stmt = conn.prepare(
            "SELECT deal_id, from_stage_id, to_stage_id, changed_ts
             FROM deal_stage_history WHERE deal_id = ?1 ORDER BY id"
        )?;
        let rows = stmt.query_map([deal_id], |row| {
            Ok(StageChange {
                deal_id: row.get(0)?,
                from_stage_id: row.get(1)?,
                to_stage_id: row.get(2)?,
                changed_ts: row.get(3)?,
            })
        })?;

        let mut changes = Vec::new();
        for row in rows {
            changes.push(row?);
        }
        Ok(changes)
    }

    fn pipeline_of_stage(conn: &Connection, stage_id: i64) -> Result<Option<i64>> {
        let pipeline_id = conn
            .query_row(
                "SELECT pipeline_id FROM stages WHERE id = ?1",
                [stage_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(pipeline_id)
    }

    fn next_position(conn: &Connection, stage_id: i64) -> Result<i64> {
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) FROM deals WHERE stage_id = ?1",
            [stage_id],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    fn record_change(
        conn: &Connection,
        deal_id: i64,
        from_stage_id: Option<i64>,
        to_stage_id: i64,
        changed_ts: i64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO deal_stage_history (deal_id, from_stage_id, to_stage_id, changed_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![deal_id, from_stage_id, to_stage_id, changed_ts],
        )?;
        Ok(())
    }
}
