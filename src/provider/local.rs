//! Data provider served from the embedded SQLite store.
//!
//! Implements the backend half of the board contract locally: stage
//! renumbering and deal moves happen in the repo layer, inside
//! transactions, so every snapshot read back is consistent.

use crate::models::{Deal, DealDraft, Pipeline, Stage, StageChange, StageDraft, StageUpdate};
use crate::provider::{DataProvider, ProviderError};
use crate::repo::{DealRepo, PipelineRepo, StageRepo};
use rusqlite::Connection;

pub struct LocalProvider {
    conn: Connection,
}

impl LocalProvider {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Stage assignments of a deal, oldest first
    pub fn deal_history(&self, deal_id: i64) -> Result<Vec<StageChange>, ProviderError> {
        if DealRepo::get_by_id(&self.conn, deal_id)?.is_none() {
            return Err(ProviderError::Rejected {
                message: format!("Deal {} not found", deal_id),
            });
        }
        Ok(DealRepo::history(&self.conn, deal_id)?)
    }
}

impl DataProvider for LocalProvider {
    fn list_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
        Ok(PipelineRepo::list(&self.conn)?)
    }

    fn create_pipeline(&self, name: &str) -> Result<Pipeline, ProviderError> {
        Ok(PipelineRepo::create(&self.conn, name)?)
    }

    fn create_stage(&self, pipeline_id: i64, draft: &StageDraft) -> Result<Stage, ProviderError> {
        Ok(StageRepo::create(&self.conn, pipeline_id, draft)?)
    }

    fn update_stage(&self, stage_id: i64, update: &StageUpdate) -> Result<Stage, ProviderError> {
        Ok(StageRepo::update(&self.conn, stage_id, update)?)
    }

    fn delete_stage(&self, stage_id: i64) -> Result<(), ProviderError> {
        Ok(StageRepo::delete(&self.conn, stage_id)?)
    }

    fn move_deal(&self, deal_id: i64, new_stage_id: i64) -> Result<Deal, ProviderError> {
        Ok(DealRepo::move_to_stage(&self.conn, deal_id, new_stage_id)?)
    }

    fn create_deal(&self, draft: &DealDraft) -> Result<Deal, ProviderError> {
        Ok(DealRepo::create(&self.conn, draft)?)
    }
}
