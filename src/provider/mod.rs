//! Data providers: the seam between the board and whoever owns the data.
//!
//! The board never holds a durable copy of anything. It reads full
//! snapshots through [`DataProvider::list_pipelines`] and issues targeted
//! mutations; the provider is the source of truth.

pub mod http;
pub mod local;

pub use http::{HttpProvider, Session};
pub use local::LocalProvider;

use crate::models::{Deal, DealDraft, Pipeline, Stage, StageDraft, StageUpdate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a provider call failed
///
/// The board treats every variant the same way (a user-visible
/// notification); the split exists for logging and for the CLI exit code.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {code} - {reason}")]
    Status { code: u16, reason: String },

    #[error("{message}")]
    Rejected { message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response did not include data")]
    MissingData,

    #[error("{0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::Store(err)
    }
}

/// Response envelope shared by every backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn failure(message: &str) -> Self {
        Self { success: false, data: None, message: Some(message.to_string()) }
    }

    /// Anything other than `success: true` is a rejection
    pub fn into_result(self) -> Result<Option<T>, ProviderError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ProviderError::Rejected {
                message: self.message.unwrap_or_else(|| "request was rejected".to_string()),
            })
        }
    }

    /// Like `into_result`, but `data` must be present
    pub fn into_data(self) -> Result<T, ProviderError> {
        self.into_result()?.ok_or(ProviderError::MissingData)
    }
}

/// Backend operations the board depends on
///
/// Mirrors the REST surface: `GET /pipelines`, `POST /pipelines`,
/// `POST /pipelines/{id}/stages`, `PUT /pipelines/stages/{id}`,
/// `DELETE /pipelines/stages/{id}`, `PUT /deals/{id}/stage` and
/// `POST /deals`.
pub trait DataProvider {
    /// Every pipeline with nested stages and deals
    fn list_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError>;

    fn create_pipeline(&self, name: &str) -> Result<Pipeline, ProviderError>;

    fn create_stage(&self, pipeline_id: i64, draft: &StageDraft) -> Result<Stage, ProviderError>;

    /// Update a stage; a changed `stage_order` reorders the whole pipeline
    fn update_stage(&self, stage_id: i64, update: &StageUpdate) -> Result<Stage, ProviderError>;

    fn delete_stage(&self, stage_id: i64) -> Result<(), ProviderError>;

    fn move_deal(&self, deal_id: i64, new_stage_id: i64) -> Result<Deal, ProviderError>;

    fn create_deal(&self, draft: &DealDraft) -> Result<Deal, ProviderError>;
}

impl<P: DataProvider + ?Sized> DataProvider for Box<P> {
    fn list_pipelines(&self) -> Result<Vec<Pipeline>, ProviderError> {
        (**self).list_pipelines()
    }

    fn create_pipeline(&self, name: &str) -> Result<Pipeline, ProviderError> {
        (**self).create_pipeline(name)
    }

    fn create_stage(&self, pipeline_id: i64, draft: &StageDraft) -> Result<Stage, ProviderError> {
        (**self).create_stage(pipeline_id, draft)
    }

    fn update_stage(&self, stage_id: i64, update: &StageUpdate) -> Result<Stage, ProviderError> {
        (**self).update_stage(stage_id, update)
    }

    fn delete_stage(&self, stage_id: i64) -> Result<(), ProviderError> {
        (**self).delete_stage(stage_id)
    }

    fn move_deal(&self, deal_id: i64, new_stage_id: i64) -> Result<Deal, ProviderError> {
        (**self).move_deal(deal_id, new_stage_id)
    }

    fn create_deal(&self, draft: &DealDraft) -> Result<Deal, ProviderError> {
        (**self).create_deal(draft)
    }
}
