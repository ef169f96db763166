use serde::{Deserialize, Serialize};
use crate::models::Deal;

/// Stage type (where a deal at this step sits in the sales outcome)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageType {
    Open,
    Won,
    Lost,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Open => "OPEN",
            StageType::Won => "WON",
            StageType::Lost => "LOST",
        }
    }

    /// Parse a stage type, case-insensitive
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(StageType::Open),
            "WON" => Some(StageType::Won),
            "LOST" => Some(StageType::Lost),
            _ => None,
        }
    }
}

impl Default for StageType {
    fn default() -> Self {
        StageType::Open
    }
}

/// Stage model
///
/// One step in a pipeline. `stage_order` is 1-based and contiguous within
/// the owning pipeline; the backend renumbers on every reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: i64,
    #[serde(default)]
    pub pipeline_id: i64,
    pub name: String,
    pub stage_order: i64,
    #[serde(default)]
    pub stage_type: StageType,
    #[serde(default)]
    pub win_probability: u8,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

impl Stage {
    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    pub fn total_value(&self) -> f64 {
        self.deals.iter().map(|d| d.amount).sum()
    }

    /// Total value weighted by the stage's win probability
    pub fn weighted_value(&self) -> f64 {
        self.total_value() * f64::from(self.win_probability) / 100.0
    }

    pub fn contains_deal(&self, deal_id: i64) -> bool {
        self.deals.iter().any(|d| d.id == deal_id)
    }
}

/// Payload for creating a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDraft {
    pub name: String,
    /// Requested position; `None` appends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_order: Option<i64>,
    pub stage_type: StageType,
    pub win_probability: u8,
}

impl StageDraft {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stage_order: None,
            stage_type: StageType::Open,
            win_probability: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_stage_name(&self.name)?;
        validate_win_probability(self.win_probability)?;
        if let Some(order) = self.stage_order {
            validate_stage_order(order)?;
        }
        Ok(())
    }
}

/// Full stage update payload (`PUT /pipelines/stages/{id}`)
///
/// A changed `stage_order` asks the backend to move the stage there and
/// renumber the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub pipeline_id: i64,
    pub stage_order: i64,
    pub name: String,
    pub stage_type: StageType,
    pub win_probability: u8,
}

impl StageUpdate {
    /// Start from the stage's current values
    pub fn from_stage(stage: &Stage) -> Self {
        Self {
            pipeline_id: stage.pipeline_id,
            stage_order: stage.stage_order,
            name: stage.name.clone(),
            stage_type: stage.stage_type,
            win_probability: stage.win_probability,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_stage_name(&self.name)?;
        validate_win_probability(self.win_probability)?;
        validate_stage_order(self.stage_order)
    }
}

pub fn validate_stage_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        Err("Stage name cannot be empty".to_string())
    } else {
        Ok(())
    }
}

pub fn validate_win_probability(probability: u8) -> Result<(), String> {
    if probability > 100 {
        Err(format!("Invalid win probability: {}. Must be between 0 and 100.", probability))
    } else {
        Ok(())
    }
}

pub fn validate_stage_order(order: i64) -> Result<(), String> {
    if order < 1 {
        Err(format!("Invalid stage order: {}. Stage order starts at 1.", order))
    } else {
        Ok(())
    }
}
