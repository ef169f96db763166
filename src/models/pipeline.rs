use serde::{Deserialize, Serialize};
use crate::models::{Deal, Stage};

/// Pipeline model
///
/// A named, ordered collection of stages. Aggregates are always recomputed
/// from the stages; totals sent by a backend are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Sort stages by order index (snapshots may arrive unsorted)
    pub fn sort_stages(&mut self) {
        self.stages.sort_by_key(|s| s.stage_order);
    }

    /// Set each nested stage's pipeline id and each nested deal's stage id
    /// from the parent that holds it
    pub fn adopt_children(&mut self) {
        for stage in &mut self.stages {
            stage.pipeline_id = self.id;
            for deal in &mut stage.deals {
                deal.stage_id = stage.id;
            }
        }
    }

    pub fn deal_count(&self) -> usize {
        self.stages.iter().map(|s| s.deal_count()).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.stages.iter().map(|s| s.total_value()).sum()
    }

    pub fn stage(&self, stage_id: i64) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Find a deal and the stage currently holding it
    pub fn deal(&self, deal_id: i64) -> Option<(&Stage, &Deal)> {
        self.stages.iter().find_map(|stage| {
            stage.deals.iter()
                .find(|d| d.id == deal_id)
                .map(|deal| (stage, deal))
        })
    }

    /// Stage orders are unique and exactly 1..=N
    pub fn has_contiguous_order(&self) -> bool {
        let mut orders: Vec<i64> = self.stages.iter().map(|s| s.stage_order).collect();
        orders.sort_unstable();
        orders.iter().enumerate().all(|(i, order)| *order == i as i64 + 1)
    }
}

/// Payload for creating a pipeline (`POST /pipelines`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDraft {
    pub name: String,
}

impl PipelineDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            Err("Pipeline name cannot be empty".to_string())
        } else {
            Ok(())
        }
    }
}
