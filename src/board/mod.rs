//! The pipeline board: one selected pipeline, its stages side by side, and
//! the drag gesture that reorders stages or moves deals.
//!
//! Every mutation is request-then-refresh. The board applies nothing
//! locally; it sends the request, waits for the answer and, on success,
//! replaces its snapshot wholesale with a fresh fetch. A failed request
//! leaves the last good snapshot in place and raises an error
//! notification. Provider errors never escape the board.
//!
//! # Example
//!
//! ```no_run
//! use pipeboard::board::{Board, DropOutcome, EntityRef, Notification};
//! use pipeboard::db::DbConnection;
//! use pipeboard::provider::LocalProvider;
//!
//! let provider = LocalProvider::new(DbConnection::connect_in_memory().unwrap());
//! let mut board = Board::new(provider, Vec::<Notification>::new());
//! board.load();
//! if board.begin_drag(EntityRef::Deal(1)) {
//!     board.hover_target(2);
//!     let outcome = board.drop(2);
//!     board.end_drag();
//!     assert_ne!(outcome, DropOutcome::NoSession);
//! }
//! ```

pub mod drag;
pub mod notify;

pub use drag::*;
pub use notify::*;

use crate::models::{Deal, DealDraft, Pipeline, PipelineDraft, Stage, StageDraft, StageUpdate};
use crate::provider::{DataProvider, ProviderError};

/// Result of a drop gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag was in progress
    NoSession,
    /// Nothing to change; no request was sent
    NoOp,
    /// The backend accepted the change and the snapshot was reloaded
    Applied,
    /// The backend refused or could not be reached; snapshot unchanged
    Failed,
}

pub struct Board<P: DataProvider, N: Notifier> {
    provider: P,
    notifier: N,
    pipelines: Vec<Pipeline>,
    selected: Option<i64>,
    drag: DragController,
}

impl<P: DataProvider, N: Notifier> Board<P, N> {
    pub fn new(provider: P, notifier: N) -> Self {
        Self {
            provider,
            notifier,
            pipelines: Vec::new(),
            selected: None,
            drag: DragController::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Every pipeline from the last successful fetch
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn selected_pipeline_id(&self) -> Option<i64> {
        self.selected
    }

    /// Snapshot of the selected pipeline
    pub fn pipeline(&self) -> Option<&Pipeline> {
        let id = self.selected?;
        self.pipelines.iter().find(|p| p.id == id)
    }

    pub fn phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    pub fn highlighted_stage(&self) -> Option<i64> {
        self.drag.highlighted()
    }

    /// Fetch all pipelines and select the first one if nothing is selected
    pub fn load(&mut self) -> bool {
        if !self.refresh() {
            return false;
        }
        if self.selected.is_none() {
            self.selected = self.pipelines.first().map(|p| p.id);
        }
        true
    }

    /// Switch the displayed pipeline and fetch a fresh snapshot
    pub fn select_pipeline(&mut self, pipeline_id: i64) -> bool {
        log::debug!("Selecting pipeline {}", pipeline_id);
        self.selected = Some(pipeline_id);
        if !self.refresh() {
            return false;
        }
        if self.pipeline().is_none() {
            self.warn(format!("Pipeline {} not found", pipeline_id));
            return false;
        }
        true
    }

    /// Replace the snapshot with whatever the provider returns now
    ///
    /// A failed fetch leaves the board empty rather than stale.
    pub fn refresh(&mut self) -> bool {
        match self.provider.list_pipelines() {
            Ok(mut pipelines) => {
                for pipeline in &mut pipelines {
                    pipeline.sort_stages();
                }
                log::debug!("Loaded {} pipeline(s)", pipelines.len());
                self.pipelines = pipelines;
                true
            }
            Err(err) => {
                log::warn!("Failed to load pipelines: {}", err);
                self.pipelines.clear();
                self.error(format!("Failed to load pipelines: {}", err));
                false
            }
        }
    }

    /// Pick up a stage or a deal from the selected pipeline
    ///
    /// Returns false when the entity is not on the board or a drop is
    /// still in flight.
    pub fn begin_drag(&mut self, entity: EntityRef) -> bool {
        let captured = match self.pipeline() {
            Some(pipeline) => match entity {
                EntityRef::Stage(id) => pipeline.stage(id)
                    .map(|stage| DraggedEntity::Stage(stage_without_deals(stage))),
                EntityRef::Deal(id) => pipeline.deal(id)
                    .map(|(_, deal)| DraggedEntity::Deal(deal.clone())),
            },
            None => None,
        };

        match captured {
            Some(entity) => self.drag.begin(entity),
            None => {
                log::debug!("Ignoring drag start for {:?}: not on the board", entity);
                false
            }
        }
    }

    /// Pointer is over a stage's drop region
    pub fn hover_target(&mut self, stage_id: i64) {
        self.drag.hover(stage_id);
    }

    /// Pointer left a stage's drop region towards `entering`
    pub fn leave_target(&mut self, stage_id: i64, entering: Option<DropRegion>) {
        self.drag.leave(stage_id, entering);
    }

    /// Gesture finished, with or without a drop
    pub fn end_drag(&mut self) {
        self.drag.end();
    }

    /// Release the dragged entity over `target_stage_id`
    pub fn drop(&mut self, target_stage_id: i64) -> DropOutcome {
        let Some(session) = self.drag.take_for_drop() else {
            return DropOutcome::NoSession;
        };

        let outcome = match &session.entity {
            DraggedEntity::Stage(stage) => self.drop_stage(stage, target_stage_id),
            DraggedEntity::Deal(deal) => self.drop_deal(deal, target_stage_id),
        };

        self.drag.finish_drop();
        log::debug!(
            "Drop of {} {} on stage {}: {:?}",
            session.entity.kind().as_str(),
            session.entity.id(),
            target_stage_id,
            outcome
        );
        outcome
    }

    fn drop_stage(&mut self, dragged: &Stage, target_stage_id: i64) -> DropOutcome {
        let Some(target_order) = self.pipeline()
            .and_then(|p| p.stage(target_stage_id))
            .map(|s| s.stage_order)
        else {
            self.warn(format!("Stage {} is not on this board", target_stage_id));
            return DropOutcome::NoOp;
        };

        if target_order == dragged.stage_order {
            return DropOutcome::NoOp;
        }

        let mut update = StageUpdate::from_stage(dragged);
        update.stage_order = target_order;
        let result = self.provider.update_stage(dragged.id, &update);
        match self.settle(result, "Failed to reorder stage", |_| {
            format!("Moved stage '{}' to position {}", dragged.name, target_order)
        }) {
            Some(_) => DropOutcome::Applied,
            None => DropOutcome::Failed,
        }
    }

    fn drop_deal(&mut self, dragged: &Deal, target_stage_id: i64) -> DropOutcome {
        if target_stage_id == dragged.stage_id {
            return DropOutcome::NoOp;
        }
        let Some(target_name) = self.pipeline()
            .and_then(|p| p.stage(target_stage_id))
            .map(|s| s.name.clone())
        else {
            self.warn(format!("Stage {} is not on this board", target_stage_id));
            return DropOutcome::NoOp;
        };

        let result = self.provider.move_deal(dragged.id, target_stage_id);
        match self.settle(result, "Failed to move deal", |_| {
            format!("Moved '{}' to {}", dragged.name, target_name)
        }) {
            Some(_) => DropOutcome::Applied,
            None => DropOutcome::Failed,
        }
    }

    /// Create a pipeline and select it
    pub fn create_pipeline(&mut self, name: &str) -> Option<Pipeline> {
        let draft = PipelineDraft { name: name.to_string() };
        if let Err(message) = draft.validate() {
            self.error(message);
            return None;
        }

        let result = self.provider.create_pipeline(name.trim());
        if let Ok(pipeline) = &result {
            self.selected = Some(pipeline.id);
        }
        self.settle(result, "Failed to create pipeline", |pipeline| {
            format!("Created pipeline '{}' (id: {})", pipeline.name, pipeline.id)
        })
    }

    pub fn create_stage(&mut self, pipeline_id: i64, draft: &StageDraft) -> Option<Stage> {
        if let Err(message) = draft.validate() {
            self.error(message);
            return None;
        }

        let result = self.provider.create_stage(pipeline_id, draft);
        self.settle(result, "Failed to create stage", |stage| {
            format!("Created stage '{}' (id: {}) at position {}", stage.name, stage.id, stage.stage_order)
        })
    }

    pub fn update_stage(&mut self, stage_id: i64, update: &StageUpdate) -> Option<Stage> {
        if let Err(message) = update.validate() {
            self.error(message);
            return None;
        }

        let result = self.provider.update_stage(stage_id, update);
        self.settle(result, "Failed to update stage", |stage| {
            format!("Updated stage '{}' (id: {})", stage.name, stage.id)
        })
    }

    pub fn delete_stage(&mut self, stage_id: i64) -> bool {
        let result = self.provider.delete_stage(stage_id);
        self.settle(result, "Failed to delete stage", |_| {
            format!("Deleted stage {}", stage_id)
        })
        .is_some()
    }

    pub fn create_deal(&mut self, draft: &DealDraft) -> Option<Deal> {
        if let Err(message) = draft.validate() {
            self.error(message);
            return None;
        }

        let result = self.provider.create_deal(draft);
        self.settle(result, "Failed to create deal", |deal| {
            format!("Created deal '{}' (id: {})", deal.name, deal.id)
        })
    }

    /// Report a mutation's result and reload on success
    fn settle<T>(
        &mut self,
        result: Result<T, ProviderError>,
        failure: &str,
        success: impl FnOnce(&T) -> String,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                self.notifier.notify(Notification::new(NotificationLevel::Success, success(&value)));
                self.refresh();
                Some(value)
            }
            Err(err) => {
                log::warn!("{}: {}", failure, err);
                self.error(format!("{}: {}", failure, err));
                None
            }
        }
    }

    fn error(&mut self, message: String) {
        self.notifier.notify(Notification::new(NotificationLevel::Error, message));
    }

    fn warn(&mut self, message: String) {
        self.notifier.notify(Notification::new(NotificationLevel::Warning, message));
    }
}

/// The drag only needs the stage's own fields
fn stage_without_deals(stage: &Stage) -> Stage {
    Stage {
        deals: Vec::new(),
        ..stage.clone()
    }
}
