//! Pointer-gesture state for the board.
//!
//! Phases: `Idle -> Dragging -> Dropping -> Idle`, plus `Dragging -> Idle`
//! when the gesture ends without a drop. At most one session exists, and it
//! never outlives `end` or a completed drop.

use crate::models::{Deal, Stage};

/// Type tag of the dragged entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Stage,
    Deal,
}

impl DragKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DragKind::Stage => "stage",
            DragKind::Deal => "deal",
        }
    }
}

/// What the pointer picked up, by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Stage(i64),
    Deal(i64),
}

/// The dragged entity as it looked in the snapshot when the drag began
#[derive(Debug, Clone, PartialEq)]
pub enum DraggedEntity {
    Stage(Stage),
    Deal(Deal),
}

impl DraggedEntity {
    pub fn kind(&self) -> DragKind {
        match self {
            DraggedEntity::Stage(_) => DragKind::Stage,
            DraggedEntity::Deal(_) => DragKind::Deal,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            DraggedEntity::Stage(stage) => stage.id,
            DraggedEntity::Deal(deal) => deal.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub entity: DraggedEntity,
    /// Stage currently highlighted as the drop candidate
    pub hover: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    /// A drop's request is in flight
    Dropping,
}

/// A hit-test area on the board
///
/// Deal cards are child regions of the column that holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropRegion {
    pub stage_id: i64,
}

impl DropRegion {
    pub fn stage(stage_id: i64) -> Self {
        Self { stage_id }
    }

    /// Any deal card inside the column of `stage_id`
    pub fn deal_card(stage_id: i64) -> Self {
        Self { stage_id }
    }

    /// True when this region lies inside the column of `stage_id`
    pub fn is_within(&self, stage_id: i64) -> bool {
        self.stage_id == stage_id
    }
}

#[derive(Debug)]
pub struct DragController {
    session: Option<DragSession>,
    phase: DragPhase,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self { session: None, phase: DragPhase::Idle }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn highlighted(&self) -> Option<i64> {
        self.session.as_ref().and_then(|s| s.hover)
    }

    /// Start a session; refused while a drop is still in flight
    pub fn begin(&mut self, entity: DraggedEntity) -> bool {
        if self.phase == DragPhase::Dropping {
            log::debug!("Ignoring drag start: a drop is still in flight");
            return false;
        }
        log::debug!("Drag start: {} {}", entity.kind().as_str(), entity.id());
        self.session = Some(DragSession { entity, hover: None });
        self.phase = DragPhase::Dragging;
        true
    }

    pub fn hover(&mut self, stage_id: i64) {
        if self.phase != DragPhase::Dragging {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if session.hover != Some(stage_id) {
                session.hover = Some(stage_id);
            }
        }
    }

    /// Pointer left the column of `stage_id` towards `entering`
    ///
    /// Crossing into a child of the same column keeps the highlight.
    pub fn leave(&mut self, stage_id: i64, entering: Option<DropRegion>) {
        if entering.is_some_and(|region| region.is_within(stage_id)) {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if session.hover == Some(stage_id) {
                session.hover = None;
            }
        }
    }

    /// Move to `Dropping` and hand out the session
    pub fn take_for_drop(&mut self) -> Option<DragSession> {
        if self.phase != DragPhase::Dragging {
            return None;
        }
        let session = self.session.take()?;
        self.phase = DragPhase::Dropping;
        Some(session)
    }

    pub fn finish_drop(&mut self) {
        self.session = None;
        self.phase = DragPhase::Idle;
    }

    /// Gesture over, dropped or cancelled
    pub fn end(&mut self) {
        if self.phase == DragPhase::Dropping {
            // The drop owns the session now; it returns to Idle when it completes
            return;
        }
        if self.session.take().is_some() {
            log::debug!("Drag end");
        }
        self.phase = DragPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(id: i64, stage_id: i64) -> DraggedEntity {
        DraggedEntity::Deal(Deal {
            id,
            name: format!("D{}", id),
            amount: 100.0,
            stage_id,
            owner: None,
        })
    }

    #[test]
    fn test_begin_hover_end() {
        let mut drag = DragController::new();
        assert_eq!(drag.phase(), DragPhase::Idle);

        assert!(drag.begin(deal(1, 10)));
        assert_eq!(drag.phase(), DragPhase::Dragging);
        assert_eq!(drag.session().unwrap().entity.kind(), DragKind::Deal);

        drag.hover(11);
        drag.hover(11);
        assert_eq!(drag.highlighted(), Some(11));

        drag.end();
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.session().is_none());
    }

    #[test]
    fn test_hover_without_session_has_no_effect() {
        let mut drag = DragController::new();
        drag.hover(3);
        assert_eq!(drag.highlighted(), None);

        drag.begin(deal(1, 10));
        drag.end();
        drag.hover(3);
        assert_eq!(drag.highlighted(), None);
    }

    #[test]
    fn test_leave_into_child_keeps_highlight() {
        let mut drag = DragController::new();
        drag.begin(deal(1, 10));
        drag.hover(11);

        drag.leave(11, Some(DropRegion::deal_card(11)));
        assert_eq!(drag.highlighted(), Some(11));

        drag.leave(11, Some(DropRegion::stage(12)));
        assert_eq!(drag.highlighted(), None);
    }

    #[test]
    fn test_leave_board_clears_highlight() {
        let mut drag = DragController::new();
        drag.begin(deal(1, 10));
        drag.hover(11);
        drag.leave(11, None);
        assert_eq!(drag.highlighted(), None);
    }

    #[test]
    fn test_leave_other_column_keeps_current_highlight() {
        let mut drag = DragController::new();
        drag.begin(deal(1, 10));
        drag.hover(12);
        drag.leave(11, None);
        assert_eq!(drag.highlighted(), Some(12));
    }

    #[test]
    fn test_drop_phase_blocks_new_drag() {
        let mut drag = DragController::new();
        drag.begin(deal(1, 10));
        let session = drag.take_for_drop().unwrap();
        assert_eq!(session.entity.id(), 1);
        assert_eq!(drag.phase(), DragPhase::Dropping);

        assert!(!drag.begin(deal(2, 10)));
        drag.end();
        assert_eq!(drag.phase(), DragPhase::Dropping);

        drag.finish_drop();
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.begin(deal(2, 10)));
    }

    #[test]
    fn test_take_for_drop_requires_session() {
        let mut drag = DragController::new();
        assert!(drag.take_for_drop().is_none());
        assert_eq!(drag.phase(), DragPhase::Idle);
    }
}
