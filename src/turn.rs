//! `TurnController`: planning-commit coordination, execution polling, and the global
//! undo stack.
//!
//! During `PLANNING` it tracks which active cats have committed a plan; once every
//! active cat is ready it requests `GameFSM::request_execute`. During `EXECUTE` it polls
//! `finishedExecution` on every agent and, once all report done, waits a small tail
//! delay for animations before requesting `PLANNING` again and resetting per-turn state.
//!
//! The undo stack is global and LIFO across all cats, following the original
//! `CatController_v2_0`: popping restores whichever cat committed most recently, not a
//! per-cat stack.

use std::collections::HashSet;

use tracing::debug;

use crate::agents::cat::CatPlanSnapshot;
use crate::entity::EntityId;
use crate::fsm::GameFsm;

/// Seconds to wait after every agent reports `finishedExecution` before requesting
/// `PLANNING`, to let in-flight animations settle.
pub const EXECUTION_TAIL_DELAY: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    Attack,
    Stomp,
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub entity: EntityId,
    pub action: ActionKind,
    pub snapshot: CatPlanSnapshot,
}

pub struct TurnController {
    active_cats: HashSet<EntityId>,
    ready: HashSet<EntityId>,
    undo_stack: Vec<UndoRecord>,
    awaiting_execute_request: bool,
    execution_tail_elapsed: f32,
    tail_delay: f32,
}

impl TurnController {
    pub fn new() -> Self {
        Self {
            active_cats: HashSet::new(),
            ready: HashSet::new(),
            undo_stack: Vec::new(),
            awaiting_execute_request: false,
            execution_tail_elapsed: 0.0,
            tail_delay: EXECUTION_TAIL_DELAY,
        }
    }

    pub fn set_active_cats(&mut self, cats: impl IntoIterator<Item = EntityId>) {
        self.active_cats = cats.into_iter().collect();
        self.ready.retain(|id| self.active_cats.contains(id));
    }

    /// Records a commit signal from `entity` plus an undo snapshot; pushes onto the
    /// global undo stack and adds `entity` to the ready-set.
    pub fn commit(&mut self, entity: EntityId, action: ActionKind, snapshot: CatPlanSnapshot) {
        self.ready.insert(entity);
        self.undo_stack.push(UndoRecord { entity, action, snapshot });
        debug!(entity = entity.0, action = ?action, "plan committed");
    }

    /// True once every active cat has committed this planning phase.
    pub fn all_ready(&self) -> bool {
        !self.active_cats.is_empty() && self.ready.is_superset(&self.active_cats)
    }

    /// Call once per planning-phase frame: raises `PLANNING -> EXECUTE` once the
    /// ready-set covers every active cat.
    pub fn poll_planning(&mut self, fsm: &mut GameFsm) {
        if self.all_ready() {
            fsm.request_execute();
            self.ready.clear();
        }
    }

    /// Pops the most recently committed record (global LIFO across all cats) and
    /// removes that cat from the ready-set so it must re-commit.
    pub fn undo(&mut self) -> Option<UndoRecord> {
        let record = self.undo_stack.pop()?;
        self.ready.remove(&record.entity);
        Some(record)
    }

    /// Call once per execution-phase frame with whether every agent currently reports
    /// `finishedExecution`. Once true, waits `tail_delay` seconds before requesting
    /// `PLANNING` and resetting per-turn bookkeeping.
    pub fn poll_execution(&mut self, all_finished: bool, dt: f32, fsm: &mut GameFsm) {
        if !all_finished {
            self.execution_tail_elapsed = 0.0;
            return;
        }
        self.execution_tail_elapsed += dt;
        if self.execution_tail_elapsed >= self.tail_delay {
            fsm.request_planning();
            self.reset_turn_state();
        }
    }

    /// Clears attack selections / path-node state proxies (the undo stack and ready
    /// set) at the top of a new planning turn. Agent-local per-turn state (path nodes,
    /// rat detection containers) is reset by each agent's own script on the same edge.
    fn reset_turn_state(&mut self) {
        self.ready.clear();
        self.undo_stack.clear();
        self.execution_tail_elapsed = 0.0;
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new()
    }
}
