//! Cat family: player-controlled units.
//!
//! `Plan` accumulates path nodes as the player drags the cursor — each cursor sample is
//! accepted as a new node only if it falls `[min_distance, max_distance]` from the last
//! accepted node, and every accepted node costs one unit of the cat's energy budget.
//! `MovementExecute` walks the committed path node by node; `AttackExecute` covers
//! projectile and stomp attacks. Caged cats are passive until rescued, after which they
//! join a follower chain trailing the main cat.

use glam::Vec2;
use smallvec::SmallVec;
use tracing::debug;

use crate::entity::EntityId;
use crate::event::EventBus;
use crate::fsm::GameFsm;
use crate::scripts::{ScriptContext, ScriptType};
use crate::store::EntityStore;

/// Seconds of continuous obstacle contact before the cat snaps to its next node
/// (anti-wedge).
pub const OBSTACLE_WEDGE_TIMEOUT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatState {
    Plan,
    PlanAttack,
    MovementExecute,
    AttackExecute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathNode {
    pub position: Vec2,
    pub active: bool,
}

/// A cat's drawn-but-not-yet-committed (or committed) movement path plus its remaining
/// energy budget.
#[derive(Debug, Clone, PartialEq)]
pub struct CatPlan {
    pub nodes: SmallVec<[PathNode; 8]>,
    pub current_node: usize,
    pub energy: f32,
}

impl CatPlan {
    pub fn new(energy: f32) -> Self {
        Self { nodes: SmallVec::new(), current_node: 0, energy }
    }

    fn last_anchor(&self, origin: Vec2) -> Vec2 {
        self.nodes.last().map(|n| n.position).unwrap_or(origin)
    }

    /// Accepts `cursor` as a new path node if it is `[min_distance, max_distance]` from
    /// the last accepted node (or `origin`, for the first node) and energy remains.
    /// Returns whether a node was added.
    pub fn try_add_node(&mut self, origin: Vec2, cursor: Vec2, min_distance: f32, max_distance: f32) -> bool {
        if self.energy < 1.0 {
            return false;
        }
        let anchor = self.last_anchor(origin);
        let dist = anchor.distance(cursor);
        if dist < min_distance || dist > max_distance {
            return false;
        }
        self.nodes.push(PathNode { position: cursor, active: true });
        self.energy -= 1.0;
        true
    }
}

/// Per-cat undo snapshot, restored verbatim by `TurnController::undo`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatPlanSnapshot {
    pub plan: CatPlan,
    pub position: Vec2,
}

#[derive(Debug, Clone)]
pub struct CatAgent {
    pub state: CatState,
    pub plan: CatPlan,
    pub movement_speed: f32,
    pub min_node_distance: f32,
    pub max_node_distance: f32,
    pub arrival_forgiveness: f32,
    pub is_caged: bool,
    pub is_main_cat: bool,
    pub finished_execution: bool,
    pub obstacle_contact_timer: f32,
    pub followers: SmallVec<[EntityId; 4]>,
    pub follow_distance: f32,
    pub health: f32,
}

impl CatAgent {
    pub fn new(max_energy: f32) -> Self {
        Self {
            state: CatState::Plan,
            plan: CatPlan::new(max_energy),
            movement_speed: 4.0,
            min_node_distance: 10.0,
            max_node_distance: 50.0,
            arrival_forgiveness: 0.25,
            is_caged: false,
            is_main_cat: false,
            finished_execution: true,
            obstacle_contact_timer: 0.0,
            followers: SmallVec::new(),
            follow_distance: 1.5,
            health: 100.0,
        }
    }

    /// Takes a snapshot suitable for `TurnController::undo`.
    pub fn snapshot(&self, position: Vec2) -> CatPlanSnapshot {
        CatPlanSnapshot { plan: self.plan.clone(), position }
    }

    pub fn restore(&mut self, snapshot: &CatPlanSnapshot) -> Vec2 {
        self.plan = snapshot.plan.clone();
        snapshot.position
    }

    /// Commits the drawn path: transitions to execution once the turn advances.
    pub fn commit(&mut self) {
        self.plan.current_node = 0;
        self.finished_execution = false;
    }

    /// Advances movement execution by `dt`. `position` is mutated in place; returns
    /// `true` once the path is exhausted (`finished_execution`).
    pub fn advance_movement(&mut self, position: &mut Vec2, dt: f32) -> bool {
        if self.plan.current_node >= self.plan.nodes.len() {
            self.finished_execution = true;
            return true;
        }
        let target = self.plan.nodes[self.plan.current_node].position;
        let to_target = target - *position;
        let dist = to_target.length();
        let step = self.movement_speed * dt;

        if dist <= self.arrival_forgiveness || dist <= step {
            *position = target;
            self.plan.nodes[self.plan.current_node].active = false;
            self.plan.current_node += 1;
            self.obstacle_contact_timer = 0.0;
        } else {
            *position += to_target / dist * step;
        }
        false
    }

    /// Called once per physics step while the cat is overlapping a non-trigger
    /// obstacle. After `OBSTACLE_WEDGE_TIMEOUT` seconds of continuous contact, the cat
    /// snaps past the blocked node (anti-wedge).
    pub fn report_obstacle_contact(&mut self, position: &mut Vec2, dt: f32) {
        self.obstacle_contact_timer += dt;
        if self.obstacle_contact_timer >= OBSTACLE_WEDGE_TIMEOUT
            && self.plan.current_node < self.plan.nodes.len()
        {
            *position = self.plan.nodes[self.plan.current_node].position;
            self.plan.nodes[self.plan.current_node].active = false;
            self.plan.current_node += 1;
            self.obstacle_contact_timer = 0.0;
        }
    }

    pub fn clear_obstacle_contact(&mut self) {
        self.obstacle_contact_timer = 0.0;
    }

    /// Appends `follower` to the chain trailing this cat: a main-cat trigger contact
    /// with a caged cat rescues it, appending it to the follower chain.
    pub fn rescue(&mut self, follower: EntityId) {
        if !self.followers.contains(&follower) {
            self.followers.push(follower);
        }
    }

    /// Each follower trails the preceding member (or the main cat, for the first
    /// follower) by `follow_distance` along the mover's motion vector, evaluated
    /// against its previous-frame position.
    pub fn follower_target(leader_prev_position: Vec2, leader_position: Vec2, follow_distance: f32) -> Vec2 {
        let motion = leader_position - leader_prev_position;
        if motion.length() < f32::EPSILON {
            return leader_prev_position;
        }
        leader_prev_position - motion.normalize() * follow_distance + motion
    }
}

/// Adapts [`CatAgent`] to the [`ScriptType`] lifecycle so `ScriptRuntime` can drive it
/// alongside any other attached script.
pub struct CatScript {
    agents: std::collections::HashMap<EntityId, CatAgent>,
    default_energy: f32,
}

impl CatScript {
    pub fn new(default_energy: f32) -> Self {
        Self { agents: std::collections::HashMap::new(), default_energy }
    }

    pub fn agent(&self, id: EntityId) -> Option<&CatAgent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut CatAgent> {
        self.agents.get_mut(&id)
    }
}

impl ScriptType for CatScript {
    fn key(&self) -> &'static str {
        "cat"
    }

    fn init(&mut self, id: EntityId, ctx: &mut ScriptContext) {
        let agent = CatAgent::new(self.default_energy);
        ctx.store.assign(id, crate::components::Huntable { is_caged: agent.is_caged });
        self.agents.insert(id, agent);
        debug!(entity = id.0, "cat agent initialized");
    }

    fn update(&mut self, id: EntityId, dt: f32, ctx: &mut ScriptContext) {
        use crate::fsm::GameState;
        let Some(agent) = self.agents.get_mut(&id) else { return };

        // Keep the `Huntable` marker (a plain store component, scanned by rats without
        // reaching across script types) in sync with the agent's own `is_caged` flag.
        if let Ok(h) = ctx.store.try_get_mut::<crate::components::Huntable>(id) {
            h.is_caged = agent.is_caged;
        }

        if ctx.fsm.current() == GameState::Execute && agent.state == CatState::MovementExecute {
            if let Ok(mut t) = ctx.store.try_get::<crate::components::Transform>(id).copied() {
                agent.advance_movement(&mut t.position, dt);
                ctx.store.assign(id, t);
            }
        }
    }

    fn destroy(&mut self, id: EntityId, _ctx: &mut ScriptContext) {
        self.agents.remove(&id);
    }

    fn on_detach(&mut self, id: EntityId, _ctx: &mut ScriptContext) {
        self.agents.remove(&id);
    }

    fn finished_execution(&self, id: EntityId) -> Option<bool> {
        self.agents.get(&id).map(|a| a.finished_execution)
    }
}
