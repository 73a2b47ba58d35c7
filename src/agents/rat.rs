//! Rat family: enemy units.
//!
//! `Idle` samples a detection radius each physics step; detecting an uncaged cat moves
//! to `Hunt`, which is budgeted in turns rather than real time — each planning phase
//! re-aims at the target, each execution phase walks toward it. Losing the target or
//! exhausting the budget falls back to `Return`, which walks the rat home and drops it
//! back to `Idle` on arrival. `Attack` is a simple delay-then-window state.

use glam::Vec2;
use tracing::debug;

use crate::components::{Huntable, Transform};
use crate::entity::EntityId;
use crate::fsm::GameState;
use crate::scripts::{ScriptContext, ScriptType};
use crate::store::ComponentMask;

pub const DEFAULT_HUNT_BUDGET_TURNS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatState {
    Idle,
    Hunt,
    Return,
    Attack,
}

#[derive(Debug, Clone)]
pub struct RatAgent {
    pub state: RatState,
    pub target: Option<EntityId>,
    pub hunt_turns_remaining: u32,
    pub hunt_budget_turns: u32,
    pub original_position: Vec2,
    pub movement_speed: f32,
    pub detection_radius: f32,
    pub min_distance_to_target: f32,
    pub attack_delay: f32,
    pub attack_duration: f32,
    pub attack_timer: f32,
    pub finished_execution: bool,
    attacked_this_execution: std::collections::HashSet<EntityId>,
}

impl RatAgent {
    pub fn new(original_position: Vec2) -> Self {
        Self {
            state: RatState::Idle,
            target: None,
            hunt_turns_remaining: 0,
            hunt_budget_turns: DEFAULT_HUNT_BUDGET_TURNS,
            original_position,
            movement_speed: 3.0,
            detection_radius: 40.0,
            min_distance_to_target: 1.0,
            attack_delay: 0.3,
            attack_duration: 0.5,
            attack_timer: 0.0,
            finished_execution: true,
            attacked_this_execution: std::collections::HashSet::new(),
        }
    }

    /// Physics-step detection sample taken while `Idle`. Transitions to `Hunt` if
    /// `cat_position` is within `detection_radius` and the cat is not caged.
    pub fn sample_detection(&mut self, self_position: Vec2, cat_id: EntityId, cat_position: Vec2, cat_is_caged: bool) {
        if self.state != RatState::Idle || cat_is_caged {
            return;
        }
        if self_position.distance(cat_position) <= self.detection_radius {
            self.target = Some(cat_id);
            self.hunt_turns_remaining = self.hunt_budget_turns;
            self.state = RatState::Hunt;
            self.finished_execution = false;
            debug!(target = cat_id.0, "rat detected cat, entering Hunt");
        }
    }

    /// Called once per planning phase while `Hunt`ing: consumes one turn of budget.
    /// Transitions to `Return` once the budget is exhausted or the target is gone.
    pub fn plan_hunt_turn(&mut self, target_alive: bool) {
        if self.state != RatState::Hunt {
            return;
        }
        if !target_alive || self.hunt_turns_remaining == 0 {
            self.begin_return();
            return;
        }
        self.hunt_turns_remaining -= 1;
    }

    fn begin_return(&mut self) {
        self.state = RatState::Return;
        self.target = None;
        self.finished_execution = false;
    }

    /// Execution-phase movement: walks toward `target_position` while hunting, or
    /// toward `original_position` while returning. Returning that arrives within
    /// `min_distance_to_target` transitions back to `Idle` and settles
    /// `finished_execution`; a still-hunting rat remains unfinished until its next
    /// planning-phase turn decision resolves it (budget exhausted or target lost).
    pub fn advance_movement(&mut self, position: &mut Vec2, target_position: Vec2, dt: f32) {
        match self.state {
            RatState::Hunt => {
                step_towards(position, target_position, self.movement_speed, dt);
                self.finished_execution = position.distance(target_position) <= self.min_distance_to_target;
            }
            RatState::Return => {
                step_towards(position, self.original_position, self.movement_speed, dt);
                if position.distance(self.original_position) <= self.min_distance_to_target {
                    self.state = RatState::Idle;
                    self.finished_execution = true;
                    debug!("rat returned home, back to Idle");
                }
            }
            RatState::Idle | RatState::Attack => {}
        }
    }

    /// Begins the attack state; `attack_delay` must elapse before the attack window
    /// opens.
    pub fn begin_attack(&mut self) {
        self.state = RatState::Attack;
        self.attack_timer = self.attack_delay;
        self.attacked_this_execution.clear();
        self.finished_execution = false;
    }

    /// Advances the attack timer. Returns `true` once `attack_delay` has elapsed and
    /// the attack window (of length `attack_duration`) is open. `finished_execution`
    /// settles back to `true` once the window closes and the rat returns to `Idle`.
    pub fn advance_attack(&mut self, dt: f32) -> bool {
        if self.state != RatState::Attack {
            return false;
        }
        if self.attack_timer > 0.0 {
            self.attack_timer -= dt;
            return false;
        }
        let remaining = self.attack_duration + self.attack_timer;
        if remaining <= 0.0 {
            self.state = RatState::Idle;
            self.finished_execution = true;
            return false;
        }
        true
    }

    /// Applies damage to `victim` at most once per execution.
    pub fn try_apply_damage(&mut self, victim: EntityId) -> bool {
        if self.attacked_this_execution.contains(&victim) {
            return false;
        }
        self.attacked_this_execution.insert(victim);
        true
    }
}

fn step_towards(position: &mut Vec2, target: Vec2, speed: f32, dt: f32) {
    let to_target = target - *position;
    let dist = to_target.length();
    let step = speed * dt;
    if dist <= step {
        *position = target;
    } else {
        *position += to_target / dist * step;
    }
}

/// Adapts [`RatAgent`] to the [`ScriptType`] lifecycle.
pub struct RatScript {
    agents: std::collections::HashMap<EntityId, RatAgent>,
}

impl RatScript {
    pub fn new() -> Self {
        Self { agents: std::collections::HashMap::new() }
    }

    pub fn agent(&self, id: EntityId) -> Option<&RatAgent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut RatAgent> {
        self.agents.get_mut(&id)
    }
}

impl Default for RatScript {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptType for RatScript {
    fn key(&self) -> &'static str {
        "rat"
    }

    fn init(&mut self, id: EntityId, ctx: &mut ScriptContext) {
        let pos = ctx
            .store
            .try_get::<crate::components::Transform>(id)
            .map(|t| t.position)
            .unwrap_or(Vec2::ZERO);
        self.agents.insert(id, RatAgent::new(pos));
    }

    /// `Idle` samples detection during `Planning` (the turn's pre-move decision point);
    /// `Hunt`/`Return` consume one turn of planning budget / re-aim, then walk toward
    /// their target each `Execute` frame. `Attack`'s trigger-collider/animation side is
    /// left to the caller (Design Note scope: renderer/collider wiring for a specific
    /// agent's attack presentation is outside the state-machine contract) — `begin_attack`
    /// / `advance_attack` / `try_apply_damage` are exercised directly by callers that own
    /// that presentation layer.
    fn update(&mut self, id: EntityId, dt: f32, ctx: &mut ScriptContext) {
        let Some(self_pos) = ctx.store.try_get::<Transform>(id).ok().map(|t| t.position) else { return };

        match ctx.fsm.current() {
            GameState::Planning => {
                let agent_state = self.agents.get(&id).map(|a| a.state);
                match agent_state {
                    Some(RatState::Idle) => {
                        let candidates: Vec<(EntityId, Vec2, bool)> = ctx
                            .store
                            .entities_in_pool(ComponentMask::EMPTY)
                            .into_iter()
                            .filter(|&e| e != id)
                            .filter_map(|e| {
                                let h = ctx.store.try_get::<Huntable>(e).ok()?;
                                let t = ctx.store.try_get::<Transform>(e).ok()?;
                                Some((e, t.position, h.is_caged))
                            })
                            .collect();
                        if let Some(agent) = self.agents.get_mut(&id) {
                            for (cat_id, cat_pos, caged) in candidates {
                                agent.sample_detection(self_pos, cat_id, cat_pos, caged);
                                if agent.state != RatState::Idle {
                                    break;
                                }
                            }
                        }
                    }
                    Some(RatState::Hunt) => {
                        if let Some(agent) = self.agents.get_mut(&id) {
                            let target_alive = agent.target.map(|t| ctx.store.is_alive(t)).unwrap_or(false);
                            agent.plan_hunt_turn(target_alive);
                        }
                    }
                    _ => {}
                }
            }
            GameState::Execute => {
                let target_pos = self
                    .agents
                    .get(&id)
                    .and_then(|a| a.target)
                    .and_then(|t| ctx.store.try_get::<Transform>(t).ok())
                    .map(|t| t.position)
                    .unwrap_or(self_pos);

                if let Some(agent) = self.agents.get_mut(&id) {
                    if matches!(agent.state, RatState::Hunt | RatState::Return) {
                        let mut pos = self_pos;
                        agent.advance_movement(&mut pos, target_pos, dt);
                        if let Ok(t) = ctx.store.try_get_mut::<Transform>(id) {
                            t.position = pos;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn destroy(&mut self, id: EntityId, _ctx: &mut ScriptContext) {
        self.agents.remove(&id);
    }

    fn finished_execution(&self, id: EntityId) -> Option<bool> {
        self.agents.get(&id).map(|a| a.finished_execution)
    }

    fn on_detach(&mut self, id: EntityId, _ctx: &mut ScriptContext) {
        self.agents.remove(&id);
    }
}
