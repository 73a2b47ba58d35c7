//! Turn-based puzzle-game engine core: ECS storage, scene hierarchy, a synchronous
//! event bus, fixed-timestep physics, and the agent behavior layer that consumes all of
//! it.
//!
//! [`Engine`] wires the per-frame control flow: `GameClock` begins the frame, the event
//! bus drains input, `GameFSM` may transition, `ScriptRuntime` runs `Init`-then-`Update`
//! for every scripted entity, `Physics` integrates and emits collision events
//! (re-entering scripts synchronously through the bus), `Hierarchy` propagates
//! transforms and render order, and `GameClock` ends the frame. Rendering, audio, and
//! asset loading are external collaborators this crate never depends on.

pub mod agents;
pub mod clock;
pub mod components;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod fsm;
pub mod hierarchy;
pub mod layers;
pub mod physics;
pub mod scripts;
pub mod store;
pub mod turn;

#[cfg(test)]
mod integration_tests;

use tracing::debug;

use clock::GameClock;
use entity::EntityId;
use event::EventBus;
use fsm::GameFsm;
use hierarchy::{Hierarchy, RenderProjection};
use layers::LayerIndex;
use physics::Physics;
use scripts::{ScriptContext, ScriptRuntime};
use store::EntityStore;
use turn::TurnController;

/// Top-level process context: every manager as an explicit field rather than a
/// process-wide singleton (Design Note "Singletons for Managers") — enables
/// multi-instance testing and keeps no hidden global state.
pub struct Engine {
    pub store: EntityStore,
    pub layers: LayerIndex,
    pub events: EventBus,
    pub clock: GameClock,
    pub fsm: GameFsm,
    pub scripts: ScriptRuntime,
    pub turn: TurnController,
    pub physics: Physics,
    last_projection: RenderProjection,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            layers: LayerIndex::new(),
            events: EventBus::new(),
            clock: GameClock::new(),
            fsm: GameFsm::new(),
            scripts: ScriptRuntime::new(),
            turn: TurnController::new(),
            physics: Physics::new(),
            last_projection: RenderProjection { world: Vec::new(), ui: Vec::new() },
        }
    }

    /// Creates an entity and registers it with the layer cache in the same step.
    /// `tick`'s per-frame script order comes from `LayerIndex`'s cached `EMPTY`-mask
    /// bucket set, which is only ever shrunk by the purge pass, never grown on its
    /// own — a `store.create` that bypasses this method is invisible to every
    /// `tick` thereafter (no `Init`/`Update`, no render order). Prefer this over
    /// `self.store.create` directly for any entity that should run through the
    /// ordinary per-frame loop.
    pub fn spawn(&mut self, name: impl Into<String>, scene_id: u32) -> EntityId {
        let id = self.store.create(name, scene_id);
        self.layers.add_entity(&self.store, id);
        id
    }

    /// Runs one full frame, with `dt` supplied by the caller (the `GameClock`'s busy-wait
    /// tail is the caller's responsibility via `clock.begin_frame()`/`clock.end_frame()`
    /// around repeated calls to `tick`).
    pub fn tick(&mut self, dt: f32) {
        self.fsm.tick_splash(dt);

        let all_mask = store::ComponentMask::EMPTY;
        let layer_state = self.layers.layer_state;
        let buckets = self.layers.get_layers(&self.store, all_mask);
        let order: Vec<EntityId> = LayerIndex::iter_view(buckets, layer_state, false).collect();

        {
            let mut ctx = ScriptContext { store: &mut self.store, events: &mut self.events, fsm: &self.fsm };
            self.scripts.run_frame(&order, dt, &mut ctx);
        }

        {
            let store = &mut self.store;
            let layers = &mut self.layers;
            self.scripts.flush_queue(|name| {
                let id = store.create(name, 0);
                layers.add_entity(store, id);
                id
            });
        }

        match self.fsm.current() {
            fsm::GameState::Planning => {
                self.turn.poll_planning(&mut self.fsm);
            }
            fsm::GameState::Execute => {
                self.physics.step(&mut self.store, &mut self.events, dt);
                let all_finished = self.scripts.all_finished_execution(&order);
                self.turn.poll_execution(all_finished, dt, &mut self.fsm);
            }
            _ => {}
        }

        self.last_projection = Hierarchy::update(&mut self.store, self.layers.layer_state);

        for id in self.store.pending_destroy().to_vec() {
            self.layers.remove_entity(id);
        }
        self.store.purge();

        self.fsm.end_frame();
        debug!(frame = self.clock.frame_count(), state = ?self.fsm.current(), "frame complete");
    }

    pub fn render_projection(&self) -> &RenderProjection {
        &self.last_projection
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
