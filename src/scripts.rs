//! `ScriptRuntime`: script-type registry and per-entity script lifecycle.
//!
//! Script types are trait objects registered once at startup (static registration, the
//! same shape as the original engine's script-type table). Each attached entity gets an
//! independent `ScriptState` per script key; `run_frame` walks attachments in the order
//! the caller supplies (LayerIndex order) and drives `Init -> Update` on first contact,
//! `Update` every following frame, and
//! `Exit -> Dead` once detached or destroyed. Entity creation requested mid-`Update` is
//! deferred through a queue and flushed exactly once per frame boundary (Design Note
//! "Deferred entity creation").

use downcast_rs::{impl_downcast, Downcast};
use fxhash::FxHashMap;
use tracing::{debug, warn};

use crate::entity::EntityId;
use crate::event::EventBus;
use crate::fsm::GameFsm;
use crate::store::EntityStore;

/// Per-entity script state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Init,
    Update,
    Exit,
    Dead,
}

/// Bundles the systems a script's lifecycle callbacks may touch. Built fresh each call
/// from the engine's separate fields — never stored inside `ScriptRuntime` itself, so
/// normal borrow-checking keeps script mutation scoped to one entity at a time.
pub struct ScriptContext<'a> {
    pub store: &'a mut EntityStore,
    pub events: &'a mut EventBus,
    pub fsm: &'a GameFsm,
}

/// Capability set every script type implements. `Downcast` lets editor tooling and tests
/// reach back through the registry to a concrete script type's own per-entity data, for
/// reflection-style editor binding; gameplay code never downcasts in the hot loop.
pub trait ScriptType: Downcast {
    /// Stable registry key; also the name scenes/prefabs serialize script data under.
    fn key(&self) -> &'static str;

    fn init(&mut self, id: EntityId, ctx: &mut ScriptContext);
    fn update(&mut self, id: EntityId, dt: f32, ctx: &mut ScriptContext);
    fn destroy(&mut self, id: EntityId, ctx: &mut ScriptContext);

    fn on_attach(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {}
    fn on_detach(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {}

    /// Reports this entity's `finishedExecution` flag (spec §4.9), if this script type
    /// tracks one. `None` means "no opinion" — `ScriptRuntime::all_finished_execution`
    /// ignores attachments that don't report, so scripts with no turn-execution concept
    /// (e.g. passive decorations) never block the `EXECUTE -> PLANNING` transition.
    fn finished_execution(&self, _id: EntityId) -> Option<bool> {
        None
    }
}
impl_downcast!(ScriptType);

/// Opaque key returned by `AddNewEntityToQueue`, exchanged for the assigned id via
/// `GetCreatedEntity` once the queue has been flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey(u64);

struct QueuedPrefab {
    key: QueueKey,
    prefab_name: String,
}

pub struct ScriptRuntime {
    types: FxHashMap<&'static str, Box<dyn ScriptType>>,
    /// Attachment order matters only within a single entity; iteration order across
    /// entities is dictated by the caller of `run_frame` (LayerIndex order).
    attachments: FxHashMap<EntityId, Vec<(&'static str, ScriptState)>>,
    queue: Vec<QueuedPrefab>,
    next_queue_key: u64,
    created: FxHashMap<u64, EntityId>,
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self {
            types: FxHashMap::default(),
            attachments: FxHashMap::default(),
            queue: Vec::new(),
            next_queue_key: 0,
            created: FxHashMap::default(),
        }
    }

    /// Static registration of a script type, performed once at engine init.
    pub fn register(&mut self, script: Box<dyn ScriptType>) {
        let key = script.key();
        self.types.insert(key, script);
    }

    /// Attaches `key` to `id`, starting it at `Init`. Unknown keys are the
    /// `ScriptTypeUnknown` path: logged and skipped, never a hard error.
    pub fn attach(&mut self, id: EntityId, key: &str, ctx: &mut ScriptContext) {
        let Some(registered_key) = self.types.keys().find(|k| **k == key).copied() else {
            warn!(script = key, "ScriptTypeUnknown: attach skipped");
            return;
        };
        let script = self.types.get_mut(registered_key).expect("key just found");
        let entry = self.attachments.entry(id).or_default();
        if entry.iter().any(|(k, _)| *k == registered_key) {
            return;
        }
        entry.push((registered_key, ScriptState::Init));
        script.on_attach(id, ctx);
        debug!(entity = id.0, script = registered_key, "script attached");
    }

    /// Marks the attachment for teardown; `Destroy`/`OnDetach` run on the next
    /// `run_frame` pass, then the attachment is dropped.
    pub fn detach(&mut self, id: EntityId, key: &str) {
        if let Some(entry) = self.attachments.get_mut(&id) {
            for (k, state) in entry.iter_mut() {
                if *k == key {
                    *state = ScriptState::Exit;
                }
            }
        }
    }

    /// Runs `Init`-then-`Update` for every attachment on `id`, in attachment order,
    /// tearing down any attachment in `Exit`. Entities are expected to be visited by the
    /// caller in LayerIndex order.
    pub fn run_entity(&mut self, id: EntityId, dt: f32, ctx: &mut ScriptContext) {
        let Some(entry) = self.attachments.get_mut(&id) else { return };
        let mut next = Vec::with_capacity(entry.len());
        for (key, state) in entry.drain(..) {
            let Some(script) = self.types.get_mut(key) else {
                continue;
            };
            match state {
                ScriptState::Init => {
                    script.init(id, ctx);
                    next.push((key, ScriptState::Update));
                }
                ScriptState::Update => {
                    script.update(id, dt, ctx);
                    next.push((key, ScriptState::Update));
                }
                ScriptState::Exit => {
                    script.destroy(id, ctx);
                    script.on_detach(id, ctx);
                    next.push((key, ScriptState::Dead));
                }
                ScriptState::Dead => {}
            }
        }
        next.retain(|(_, s)| *s != ScriptState::Dead);
        if next.is_empty() {
            self.attachments.remove(&id);
        } else {
            self.attachments.insert(id, next);
        }
    }

    /// Runs every attachment for every entity in `order`. `order` is supplied by the
    /// caller (typically a `LayerIndex` view) so iteration follows the caller's ordering
    /// guarantee rather than this type's own bookkeeping order.
    pub fn run_frame(&mut self, order: &[EntityId], dt: f32, ctx: &mut ScriptContext) {
        for &id in order {
            self.run_entity(id, dt, ctx);
        }
    }

    /// `AddNewEntityToQueue(prefab) -> QueueKey`. Safe to call from inside `Update`
    /// since it only appends; the actual `EntityStore::create` happens in `flush_queue`.
    pub fn add_new_entity_to_queue(&mut self, prefab_name: impl Into<String>) -> QueueKey {
        let key = QueueKey(self.next_queue_key);
        self.next_queue_key += 1;
        self.queue.push(QueuedPrefab { key, prefab_name: prefab_name.into() });
        key
    }

    /// Instantiates every queued prefab via `factory`, recording the assigned id so
    /// `get_created_entity` can resolve it. Called once per frame, at the frame
    /// boundary after scripts have run (Design Note "Deferred entity creation").
    pub fn flush_queue(&mut self, mut factory: impl FnMut(&str) -> EntityId) {
        for queued in self.queue.drain(..) {
            let id = factory(&queued.prefab_name);
            self.created.insert(queued.key.0, id);
        }
    }

    pub fn get_created_entity(&self, key: QueueKey) -> Option<EntityId> {
        self.created.get(&key.0).copied()
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    /// `TurnController::poll_execution`'s input: true once every attached script on
    /// every entity in `ids` either reports `finishedExecution = true` or has no
    /// opinion at all. Used once per frame while `GameFSM::current() == Execute`.
    pub fn all_finished_execution(&self, ids: &[EntityId]) -> bool {
        for &id in ids {
            let Some(entry) = self.attachments.get(&id) else { continue };
            for (key, _) in entry {
                if let Some(script) = self.types.get(key) {
                    if script.finished_execution(id) == Some(false) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Reaches back through the registry to a concrete script type, for editor
    /// tooling and tests. Never used on the gameplay hot path.
    pub fn downcast_mut<T: ScriptType>(&mut self, key: &str) -> Option<&mut T> {
        self.types.get_mut(key)?.downcast_mut::<T>()
    }
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingScript {
        inits: Rc<RefCell<u32>>,
        updates: Rc<RefCell<u32>>,
        destroys: Rc<RefCell<u32>>,
    }

    impl ScriptType for CountingScript {
        fn key(&self) -> &'static str {
            "counting"
        }
        fn init(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {
            *self.inits.borrow_mut() += 1;
        }
        fn update(&mut self, _id: EntityId, _dt: f32, _ctx: &mut ScriptContext) {
            *self.updates.borrow_mut() += 1;
        }
        fn destroy(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {
            *self.destroys.borrow_mut() += 1;
        }
    }

    fn ctx<'a>(store: &'a mut EntityStore, events: &'a mut EventBus, fsm: &'a GameFsm) -> ScriptContext<'a> {
        ScriptContext { store, events, fsm }
    }

    #[test]
    fn init_then_update_sequence() {
        let mut store = EntityStore::new();
        let mut events = EventBus::new();
        let fsm = GameFsm::new();
        let id = store.create("e", 0);

        let inits = Rc::new(RefCell::new(0));
        let updates = Rc::new(RefCell::new(0));
        let destroys = Rc::new(RefCell::new(0));
        let mut runtime = ScriptRuntime::new();
        runtime.register(Box::new(CountingScript {
            inits: inits.clone(),
            updates: updates.clone(),
            destroys: destroys.clone(),
        }));

        runtime.attach(id, "counting", &mut ctx(&mut store, &mut events, &fsm));
        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        assert_eq!(*inits.borrow(), 1);
        assert_eq!(*updates.borrow(), 0);

        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        assert_eq!(*updates.borrow(), 1);
        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        assert_eq!(*updates.borrow(), 2);
    }

    #[test]
    fn detach_runs_destroy_then_stops() {
        let mut store = EntityStore::new();
        let mut events = EventBus::new();
        let fsm = GameFsm::new();
        let id = store.create("e", 0);

        let inits = Rc::new(RefCell::new(0));
        let updates = Rc::new(RefCell::new(0));
        let destroys = Rc::new(RefCell::new(0));
        let mut runtime = ScriptRuntime::new();
        runtime.register(Box::new(CountingScript {
            inits: inits.clone(),
            updates: updates.clone(),
            destroys: destroys.clone(),
        }));

        runtime.attach(id, "counting", &mut ctx(&mut store, &mut events, &fsm));
        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        runtime.detach(id, "counting");
        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        assert_eq!(*destroys.borrow(), 1);

        // No attachment remains; further frames are no-ops.
        runtime.run_entity(id, 0.016, &mut ctx(&mut store, &mut events, &fsm));
        assert_eq!(*updates.borrow(), 0);
    }

    #[test]
    fn unknown_script_key_is_skipped_not_fatal() {
        let mut store = EntityStore::new();
        let mut events = EventBus::new();
        let fsm = GameFsm::new();
        let id = store.create("e", 0);
        let mut runtime = ScriptRuntime::new();
        runtime.attach(id, "nonexistent", &mut ctx(&mut store, &mut events, &fsm));
        assert!(!runtime.is_registered("nonexistent"));
    }

    struct ExecutionGatedScript {
        finished: std::cell::Cell<bool>,
    }

    impl ScriptType for ExecutionGatedScript {
        fn key(&self) -> &'static str {
            "gated"
        }
        fn init(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {}
        fn update(&mut self, _id: EntityId, _dt: f32, _ctx: &mut ScriptContext) {}
        fn destroy(&mut self, _id: EntityId, _ctx: &mut ScriptContext) {}
        fn finished_execution(&self, _id: EntityId) -> Option<bool> {
            Some(self.finished.get())
        }
    }

    #[test]
    fn all_finished_execution_ignores_entities_with_no_opinion() {
        let mut store = EntityStore::new();
        let mut events = EventBus::new();
        let fsm = GameFsm::new();
        let id = store.create("e", 0);
        let mut runtime = ScriptRuntime::new();
        runtime.register(Box::new(CountingScript {
            inits: Rc::new(RefCell::new(0)),
            updates: Rc::new(RefCell::new(0)),
            destroys: Rc::new(RefCell::new(0)),
        }));
        runtime.attach(id, "counting", &mut ctx(&mut store, &mut events, &fsm));
        assert!(runtime.all_finished_execution(&[id]));
    }

    #[test]
    fn all_finished_execution_blocks_on_a_single_unfinished_entity() {
        let mut store = EntityStore::new();
        let mut events = EventBus::new();
        let fsm = GameFsm::new();
        let a = store.create("a", 0);
        let b = store.create("b", 0);
        let mut runtime = ScriptRuntime::new();
        runtime.register(Box::new(ExecutionGatedScript { finished: std::cell::Cell::new(true) }));
        runtime.attach(a, "gated", &mut ctx(&mut store, &mut events, &fsm));
        runtime.attach(b, "gated", &mut ctx(&mut store, &mut events, &fsm));
        assert!(runtime.all_finished_execution(&[a, b]));

        runtime.downcast_mut::<ExecutionGatedScript>("gated").unwrap().finished.set(false);
        assert!(!runtime.all_finished_execution(&[a, b]));
    }

    #[test]
    fn queued_prefab_resolves_after_flush() {
        let mut runtime = ScriptRuntime::new();
        let key = runtime.add_new_entity_to_queue("cat_prefab");
        assert!(runtime.get_created_entity(key).is_none());

        let mut store = EntityStore::new();
        runtime.flush_queue(|_name| store.create("spawned", 0));
        let id = runtime.get_created_entity(key);
        assert!(id.is_some());
    }
}
