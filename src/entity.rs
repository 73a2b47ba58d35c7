//! Entity identity and the per-entity descriptor.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Opaque 64-bit entity identifier. Monotonically assigned, never reused within a run.
///
/// Entity 0 is reserved for the default camera and is never handed out by
/// [`EntityAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const CAMERA: EntityId = EntityId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Monotonic id allocator. Entity 0 is reserved and pre-consumed at construction.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    pub fn new() -> Self {
        // 0 is reserved for the default camera; the first scripted entity gets id 1.
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximum nesting depth the render-order recursion subdivides before it stops halving
/// the `[ro, ro+1)` interval further, per REDESIGN FLAG (b) — avoids floating-point
/// underflow in pathologically deep hierarchies.
pub const MAX_HIERARCHY_DEPTH: u32 = 24;

/// Mandatory per-entity bookkeeping, one instance per live entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub parent: Option<EntityId>,
    pub children: SmallVec<[EntityId; 4]>,
    pub scene_id: u32,
    pub layer_index: u8,
    pub render_order: f32,
    pub is_active: bool,
    pub is_alive: bool,
    pub to_save: bool,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, scene_id: u32) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: SmallVec::new(),
            scene_id,
            layer_index: 0,
            render_order: 0.0,
            is_active: true,
            is_alive: true,
            to_save: true,
        }
    }
}
