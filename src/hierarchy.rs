//! Parent/child hierarchy: attach/detach and the per-frame four-pass update.
//!
//! `Transform::rel_position`/`rel_orientation` are authoritative for children; a root's
//! `position`/`orientation` are authoritative in their own right and are left untouched
//! by propagation. Render order is derived the same pass: each root claims
//! `sceneId + layerIndex * Δ` (Δ = 100 × root count) as the start of a `[ro, ro + 1)`
//! interval, and children split what's left of their parent's interval evenly, one level
//! at a time, so sibling order survives without needing a full re-sort every frame.

use crate::components::Transform;
use crate::entity::{EntityId, MAX_HIERARCHY_DEPTH};
use crate::error::{EngineError, EngineResult};
use crate::layers::LayerState;
use crate::store::EntityStore;

pub struct Hierarchy;

impl Hierarchy {
    /// True if `ancestor` is found walking up `descendant`'s parent chain.
    fn is_ancestor(store: &EntityStore, ancestor: EntityId, descendant: EntityId) -> bool {
        let mut cur = descendant;
        loop {
            match store.descriptor(cur).and_then(|d| d.parent) {
                Some(p) if p == ancestor => return true,
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Attaches `child` under `parent`. Rejected with `InvalidHierarchy` if `parent` is
    /// already a descendant of `child` — attaching would close a cycle.
    ///
    /// Recomputes `child.rel_position`/`rel_orientation` from its current world pose so
    /// the attach doesn't move it, and disables the child if the parent is disabled.
    pub fn attach_child(store: &mut EntityStore, parent: EntityId, child: EntityId) -> EngineResult<()> {
        if !store.is_alive(parent) {
            return Err(EngineError::InvalidEntity(parent));
        }
        if !store.is_alive(child) {
            return Err(EngineError::InvalidEntity(child));
        }
        if parent == child || Self::is_ancestor(store, child, parent) {
            return Err(EngineError::InvalidHierarchy { parent, child });
        }

        Self::detach_child(store, child);

        if let (Some(parent_t), Some(mut child_t)) = (
            store.try_get::<Transform>(parent).ok().copied(),
            store.try_get::<Transform>(child).ok().copied(),
        ) {
            child_t.rel_position = parent_t.world_to_local(child_t.position);
            child_t.rel_orientation = child_t.orientation - parent_t.orientation;
            store.assign(child, child_t);
        }

        let parent_active = store.descriptor(parent).map(|d| d.is_active).unwrap_or(true);

        if let Some(pd) = store.descriptor_mut(parent) {
            if !pd.children.contains(&child) {
                pd.children.push(child);
            }
        }
        if let Some(cd) = store.descriptor_mut(child) {
            cd.parent = Some(parent);
            if !parent_active {
                cd.is_active = false;
            }
        }
        Ok(())
    }

    /// Detaches `child` from its current parent, if any, zeroing its relative transform.
    /// Its world `position`/`orientation` are left as-is, now authoritative as a root.
    pub fn detach_child(store: &mut EntityStore, child: EntityId) {
        let old_parent = store.descriptor(child).and_then(|d| d.parent);
        let Some(parent) = old_parent else { return };

        if let Some(pd) = store.descriptor_mut(parent) {
            pd.children.retain(|&c| c != child);
        }
        if let Some(mut t) = store.try_get::<Transform>(child).ok().copied() {
            t.rel_position = glam::Vec2::ZERO;
            t.rel_orientation = 0.0;
            store.assign(child, t);
        }
        if let Some(cd) = store.descriptor_mut(child) {
            cd.parent = None;
        }
    }

    /// An entity is effectively enabled iff it and every ancestor is `isActive`.
    pub fn is_effectively_active(store: &EntityStore, id: EntityId) -> bool {
        let mut cur = Some(id);
        while let Some(e) = cur {
            match store.descriptor(e) {
                Some(d) if d.is_active => cur = d.parent,
                _ => return false,
            }
        }
        true
    }

    /// Runs the four-pass per-frame update: rebuild the root list, propagate world
    /// transforms, assign render order, then project into world/UI render sequences.
    pub fn update(store: &mut EntityStore, layer_state: LayerState) -> RenderProjection {
        let roots = Self::parent_order(store, layer_state);

        for &root in &roots {
            Self::propagate_transform(store, root, None);
        }

        let delta = 100.0 * roots.len().max(1) as f32;
        for &root in &roots {
            let desc = store.descriptor(root).expect("root must be alive");
            let ro = desc.scene_id as f32 + desc.layer_index as f32 * delta;
            Self::assign_render_order(store, root, ro, 1.0, 0);
        }

        RenderProjection::build(store, &roots)
    }

    /// Pass 1: entities in active layers with a [`Transform`] and no parent, ordered by
    /// `sceneId`.
    fn parent_order(store: &EntityStore, layer_state: LayerState) -> Vec<EntityId> {
        let mut roots: Vec<EntityId> = store
            .entities_in_pool(crate::store::ComponentMask::EMPTY)
            .into_iter()
            .filter(|&id| store.has::<Transform>(id))
            .filter(|&id| {
                store
                    .descriptor(id)
                    .map(|d| d.parent.is_none() && layer_state.is_enabled(d.layer_index))
                    .unwrap_or(false)
            })
            .collect();
        roots.sort_by_key(|&id| store.descriptor(id).map(|d| d.scene_id).unwrap_or(0));
        roots
    }

    /// Pass 2, preorder: `c.position = p.rotation * c.relPosition + p.position`.
    fn propagate_transform(store: &mut EntityStore, id: EntityId, parent: Option<Transform>) {
        if let Some(mut t) = store.try_get::<Transform>(id).ok().copied() {
            if let Some(pt) = parent {
                t.position = pt.local_to_world(t.rel_position);
                t.orientation = pt.orientation + t.rel_orientation;
                store.assign(id, t);
            }
        }
        let this_world = store.try_get::<Transform>(id).ok().copied();
        let children = store.descriptor(id).map(|d| d.children.clone()).unwrap_or_default();
        for child in children {
            Self::propagate_transform(store, child, this_world);
        }
    }

    /// Pass 3, preorder: split `[ro, ro + len)` evenly among the node's children.
    ///
    /// REDESIGN FLAG (b): the interval halves at every level, so a pathologically deep
    /// hierarchy would underflow `f32` precision. Once `depth` reaches
    /// `MAX_HIERARCHY_DEPTH`, stop subdividing — every descendant past the cap reuses
    /// its ancestor's `[ro, ro + len)` interval unchanged instead of shrinking it
    /// further, trading exact sibling ordering at extreme depth for never underflowing.
    fn assign_render_order(store: &mut EntityStore, id: EntityId, ro: f32, len: f32, depth: u32) {
        if let Some(desc) = store.descriptor_mut(id) {
            desc.render_order = ro;
        }
        let children = store.descriptor(id).map(|d| d.children.clone()).unwrap_or_default();
        if children.is_empty() {
            return;
        }
        if depth >= MAX_HIERARCHY_DEPTH {
            for child in children {
                Self::assign_render_order(store, child, ro, len, depth);
            }
            return;
        }
        let share = len / children.len() as f32;
        for (i, child) in children.into_iter().enumerate() {
            Self::assign_render_order(store, child, ro + share * i as f32, share, depth + 1);
        }
    }
}

/// Pass 4: world-render vs UI-render entity sequences, sorted by `render_order`. The
/// predicate distinguishing renderer kinds is supplied by the caller — this crate has no
/// rendering backend of its own, only the ordering contract a backend would consume.
pub struct RenderProjection {
    pub world: Vec<EntityId>,
    pub ui: Vec<EntityId>,
}

impl RenderProjection {
    fn build(store: &EntityStore, roots: &[EntityId]) -> Self {
        let mut all = Vec::new();
        for &root in roots {
            Self::collect(store, root, &mut all);
        }
        all.sort_by(|&a, &b| {
            let ra = store.descriptor(a).map(|d| d.render_order).unwrap_or(0.0);
            let rb = store.descriptor(b).map(|d| d.render_order).unwrap_or(0.0);
            ra.total_cmp(&rb)
        });
        // No UI-renderer-kind component is modeled in this crate's scope; everything
        // routes to the world sequence until a concrete renderer distinguishes them.
        RenderProjection { world: all, ui: Vec::new() }
    }

    fn collect(store: &EntityStore, id: EntityId, out: &mut Vec<EntityId>) {
        out.push(id);
        if let Some(desc) = store.descriptor(id) {
            for &child in &desc.children {
                Self::collect(store, child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn entity_with_transform(store: &mut EntityStore, pos: Vec2) -> EntityId {
        let id = store.create("e", 0);
        store.assign(id, Transform::at(pos));
        id
    }

    #[test]
    fn attach_preserves_world_position() {
        let mut store = EntityStore::new();
        let parent = entity_with_transform(&mut store, Vec2::new(5.0, 0.0));
        let child = entity_with_transform(&mut store, Vec2::new(8.0, 0.0));

        Hierarchy::attach_child(&mut store, parent, child).unwrap();
        Hierarchy::update(&mut store, LayerState::ALL_ENABLED);

        let child_t = store.get::<Transform>(child);
        assert!((child_t.position - Vec2::new(8.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn moving_parent_moves_child() {
        let mut store = EntityStore::new();
        let parent = entity_with_transform(&mut store, Vec2::ZERO);
        let child = entity_with_transform(&mut store, Vec2::new(2.0, 0.0));
        Hierarchy::attach_child(&mut store, parent, child).unwrap();
        Hierarchy::update(&mut store, LayerState::ALL_ENABLED);

        let mut parent_t = *store.get::<Transform>(parent);
        parent_t.position = Vec2::new(10.0, 0.0);
        store.assign(parent, parent_t);
        Hierarchy::update(&mut store, LayerState::ALL_ENABLED);

        let child_t = store.get::<Transform>(child);
        assert!((child_t.position - Vec2::new(12.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn attach_rejects_cycle() {
        let mut store = EntityStore::new();
        let a = store.create("a", 0);
        let b = store.create("b", 0);
        Hierarchy::attach_child(&mut store, a, b).unwrap();
        let err = Hierarchy::attach_child(&mut store, b, a).unwrap_err();
        assert!(matches!(err, EngineError::InvalidHierarchy { .. }));
    }

    #[test]
    fn detach_zeroes_relative_transform() {
        let mut store = EntityStore::new();
        let a = entity_with_transform(&mut store, Vec2::ZERO);
        let b = entity_with_transform(&mut store, Vec2::new(1.0, 1.0));
        Hierarchy::attach_child(&mut store, a, b).unwrap();
        Hierarchy::detach_child(&mut store, b);
        let t = store.get::<Transform>(b);
        assert_eq!(t.rel_position, Vec2::ZERO);
        assert_eq!(t.rel_orientation, 0.0);
        assert!(store.descriptor(b).unwrap().parent.is_none());
        assert!(store.descriptor(a).unwrap().children.is_empty());
    }

    #[test]
    fn siblings_get_monotonic_render_order_within_parent_interval() {
        let mut store = EntityStore::new();
        let parent = entity_with_transform(&mut store, Vec2::ZERO);
        let c1 = entity_with_transform(&mut store, Vec2::ZERO);
        let c2 = entity_with_transform(&mut store, Vec2::ZERO);
        Hierarchy::attach_child(&mut store, parent, c1).unwrap();
        Hierarchy::attach_child(&mut store, parent, c2).unwrap();
        Hierarchy::update(&mut store, LayerState::ALL_ENABLED);

        let ro_p = store.descriptor(parent).unwrap().render_order;
        let ro1 = store.descriptor(c1).unwrap().render_order;
        let ro2 = store.descriptor(c2).unwrap().render_order;
        assert!(ro_p <= ro1 && ro1 < ro2 && ro2 < ro_p + 1.0);
    }

    #[test]
    fn disabled_layer_root_excluded_from_update() {
        let mut store = EntityStore::new();
        let a = entity_with_transform(&mut store, Vec2::ZERO);
        store.descriptor_mut(a).unwrap().layer_index = 2;
        let mut state = LayerState::ALL_ENABLED;
        state.disable(2);
        Hierarchy::update(&mut store, state);
        // render_order left at its prior default since the disabled root was skipped
        assert_eq!(store.descriptor(a).unwrap().render_order, 0.0);
    }

    #[test]
    fn attaching_under_disabled_parent_disables_child() {
        let mut store = EntityStore::new();
        let parent = store.create("p", 0);
        store.descriptor_mut(parent).unwrap().is_active = false;
        let child = store.create("c", 0);
        Hierarchy::attach_child(&mut store, parent, child).unwrap();
        assert!(!store.descriptor(child).unwrap().is_active);
    }

    #[test]
    fn deep_chain_past_depth_cap_does_not_underflow_render_order() {
        let mut store = EntityStore::new();
        let root = entity_with_transform(&mut store, Vec2::ZERO);
        let mut prev = root;
        let chain_len = MAX_HIERARCHY_DEPTH + 10;
        for _ in 0..chain_len {
            let next = entity_with_transform(&mut store, Vec2::ZERO);
            Hierarchy::attach_child(&mut store, prev, next).unwrap();
            prev = next;
        }

        Hierarchy::update(&mut store, LayerState::ALL_ENABLED);

        let deepest_ro = store.descriptor(prev).unwrap().render_order;
        assert!(deepest_ro.is_finite());
        assert!(deepest_ro > 0.0 || deepest_ro == 0.0);
    }
}
