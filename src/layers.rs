//! `LayerIndex`: cached views of entities by component-mask × layer.
//!
//! A scene has 11 layers (0..10), each entity belongs to exactly one (its
//! `EntityDescriptor::layer_index`). For every distinct [`ComponentMask`] a caller has
//! ever queried, `LayerIndex` keeps 11 buckets of matching entity ids, built once by a
//! full scan and kept current incrementally via `add_entity`/`remove_entity`/
//! `update_entity` rather than rescanned every frame.

use fxhash::FxHashMap;

use crate::entity::EntityId;
use crate::store::{ComponentMask, EntityStore};

/// Global 11-bit layer enable mask. Consumers skip disabled layers unless they opt in
/// with `ignore = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerState(u16);

pub const LAYER_COUNT: usize = 11;

impl LayerState {
    pub const ALL_ENABLED: LayerState = LayerState(0x7FF);

    pub fn is_enabled(&self, layer: u8) -> bool {
        (layer as usize) < LAYER_COUNT && self.0 & (1 << layer) != 0
    }

    pub fn enable(&mut self, layer: u8) {
        self.0 |= 1 << layer;
    }

    pub fn disable(&mut self, layer: u8) {
        self.0 &= !(1 << layer);
    }
}

impl Default for LayerState {
    fn default() -> Self {
        Self::ALL_ENABLED
    }
}

pub type LayerBuckets = [Vec<EntityId>; LAYER_COUNT];

fn empty_buckets() -> LayerBuckets {
    std::array::from_fn(|_| Vec::new())
}

pub struct LayerIndex {
    cache: FxHashMap<u32, LayerBuckets>,
    pub layer_state: LayerState,
}

impl LayerIndex {
    pub fn new() -> Self {
        Self { cache: FxHashMap::default(), layer_state: LayerState::default() }
    }

    /// `GetLayers(mask)`: lazily builds the 11-bucket cache for `mask` by scanning the
    /// store once, then returns it. Subsequent calls with the same mask are O(1).
    pub fn get_layers(&mut self, store: &EntityStore, mask: ComponentMask) -> &LayerBuckets {
        self.cache.entry(mask.0).or_insert_with(|| {
            let mut buckets = empty_buckets();
            for id in store.entities_in_pool(mask) {
                if let Some(desc) = store.descriptor(id) {
                    buckets[desc.layer_index as usize].push(id);
                }
            }
            buckets
        })
    }

    /// Inserts `id` into every cached mask it newly qualifies for, at its current layer.
    pub fn add_entity(&mut self, store: &EntityStore, id: EntityId) {
        let Some(desc) = store.descriptor(id) else { return };
        let entity_mask = store.component_mask(id);
        let layer = desc.layer_index as usize;
        for (&mask_bits, buckets) in self.cache.iter_mut() {
            if entity_mask.contains(ComponentMask(mask_bits)) && !buckets[layer].contains(&id) {
                buckets[layer].push(id);
            }
        }
    }

    /// Removes `id` from every cached bucket.
    pub fn remove_entity(&mut self, id: EntityId) {
        for buckets in self.cache.values_mut() {
            for bucket in buckets.iter_mut() {
                bucket.retain(|&e| e != id);
            }
        }
    }

    /// Resyncs `id`'s cache membership after its component mask or layer changed.
    pub fn update_entity(&mut self, store: &EntityStore, id: EntityId) {
        self.remove_entity(id);
        self.add_entity(store, id);
    }

    /// `ResetLayerCache()`: drops every cached view. Used on scene load.
    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    /// Flattens a cached view in layer order (0..10), honoring `LayerState` unless
    /// `ignore` is set.
    pub fn iter_view<'a>(
        buckets: &'a LayerBuckets,
        layer_state: LayerState,
        ignore: bool,
    ) -> impl Iterator<Item = EntityId> + 'a {
        buckets.iter().enumerate().flat_map(move |(layer, bucket)| {
            let visible = ignore || layer_state.is_enabled(layer as u8);
            bucket.iter().copied().filter(move |_| visible)
        })
    }
}

impl Default for LayerIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Transform;

    #[test]
    fn get_layers_buckets_by_layer_index() {
        let mut store = EntityStore::new();
        let a = store.create("a", 0);
        store.assign(a, Transform::default());
        store.descriptor_mut(a).unwrap().layer_index = 3;
        let b = store.create("b", 0);
        store.assign(b, Transform::default());

        let mut index = LayerIndex::new();
        let mask = store.component_mask(a);
        let buckets = index.get_layers(&store, mask);
        assert_eq!(buckets[3], vec![a]);
        assert_eq!(buckets[0], vec![b]);
    }

    #[test]
    fn remove_entity_drops_from_all_buckets() {
        let mut store = EntityStore::new();
        let a = store.create("a", 0);
        store.assign(a, Transform::default());
        let mut index = LayerIndex::new();
        let mask = store.component_mask(a);
        index.get_layers(&store, mask);
        index.remove_entity(a);
        let buckets = index.get_layers(&store, mask);
        assert!(buckets.iter().all(|b| b.is_empty()));
    }

    #[test]
    fn disabled_layer_is_skipped_unless_ignored() {
        let mut store = EntityStore::new();
        let a = store.create("a", 0);
        store.assign(a, Transform::default());
        store.descriptor_mut(a).unwrap().layer_index = 5;

        let mut index = LayerIndex::new();
        let mask = store.component_mask(a);
        index.layer_state.disable(5);
        let state = index.layer_state;
        let buckets = index.get_layers(&store, mask);
        assert_eq!(LayerIndex::iter_view(buckets, state, false).count(), 0);
        assert_eq!(LayerIndex::iter_view(buckets, state, true).count(), 1);
    }

    #[test]
    fn reset_cache_forces_rescan() {
        let mut store = EntityStore::new();
        let a = store.create("a", 0);
        store.assign(a, Transform::default());
        let mut index = LayerIndex::new();
        let mask = store.component_mask(a);
        index.get_layers(&store, mask);
        index.reset_cache();
        let b = store.create("b", 0);
        store.assign(b, Transform::default());
        let buckets = index.get_layers(&store, mask);
        assert_eq!(buckets[0].len(), 2);
    }
}
