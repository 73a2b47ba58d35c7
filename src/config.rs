//! Persisted JSON shapes: settings, scenes, and prefabs.
//!
//! Plain `#[derive(Serialize, Deserialize)]` structs round-tripped through `serde_json`
//! — no runtime reflection, per Design Note "Reflection of script data". Unknown script
//! keys in a scene document are the `ScriptTypeUnknown` path: logged and skipped, the
//! rest of the document still loads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clock::{DEFAULT_TARGET_FPS, SUPPORTED_FPS};
use crate::components::{Collider, RigidBody, Transform};
use crate::entity::EntityId;

/// Persistent settings file. Volumes clamp to `[0, 1]`; an out-of-set `target_fps`
/// falls back to 60 with a warning, both on deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub master_volume: f32,
    pub sfx_volume: f32,
    pub bgm_volume: f32,
    pub target_fps: u32,
    pub fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            sfx_volume: 1.0,
            bgm_volume: 1.0,
            target_fps: DEFAULT_TARGET_FPS,
            fullscreen: false,
        }
    }
}

impl Settings {
    /// Parses and normalizes a settings JSON document: volumes clamp into `[0, 1]`,
    /// `target_fps` falls back to 60 if it isn't one of the clock's supported rates.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut settings: Settings = serde_json::from_str(text)?;
        settings.master_volume = settings.master_volume.clamp(0.0, 1.0);
        settings.sfx_volume = settings.sfx_volume.clamp(0.0, 1.0);
        settings.bgm_volume = settings.bgm_volume.clamp(0.0, 1.0);
        if !SUPPORTED_FPS.contains(&settings.target_fps) {
            warn!(requested = settings.target_fps, "unsupported target_fps, falling back to 60");
            settings.target_fps = DEFAULT_TARGET_FPS;
        }
        Ok(settings)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A small explicit set of serializable components an `EntityRecord` may carry, as a
/// plain enum rather than runtime reflection, per Design Note "Reflection of script
/// data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentRecord {
    Transform(Transform),
    RigidBody(RigidBody),
    Collider(Collider),
}

/// One entity block, shared by scene documents and prefab files. `id` is a placeholder
/// for prefabs — the loader reassigns it via `EntityStore::create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u64,
    pub name: String,
    pub parent: Option<u64>,
    pub scene_id: u32,
    pub layer_index: u8,
    #[serde(default)]
    pub is_active: bool,
    pub components: Vec<ComponentRecord>,
    /// Script key -> opaque reflected data blob. Deserialized lazily as `Value` since
    /// each script type owns its own data shape; `ScriptRuntime::attach` resolves the
    /// key against the registry and logs + skips unknown ones.
    #[serde(default)]
    pub scripts: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    pub entities: Vec<EntityRecord>,
}

impl SceneDocument {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Validates every script key against `known_keys`, warning (not failing) on any
    /// that the registry doesn't recognize (`ScriptTypeUnknown`).
    pub fn warn_unknown_scripts(&self, known_keys: impl Fn(&str) -> bool) {
        for entity in &self.entities {
            for key in entity.scripts.keys() {
                if !known_keys(key) {
                    warn!(entity = entity.id, script = key, "ScriptTypeUnknown in scene document");
                }
            }
        }
    }
}

/// A prefab file is structurally identical to one scene entity block, with `id` an
/// unused placeholder assigned on instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabDocument {
    pub record: EntityRecord,
}

impl PrefabDocument {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A meta-file sidecar. `guid` follows the format `guid<ext><timestamp-with-microseconds>`;
/// timestamps are supplied by the caller since this crate doesn't read the system clock
/// on its own (determinism for replays/tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub guid: String,
    pub asset_type: String,
    pub is_sprite_sheet: bool,
}

impl MetaFile {
    pub fn make_guid(extension: &str, timestamp_micros: u128) -> String {
        format!("guid{extension}{timestamp_micros}")
    }
}

/// A raw, pre-remap entity id as it appears in a scene or prefab document, addressed by
/// relative id before the loader assigns real entities.
pub type RawEntityId = u64;

pub fn remap_placeholder(raw: RawEntityId, assigned: EntityId) -> (RawEntityId, EntityId) {
    (raw, assigned)
}
