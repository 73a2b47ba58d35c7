//! Fixed-timestep physics integration and collision detection.
//!
//! `Physics::step` runs once per `GameClock` frame: drag + force integration for dynamic
//! bodies, a velocity clamp to kill floating-point creep, position/orientation
//! integration for non-static bodies, then a linear (non-broadphase) collision pass
//! that classifies every unordered pair of colliders and emits `Enter`/`Stay`/`Exit` or
//! `Trigger*` events through the [`EventBus`] depending on overlap history.

use glam::Vec2;
use tracing::warn;

use crate::components::{BodyType, Collider, ColliderShape, RigidBody, Transform};
use crate::entity::EntityId;
use crate::event::{CollisionEvent, CollisionEventKind, EventBus};
use crate::hierarchy::Hierarchy;
use crate::store::EntityStore;

/// Velocity components below this magnitude are snapped to zero after integration.
pub const VELOCITY_EPSILON: f32 = 2.0;

/// Force magnitude below which a dynamic body is put back to sleep, matching the
/// original `ApplyLinearDamping` behavior: `awake` gates force/torque integration, not
/// position integration.
const SLEEP_FORCE_EPSILON: f32 = 0.001;

fn wrap_angle(mut a: f32) -> f32 {
    use std::f32::consts::TAU;
    a %= TAU;
    if a < 0.0 {
        a += TAU;
    }
    a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(EntityId, EntityId);

impl PairKey {
    fn new(a: EntityId, b: EntityId) -> Self {
        if a.0 <= b.0 { PairKey(a, b) } else { PairKey(b, a) }
    }
}

/// Per-frame integration and collision detection, driven by `GameClock`.
pub struct Physics {
    /// Entity-pair -> currently overlapping, used to classify Enter/Stay/Exit across
    /// frames: the running sum of (CollisionEnter - CollisionExit) for a pair always
    /// equals its current overlap state.
    overlapping: std::collections::HashMap<PairKey, bool>,
}

impl Physics {
    pub fn new() -> Self {
        Self { overlapping: std::collections::HashMap::new() }
    }

    /// Runs the full per-frame pass: integration for every active `RigidBody` +
    /// `Transform` entity, then collision detection over every active `Collider` +
    /// `Transform` entity pair.
    pub fn step(&mut self, store: &mut EntityStore, events: &mut EventBus, dt: f32) {
        self.integrate(store, dt);
        self.detect_collisions(store, events);
    }

    fn integrate(&self, store: &mut EntityStore, dt: f32) {
        let ids: Vec<EntityId> = store
            .entities_in_pool(crate::store::ComponentMask::EMPTY)
            .into_iter()
            .filter(|&id| store.has::<RigidBody>(id) && store.has::<Transform>(id))
            .filter(|&id| Hierarchy::is_effectively_active(store, id))
            .collect();

        for id in ids {
            let mut body = *store.get::<RigidBody>(id);

            if body.velocity.x.is_nan() || body.velocity.y.is_nan() {
                warn!(entity = id.0, "PhysicsDegenerate: NaN velocity, skipping entity");
                continue;
            }

            if body.body_type == BodyType::Dynamic && body.awake {
                // Step 1: drag opposes current velocity.
                body.force += -body.velocity * body.mass * body.linear_drag;
            }

            if body.awake {
                // Step 2: integrate velocity from accumulated force.
                body.velocity += body.force * body.inverse_mass * dt;
            }

            // Step 3: clamp near-zero components to exactly zero.
            if body.velocity.x.abs() < VELOCITY_EPSILON {
                body.velocity.x = 0.0;
            }
            if body.velocity.y.abs() < VELOCITY_EPSILON {
                body.velocity.y = 0.0;
            }

            if body.body_type == BodyType::Static {
                // Invariant 4: a static body has zero velocity after every step.
                body.velocity = Vec2::ZERO;
                body.angular_velocity = 0.0;
            } else {
                let mut t = *store.get::<Transform>(id);
                t.position += body.velocity * dt;
                // Step 4: integrate position/orientation.
                let prev = t.position - body.velocity * dt;
                body.prev_position = prev;
                t.orientation = wrap_angle(t.orientation + body.angular_velocity * dt);
                store.assign(id, t);
            }

            // Step 5: zero accumulated force/torque; fall asleep if it decayed away.
            if body.force.length() < SLEEP_FORCE_EPSILON {
                body.awake = false;
            }
            body.force = Vec2::ZERO;
            body.torque = 0.0;
            if body.body_type != BodyType::Dynamic {
                body.angular_velocity = 0.0;
            }

            store.assign(id, body);
        }
    }

    fn detect_collisions(&mut self, store: &mut EntityStore, events: &mut EventBus) {
        let ids: Vec<EntityId> = store
            .entities_in_pool(crate::store::ComponentMask::EMPTY)
            .into_iter()
            .filter(|&id| store.has::<Collider>(id) && store.has::<Transform>(id))
            .filter(|&id| Hierarchy::is_effectively_active(store, id))
            .collect();

        let mut seen_this_frame = std::collections::HashSet::new();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (a, b) = (ids[i], ids[j]);
                let collider_a = *store.get::<Collider>(a);
                let collider_b = *store.get::<Collider>(b);

                if collider_a.is_degenerate() || collider_b.is_degenerate() {
                    warn!(a = a.0, b = b.0, "PhysicsDegenerate: zero-extent collider, pair skipped");
                    continue;
                }
                if collider_a.layer_index != collider_b.layer_index {
                    continue;
                }
                let a_dynamic = store
                    .try_get::<RigidBody>(a)
                    .map(|rb| rb.body_type == BodyType::Dynamic)
                    .unwrap_or(false);
                let b_dynamic = store
                    .try_get::<RigidBody>(b)
                    .map(|rb| rb.body_type == BodyType::Dynamic)
                    .unwrap_or(false);
                if !a_dynamic && !b_dynamic {
                    continue;
                }

                let ta = *store.get::<Transform>(a);
                let tb = *store.get::<Transform>(b);
                let overlapping = narrowphase(&collider_a, ta, &collider_b, tb);

                let key = PairKey::new(a, b);
                seen_this_frame.insert(key);
                let was_overlapping = self.overlapping.get(&key).copied().unwrap_or(false);
                let is_trigger = collider_a.is_trigger || collider_b.is_trigger;

                if overlapping {
                    let kind = if is_trigger {
                        if was_overlapping { CollisionEventKind::TriggerStay } else { CollisionEventKind::TriggerEnter }
                    } else {
                        if was_overlapping { CollisionEventKind::Stay } else { CollisionEventKind::Enter }
                    };
                    events.send_collision(CollisionEvent { a, b, kind });

                    if !is_trigger {
                        resolve_penetration(store, a, b, &collider_a, ta, &collider_b, tb);
                    }
                } else if was_overlapping {
                    let kind = if is_trigger { CollisionEventKind::TriggerExit } else { CollisionEventKind::Exit };
                    events.send_collision(CollisionEvent { a, b, kind });
                }

                self.overlapping.insert(key, overlapping);
            }
        }

        // Pairs no longer considered (one side removed or deactivated) stop tracking
        // once their Exit has fired; drop them instead of growing unbounded.
        self.overlapping.retain(|key, overlapping| seen_this_frame.contains(key) || !*overlapping);
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new()
    }
}

fn aabb_extent(collider: &Collider) -> Option<Vec2> {
    match collider.shape {
        ColliderShape::Aabb { half_extent } => Some(half_extent + collider.scale_offset),
        _ => None,
    }
}

/// Narrowphase dispatch by collider variant: AABB-AABB, Circle-Circle, AABB-Circle,
/// Point-*.
fn narrowphase(a: &Collider, ta: Transform, b: &Collider, tb: Transform) -> bool {
    match (a.shape, b.shape) {
        (ColliderShape::Aabb { .. }, ColliderShape::Aabb { .. }) => {
            let ea = aabb_extent(a).unwrap();
            let eb = aabb_extent(b).unwrap();
            let delta = (ta.position - tb.position).abs();
            delta.x <= ea.x + eb.x && delta.y <= ea.y + eb.y
        }
        (ColliderShape::Circle { radius: ra }, ColliderShape::Circle { radius: rb }) => {
            ta.position.distance(tb.position) <= ra + rb
        }
        (ColliderShape::Aabb { .. }, ColliderShape::Circle { radius }) => {
            aabb_circle(ta, aabb_extent(a).unwrap(), tb.position, radius)
        }
        (ColliderShape::Circle { radius }, ColliderShape::Aabb { .. }) => {
            aabb_circle(tb, aabb_extent(b).unwrap(), ta.position, radius)
        }
        (ColliderShape::Point, ColliderShape::Point) => ta.position.distance(tb.position) < f32::EPSILON,
        (ColliderShape::Point, ColliderShape::Aabb { .. }) => point_in_aabb(ta.position, tb, aabb_extent(b).unwrap()),
        (ColliderShape::Aabb { .. }, ColliderShape::Point) => point_in_aabb(tb.position, ta, aabb_extent(a).unwrap()),
        (ColliderShape::Point, ColliderShape::Circle { radius }) => ta.position.distance(tb.position) <= radius,
        (ColliderShape::Circle { radius }, ColliderShape::Point) => ta.position.distance(tb.position) <= radius,
    }
}

fn aabb_circle(aabb_t: Transform, half_extent: Vec2, circle_center: Vec2, radius: f32) -> bool {
    let min = aabb_t.position - half_extent;
    let max = aabb_t.position + half_extent;
    let closest = circle_center.clamp(min, max);
    closest.distance(circle_center) <= radius
}

fn point_in_aabb(point: Vec2, aabb_t: Transform, half_extent: Vec2) -> bool {
    let delta = (point - aabb_t.position).abs();
    delta.x <= half_extent.x && delta.y <= half_extent.y
}

/// Positional response: minimum translation vector split by inverse mass. Only meaningful for AABB-AABB overlaps; other shape pairs are resolved via impulse
/// response left to scripts (projectiles, stomp AoE) rather than positional correction.
fn resolve_penetration(
    store: &mut EntityStore,
    a: EntityId,
    b: EntityId,
    collider_a: &Collider,
    ta: Transform,
    collider_b: &Collider,
    tb: Transform,
) {
    let (Some(ea), Some(eb)) = (aabb_extent(collider_a), aabb_extent(collider_b)) else { return };
    let delta = tb.position - ta.position;
    let overlap_x = ea.x + eb.x - delta.x.abs();
    let overlap_y = ea.y + eb.y - delta.y.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return;
    }

    let mtv = if overlap_x < overlap_y {
        Vec2::new(overlap_x * delta.x.signum(), 0.0)
    } else {
        Vec2::new(0.0, overlap_y * delta.y.signum())
    };

    let inv_a = store.try_get::<RigidBody>(a).map(|rb| rb.inverse_mass).unwrap_or(0.0);
    let inv_b = store.try_get::<RigidBody>(b).map(|rb| rb.inverse_mass).unwrap_or(0.0);
    let total_inv = inv_a + inv_b;
    if total_inv <= 0.0 {
        return;
    }

    let share_a = inv_a / total_inv;
    let share_b = inv_b / total_inv;

    if let Ok(mut t) = store.try_get::<Transform>(a).copied() {
        t.position -= mtv * share_a;
        store.assign(a, t);
    }
    if let Ok(mut t) = store.try_get::<Transform>(b).copied() {
        t.position += mtv * share_b;
        store.assign(b, t);
    }
}
