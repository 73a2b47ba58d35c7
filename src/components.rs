//! Core components. Plain data, no methods beyond small geometric helpers — systems own
//! the behavior, components own the state.

use glam::{Mat3, Vec2};
use serde::{Deserialize, Serialize};

/// Spatial transform. World-space `position`/`orientation` are recomputed every frame by
/// [`crate::hierarchy::Hierarchy::update`]; `rel_position`/`rel_orientation` are
/// authoritative for children and survive serialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    pub orientation: f32,
    pub rel_position: Vec2,
    pub rel_orientation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            width: 1.0,
            height: 1.0,
            orientation: 0.0,
            rel_position: Vec2::ZERO,
            rel_orientation: 0.0,
        }
    }
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self { position, ..Default::default() }
    }

    /// Rotation matrix for the current orientation (radians, CCW).
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_angle(self.orientation)
    }

    /// Converts a world-space point into this transform's local space.
    /// Used by `Hierarchy::attach_child` to compute `rel_position` on attach.
    pub fn world_to_local(&self, world_point: Vec2) -> Vec2 {
        let inv_rot = Mat3::from_angle(-self.orientation);
        inv_rot.transform_point2(world_point - self.position)
    }

    /// Converts a local-space point (e.g. a child's `rel_position`) into world space.
    pub fn local_to_world(&self, local_point: Vec2) -> Vec2 {
        self.position + self.rotation_matrix().transform_point2(local_point)
    }
}

/// Body dynamics category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// Rigid body dynamics state, integrated by [`crate::physics::Physics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub mass: f32,
    pub inverse_mass: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    pub linear_drag: f32,
    pub angular_drag: f32,
    pub prev_position: Vec2,
    pub body_type: BodyType,
    /// Whether integration currently applies to this body. A dynamic body falls asleep
    /// once its accumulated force decays below a negligible threshold (see
    /// `Physics::integrate`), independent of whether its velocity is still nonzero.
    pub awake: bool,
}

impl RigidBody {
    pub fn new(mass: f32, body_type: BodyType) -> Self {
        let inverse_mass = match body_type {
            BodyType::Static => 0.0,
            _ => {
                if mass > 0.0 {
                    1.0 / mass
                } else {
                    0.0
                }
            }
        };
        Self {
            mass,
            inverse_mass,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            linear_drag: 0.0,
            angular_drag: 0.0,
            prev_position: Vec2::ZERO,
            body_type,
            awake: matches!(body_type, BodyType::Dynamic),
        }
    }

    pub fn static_body() -> Self {
        Self::new(0.0, BodyType::Static)
    }

    pub fn add_force(&mut self, force: Vec2) {
        if self.body_type == BodyType::Dynamic {
            self.force += force;
            self.awake = true;
        }
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2) {
        if self.body_type == BodyType::Dynamic {
            self.velocity += impulse * self.inverse_mass;
            self.awake = true;
        }
    }
}

/// Collider geometry, tagged by variant for narrowphase dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Aabb { half_extent: Vec2 },
    Circle { radius: f32 },
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub is_trigger: bool,
    pub layer_index: u8,
    pub scale_offset: Vec2,
}

impl Collider {
    pub fn aabb(half_extent: Vec2) -> Self {
        Self {
            shape: ColliderShape::Aabb { half_extent },
            is_trigger: false,
            layer_index: 0,
            scale_offset: Vec2::ZERO,
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Circle { radius },
            is_trigger: false,
            layer_index: 0,
            scale_offset: Vec2::ZERO,
        }
    }

    pub fn point() -> Self {
        Self {
            shape: ColliderShape::Point,
            is_trigger: false,
            layer_index: 0,
            scale_offset: Vec2::ZERO,
        }
    }

    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Zero-extent colliders are degenerate (`PhysicsDegenerate`).
    pub fn is_degenerate(&self) -> bool {
        match self.shape {
            ColliderShape::Aabb { half_extent } => half_extent.x <= 0.0 || half_extent.y <= 0.0,
            ColliderShape::Circle { radius } => radius <= 0.0,
            ColliderShape::Point => false,
        }
    }
}

/// Marker a cat carries so rat detection (`RatScript::update`) can scan the store for
/// huntable targets without reaching across script types. `is_caged` mirrors
/// `CatAgent::is_caged` — kept on the component rather than read off the script's
/// private per-entity map, since detection is a store scan, not a script-to-script call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Huntable {
    pub is_caged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transform_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec2::ZERO);
        assert_eq!(t.orientation, 0.0);
    }

    #[test]
    fn world_to_local_round_trips() {
        let mut t = Transform::at(Vec2::new(10.0, 5.0));
        t.orientation = 0.3;
        let world_point = Vec2::new(12.0, 7.0);
        let local = t.world_to_local(world_point);
        let back = t.local_to_world(local);
        assert!((back - world_point).length() < 1e-4);
    }

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let b = RigidBody::static_body();
        assert_eq!(b.inverse_mass, 0.0);
        assert!(!b.awake);
    }

    #[test]
    fn dynamic_body_starts_awake() {
        let b = RigidBody::new(2.0, BodyType::Dynamic);
        assert_eq!(b.inverse_mass, 0.5);
        assert!(b.awake);
    }

    #[test]
    fn add_force_ignored_on_static() {
        let mut b = RigidBody::static_body();
        b.add_force(Vec2::new(1.0, 0.0));
        assert_eq!(b.force, Vec2::ZERO);
    }

    #[test]
    fn degenerate_collider_detection() {
        assert!(Collider::circle(0.0).is_degenerate());
        assert!(Collider::aabb(Vec2::new(0.0, 1.0)).is_degenerate());
        assert!(!Collider::circle(1.0).is_degenerate());
        assert!(!Collider::point().is_degenerate());
    }
}
