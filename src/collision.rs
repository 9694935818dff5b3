//! Raycast result structure.
//!
//! Holds the outcome of a physics query (downward grounding ray or an
//! extended lookahead probe) in a backend-neutral form.

use bevy::prelude::*;

/// Information about a raycast hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionData {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a hit result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_fields_round_trip() {
        let hit = CollisionData::new(0.15, Vec3::Y, Vec3::new(1.0, 0.0, -2.0), None);

        assert_eq!(hit.distance, 0.15);
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.point, Vec3::new(1.0, 0.0, -2.0));
    }

    #[test]
    fn hit_with_entity() {
        let entity = Entity::from_raw(42);
        let hit = CollisionData::new(0.02, Vec3::Y, Vec3::ZERO, Some(entity));

        assert_eq!(hit.entity, Some(entity));
    }
}
