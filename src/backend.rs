//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! work with the locomotion controller. The physics engine is treated as a
//! black box behind this seam, which allows swapping engines (Rapier3D,
//! XPBD, custom) and keeps every collaborator explicit: the controller
//! receives its backend as a type parameter at construction, never through
//! a global lookup.

use bevy::prelude::*;

/// Trait for physics backend implementations.
///
/// The required methods cover the guaranteed surface every rigid-body
/// engine has: velocity and transform access. Force and impulse
/// application are optional capabilities; their default implementations
/// degrade to the velocity path, so a backend without them still produces
/// correct (if less smooth) movement.
///
/// Scene queries (raycasts, contact lookups) stay inside the backend's own
/// sensing systems, registered by [`CharacterPhysicsBackend::plugin`]; the
/// generic controller systems never issue them directly.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// The velocity component type used by this backend.
    type VelocityComponent: Component;

    /// Returns the plugin that sets up this backend, including its ground
    /// sensing systems.
    fn plugin() -> impl Plugin;

    /// Get the current linear velocity of an entity, or `None` when the
    /// body is not ready (no velocity component yet).
    fn try_velocity(world: &World, entity: Entity) -> Option<Vec3>;

    /// Get the current linear velocity, defaulting to zero when the body
    /// is not ready.
    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        Self::try_velocity(world, entity).unwrap_or(Vec3::ZERO)
    }

    /// Set the linear velocity of an entity. No-op when the body is not
    /// ready.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Get the current world position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Get the current rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Set the rotation of an entity.
    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat);

    /// Get the current angular velocity of an entity.
    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the angular velocity of an entity.
    fn set_angular_velocity(world: &mut World, entity: Entity, angular: Vec3);

    /// Get the mass of an entity.
    ///
    /// Used to convert accelerations into forces (F = m * a) and to scale
    /// impulse fallbacks. Defaults to 1.0 when the backend cannot report
    /// mass.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        1.0
    }

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Apply an instantaneous impulse (momentum change) to an entity.
    ///
    /// Optional capability. The default implementation degrades to the
    /// velocity path: `v += impulse / m`.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        let mass = Self::get_mass(world, entity).max(f32::EPSILON);
        let velocity = Self::get_velocity(world, entity);
        Self::set_velocity(world, entity, velocity + impulse / mass);
    }

    /// Apply a continuous force to an entity for this timestep.
    ///
    /// Optional capability. The default implementation degrades to the
    /// velocity path: `v += (force / m) * dt`.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        let mass = Self::get_mass(world, entity).max(f32::EPSILON);
        let dt = Self::get_fixed_timestep(world);
        let velocity = Self::get_velocity(world, entity);
        Self::set_velocity(world, entity, velocity + force / mass * dt);
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
