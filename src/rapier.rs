//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::log::warn;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::collision::CollisionData;
use crate::config::{CharacterBody, ControllerConfig};
use crate::detection::{self, GroundSignals};

/// Rapier3D physics backend for the locomotion controller.
///
/// Velocity, transform and mass access go through Rapier's components.
/// Ground sensing (raycasts and contact queries) is handled by a dedicated
/// system that receives `RapierContext` as a system parameter and runs in
/// the sensor phase of the controller schedule.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    type VelocityComponent = Velocity;

    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn try_velocity(world: &World, entity: Entity) -> Option<Vec3> {
        world.get::<Velocity>(entity).map(|v| v.linvel)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| {
                world
                    .get::<GlobalTransform>(entity)
                    .map(|t| t.translation())
            })
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.angvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_angular_velocity(world: &mut World, entity: Entity, angular: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.angvel = angular;
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|mass| mass.is_finite() && *mass > 0.0)
            .unwrap_or(1.0)
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else {
            // Fallback: apply as a velocity change when the impulse
            // component is absent.
            let mass = Self::get_mass(world, entity).max(f32::EPSILON);
            if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                vel.linvel += impulse / mass;
            }
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        // One timestep's worth of force, pushed as an impulse so no manual
        // clearing is needed between frames.
        let dt = Self::get_fixed_timestep(world);
        Self::apply_impulse(world, entity, force * dt);
    }
}

/// Plugin that sets up Rapier3D-specific systems for the controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::CharacterControllerSet;

        app.add_systems(
            FixedUpdate,
            ground_sensing.in_set(CharacterControllerSet::Sensors),
        );
    }
}

/// Cast one downward ray, excluding the character's own body.
fn cast_down(
    context: &RapierContext,
    origin: Vec3,
    length: f32,
    exclude: Entity,
) -> Option<CollisionData> {
    let filter = QueryFilter::default()
        .exclude_rigid_body(exclude)
        .exclude_sensors();

    context
        .cast_ray(origin, -Vec3::Y, length, true, filter)
        .map(|(hit_entity, toi)| {
            let point = origin - Vec3::Y * toi;
            // A plain ray has no surface normal; grounding only needs the
            // up-facing approximation.
            CollisionData::new(toi, Vec3::Y, point, Some(hit_entity))
        })
}

/// Immediate, uncached downward probe below a character's capsule.
///
/// Casts the multi-point ray fan from the capsule's lowest point and
/// returns the nearest hit. `extended_distance` lengthens the rays beyond
/// the configured probe distance, for lookahead landing checks; pass zero
/// for a plain grounding probe. `center_only` collapses the fan to the
/// center ray.
pub fn probe_ground(
    context: &RapierContext,
    entity: Entity,
    center: Vec3,
    body: &CharacterBody,
    config: &ControllerConfig,
    extended_distance: f32,
    center_only: bool,
) -> Option<CollisionData> {
    let rays = detection::probe_fan(
        center,
        body.foot_offset(),
        body.capsule_radius,
        config.probe_lateral_scale,
        config.ground_probe_distance + extended_distance,
        center_only,
    );

    rays.iter()
        .filter_map(|ray| cast_down(context, ray.origin, ray.length, entity))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Check whether any contact manifold reports the character touching the
/// world within the penetration epsilon.
fn contact_touching(context: &RapierContext, entity: Entity, epsilon: f32) -> bool {
    for pair in context.contact_pairs_with(entity) {
        if !pair.has_any_active_contact() {
            continue;
        }
        for manifold in pair.manifolds() {
            for point in manifold.points() {
                if point.dist() <= epsilon {
                    return true;
                }
            }
        }
    }
    false
}

/// Ground sensing for Rapier-backed characters.
///
/// Runs every tick: records the vertical-velocity history and checks the
/// inflection heuristic. The raycast fan and the contact fallback are
/// throttled to the configured probe interval to bound per-tick cost; the
/// grounded flag is a cache in between. While vertical velocity is clearly
/// upward the rays are skipped entirely so the launch surface of a fresh
/// jump is never re-detected.
///
/// A false-to-true grounded edge stabilizes the body: horizontal velocity
/// is damped, vertical velocity is damped harder, and upright orientation
/// is re-asserted, which suppresses solver bounce on impact.
pub fn ground_sensing(
    rapier_context: ReadRapierContext,
    time: Res<Time<Fixed>>,
    mut q_characters: Query<(
        Entity,
        &ControllerConfig,
        &mut CharacterBody,
        &mut Velocity,
        &mut Transform,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let dt = time.delta_secs();
    let now = time.elapsed_secs();

    for (entity, config, mut body, mut velocity, mut transform) in &mut q_characters {
        if !velocity.linvel.is_finite() {
            warn!("ground sensing reset non-finite velocity on {entity:?}");
            velocity.linvel = Vec3::ZERO;
        }
        let vertical = velocity.linvel.y;
        body.record_vertical(vertical);

        if !body.grounded() {
            body.time_since_grounded += dt;
        }
        body.probe_elapsed += dt;

        let inflection_landing = detection::snap_landing(
            body.previous_vertical_velocity,
            vertical,
            config.inflection_drop_speed,
        );

        let run_probe = body.probe_elapsed >= config.ground_probe_interval;
        if !(run_probe || inflection_landing) {
            continue;
        }

        let grounded = if run_probe {
            body.probe_elapsed = 0.0;

            let ascending = vertical > config.upward_probe_skip_speed;
            let signals = GroundSignals {
                ray_hit: !ascending
                    && probe_ground(
                        &context,
                        entity,
                        transform.translation,
                        &body,
                        config,
                        0.0,
                        false,
                    )
                    .is_some(),
                contact: vertical <= 0.0
                    && contact_touching(&context, entity, config.penetration_epsilon),
                inflection_landing,
            };
            signals.grounded()
        } else {
            // No probe this tick, but the inflection heuristic counts as a
            // landing on its own.
            true
        };

        let just_landed = body.set_grounded(grounded, now);
        if just_landed {
            velocity.linvel = detection::stabilized_velocity(
                velocity.linvel,
                config.landing_horizontal_damping,
                config.landing_vertical_damping,
            );
            velocity.angvel = Vec3::new(0.0, velocity.angvel.y, 0.0);

            let (yaw, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
            transform.rotation = Quat::from_rotation_y(yaw);
        }
    }
}

/// Bundle for creating a character with Rapier3D physics.
///
/// Provides the rigid body, velocity tracking, external force/impulse
/// components for movement, axis locking, damping and mass readback. All
/// physics handles are owned by the ECS entity; despawning the entity
/// releases them.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use locomotion_controller::prelude::*;
/// use locomotion_controller::rapier::Rapier3dCharacterBundle;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         CharacterBody::new(),
///         ControllerConfig::player(),
///         MovementIntent::default(),
///         PhaseMachine::default(),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.5, 0.4),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. [`RigidBody::Dynamic`] for characters.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each step.
    pub velocity: Velocity,
    /// Accumulated forces applied this frame.
    pub external_force: ExternalForce,
    /// Accumulated impulses applied this frame.
    pub external_impulse: ExternalImpulse,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Damping coefficients for velocity reduction.
    pub damping: Damping,
    /// Computed mass properties, read back from the collider.
    pub mass_properties: ReadMassProperties,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dCharacterBundle {
    /// Create a character bundle with pitch and roll rotation locked.
    ///
    /// The yaw axis stays free so the character can face its movement
    /// direction. Upright enforcement still runs as a second line of
    /// defense against solver drift.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED_X | LockedAxes::ROTATION_LOCKED_Z,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            mass_properties: ReadMassProperties::default(),
        }
    }

    /// Create a character bundle with all rotation axes free.
    ///
    /// Collision torque can tip the body; the upright enforcement system
    /// corrects it each tick. Use this when knock-over-and-recover
    /// behavior is wanted.
    pub fn free_rotation() -> Self {
        Self {
            locked_axes: LockedAxes::empty(),
            ..Self::new()
        }
    }

    /// Set the damping coefficients.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes are locked.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(TransformPlugin);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app
    }

    #[test]
    fn backend_get_position() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::from_xyz(1.0, 2.0, -3.0), RigidBody::Dynamic))
            .id();

        app.update();

        let pos = Rapier3dBackend::get_position(app.world(), entity);
        assert!((pos - Vec3::new(1.0, 2.0, -3.0)).length() < 0.01);
    }

    #[test]
    fn backend_velocity_round_trip() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                RigidBody::Dynamic,
                Velocity::linear(Vec3::new(1.0, 2.0, 3.0)),
            ))
            .id();

        app.update();

        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel - Vec3::new(1.0, 2.0, 3.0)).length() < 0.01);

        Rapier3dBackend::set_velocity(app.world_mut(), entity, Vec3::new(0.0, 5.0, 0.0));
        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel.y - 5.0).abs() < 0.01);
        assert!(vel.x.abs() < 0.01 && vel.z.abs() < 0.01);
    }

    #[test]
    fn backend_reports_missing_body() {
        let mut app = create_test_app();
        let entity = app.world_mut().spawn(Transform::default()).id();

        assert_eq!(Rapier3dBackend::try_velocity(app.world(), entity), None);
        assert_eq!(
            Rapier3dBackend::get_velocity(app.world(), entity),
            Vec3::ZERO
        );
    }

    #[test]
    fn impulse_accumulates_into_component() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                RigidBody::Dynamic,
                Velocity::default(),
                ExternalImpulse::default(),
            ))
            .id();

        Rapier3dBackend::apply_impulse(app.world_mut(), entity, Vec3::Y * 2.0);

        let impulse = app.world().get::<ExternalImpulse>(entity).unwrap();
        assert!((impulse.impulse.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn character_bundle_creates_valid_entity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                Rapier3dCharacterBundle::new(),
                Collider::capsule_y(0.5, 0.4),
            ))
            .id();

        app.update();

        assert!(app.world().get::<RigidBody>(entity).is_some());
        assert!(app.world().get::<Velocity>(entity).is_some());
        assert!(app.world().get::<ExternalImpulse>(entity).is_some());
        let axes = app.world().get::<LockedAxes>(entity).unwrap();
        assert!(axes.contains(LockedAxes::ROTATION_LOCKED_X));
        assert!(axes.contains(LockedAxes::ROTATION_LOCKED_Z));
        assert!(!axes.contains(LockedAxes::ROTATION_LOCKED_Y));
    }
}
