//! Core controller systems.
//!
//! These systems turn intent into rigid-body motion and keep the phase
//! machine current. They are generic over the physics backend; scene
//! queries (ground probing) live in the backend's own sensing systems and
//! run earlier in the same tick.
//!
//! Every failure mode here degrades to a safe no-op for the tick: a body
//! that is not ready is skipped, non-finite velocity fails closed to zero
//! movement, and a failed phase evaluation retains the previous phase.
//! All of these are logged, none of them panic.

use bevy::log::{debug, warn};
use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{AxisOverride, CharacterBody, ControllerConfig};
use crate::detection;
use crate::error::ControllerError;
use crate::intent::{MovementIntent, INPUT_EPSILON};
use crate::phase::{Phase, PhaseContext, PhaseMachine};
use crate::state::{Airborne, Grounded};

/// Horizontal speeds below this are snapped to zero when damping.
const STOP_SPEED_EPSILON: f32 = 0.01;

/// Apply directional movement based on intent.
///
/// Non-zero input sets horizontal velocity directly (normalized direction
/// times move speed) while preserving vertical velocity; direct control is
/// what guarantees responsive, non-sliding movement. When the config asks
/// for it, an additional ramp-up force is applied while still below full
/// speed, which smooths the first ticks of acceleration on backends with
/// force support.
///
/// Zero input while grounded damps horizontal velocity multiplicatively
/// toward zero instead of stopping instantly. In the air the input is
/// phase-gated away and momentum is preserved.
pub fn apply_movement<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, ControllerConfig, CharacterBody, Vec3)> = world
        .query::<(
            Entity,
            &ControllerConfig,
            &CharacterBody,
            &MovementIntent,
            &PhaseMachine,
        )>()
        .iter(world)
        .map(|(entity, config, body, intent, machine)| {
            let direction = if machine.current().allows_walk() {
                intent.direction()
            } else {
                Vec3::ZERO
            };
            (entity, *config, body.clone(), direction)
        })
        .collect();

    for (entity, config, body, direction) in entities {
        let Some(raw_velocity) = B::try_velocity(world, entity) else {
            warn!(
                "movement skipped: {}",
                ControllerError::BodyNotReady { entity }
            );
            continue;
        };
        let Some(current) = detection::sanitize(raw_velocity) else {
            warn!(
                "movement failed closed: {}",
                ControllerError::InvalidNumeric {
                    entity,
                    quantity: "linear velocity",
                }
            );
            B::set_velocity(world, entity, Vec3::ZERO);
            continue;
        };

        if direction.length_squared() > INPUT_EPSILON * INPUT_EPSILON {
            let dir = direction.normalize();
            let target = dir * config.move_speed;
            let horizontal_speed = Vec3::new(current.x, 0.0, current.z).length();

            B::set_velocity(world, entity, Vec3::new(target.x, current.y, target.z));

            // Ramp-up force only while the body was still below full speed,
            // so repeated application can never push past move_speed.
            if config.ramp_up_accel > 0.0 && horizontal_speed < config.move_speed {
                let mass = B::get_mass(world, entity);
                B::apply_force(world, entity, dir * config.ramp_up_accel * mass);
            }
        } else if body.grounded() {
            let mut horizontal = Vec3::new(current.x, 0.0, current.z) * config.stop_damping;
            if horizontal.length() < STOP_SPEED_EPSILON {
                horizontal = Vec3::ZERO;
            }
            B::set_velocity(
                world,
                entity,
                Vec3::new(horizontal.x, current.y, horizontal.z),
            );
        }

        // Continuous acceleration request (F = m * a), set through
        // override_acceleration.
        if body.acceleration != Vec3::ZERO {
            let mass = B::get_mass(world, entity);
            B::apply_force(world, entity, body.acceleration * mass);
        }
    }
}

/// Launch a jump for one character.
///
/// Computes a launch speed from gravity magnitude and the configured jump
/// height, sets vertical velocity to it while preserving horizontal
/// velocity, clears the grounded cache and the last-contact timestamp so
/// landing logic cannot fire off the launch surface, and forces the phase
/// machine into Jumping.
pub fn execute_jump<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    now: f32,
) -> Result<(), ControllerError> {
    let launch = {
        let config = world
            .get::<ControllerConfig>(entity)
            .copied()
            .ok_or(ControllerError::BodyNotReady { entity })?;
        let body = world
            .get::<CharacterBody>(entity)
            .ok_or(ControllerError::BodyNotReady { entity })?;
        body.launch_speed(&config)
    };

    let raw_velocity =
        B::try_velocity(world, entity).ok_or(ControllerError::BodyNotReady { entity })?;
    let current = detection::sanitize(raw_velocity).ok_or(ControllerError::InvalidNumeric {
        entity,
        quantity: "linear velocity",
    })?;

    B::set_velocity(world, entity, Vec3::new(current.x, launch, current.z));

    if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
        body.mark_jump(now);
        // Seed the vertical history with the launch speed so the phase
        // machine sees the ascent on this very tick.
        body.record_vertical(launch);
    }

    if let Some(mut machine) = world.get_mut::<PhaseMachine>(entity) {
        machine.force_enter(Phase::Jumping)?;
    }

    Ok(())
}

/// Consume jump edges and launch jumps where the active phase permits it.
pub fn apply_jump<B: CharacterPhysicsBackend>(world: &mut World) {
    let now = world
        .get_resource::<Time<Fixed>>()
        .map(|t| t.elapsed_secs())
        .unwrap_or(0.0);

    // Edge detection must run for every intent every tick, whether or not
    // the jump is ultimately allowed.
    let edges: Vec<Entity> = world
        .query::<(Entity, &mut MovementIntent)>()
        .iter_mut(world)
        .filter_map(|(entity, mut intent)| intent.take_jump_edge().then_some(entity))
        .collect();

    for entity in edges {
        let allowed = world
            .get::<PhaseMachine>(entity)
            .map(|machine| machine.current().allows_jump())
            .unwrap_or(false);
        let supported = world
            .get::<CharacterBody>(entity)
            .zip(world.get::<ControllerConfig>(entity))
            .map(|(body, config)| {
                body.grounded() || body.landed_recently(config.landed_recently_window, now)
            })
            .unwrap_or(false);

        if !(allowed && supported) {
            continue;
        }

        if let Err(err) = execute_jump::<B>(world, entity, now) {
            warn!("jump skipped: {err}");
        }
    }
}

/// Enforce upright orientation.
///
/// Collision torque may tip the body; this strips pitch and roll from the
/// rotation (keeping yaw, the facing direction) and suppresses angular
/// velocity about the non-yaw axes. Runs every tick so the character can
/// never accumulate a tilt.
pub fn enforce_upright<B: CharacterPhysicsBackend>(world: &mut World) {
    let entities: Vec<Entity> = world
        .query_filtered::<Entity, With<CharacterBody>>()
        .iter(world)
        .collect();

    for entity in entities {
        let rotation = B::get_rotation(world, entity);
        if !rotation.is_finite() {
            warn!(
                "upright enforcement reset rotation: {}",
                ControllerError::InvalidNumeric {
                    entity,
                    quantity: "rotation",
                }
            );
            B::set_rotation(world, entity, Quat::IDENTITY);
            continue;
        }

        let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);
        let upright = Quat::from_rotation_y(yaw);
        if rotation.angle_between(upright) > 1e-4 {
            B::set_rotation(world, entity, upright);
        }

        let angular = B::get_angular_velocity(world, entity);
        if angular.x != 0.0 || angular.z != 0.0 {
            B::set_angular_velocity(world, entity, Vec3::new(0.0, angular.y, 0.0));
        }
    }
}

/// Advance phase timers and run the decision pass.
///
/// The active phase's per-tick behavior (its timer) executes first, then
/// the decision pass may hand off to the next phase. If the context
/// snapshot cannot be built, the pass is skipped and the previous phase
/// retained; the character simply stays in its last known phase until the
/// next successful tick.
pub fn advance_phases<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    let now = world
        .get_resource::<Time<Fixed>>()
        .map(|t| t.elapsed_secs())
        .unwrap_or(0.0);

    let entities: Vec<(Entity, ControllerConfig, Result<PhaseContext, ControllerError>)> = world
        .query::<(Entity, &ControllerConfig, &CharacterBody, &MovementIntent)>()
        .iter(world)
        .map(|(entity, config, body, intent)| {
            let ctx = build_phase_context::<B>(world, entity, config, body, intent, now);
            (entity, *config, ctx)
        })
        .collect();

    for (entity, config, ctx) in entities {
        let Some(mut machine) = world.get_mut::<PhaseMachine>(entity) else {
            continue;
        };
        machine.tick(dt);

        match ctx {
            Ok(ctx) => {
                if let Some(next) = machine.decide(&ctx, &config) {
                    debug!(
                        "{entity:?} phase {} -> {}",
                        machine.previous().name(),
                        next.name()
                    );
                }
            }
            Err(err) => {
                warn!("phase decision skipped for {entity:?}: {err}");
            }
        }
    }
}

fn build_phase_context<B: CharacterPhysicsBackend>(
    world: &World,
    entity: Entity,
    config: &ControllerConfig,
    body: &CharacterBody,
    intent: &MovementIntent,
    now: f32,
) -> Result<PhaseContext, ControllerError> {
    let raw_velocity =
        B::try_velocity(world, entity).ok_or(ControllerError::BodyNotReady { entity })?;
    detection::sanitize(raw_velocity).ok_or(ControllerError::InvalidNumeric {
        entity,
        quantity: "linear velocity",
    })?;

    Ok(PhaseContext {
        grounded: body.grounded(),
        // The sensing pass records vertical velocity each tick; a jump
        // launched this tick seeds it directly, so the recorded value is
        // fresher than a re-read after forces were applied.
        vertical_velocity: body.vertical_velocity(),
        input_active: intent.is_active(),
        at_inflection: body.at_inflection(),
        landed_recently: body.landed_recently(config.landed_recently_window, now),
    })
}

/// Sync [`Grounded`]/[`Airborne`] marker components with the body's cached
/// grounded flag.
pub fn sync_state_markers(
    mut commands: Commands,
    q_bodies: Query<(Entity, &CharacterBody, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, body, has_grounded, has_airborne) in &q_bodies {
        if body.grounded() {
            if !has_grounded {
                commands.entity(entity).insert(Grounded).remove::<Airborne>();
            }
        } else if !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }
    }
}

/// Partially override a character's linear velocity.
///
/// Unspecified axes keep their current value; the result is readable back
/// immediately, before any physics step.
pub fn override_velocity<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    axes: AxisOverride,
) -> Result<(), ControllerError> {
    if !axes.is_finite() {
        return Err(ControllerError::InvalidNumeric {
            entity,
            quantity: "velocity override",
        });
    }
    let current =
        B::try_velocity(world, entity).ok_or(ControllerError::BodyNotReady { entity })?;
    B::set_velocity(world, entity, axes.apply_to(current));
    Ok(())
}

/// Partially override a character's continuous acceleration request.
///
/// Unspecified axes keep their current value. The request is converted to
/// a force (F = m * a) and applied each tick by [`apply_movement`] until
/// changed again.
pub fn override_acceleration<B: CharacterPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    axes: AxisOverride,
) -> Result<(), ControllerError> {
    if !axes.is_finite() {
        return Err(ControllerError::InvalidNumeric {
            entity,
            quantity: "acceleration override",
        });
    }
    let mut body = world
        .get_mut::<CharacterBody>(entity)
        .ok_or(ControllerError::BodyNotReady { entity })?;
    let current = body.acceleration;
    body.acceleration = axes.apply_to(current);
    Ok(())
}
