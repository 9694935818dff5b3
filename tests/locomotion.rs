//! Phase sequence scenarios with real physics stepping.
//!
//! Each test drives the full controller through a gameplay situation and
//! checks the order in which locomotion phases are visited.

use bevy::prelude::*;
use bevy::time::Virtual;
use bevy_rapier3d::prelude::*;
use locomotion_controller::prelude::*;

fn create_test_app() -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
    app.add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default());
    app.insert_resource(Time::<Fixed>::from_hz(60.0));

    app.finish();
    app.cleanup();

    // Drive time manually: only the ticks below advance the simulation.
    app.world_mut().resource_mut::<Time<Virtual>>().pause();
    app
}

fn spawn_floor(app: &mut App) {
    app.world_mut().spawn((
        Transform::from_xyz(0.0, -0.5, 0.0),
        RigidBody::Fixed,
        Collider::cuboid(40.0, 0.5, 40.0),
    ));
}

/// Spawn a character whose capsule bottom sits `height` above the floor
/// surface, then let the physics world register it.
fn spawn_character(app: &mut App, height: f32) -> Entity {
    let body = CharacterBody::new();
    let foot = body.foot_offset();
    let entity = app
        .world_mut()
        .spawn((
            Transform::from_xyz(0.0, height + foot, 0.0),
            body,
            ControllerConfig::default(),
            MovementIntent::default(),
            PhaseMachine::default(),
            Rapier3dCharacterBundle::new(),
            Collider::capsule_y(0.5, 0.4),
        ))
        .id();
    app.update();
    entity
}

fn tick(app: &mut App) {
    let timestep = std::time::Duration::from_secs_f64(1.0 / 60.0);
    app.world_mut()
        .resource_mut::<Time<Virtual>>()
        .advance_by(timestep);
    app.update();
}

fn phase(app: &App, entity: Entity) -> Phase {
    app.world().get::<PhaseMachine>(entity).unwrap().current()
}

/// Run `ticks` ticks and record the phase after each one, collapsing
/// consecutive duplicates.
fn record_phases(app: &mut App, entity: Entity, ticks: usize) -> Vec<Phase> {
    let mut sequence = vec![phase(app, entity)];
    for _ in 0..ticks {
        tick(app);
        let current = phase(app, entity);
        if *sequence.last().unwrap() != current {
            sequence.push(current);
        }
    }
    sequence
}

/// Assert that `expected` appears in `sequence` in order (gaps allowed).
fn assert_subsequence(sequence: &[Phase], expected: &[Phase]) {
    let mut iter = sequence.iter();
    for want in expected {
        assert!(
            iter.any(|got| got == want),
            "expected {expected:?} in order within {sequence:?}"
        );
    }
}

#[test]
fn spawned_at_rest_settles_in_idle() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 0.0);

    tick(&mut app);

    assert_eq!(
        phase(&app, character),
        Phase::Idle,
        "a character spawned at rest on flat ground starts idle"
    );
}

#[test]
fn idle_to_walking_on_direction_input() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 0.0);

    for _ in 0..5 {
        tick(&mut app);
    }
    assert_eq!(phase(&app, character), Phase::Idle);

    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_direction(Vec3::new(1.0, 0.0, 0.0));
    tick(&mut app);

    assert_eq!(phase(&app, character), Phase::Walking);
}

#[test]
fn walking_returns_to_idle_when_input_stops() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 0.0);

    for _ in 0..5 {
        tick(&mut app);
    }
    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_direction(Vec3::X);
    for _ in 0..10 {
        tick(&mut app);
    }
    assert_eq!(phase(&app, character), Phase::Walking);

    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .clear();
    // Horizontal damping needs a few ticks; idle requires settled velocity.
    for _ in 0..30 {
        tick(&mut app);
    }

    assert_eq!(phase(&app, character), Phase::Idle);
}

#[test]
fn jump_from_walking_enters_jumping_with_upward_velocity() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 0.0);

    for _ in 0..5 {
        tick(&mut app);
    }
    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_direction(Vec3::X);
    for _ in 0..5 {
        tick(&mut app);
    }
    assert_eq!(phase(&app, character), Phase::Walking);

    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_jump_pressed(true);
    tick(&mut app);

    assert_eq!(phase(&app, character), Phase::Jumping);
    let velocity = app.world().get::<Velocity>(character).unwrap().linvel;
    assert!(velocity.y > 0.0, "jump must launch upward, vy={}", velocity.y);
    // Directional control is retained through the launch.
    assert!(velocity.x > 0.0);
}

#[test]
fn full_jump_cycle_visits_every_air_phase_in_order() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 0.0);

    for _ in 0..5 {
        tick(&mut app);
    }
    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_jump_pressed(true);

    let sequence = record_phases(&mut app, character, 240);

    assert_subsequence(
        &sequence,
        &[
            Phase::Jumping,
            Phase::Airborne,
            Phase::Landing,
            Phase::Idle,
        ],
    );
    assert_eq!(*sequence.last().unwrap(), Phase::Idle);

    // Jumping never hands off to a ground phase directly.
    for pair in sequence.windows(2) {
        if pair[0] == Phase::Jumping {
            assert_eq!(pair[1], Phase::Airborne);
        }
    }
}

#[test]
fn falling_spawn_goes_airborne_then_lands() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 3.0);

    let sequence = record_phases(&mut app, character, 240);

    assert_subsequence(
        &sequence,
        &[Phase::Airborne, Phase::Landing, Phase::Idle],
    );
    assert!(
        app.world()
            .get::<CharacterBody>(character)
            .unwrap()
            .grounded(),
        "character must be grounded after the fall settles"
    );
}

#[test]
fn landing_dwell_holds_before_idle() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 2.0);

    // Fall until landing starts.
    let mut landed = false;
    for _ in 0..240 {
        tick(&mut app);
        if phase(&app, character) == Phase::Landing {
            landed = true;
            break;
        }
    }
    assert!(landed, "character must enter landing after a fall");

    // Count how long landing holds.
    let mut dwell_ticks = 0;
    while phase(&app, character) == Phase::Landing {
        tick(&mut app);
        dwell_ticks += 1;
        assert!(dwell_ticks < 240, "landing must not hold forever");
    }

    let dwell = app
        .world()
        .get::<ControllerConfig>(character)
        .unwrap()
        .landing_dwell;
    assert!(
        dwell_ticks as f32 / 60.0 >= dwell - 1.0 / 60.0,
        "landing held only {dwell_ticks} ticks, dwell is {dwell}s"
    );
    assert_eq!(phase(&app, character), Phase::Idle);
}

#[test]
fn airborne_input_does_not_steer_the_character() {
    let mut app = create_test_app();
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, 4.0);

    tick(&mut app);
    assert_eq!(phase(&app, character), Phase::Airborne);

    app.world_mut()
        .get_mut::<MovementIntent>(character)
        .unwrap()
        .set_direction(Vec3::X);
    for _ in 0..10 {
        tick(&mut app);
    }

    let velocity = app.world().get::<Velocity>(character).unwrap().linvel;
    assert!(
        velocity.x.abs() < 0.05,
        "directional input is gated while airborne, vx={}",
        velocity.x
    );
}
