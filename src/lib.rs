//! # `locomotion_controller`
//!
//! A physics-backed 3D locomotion controller with an explicit movement
//! phase machine.
//!
//! This crate turns raw directional/jump input into stable rigid-body
//! motion and tracks which locomotion phase the character is in:
//! - Direct velocity control for responsive, non-sliding movement
//! - Multi-signal ground detection (ray fan, contact query, velocity
//!   inflection) with throttled probing
//! - A closed phase machine (Idle, Walking, Jumping, Airborne, Landing)
//!   with a static transition table and per-phase dwell gates
//! - Upright enforcement so collision torque can never tip the character
//! - A physics backend abstraction (Rapier3D included) so the engine stays
//!   a black box behind one trait
//!
//! ## Architecture
//!
//! Each simulation tick runs one chain in `FixedUpdate`:
//! 1. **Sensors**: the backend probes the ground and refreshes the body's
//!    cached grounded state
//! 2. **Movement**: intent is applied as velocity, jumps launch, upright
//!    orientation is enforced
//! 3. **Phases**: the active phase's timer advances, then the decision
//!    pass may hand off to the next phase (at most one transition)
//! 4. **Sync**: `Grounded`/`Airborne` markers mirror the body state
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use locomotion_controller::prelude::*;
//!
//! // Components for a playable character
//! let body = CharacterBody::new();
//! let config = ControllerConfig::player();
//! let mut intent = MovementIntent::default();
//!
//! // The input layer writes onto the intent each tick
//! intent.set_direction(Vec3::new(0.0, 0.0, -1.0));
//! intent.set_jump_pressed(false);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod detection;
pub mod error;
pub mod intent;
pub mod phase;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::collision::CollisionData;
    pub use crate::config::{AxisOverride, CharacterBody, ControllerConfig, VERTICAL_EPSILON};
    pub use crate::detection::GroundSignals;
    pub use crate::error::ControllerError;
    pub use crate::intent::MovementIntent;
    pub use crate::phase::{Phase, PhaseContext, PhaseMachine, PHASES};
    pub use crate::state::{Airborne, Grounded};
    pub use crate::{CharacterControllerPlugin, CharacterControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// System sets for the controller's `FixedUpdate` chain, in execution
/// order.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum CharacterControllerSet {
    /// Backend ground sensing: probe throttling, ray fan, contact
    /// fallback, landing stabilization.
    Sensors,
    /// Intent application: movement velocity, jump launches, upright
    /// enforcement.
    Movement,
    /// Phase timers and the decision pass.
    Phases,
    /// Marker component sync for downstream consumers.
    Sync,
}

/// Main plugin for the locomotion controller.
///
/// Generic over a physics backend `B` which provides the actual physics
/// operations (velocity access, raycasting, force application).
///
/// # Example
///
/// With the Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use locomotion_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct CharacterControllerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for CharacterControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for CharacterControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterBody>();
        app.register_type::<config::ControllerConfig>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<phase::Phase>();
        app.register_type::<phase::PhaseMachine>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();

        // Sensing runs before movement so phase gates and jump support
        // checks see this tick's grounded state; the decision pass runs
        // last so it evaluates post-update velocity.
        app.configure_sets(
            FixedUpdate,
            (
                CharacterControllerSet::Sensors,
                CharacterControllerSet::Movement,
                CharacterControllerSet::Phases,
                CharacterControllerSet::Sync,
            )
                .chain(),
        );

        // The backend plugin registers its sensing systems
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            (
                systems::apply_movement::<B>,
                systems::apply_jump::<B>,
                systems::enforce_upright::<B>,
            )
                .chain()
                .in_set(CharacterControllerSet::Movement),
        );
        app.add_systems(
            FixedUpdate,
            systems::advance_phases::<B>.in_set(CharacterControllerSet::Phases),
        );
        app.add_systems(
            FixedUpdate,
            systems::sync_state_markers.in_set(CharacterControllerSet::Sync),
        );
    }
}
