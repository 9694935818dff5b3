//! State marker components.
//!
//! These components mirror the character's grounded status for consumers
//! that want query-level filtering (`Query<&Camera, With<Grounded>>`)
//! instead of reading the body component. They are added and removed by the
//! marker sync system.

use bevy::prelude::*;

/// Marker component indicating the character is resting on a surface.
///
/// Mutually exclusive with [`Airborne`].
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use locomotion_controller::prelude::*;
///
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character has no ground contact.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;
