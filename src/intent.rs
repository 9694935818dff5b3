//! Movement intent component.
//!
//! The intent represents the desired movement direction from player input or
//! AI. The input layer is external: whatever maps keys, gamepads or touch to
//! a camera-relative direction writes the result here once per tick, and the
//! controller systems read it and apply the appropriate physics.

use bevy::prelude::*;

/// Input magnitudes below this are treated as no input.
pub(crate) const INPUT_EPSILON: f32 = 0.001;

/// Desired movement for one character, written by the input layer each tick.
///
/// The direction is a camera-relative horizontal vector in world space. It
/// is expected to be unit length or shorter; longer vectors are clamped so
/// input can never exceed the configured move speed. The vertical component
/// is discarded, vertical motion belongs to gravity and jumping.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use locomotion_controller::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_direction(Vec3::new(1.0, 0.0, 0.0));
/// assert!(intent.is_active());
///
/// intent.clear();
/// assert!(!intent.is_active());
/// ```
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Desired horizontal movement direction (world space, camera-relative).
    direction: Vec3,
    /// Whether the jump action is currently held.
    ///
    /// Set this every tick from your input source. The controller detects
    /// the rising edge and triggers at most one jump per press.
    pub jump_pressed: bool,
    /// Previous tick's jump state, for edge detection. Managed internally.
    pub(crate) jump_pressed_prev: bool,
}

impl Default for MovementIntent {
    fn default() -> Self {
        Self {
            direction: Vec3::ZERO,
            jump_pressed: false,
            jump_pressed_prev: false,
        }
    }
}

impl MovementIntent {
    /// Create a new empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the desired movement direction.
    ///
    /// The vertical component is stripped and the result is clamped to unit
    /// length. Non-finite input is rejected and treated as no input.
    pub fn set_direction(&mut self, direction: Vec3) {
        if !direction.is_finite() {
            self.direction = Vec3::ZERO;
            return;
        }
        let planar = Vec3::new(direction.x, 0.0, direction.z);
        self.direction = planar.clamp_length_max(1.0);
    }

    /// The current desired direction (horizontal, length <= 1).
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Clear the movement direction.
    pub fn clear(&mut self) {
        self.direction = Vec3::ZERO;
    }

    /// Check if there is active directional input.
    pub fn is_active(&self) -> bool {
        self.direction.length_squared() > INPUT_EPSILON * INPUT_EPSILON
    }

    /// Set the jump state.
    ///
    /// Pass `true` while the player/AI wants to jump, `false` otherwise.
    /// Call this every tick with the current state; the controller turns the
    /// rising edge into a single jump.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    /// Check if jump is currently held.
    pub fn is_jump_pressed(&self) -> bool {
        self.jump_pressed
    }

    /// Consume the jump rising edge.
    ///
    /// Returns `true` exactly once per press, on the tick where the state
    /// changed from released to held.
    pub(crate) fn take_jump_edge(&mut self) -> bool {
        let edge = self.jump_pressed && !self.jump_pressed_prev;
        self.jump_pressed_prev = self.jump_pressed;
        edge
    }
}
