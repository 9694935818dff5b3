//! Character body and controller configuration components.
//!
//! This module defines the central state hub for a character (`CharacterBody`)
//! and the tuning parameters that drive it (`ControllerConfig`).

use bevy::prelude::*;

/// Threshold below which vertical velocity counts as "at rest".
///
/// One value is used by every phase predicate and by inflection detection.
/// Mixing per-phase thresholds invites flicker at phase boundaries.
pub const VERTICAL_EPSILON: f32 = 0.1;

/// Central state hub for one physics-backed character.
///
/// This component caches RESULT state derived from the physics body: the
/// rolling grounded flag, contact timestamps, and the vertical-velocity
/// history used for inflection detection. The authoritative position and
/// velocity always live in the physics engine and are read through the
/// backend; nothing here is a second source of truth for them.
///
/// The grounded flag is a cache. Ground probes are throttled (at most one
/// per [`ControllerConfig::ground_probe_interval`] of simulated time) to
/// bound per-tick cost, so the flag can lag the world by up to one probe
/// interval. Vertical velocity is authoritative for fall/jump decisions.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterBody {
    /// Gravity affecting this character. Used to scale the jump launch
    /// speed so jump height stays visually consistent when gravity is
    /// tuned. Keep this in sync with the physics world's gravity.
    pub gravity: Vec3,
    /// Capsule radius.
    pub capsule_radius: f32,
    /// Half-length of the capsule's cylindrical segment.
    pub capsule_half_height: f32,
    /// Continuous acceleration request, applied as F = m * a each tick.
    /// Zero by default. Set through [`AxisOverride`] based helpers.
    pub(crate) acceleration: Vec3,

    // === Cached ground state ===
    pub(crate) grounded: bool,
    /// Clock time of the last confirmed ground contact, in seconds.
    pub(crate) last_ground_contact: f32,
    /// Clock time of the last jump launch, in seconds.
    pub(crate) last_jump_time: f32,
    /// Seconds since the character was last grounded.
    pub(crate) time_since_grounded: f32,
    /// Accumulator driving the probe throttle. Starts saturated so the
    /// first tick after spawn always probes.
    pub(crate) probe_elapsed: f32,

    // === Vertical velocity history (inflection detection) ===
    pub(crate) vertical_velocity: f32,
    pub(crate) previous_vertical_velocity: f32,
}

impl Default for CharacterBody {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            capsule_radius: 0.4,
            capsule_half_height: 0.5,
            acceleration: Vec3::ZERO,
            grounded: false,
            last_ground_contact: f32::NEG_INFINITY,
            last_jump_time: f32::NEG_INFINITY,
            time_since_grounded: 0.0,
            probe_elapsed: f32::MAX,
            vertical_velocity: 0.0,
            previous_vertical_velocity: 0.0,
        }
    }
}

impl CharacterBody {
    /// Create a new body with default gravity and capsule dimensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new body with custom gravity.
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..default()
        }
    }

    /// Builder: set the capsule dimensions.
    ///
    /// `half_height` is the half-length of the cylindrical segment, matching
    /// the convention of capsule colliders built from (half height, radius).
    pub fn with_capsule(mut self, half_height: f32, radius: f32) -> Self {
        self.capsule_half_height = half_height;
        self.capsule_radius = radius;
        self
    }

    /// The cached grounded flag.
    ///
    /// Refreshed by the ground sensing system at bounded intervals, not
    /// every tick. For an immediate, uncached lookahead check use the
    /// backend probe directly.
    pub fn grounded(&self) -> bool {
        self.grounded
    }

    /// True if a ground contact was registered within `threshold` seconds
    /// of `now`.
    ///
    /// A secondary landing signal for when raycasting is inconclusive, for
    /// example on sloped or thin geometry.
    pub fn landed_recently(&self, threshold: f32, now: f32) -> bool {
        now - self.last_ground_contact <= threshold
    }

    /// True if vertical velocity crossed from above [`VERTICAL_EPSILON`] to
    /// at-or-below it between the previous and current tick.
    ///
    /// This detects the apex of a jump arc, a point where grounding should
    /// be re-evaluated even though no probe distance has changed yet.
    pub fn at_inflection(&self) -> bool {
        self.previous_vertical_velocity > VERTICAL_EPSILON
            && self.vertical_velocity <= VERTICAL_EPSILON
    }

    /// Vertical velocity recorded this tick.
    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    /// Seconds since the character was last grounded.
    pub fn time_since_grounded(&self) -> f32 {
        self.time_since_grounded
    }

    /// Distance from the capsule center to its lowest point.
    pub fn foot_offset(&self) -> f32 {
        self.capsule_half_height + self.capsule_radius
    }

    /// Launch speed for a jump, scaled by gravity magnitude so the apex
    /// height tracks `config.jump_height` regardless of gravity tuning.
    pub fn launch_speed(&self, config: &ControllerConfig) -> f32 {
        (2.0 * self.gravity.length() * config.jump_height).sqrt()
    }

    /// Record this tick's vertical velocity, shifting the previous sample.
    pub(crate) fn record_vertical(&mut self, vertical: f32) {
        self.previous_vertical_velocity = self.vertical_velocity;
        self.vertical_velocity = vertical;
    }

    /// Update the grounded cache. Returns `true` on a false-to-true edge,
    /// the moment the caller must stabilize the body.
    pub(crate) fn set_grounded(&mut self, grounded: bool, now: f32) -> bool {
        let just_landed = grounded && !self.grounded;
        self.grounded = grounded;
        if grounded {
            self.last_ground_contact = now;
            self.time_since_grounded = 0.0;
        }
        just_landed
    }

    /// Clear ground state at the moment of a jump launch, so landing logic
    /// cannot fire off the launch surface.
    pub(crate) fn mark_jump(&mut self, now: f32) {
        self.grounded = false;
        self.last_ground_contact = f32::NEG_INFINITY;
        self.last_jump_time = now;
    }
}

/// Tuning parameters for the locomotion controller.
///
/// Distances are in world units (meters), speeds in units per second,
/// durations in seconds.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct ControllerConfig {
    // === Movement ===
    /// Maximum horizontal movement speed.
    pub move_speed: f32,
    /// Apex height of a jump.
    pub jump_height: f32,
    /// Per-tick multiplier applied to horizontal velocity while grounded
    /// with no input. Values in (0, 1); lower stops faster. Velocity decays
    /// geometrically toward zero instead of popping to an instant stop.
    pub stop_damping: f32,
    /// Extra horizontal acceleration applied while below `move_speed`, for
    /// smoother ramp-up on backends that support continuous forces.
    /// Zero disables it; velocity-only control must feel correct without it.
    pub ramp_up_accel: f32,

    // === Ground sensing ===
    /// Minimum simulated time between ground probes. Bounds per-tick cost.
    pub ground_probe_interval: f32,
    /// How far below the capsule's lowest point the grounding rays reach.
    pub ground_probe_distance: f32,
    /// Lateral probe offsets as a fraction of the capsule radius.
    pub probe_lateral_scale: f32,
    /// Contact manifold points closer than this count as a confirmed touch.
    pub penetration_epsilon: f32,
    /// Above this upward vertical velocity, lateral rays are skipped and
    /// only the center ray runs, so the launch surface is not re-detected
    /// right after a jump.
    pub upward_probe_skip_speed: f32,
    /// Vertical velocity below this counts as a strong fall; snapping from
    /// below it to near-zero in one tick is treated as a landing even
    /// without a fresh ray hit.
    pub inflection_drop_speed: f32,

    // === Landing / phase timing ===
    /// Window for the landed-recently secondary signal.
    pub landed_recently_window: f32,
    /// Minimum time in Airborne before Landing may be entered. Prevents
    /// self-landing off the launch surface right after a jump impulse.
    pub min_airborne_time: f32,
    /// Minimum time in Landing before Idle/Walking may be entered, even if
    /// grounded is already true at entry. Prevents flicker on bumpy contact.
    pub landing_dwell: f32,
    /// Horizontal velocity multiplier applied at the instant of landing.
    pub landing_horizontal_damping: f32,
    /// Vertical velocity multiplier applied at the instant of landing.
    pub landing_vertical_damping: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Movement
            move_speed: 5.0,
            jump_height: 1.2,
            stop_damping: 0.8,
            ramp_up_accel: 0.0,

            // Ground sensing
            ground_probe_interval: 0.025,
            ground_probe_distance: 0.2,
            probe_lateral_scale: 0.7,
            penetration_epsilon: 0.01,
            upward_probe_skip_speed: 0.5,
            inflection_drop_speed: -3.0,

            // Landing / phase timing
            landed_recently_window: 0.1,
            min_airborne_time: 0.15,
            landing_dwell: 0.1,
            landing_horizontal_damping: 0.9,
            landing_vertical_damping: 0.6,
        }
    }
}

impl ControllerConfig {
    /// Config tuned for responsive player control.
    pub fn player() -> Self {
        Self {
            move_speed: 6.0,
            jump_height: 1.4,
            ramp_up_accel: 30.0,
            ..default()
        }
    }

    /// Builder: set the maximum horizontal speed.
    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Builder: set the jump apex height.
    pub fn with_jump_height(mut self, height: f32) -> Self {
        self.jump_height = height;
        self
    }

    /// Builder: set the no-input horizontal damping multiplier.
    pub fn with_stop_damping(mut self, damping: f32) -> Self {
        self.stop_damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the ramp-up acceleration (zero disables).
    pub fn with_ramp_up_accel(mut self, accel: f32) -> Self {
        self.ramp_up_accel = accel.max(0.0);
        self
    }

    /// Builder: set the ground probe throttle interval.
    pub fn with_probe_interval(mut self, interval: f32) -> Self {
        self.ground_probe_interval = interval.max(0.0);
        self
    }

    /// Builder: set the minimum airborne time before landing.
    pub fn with_min_airborne_time(mut self, time: f32) -> Self {
        self.min_airborne_time = time.max(0.0);
        self
    }

    /// Builder: set the minimum landing dwell time.
    pub fn with_landing_dwell(mut self, dwell: f32) -> Self {
        self.landing_dwell = dwell.max(0.0);
        self
    }
}

/// Partial per-axis override for velocity or acceleration.
///
/// Unspecified axes keep their current value.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use locomotion_controller::prelude::*;
///
/// let launch = AxisOverride::new().y(5.0);
/// let result = launch.apply_to(Vec3::new(2.0, -1.0, 3.0));
/// assert_eq!(result, Vec3::new(2.0, 5.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisOverride {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl AxisOverride {
    /// Create an override that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the x axis.
    pub fn x(mut self, value: f32) -> Self {
        self.x = Some(value);
        self
    }

    /// Override the y axis.
    pub fn y(mut self, value: f32) -> Self {
        self.y = Some(value);
        self
    }

    /// Override the z axis.
    pub fn z(mut self, value: f32) -> Self {
        self.z = Some(value);
        self
    }

    /// Apply the override on top of `current`.
    pub fn apply_to(&self, current: Vec3) -> Vec3 {
        Vec3::new(
            self.x.unwrap_or(current.x),
            self.y.unwrap_or(current.y),
            self.z.unwrap_or(current.z),
        )
    }

    /// True if no axis is overridden.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// True if every specified axis is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.map_or(true, f32::is_finite)
            && self.y.map_or(true, f32::is_finite)
            && self.z.map_or(true, f32::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn body_defaults() {
        let body = CharacterBody::new();
        assert!(!body.grounded());
        assert_eq!(body.gravity, Vec3::new(0.0, -9.81, 0.0));
        assert_relative_eq!(body.foot_offset(), 0.9);
    }

    #[test]
    fn body_with_gravity() {
        let gravity = Vec3::new(0.0, -20.0, 0.0);
        let body = CharacterBody::with_gravity(gravity);
        assert_eq!(body.gravity, gravity);
    }

    #[test]
    fn launch_speed_scales_with_gravity() {
        let config = ControllerConfig::default();
        let normal = CharacterBody::new().launch_speed(&config);
        let heavy = CharacterBody::with_gravity(Vec3::new(0.0, -4.0 * 9.81, 0.0))
            .launch_speed(&config);

        // Quadrupled gravity doubles the required launch speed for the
        // same apex height.
        assert_relative_eq!(heavy, 2.0 * normal, epsilon = 1e-4);
    }

    #[test]
    fn landed_recently_window() {
        let mut body = CharacterBody::new();
        assert!(!body.landed_recently(0.1, 10.0));

        body.set_grounded(true, 10.0);
        assert!(body.landed_recently(0.1, 10.05));
        assert!(!body.landed_recently(0.1, 10.3));
    }

    #[test]
    fn set_grounded_reports_landing_edge_once() {
        let mut body = CharacterBody::new();
        assert!(body.set_grounded(true, 1.0));
        assert!(!body.set_grounded(true, 1.1));
        assert!(!body.set_grounded(false, 1.2));
        assert!(body.set_grounded(true, 1.3));
    }

    #[test]
    fn inflection_detected_at_apex() {
        let mut body = CharacterBody::new();
        body.record_vertical(4.0);
        assert!(!body.at_inflection());

        body.record_vertical(0.05);
        assert!(body.at_inflection());

        // One tick later the crossing is in the past.
        body.record_vertical(-0.5);
        assert!(!body.at_inflection());
    }

    #[test]
    fn no_inflection_while_rising() {
        let mut body = CharacterBody::new();
        body.record_vertical(4.0);
        body.record_vertical(3.0);
        assert!(!body.at_inflection());
    }

    #[test]
    fn mark_jump_clears_ground_state() {
        let mut body = CharacterBody::new();
        body.set_grounded(true, 5.0);
        body.mark_jump(5.5);

        assert!(!body.grounded());
        assert!(!body.landed_recently(0.1, 5.5));
        assert_eq!(body.last_jump_time, 5.5);
    }

    #[test]
    fn config_player_preset_is_snappier() {
        let player = ControllerConfig::player();
        let default = ControllerConfig::default();
        assert!(player.move_speed >= default.move_speed);
        assert!(player.ramp_up_accel > 0.0);
    }

    #[test]
    fn config_builders_clamp() {
        let config = ControllerConfig::default()
            .with_stop_damping(2.0)
            .with_ramp_up_accel(-5.0)
            .with_probe_interval(-1.0);

        assert_eq!(config.stop_damping, 1.0);
        assert_eq!(config.ramp_up_accel, 0.0);
        assert_eq!(config.ground_probe_interval, 0.0);
    }

    #[test]
    fn axis_override_applies_partially() {
        let current = Vec3::new(1.0, 2.0, 3.0);

        assert_eq!(AxisOverride::new().apply_to(current), current);
        assert_eq!(
            AxisOverride::new().y(5.0).apply_to(current),
            Vec3::new(1.0, 5.0, 3.0)
        );
        assert_eq!(
            AxisOverride::new().x(0.0).z(0.0).apply_to(current),
            Vec3::new(0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn axis_override_finite_check() {
        assert!(AxisOverride::new().is_finite());
        assert!(AxisOverride::new().x(1.0).is_finite());
        assert!(!AxisOverride::new().y(f32::NAN).is_finite());
        assert!(!AxisOverride::new().z(f32::INFINITY).is_finite());
    }

    #[test]
    fn axis_override_is_empty() {
        assert!(AxisOverride::new().is_empty());
        assert!(!AxisOverride::new().x(0.0).is_empty());
    }
}
