//! Ground detection logic.
//!
//! A single downward ray from the capsule center is unreliable on edges,
//! slopes and small objects, and "any contact means grounded" fires false
//! positives right after a jump while the body still overlaps its launch
//! surface. Grounding therefore combines three independent signals:
//!
//! 1. A multi-point ray fan below the capsule (center plus four lateral
//!    offsets), reduced to the center ray while moving clearly upward.
//! 2. A contact-penetration fallback, consulted only while vertical
//!    velocity is non-positive.
//! 3. A velocity-inflection heuristic that treats a hard stop of a fall as
//!    a landing even when no fresh ray hit is available yet.
//!
//! Everything in this module is pure math over sampled values, so it is
//! unit-testable without a physics world. The backend module turns the ray
//! descriptions produced here into actual physics queries.

use bevy::prelude::*;

use crate::config::VERTICAL_EPSILON;

/// One downward grounding ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeRay {
    /// Ray origin in world space.
    pub origin: Vec3,
    /// Cast length.
    pub length: f32,
}

/// Downward ray fan below a capsule.
///
/// `center` is the capsule center, `foot_offset` the distance from the
/// center to the capsule's lowest point. Lateral rays sit at
/// `lateral_scale * radius` on the x and z axes. With `center_only` the
/// fan collapses to the center ray, used while the body moves clearly
/// upward so the launch surface is not re-detected.
pub fn probe_fan(
    center: Vec3,
    foot_offset: f32,
    radius: f32,
    lateral_scale: f32,
    length: f32,
    center_only: bool,
) -> Vec<ProbeRay> {
    let foot = center - Vec3::Y * foot_offset;
    let mut rays = vec![ProbeRay {
        origin: foot,
        length,
    }];

    if !center_only {
        let side = radius * lateral_scale;
        for offset in [
            Vec3::new(side, 0.0, 0.0),
            Vec3::new(-side, 0.0, 0.0),
            Vec3::new(0.0, 0.0, side),
            Vec3::new(0.0, 0.0, -side),
        ] {
            rays.push(ProbeRay {
                origin: foot + offset,
                length,
            });
        }
    }

    rays
}

/// The three grounding signals gathered for one probe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroundSignals {
    /// Any ray of the fan hit within range.
    pub ray_hit: bool,
    /// A contact manifold point confirmed a touch (only gathered while
    /// vertical velocity is non-positive).
    pub contact: bool,
    /// Vertical velocity snapped from a strong fall to near-zero.
    pub inflection_landing: bool,
}

impl GroundSignals {
    /// Combine the signals into a grounded verdict.
    pub fn grounded(&self) -> bool {
        self.ray_hit || self.contact || self.inflection_landing
    }
}

/// True if vertical velocity snapped from a strong fall to near-zero in one
/// tick. Covers landings that fall inside the probe throttle window or on
/// geometry the ray fan misses (thin edges, moving platforms).
pub fn snap_landing(previous_vertical: f32, vertical: f32, drop_speed: f32) -> bool {
    previous_vertical < drop_speed && vertical.abs() <= VERTICAL_EPSILON
}

/// Velocity after the landing-instant stabilization.
///
/// Scales horizontal velocity by `horizontal` and vertical by `vertical` to
/// suppress simulator bounce and jitter on impact.
pub fn stabilized_velocity(velocity: Vec3, horizontal: f32, vertical: f32) -> Vec3 {
    Vec3::new(
        velocity.x * horizontal,
        velocity.y * vertical,
        velocity.z * horizontal,
    )
}

/// Reject non-finite velocity read back from the physics engine.
///
/// Returns `None` when any component is NaN or infinite; callers fail
/// closed to zero movement for the tick instead of propagating the value.
pub fn sanitize(velocity: Vec3) -> Option<Vec3> {
    velocity.is_finite().then_some(velocity)
}
