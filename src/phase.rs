//! Locomotion phase machine.
//!
//! A character is always in exactly one movement phase: Idle, Walking,
//! Jumping, Airborne or Landing. Phases gate what input may do (walking is
//! disabled while airborne, jumping while landing) and drive animation and
//! camera consumers through [`Phase::name`].
//!
//! Phase kinds form a closed enum and the registration order is a static
//! table, so entering an unknown phase is impossible by construction.
//! Transition logic runs over a [`PhaseContext`] snapshot of the body, which
//! keeps the machine itself free of physics queries and unit-testable.

use bevy::prelude::*;

use crate::config::{ControllerConfig, VERTICAL_EPSILON};
use crate::error::ControllerError;

/// One movement phase.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Standing still on the ground.
    #[default]
    Idle,
    /// Moving on the ground under directional input.
    Walking,
    /// Ascending immediately after a jump launch. Entered only through the
    /// jump operation, never by the decision pass.
    Jumping,
    /// In the air, past the apex or falling. No directional control.
    Airborne,
    /// Touched down, settling before normal ground phases resume.
    Landing,
}

/// All phases in registration order. The decision pass walks this table;
/// earlier entries win when several candidates could be entered.
pub const PHASES: [Phase; 5] = [
    Phase::Idle,
    Phase::Walking,
    Phase::Jumping,
    Phase::Airborne,
    Phase::Landing,
];

impl Phase {
    /// Stable name for animation, camera and debug consumers.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Walking => "walking",
            Phase::Jumping => "jumping",
            Phase::Airborne => "airborne",
            Phase::Landing => "landing",
        }
    }

    /// Phases this phase may hand off to in the decision pass.
    ///
    /// Jumping appears in no list: it is entered explicitly by the jump
    /// operation. Idle and Walking both list Airborne so that walking off a
    /// ledge (or being pushed off one) is picked up by re-evaluation.
    pub fn allowed_next(self) -> &'static [Phase] {
        match self {
            Phase::Idle => &[Phase::Walking, Phase::Airborne],
            Phase::Walking => &[Phase::Idle, Phase::Airborne],
            Phase::Jumping => &[Phase::Airborne],
            Phase::Airborne => &[Phase::Landing],
            Phase::Landing => &[Phase::Idle, Phase::Walking],
        }
    }

    /// Whether directional input drives the body in this phase.
    /// Jumping retains directional control; Airborne does not.
    pub fn allows_walk(self) -> bool {
        !matches!(self, Phase::Airborne)
    }

    /// Whether a jump may be launched from this phase.
    pub fn allows_jump(self) -> bool {
        matches!(self, Phase::Idle | Phase::Walking)
    }

    /// Entry predicate: may this phase become active given the snapshot?
    pub fn can_enter(self, ctx: &PhaseContext) -> bool {
        match self {
            Phase::Idle => !ctx.input_active && ctx.vertically_settled(),
            Phase::Walking => ctx.input_active && ctx.vertically_settled(),
            Phase::Jumping => ctx.vertical_velocity > VERTICAL_EPSILON,
            Phase::Airborne => {
                !ctx.grounded || !ctx.vertically_settled() || ctx.at_inflection
            }
            Phase::Landing => ctx.grounded || ctx.landed_recently,
        }
    }

    /// Exit gate: whether the decision pass may leave this phase at all.
    ///
    /// Jumping holds until the launch velocity has decayed to the rest
    /// threshold, so a jump is never cut short by re-evaluation. Airborne
    /// holds for a minimum duration so a fresh jump cannot self-land off
    /// its own launch surface. Landing holds for a minimum dwell to
    /// suppress Landing/Idle flicker on bumpy contact.
    pub fn may_exit(self, ctx: &PhaseContext, time_in_phase: f32, config: &ControllerConfig) -> bool {
        match self {
            Phase::Jumping => ctx.vertical_velocity <= VERTICAL_EPSILON,
            Phase::Airborne => time_in_phase >= config.min_airborne_time,
            Phase::Landing => time_in_phase >= config.landing_dwell,
            _ => true,
        }
    }
}

/// Snapshot of the body state the phase predicates evaluate against.
///
/// Built once per tick by the phase system; building it is the fallible
/// part of phase evaluation (the body may not be ready, or the engine may
/// return non-finite values), and the predicates themselves are pure.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext {
    /// Cached grounded flag.
    pub grounded: bool,
    /// Vertical velocity this tick.
    pub vertical_velocity: f32,
    /// Whether directional input is active.
    pub input_active: bool,
    /// Whether vertical velocity just crossed the apex threshold.
    pub at_inflection: bool,
    /// Whether ground contact was registered within the recency window.
    pub landed_recently: bool,
}

impl PhaseContext {
    /// Vertical velocity is within the rest threshold.
    pub fn vertically_settled(&self) -> bool {
        self.vertical_velocity.abs() <= VERTICAL_EPSILON
    }
}

/// Per-character phase machine.
///
/// Tracks the active phase, the previous phase and the time spent in the
/// active phase. At most one transition happens per tick, so a single frame
/// can never thrash through multiple phases.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct PhaseMachine {
    current: Phase,
    previous: Phase,
    time_in_phase: f32,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(Phase::Idle)
    }
}

impl PhaseMachine {
    /// Create a machine starting in `initial`.
    pub fn new(initial: Phase) -> Self {
        Self {
            current: initial,
            previous: initial,
            time_in_phase: 0.0,
        }
    }

    /// The active phase.
    pub fn current(&self) -> Phase {
        self.current
    }

    /// The phase that was active before the last transition.
    pub fn previous(&self) -> Phase {
        self.previous
    }

    /// Seconds spent in the active phase.
    pub fn time_in_phase(&self) -> f32 {
        self.time_in_phase
    }

    /// Stable name of the active phase.
    pub fn phase_name(&self) -> &'static str {
        self.current.name()
    }

    /// Advance the in-phase timer. Called once per tick, before the
    /// decision pass, so exit gates see the time up to and including the
    /// current tick.
    pub fn tick(&mut self, dt: f32) {
        self.time_in_phase += dt;
    }

    fn transition(&mut self, next: Phase) {
        self.previous = self.current;
        self.current = next;
        self.time_in_phase = 0.0;
    }

    /// Force the machine into `next`, bypassing the transition table.
    ///
    /// Used by the jump operation, which is the only way to enter Jumping.
    /// Self-transitions are rejected.
    pub(crate) fn force_enter(&mut self, next: Phase) -> Result<(), ControllerError> {
        if next == self.current {
            return Err(ControllerError::PhaseEvaluation {
                reason: "self-transition",
            });
        }
        self.transition(next);
        Ok(())
    }

    /// Run one decision pass over the registration table.
    ///
    /// While the current phase's exit gate holds, no candidate is
    /// considered. Otherwise candidates are visited in registration order;
    /// the current phase and phases outside its allowed-next set are
    /// skipped; the first candidate whose entry predicate holds wins.
    ///
    /// Returns the phase entered, if any. At most one transition per call.
    pub fn decide(&mut self, ctx: &PhaseContext, config: &ControllerConfig) -> Option<Phase> {
        if !self.current.may_exit(ctx, self.time_in_phase, config) {
            return None;
        }

        for candidate in PHASES {
            if candidate == self.current {
                continue;
            }
            if !self.current.allowed_next().contains(&candidate) {
                continue;
            }
            if candidate.can_enter(ctx) {
                self.transition(candidate);
                return Some(candidate);
            }
        }

        None
    }
}
