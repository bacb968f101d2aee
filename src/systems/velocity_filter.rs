use std::time::{Duration, Instant};

use log::{debug, warn};
use nalgebra::UnitQuaternion;

use crate::{geometry_utils::angle_between, streamer_config::StreamerConfig};

#[derive(Debug, Clone, Copy)]
pub struct VelocityFilterSettings {
    pub enabled: bool,
    /// Degrees per second
    pub max_angular_velocity: f32,
    pub suppression_duration: Duration,
}

impl VelocityFilterSettings {
    pub fn from_config(config: &StreamerConfig) -> Self {
        VelocityFilterSettings {
            enabled: config.enable_rotation_velocity_filter,
            max_angular_velocity: config.max_head_angular_velocity,
            suppression_duration: suppression_duration(config.velocity_filter_duration),
        }
    }
}

/// Negative or NaN durations mean no cooldown; anything too large for a
/// `Duration` saturates
fn suppression_duration(seconds: f32) -> Duration {
    Duration::try_from_secs_f32(seconds.max(0.)).unwrap_or_else(|_| {
        warn!(
            "Velocity filter duration {} is out of range; cooldown never ends",
            seconds
        );
        Duration::MAX
    })
}

/// Everything the filter remembers between ticks. Uninitialised until the
/// first observation.
#[derive(Debug, Clone, Copy)]
pub struct VelocityFilterState {
    last_rotation: UnitQuaternion<f32>,
    last_checked: Option<Instant>,
    last_fast_movement: Option<Instant>,
}

impl Default for VelocityFilterState {
    fn default() -> Self {
        VelocityFilterState {
            last_rotation: UnitQuaternion::identity(),
            last_checked: None,
            last_fast_movement: None,
        }
    }
}

impl VelocityFilterState {
    pub fn is_initialized(&self) -> bool {
        self.last_checked.is_some()
    }

    pub fn last_rotation(&self) -> &UnitQuaternion<f32> {
        &self.last_rotation
    }

    pub fn last_fast_movement(&self) -> Option<Instant> {
        self.last_fast_movement
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SuppressionReason {
    /// Reference body rotated faster than allowed on this tick
    FastRotation { degrees_per_second: f32 },
    /// Still inside the cooldown window after a fast rotation
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterDecision {
    Normal,
    Suppressed(SuppressionReason),
}

/// One step of the filter. The returned state always carries the new
/// rotation and time, whatever the decision.
pub fn evaluate(
    state: &VelocityFilterState,
    settings: &VelocityFilterSettings,
    rotation: &UnitQuaternion<f32>,
    now: Instant,
) -> (VelocityFilterState, FilterDecision) {
    let mut next = VelocityFilterState {
        last_rotation: *rotation,
        last_checked: Some(now),
        last_fast_movement: state.last_fast_movement,
    };

    let last_checked = match state.last_checked {
        Some(t) if settings.enabled => t,
        _ => return (next, FilterDecision::Normal),
    };

    let elapsed = now.saturating_duration_since(last_checked).as_secs_f32();
    if elapsed <= 0. {
        // Cannot estimate a velocity; let it through, leave the marker alone
        return (next, FilterDecision::Normal);
    }

    let degrees_per_second = angle_between(&state.last_rotation, rotation) / elapsed;
    if degrees_per_second > settings.max_angular_velocity {
        next.last_fast_movement = Some(now);
        return (
            next,
            FilterDecision::Suppressed(SuppressionReason::FastRotation { degrees_per_second }),
        );
    }

    let in_cooldown = state
        .last_fast_movement
        .is_some_and(|t| now.saturating_duration_since(t) < settings.suppression_duration);
    if in_cooldown {
        (next, FilterDecision::Suppressed(SuppressionReason::Cooldown))
    } else {
        (next, FilterDecision::Normal)
    }
}

/// Suppresses output while (and shortly after) the reference body rotates
/// implausibly fast.
pub struct RotationVelocityFilter {
    settings: VelocityFilterSettings,
    state: VelocityFilterState,
}

impl RotationVelocityFilter {
    pub fn new(settings: VelocityFilterSettings) -> Self {
        RotationVelocityFilter {
            settings,
            state: VelocityFilterState::default(),
        }
    }

    pub fn update(&mut self, rotation: &UnitQuaternion<f32>, now: Instant) -> FilterDecision {
        let (next, decision) = evaluate(&self.state, &self.settings, rotation, now);
        self.state = next;
        if let FilterDecision::Suppressed(SuppressionReason::FastRotation { degrees_per_second }) =
            decision
        {
            debug!(
                "Suppressing update - Head: {:.1}°/s > {:.1}°/s",
                degrees_per_second, self.settings.max_angular_velocity
            );
        }
        decision
    }

    pub fn state(&self) -> &VelocityFilterState {
        &self.state
    }

    pub fn set_settings(&mut self, settings: VelocityFilterSettings) {
        self.settings = settings;
    }
}
