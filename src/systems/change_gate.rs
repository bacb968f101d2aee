use crate::{
    geometry_utils::{angle_between, distance},
    streamer_config::StreamerConfig,
};

use super::relative_pose::RelativePose;

#[derive(Debug, Clone, Copy)]
pub struct ChangeThresholds {
    pub position: f32,
    /// Degrees
    pub rotation: f32,
}

impl ChangeThresholds {
    pub fn from_config(config: &StreamerConfig) -> Self {
        ChangeThresholds {
            position: config.position_threshold,
            rotation: config.rotation_threshold,
        }
    }
}

/// Emit if EITHER the position or the rotation moved past its threshold
pub fn should_emit(
    candidate: &RelativePose,
    last_emitted: &RelativePose,
    thresholds: &ChangeThresholds,
) -> bool {
    let position_delta = distance(&candidate.position, &last_emitted.position);
    let rotation_delta = angle_between(&candidate.rotation, &last_emitted.rotation);
    position_delta > thresholds.position || rotation_delta > thresholds.rotation
}

/// Dead-banding against the last sample that was actually sent. The baseline
/// starts at the origin with no rotation.
pub struct ChangeThresholdGate {
    thresholds: ChangeThresholds,
    last_emitted: RelativePose,
}

impl ChangeThresholdGate {
    pub fn new(thresholds: ChangeThresholds) -> Self {
        ChangeThresholdGate {
            thresholds,
            last_emitted: RelativePose::default(),
        }
    }

    pub fn should_emit(&self, candidate: &RelativePose) -> bool {
        should_emit(candidate, &self.last_emitted, &self.thresholds)
    }

    /// Only call this once the candidate has really been sent
    pub fn commit(&mut self, emitted: &RelativePose) {
        self.last_emitted = *emitted;
    }

    pub fn last_emitted(&self) -> &RelativePose {
        &self.last_emitted
    }

    pub fn set_thresholds(&mut self, thresholds: ChangeThresholds) {
        self.thresholds = thresholds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    fn thresholds() -> ChangeThresholds {
        ChangeThresholds {
            position: 0.002,
            rotation: 0.3,
        }
    }

    fn relative(position: [f32; 3], yaw_degrees: f32) -> RelativePose {
        RelativePose {
            position: Vector3::from(position),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw_degrees.to_radians()),
        }
    }

    #[test]
    fn test_first_real_sample_emits() {
        let gate = ChangeThresholdGate::new(thresholds());
        assert!(gate.should_emit(&relative([0.1, -0.3, 0.4], 12.)));
    }

    #[test]
    fn test_small_position_change_is_gated() {
        let mut gate = ChangeThresholdGate::new(thresholds());
        gate.commit(&relative([0.1, 0., 0.], 0.));
        assert!(!gate.should_emit(&relative([0.1019, 0., 0.], 0.)));
    }

    #[test]
    fn test_position_only_change_emits() {
        let mut gate = ChangeThresholdGate::new(thresholds());
        gate.commit(&relative([0.1, 0., 0.], 30.));
        assert!(gate.should_emit(&relative([0.1, 0.003, 0.], 30.)));
    }

    #[test]
    fn test_rotation_only_change_emits() {
        let mut gate = ChangeThresholdGate::new(thresholds());
        gate.commit(&relative([0.1, 0., 0.], 30.));
        assert!(gate.should_emit(&relative([0.1, 0., 0.], 30.5)));
        assert!(!gate.should_emit(&relative([0.1, 0., 0.], 30.1)));
    }

    #[test]
    fn test_baseline_only_moves_on_commit() {
        let mut gate = ChangeThresholdGate::new(thresholds());
        let first = relative([0.2, 0.2, 0.2], 10.);
        assert!(gate.should_emit(&first));
        gate.commit(&first);

        // A run of tiny changes never emits, because the baseline stays put
        let mut emitted = 0;
        for i in 1..=20 {
            let drift = 0.00005 * i as f32;
            if gate.should_emit(&relative([0.2 + drift, 0.2, 0.2], 10.)) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 0);
        assert_eq!(gate.last_emitted(), &first);

        // ...but accumulated drift past the threshold does
        assert!(gate.should_emit(&relative([0.2021, 0.2, 0.2], 10.)));
    }
}
