use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    geometry_utils::{quaternion_to_xyzw, vector_to_array},
    streamer_config::StreamerConfig,
    tracking::{timestamp_millis, RelativeTransformSample},
    transport::{MessageKind, Transport},
};

use super::{
    coordinate_conversion::ConvertedPose, relative_pose::RelativePose,
    session_target::Participant,
};

/// How payloads are encoded before being handed to the transport
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PayloadEncoding {
    /// MessagePack with named fields, as usual for Tether
    #[default]
    MessagePack,
    Json,
}

impl PayloadEncoding {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let payload = match self {
            PayloadEncoding::MessagePack => rmp_serde::to_vec_named(value)?,
            PayloadEncoding::Json => serde_json::to_vec(value)?,
        };
        Ok(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Nobody to send to; the message was dropped
    NoTarget,
}

pub struct Transmitter {
    encoding: PayloadEncoding,
    include_world_transforms: bool,
}

impl Transmitter {
    pub fn new(config: &StreamerConfig) -> Self {
        Transmitter {
            encoding: config.payload_encoding,
            include_world_transforms: config.send_world_transforms,
        }
    }

    pub fn build_full_sample(
        &self,
        relative: &RelativePose,
        phone: &ConvertedPose,
        hololens: &ConvertedPose,
    ) -> RelativeTransformSample {
        let mut sample = RelativeTransformSample {
            relative_position: vector_to_array(&relative.position),
            relative_rotation: quaternion_to_xyzw(&relative.rotation),
            phone_world_position: None,
            phone_world_rotation: None,
            hololens_world_position: None,
            hololens_world_rotation: None,
            timestamp: timestamp_millis(),
            phone_tracked: true,
            hololens_tracked: true,
        };

        if self.include_world_transforms {
            sample.phone_world_position = Some(vector_to_array(&phone.position));
            sample.phone_world_rotation = Some(quaternion_to_xyzw(&phone.rotation));
            sample.hololens_world_position = Some(vector_to_array(&hololens.position));
            sample.hololens_world_rotation = Some(quaternion_to_xyzw(&hololens.rotation));
        }

        sample
    }

    pub fn build_status_sample(
        &self,
        phone_tracked: bool,
        hololens_tracked: bool,
    ) -> RelativeTransformSample {
        RelativeTransformSample::tracking_status(phone_tracked, hololens_tracked)
    }

    /// Send to the target only; with no target this is a no-op
    pub fn send(
        &self,
        sample: &RelativeTransformSample,
        target: Option<&Participant>,
        transport: &mut dyn Transport,
    ) -> Result<SendOutcome> {
        let Some(target) = target else {
            debug!("No session target connected; dropping relative transform");
            return Ok(SendOutcome::NoTarget);
        };
        let payload = self.encoding.encode(sample)?;
        transport.send(&target.id, MessageKind::RelativeTransform, &payload)?;
        Ok(SendOutcome::Sent)
    }
}

/// Lets the pipeline run at most once per interval, however often it is ticked
pub struct SendInterval {
    interval: Duration,
    last_run: Option<Instant>,
}

impl SendInterval {
    pub fn new(interval: Duration) -> Self {
        SendInterval {
            interval,
            last_run: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last_run) => now.saturating_duration_since(last_run) >= self.interval,
        }
    }

    pub fn reset_timer(&mut self, now: Instant) {
        self.last_run = Some(now);
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use nalgebra::{UnitQuaternion, Vector3};

    fn converted(position: [f32; 3]) -> ConvertedPose {
        ConvertedPose {
            position: Vector3::from(position),
            rotation: UnitQuaternion::identity(),
        }
    }

    #[test]
    fn test_world_transforms_follow_config() {
        let relative = RelativePose::default();
        let phone = converted([1., 2., 3.]);
        let hololens = converted([4., 5., 6.]);

        let with_world = Transmitter::new(&StreamerConfig::default());
        let sample = with_world.build_full_sample(&relative, &phone, &hololens);
        assert_eq!(sample.phone_world_position, Some([1., 2., 3.]));
        assert_eq!(sample.hololens_world_position, Some([4., 5., 6.]));
        assert_eq!(sample.hololens_world_rotation, Some([0., 0., 0., 1.]));
        assert_eq!(sample.relative_rotation, [0., 0., 0., 1.]);

        let without_world = Transmitter::new(&StreamerConfig {
            send_world_transforms: false,
            ..Default::default()
        });
        let sample = without_world.build_full_sample(&relative, &phone, &hololens);
        assert!(sample.phone_world_position.is_none());
        assert!(sample.hololens_world_rotation.is_none());
        assert!(sample.phone_tracked && sample.hololens_tracked);
    }

    #[test]
    fn test_send_without_target_is_noop() {
        let transmitter = Transmitter::new(&StreamerConfig::default());
        let mut transport = InMemoryTransport::new();
        let sample = transmitter.build_status_sample(false, true);
        let outcome = transmitter.send(&sample, None, &mut transport).unwrap();
        assert_eq!(outcome, SendOutcome::NoTarget);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_send_is_addressed_to_target() {
        let transmitter = Transmitter::new(&StreamerConfig::default());
        let mut transport = InMemoryTransport::new();
        let target = Participant::new("hmd-7", "hmd");
        let sample = transmitter.build_status_sample(false, true);

        let outcome = transmitter
            .send(&sample, Some(&target), &mut transport)
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].target_id, "hmd-7");
        assert_eq!(transport.sent[0].kind, MessageKind::RelativeTransform);

        let decoded: RelativeTransformSample =
            rmp_serde::from_slice(&transport.sent[0].payload).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_json_encoding() {
        let transmitter = Transmitter::new(&StreamerConfig {
            payload_encoding: PayloadEncoding::Json,
            ..Default::default()
        });
        let mut transport = InMemoryTransport::new();
        let target = Participant::new("hmd-7", "hmd");
        let sample = transmitter.build_status_sample(true, false);
        transmitter
            .send(&sample, Some(&target), &mut transport)
            .unwrap();

        let text = String::from_utf8(transport.sent[0].payload.clone()).unwrap();
        assert!(text.contains("\"hololensTracked\":false"));
        assert!(!text.contains("phoneWorldPosition"));
    }

    #[test]
    fn test_transport_failure_is_an_error() {
        let transmitter = Transmitter::new(&StreamerConfig::default());
        let mut transport = InMemoryTransport {
            failing: true,
            ..Default::default()
        };
        let target = Participant::new("hmd-7", "hmd");
        let sample = transmitter.build_status_sample(true, true);
        assert!(transmitter
            .send(&sample, Some(&target), &mut transport)
            .is_err());
    }

    #[test]
    fn test_send_interval() {
        let t0 = Instant::now();
        let mut interval = SendInterval::new(Duration::from_millis(20));
        assert!(interval.is_due(t0));
        interval.reset_timer(t0);
        assert!(!interval.is_due(t0 + Duration::from_millis(5)));
        assert!(!interval.is_due(t0 + Duration::from_millis(19)));
        assert!(interval.is_due(t0 + Duration::from_millis(20)));
    }
}
