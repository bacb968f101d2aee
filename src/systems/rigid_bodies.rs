use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::debug;

use crate::tracking::RigidBodyPose;

#[derive(Debug)]
struct KnownBody {
    pose: RigidBodyPose,
    last_updated: Instant,
}

/// Latest pose of every rigid body the capture system has reported
pub struct RigidBodyTracker {
    known_bodies: IndexMap<String, KnownBody>,
    expire_after: Option<Duration>,
}

impl RigidBodyTracker {
    pub fn new(expire_after: Option<Duration>) -> Self {
        RigidBodyTracker {
            known_bodies: IndexMap::new(),
            expire_after,
        }
    }

    pub fn update_from_frame(&mut self, frame: &[RigidBodyPose], now: Instant) {
        for pose in frame {
            if !self.known_bodies.contains_key(&pose.name) {
                debug!("Added new rigid body \"{}\"", pose.name);
            }
            self.known_bodies.insert(
                pose.name.clone(),
                KnownBody {
                    pose: pose.clone(),
                    last_updated: now,
                },
            );
        }
    }

    /// The body's latest pose, unless it was reported untracked, has never been
    /// seen, or has not been updated recently enough
    pub fn get_tracked(&self, name: &str, now: Instant) -> Option<&RigidBodyPose> {
        let body = self.known_bodies.get(name)?;
        if !body.pose.tracked {
            return None;
        }
        if let Some(expire_after) = self.expire_after {
            if now.saturating_duration_since(body.last_updated) > expire_after {
                return None;
            }
        }
        Some(&body.pose)
    }

    pub fn set_expiry(&mut self, expire_after: Option<Duration>) {
        self.expire_after = expire_after;
    }

    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        self.known_bodies.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_pose_wins() {
        let now = Instant::now();
        let mut tracker = RigidBodyTracker::new(None);
        tracker.update_from_frame(&[RigidBodyPose::new("phone", [1., 0., 0.], [0., 0., 0., 1.])], now);
        tracker.update_from_frame(&[RigidBodyPose::new("phone", [2., 0., 0.], [0., 0., 0., 1.])], now);
        assert_eq!(tracker.get_tracked("phone", now).unwrap().position, [2., 0., 0.]);
        assert!(tracker.get_tracked("hololens", now).is_none());
        assert_eq!(tracker.known_names().collect::<Vec<_>>(), vec!["phone"]);
    }

    #[test]
    fn test_untracked_flag() {
        let now = Instant::now();
        let mut tracker = RigidBodyTracker::new(None);
        tracker.update_from_frame(&[RigidBodyPose::untracked("phone")], now);
        assert!(tracker.get_tracked("phone", now).is_none());
    }

    #[test]
    fn test_stale_body_expires() {
        let now = Instant::now();
        let mut tracker = RigidBodyTracker::new(Some(Duration::from_millis(500)));
        tracker.update_from_frame(&[RigidBodyPose::new("phone", [1., 0., 0.], [0., 0., 0., 1.])], now);
        assert!(tracker.get_tracked("phone", now + Duration::from_millis(400)).is_some());
        assert!(tracker.get_tracked("phone", now + Duration::from_millis(600)).is_none());
    }
}
