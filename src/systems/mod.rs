pub mod change_gate;
pub mod coordinate_conversion;
pub mod relative_pose;
pub mod rigid_bodies;
pub mod session_target;
pub mod transmitter;
pub mod velocity_filter;

use std::time::Instant;

use anyhow::Result;
use change_gate::{ChangeThresholdGate, ChangeThresholds};
use coordinate_conversion::CoordinateConverter;
use log::{debug, info, warn};
use rigid_bodies::RigidBodyTracker;
use session_target::{SessionTargetResolver, TargetChange};
use transmitter::{SendInterval, SendOutcome, Transmitter};
use velocity_filter::{
    FilterDecision, RotationVelocityFilter, SuppressionReason, VelocityFilterSettings,
};

use crate::{streamer_config::StreamerConfig, transport::Transport};

/// What a single call to [`Systems::tick`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Too soon since the last evaluation
    NotDue,
    /// No session target connected; nothing evaluated or sent
    NoTarget,
    /// At least one body untracked; a tracking-status-only sample was sent
    StatusSent {
        phone_tracked: bool,
        hololens_tracked: bool,
    },
    /// The rotation velocity filter held this tick back
    Suppressed(SuppressionReason),
    /// Not enough change since the last sent sample
    BelowThreshold,
    Sent,
}

pub struct Systems {
    pub rigid_bodies: RigidBodyTracker,
    pub converter: CoordinateConverter,
    pub velocity_filter: RotationVelocityFilter,
    pub change_gate: ChangeThresholdGate,
    pub session_target: SessionTargetResolver,
    pub transmitter: Transmitter,
    pub send_interval: SendInterval,
    phone_rigid_body: String,
    hololens_rigid_body: String,
}

impl Systems {
    pub fn new(config: &StreamerConfig) -> Systems {
        info!(
            "Streaming \"{}\" relative to \"{}\" at {}Hz",
            config.phone_rigid_body, config.hololens_rigid_body, config.send_rate
        );
        Systems {
            rigid_bodies: RigidBodyTracker::new(config.body_expiry()),
            converter: CoordinateConverter::new(config),
            velocity_filter: RotationVelocityFilter::new(VelocityFilterSettings::from_config(
                config,
            )),
            change_gate: ChangeThresholdGate::new(ChangeThresholds::from_config(config)),
            session_target: SessionTargetResolver::new(&config.target_role),
            transmitter: Transmitter::new(config),
            send_interval: SendInterval::new(config.send_interval()),
            phone_rigid_body: config.phone_rigid_body.clone(),
            hololens_rigid_body: config.hololens_rigid_body.clone(),
        }
    }

    /// Take on new settings without forgetting filter or gate state. A change
    /// of target role re-resolves the target from the current roster, and
    /// returns the resulting target change, if any.
    pub fn apply_config(&mut self, config: &StreamerConfig) -> Option<TargetChange> {
        let mut target_change = None;
        if config.target_role != self.session_target.target_role() {
            warn!(
                "Target role changed to \"{}\"; resolving target again from roster",
                config.target_role
            );
            let previous = self.session_target.target().cloned();
            let mut resolver = SessionTargetResolver::new(&config.target_role);
            let roster: Vec<_> = self.session_target.roster().cloned().collect();
            resolver.on_joined_session(&roster);
            target_change = match (previous, resolver.target().cloned()) {
                (previous, Some(next)) if previous.as_ref() != Some(&next) => {
                    Some(TargetChange::Connected(next))
                }
                (Some(previous), None) => Some(TargetChange::Disconnected(previous)),
                _ => None,
            };
            self.session_target = resolver;
        }
        self.rigid_bodies.set_expiry(config.body_expiry());
        self.converter = CoordinateConverter::new(config);
        self.velocity_filter
            .set_settings(VelocityFilterSettings::from_config(config));
        self.change_gate
            .set_thresholds(ChangeThresholds::from_config(config));
        self.transmitter = Transmitter::new(config);
        self.send_interval.set_interval(config.send_interval());
        self.phone_rigid_body = config.phone_rigid_body.clone();
        self.hololens_rigid_body = config.hololens_rigid_body.clone();
        target_change
    }

    /// Run the pipeline once, if it is due: convert, filter, compute the
    /// relative pose, gate, send.
    pub fn tick(&mut self, now: Instant, transport: &mut dyn Transport) -> Result<TickOutcome> {
        if !self.session_target.is_connected() {
            return Ok(TickOutcome::NoTarget);
        }
        if !self.send_interval.is_due(now) {
            return Ok(TickOutcome::NotDue);
        }
        self.send_interval.reset_timer(now);

        let phone = self
            .rigid_bodies
            .get_tracked(&self.phone_rigid_body, now)
            .and_then(|pose| self.converter.convert(pose));
        let hololens = self
            .rigid_bodies
            .get_tracked(&self.hololens_rigid_body, now)
            .and_then(|pose| self.converter.convert(pose));

        let (phone, hololens) = match (phone, hololens) {
            (Some(phone), Some(hololens)) => (phone, hololens),
            (phone, hololens) => {
                let (phone_tracked, hololens_tracked) = (phone.is_some(), hololens.is_some());
                debug!(
                    "Tracking status only; phone: {}, hololens: {}",
                    phone_tracked, hololens_tracked
                );
                let sample = self
                    .transmitter
                    .build_status_sample(phone_tracked, hololens_tracked);
                return match self.transmitter.send(
                    &sample,
                    self.session_target.target(),
                    transport,
                )? {
                    SendOutcome::Sent => Ok(TickOutcome::StatusSent {
                        phone_tracked,
                        hololens_tracked,
                    }),
                    SendOutcome::NoTarget => Ok(TickOutcome::NoTarget),
                };
            }
        };

        if let FilterDecision::Suppressed(reason) =
            self.velocity_filter.update(&hololens.rotation, now)
        {
            return Ok(TickOutcome::Suppressed(reason));
        }

        let relative = relative_pose::calculate(&phone, &hololens);
        if !self.change_gate.should_emit(&relative) {
            return Ok(TickOutcome::BelowThreshold);
        }

        let sample = self
            .transmitter
            .build_full_sample(&relative, &phone, &hololens);
        match self
            .transmitter
            .send(&sample, self.session_target.target(), transport)?
        {
            SendOutcome::Sent => {
                self.change_gate.commit(&relative);
                Ok(TickOutcome::Sent)
            }
            SendOutcome::NoTarget => Ok(TickOutcome::NoTarget),
        }
    }
}
