use std::{collections::HashMap, time::Instant};

use anyhow::{anyhow, Result};
use log::{debug, error, info};
use tether_agent::{ChannelDefinition, ChannelOptionsBuilder, TetherAgent};

use crate::{
    streamer_config::StreamerConfig,
    systems::{
        session_target::{RosterEvent, TargetChange},
        Systems,
    },
    tracking::RigidBodyFrame,
    transport::{MessageKind, Transport},
};

pub struct Outputs {
    pub config_output: ChannelDefinition,
    pub status_output: ChannelDefinition,
}

impl Outputs {
    pub fn new(tether_agent: &mut TetherAgent) -> Outputs {
        let config_output = ChannelOptionsBuilder::create_sender("provideStreamerConfig")
            .qos(Some(2))
            .retain(Some(true))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        let status_output = ChannelOptionsBuilder::create_sender("streamerStatus")
            .qos(Some(2))
            .retain(Some(true))
            .build(tether_agent)
            .expect("failed to create Output Plug");

        Outputs {
            config_output,
            status_output,
        }
    }
}

pub struct Inputs {
    pub rigid_bodies_input: ChannelDefinition,
    pub roster_input: ChannelDefinition,
    pub save_config_input: ChannelDefinition,
    pub send_study_input: ChannelDefinition,
}

impl Inputs {
    pub fn new(tether_agent: &mut TetherAgent) -> Inputs {
        // Capture frames arrive at high rate; losing one is fine
        let rigid_bodies_input = ChannelOptionsBuilder::create_receiver("rigidBodies")
            .qos(Some(0))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let roster_input = ChannelOptionsBuilder::create_receiver("sessionRoster")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let save_config_input = ChannelOptionsBuilder::create_receiver("saveStreamerConfig")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Input Plug");
        let send_study_input = ChannelOptionsBuilder::create_receiver("sendStudyConfiguration")
            .qos(Some(2))
            .build(tether_agent)
            .expect("failed to create Input Plug");

        Inputs {
            rigid_bodies_input,
            roster_input,
            save_config_input,
            send_study_input,
        }
    }
}

/// Delivers messages over Tether, on a channel whose ID part is the target
/// participant's ID. QoS 2 throughout.
pub struct TetherTransport {
    tether_agent: TetherAgent,
    senders: HashMap<(MessageKind, String), ChannelDefinition>,
}

impl TetherTransport {
    pub fn new(tether_agent: TetherAgent) -> Self {
        TetherTransport {
            tether_agent,
            senders: HashMap::new(),
        }
    }

    pub fn agent(&self) -> &TetherAgent {
        &self.tether_agent
    }

    pub fn agent_mut(&mut self) -> &mut TetherAgent {
        &mut self.tether_agent
    }

    /// Drop the channels addressed to a participant that is no longer the target
    pub fn forget_participant(&mut self, participant_id: &str) {
        forget_senders_for(&mut self.senders, participant_id);
    }
}

fn forget_senders_for<C>(senders: &mut HashMap<(MessageKind, String), C>, participant_id: &str) {
    senders.retain(|(_, id), _| id != participant_id);
}

impl Transport for TetherTransport {
    fn send(&mut self, target_id: &str, kind: MessageKind, payload: &[u8]) -> Result<()> {
        let key = (kind, String::from(target_id));
        if !self.senders.contains_key(&key) {
            debug!(
                "Create sender \"{}\" for participant {}",
                kind.channel_name(),
                target_id
            );
            let channel = ChannelOptionsBuilder::create_sender(kind.channel_name())
                .id(Some(target_id))
                .qos(Some(2))
                .build(&mut self.tether_agent)
                .map_err(|e| anyhow!("failed to create sender for {}: {}", target_id, e))?;
            self.senders.insert(key.clone(), channel);
        }
        let channel = self
            .senders
            .get(&key)
            .ok_or_else(|| anyhow!("no sender for {}", target_id))?;
        self.tether_agent
            .send(channel, Some(payload))
            .map_err(|e| anyhow!("failed to send to {}: {}", target_id, e))
    }
}

pub fn handle_rigid_bodies_message(payload: &[u8], systems: &mut Systems, now: Instant) {
    match rmp_serde::from_slice::<RigidBodyFrame>(payload) {
        Ok(frame) => systems.rigid_bodies.update_from_frame(&frame, now),
        Err(e) => error!("Failed to decode rigid bodies frame: {}", e),
    }
}

pub fn handle_roster_message(payload: &[u8], systems: &mut Systems) -> Option<TargetChange> {
    match rmp_serde::from_slice::<RosterEvent>(payload) {
        Ok(event) => {
            debug!("Roster event: {:?}", event);
            systems.session_target.handle_roster_event(&event)
        }
        Err(e) => {
            error!("Failed to decode roster event: {}", e);
            None
        }
    }
}

/// Publish the status for a target change; senders for a departed target are dropped
pub fn handle_target_change(
    change: &TargetChange,
    transport: &mut TetherTransport,
    outputs: &Outputs,
) {
    if let TargetChange::Disconnected(previous) = change {
        transport.forget_participant(&previous.id);
    }
    publish_status(transport.agent(), &outputs.status_output, &change.status_text());
}

pub fn publish_status(tether_agent: &TetherAgent, status_output: &ChannelDefinition, text: &str) {
    info!("Status: {}", text);
    match rmp_serde::to_vec_named(text) {
        Ok(payload) => {
            if let Err(e) = tether_agent.send(status_output, Some(&payload)) {
                error!("Failed to publish status: {}", e);
            }
        }
        Err(e) => error!("Failed to encode status: {}", e),
    }
}

/// Replace the whole config from a remote message, apply it, save to disk and
/// re-publish
pub fn handle_save_message(
    payload: &[u8],
    config: &mut StreamerConfig,
    systems: &mut Systems,
    transport: &mut TetherTransport,
    outputs: &Outputs,
    config_file_path: &str,
) -> Result<()> {
    config.parse_remote_config(payload)?;
    info!("Remote-provided config parsed OK; apply, save to disk and (re) publish");
    if let Some(change) = systems.apply_config(config) {
        handle_target_change(&change, transport, outputs);
    }
    config.save_and_republish(transport.agent(), &outputs.config_output, config_file_path)
}

/// Send the configured study setup to the current target; returns status text
/// either way
pub fn handle_send_study_message(
    config: &mut StreamerConfig,
    systems: &Systems,
    transport: &mut TetherTransport,
) -> String {
    let encoding = config.payload_encoding;
    let result = match config.study.as_mut() {
        Some(study) => study.send_to_target(&systems.session_target, transport, encoding),
        None => Err(anyhow!("No study configuration defined")),
    };
    match result {
        Ok(status) => status,
        Err(e) => {
            error!("Study configuration not sent: {}", e);
            format!("Error: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        systems::session_target::Participant, tracking::RigidBodyPose,
        streamer_config::StreamerConfig,
    };

    #[test]
    fn test_rigid_bodies_frame_updates_tracker() {
        let mut systems = Systems::new(&StreamerConfig::default());
        let now = Instant::now();
        let frame: RigidBodyFrame = vec![
            RigidBodyPose::new("phone", [1., 2., 3.], [0., 0., 0., 1.]),
            RigidBodyPose::untracked("hololens"),
        ];
        let payload = rmp_serde::to_vec_named(&frame).unwrap();

        handle_rigid_bodies_message(&payload, &mut systems, now);
        assert_eq!(
            systems.rigid_bodies.get_tracked("phone", now).unwrap().position,
            [1., 2., 3.]
        );
        assert!(systems.rigid_bodies.get_tracked("hololens", now).is_none());
    }

    #[test]
    fn test_forget_senders_for_departed_participant() {
        let mut senders = HashMap::new();
        senders.insert((MessageKind::RelativeTransform, String::from("hmd-1")), ());
        senders.insert((MessageKind::StudyConfiguration, String::from("hmd-1")), ());
        senders.insert((MessageKind::RelativeTransform, String::from("hmd-2")), ());

        forget_senders_for(&mut senders, "hmd-1");
        assert_eq!(senders.len(), 1);
        assert!(senders.contains_key(&(MessageKind::RelativeTransform, String::from("hmd-2"))));

        forget_senders_for(&mut senders, "nobody");
        assert_eq!(senders.len(), 1);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut systems = Systems::new(&StreamerConfig::default());
        handle_rigid_bodies_message(&[0xc1, 0x00], &mut systems, Instant::now());
        assert_eq!(systems.rigid_bodies.known_names().count(), 0);
    }

    #[test]
    fn test_roster_message_connects_target() {
        let mut systems = Systems::new(&StreamerConfig::default());
        let event = RosterEvent::Entered {
            participant: Participant::new("hmd-1", "hmd"),
        };
        let payload = rmp_serde::to_vec_named(&event).unwrap();

        let change = handle_roster_message(&payload, &mut systems).unwrap();
        assert_eq!(
            change.status_text(),
            "hmd connected! Ready to send configuration."
        );
        assert!(systems.session_target.is_connected());

        assert!(handle_roster_message(b"nonsense", &mut systems).is_none());
        assert!(systems.session_target.is_connected());
    }
}
