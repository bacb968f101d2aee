use std::{fs, io::ErrorKind, time::Duration};

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tether_agent::{ChannelDefinition, TetherAgent};

use crate::{study_config::StudyConfiguration, systems::transmitter::PayloadEncoding};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamerConfig {
    // -------- STREAMING SETTINGS
    /// How many times per second (Hz) to evaluate and (maybe) send the relative transform
    pub send_rate: u32,

    /// Minimum change in relative position (in working units) before a new sample is sent
    pub position_threshold: f32,

    /// Minimum change in relative rotation (in degrees) before a new sample is sent
    pub rotation_threshold: f32,

    /// Also include both bodies' (converted) world poses in every full sample
    pub send_world_transforms: bool,

    // -------- ROTATION VELOCITY FILTER SETTINGS
    pub enable_rotation_velocity_filter: bool,

    /// Above this angular velocity (degrees per second) of the hololens, samples are
    /// considered tracking noise and suppressed
    pub max_head_angular_velocity: f32,

    /// How long (seconds) to keep suppressing after a fast movement
    pub velocity_filter_duration: f32,

    // -------- COORDINATE SYSTEM SETTINGS
    /// Swap Y and Z axes (position and rotation) coming from the capture system
    #[serde(rename = "flipYZ")]
    pub flip_yz: bool,

    /// Component-wise scale applied to positions, after any axis swap
    pub position_scale: [f32; 3],

    /// Offset (Euler angles, degrees) applied to rotations in the body's local frame
    pub rotation_offset: [f32; 3],

    // -------- RIGID BODIES
    /// Name of the handheld device's rigid body in capture frames
    pub phone_rigid_body: String,

    /// Name of the head-mounted device's rigid body in capture frames; this is the
    /// reference frame for the relative transform
    pub hololens_rigid_body: String,

    /// How long (ms) before a rigid body that has not been updated counts as untracked;
    /// 0 means never expire
    pub body_expire_ms: u64,

    // -------- SESSION
    /// Role name of the participant who should receive the relative transform
    pub target_role: String,

    pub payload_encoding: PayloadEncoding,

    pub study: Option<StudyConfiguration>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        StreamerConfig {
            send_rate: 60,
            position_threshold: 0.002,
            rotation_threshold: 0.3,
            send_world_transforms: true,
            enable_rotation_velocity_filter: true,
            max_head_angular_velocity: 90.,
            velocity_filter_duration: 0.1,
            flip_yz: false,
            position_scale: [1., 1., 1.],
            rotation_offset: [0., 0., 0.],
            phone_rigid_body: String::from("phone"),
            hololens_rigid_body: String::from("hololens"),
            body_expire_ms: 500,
            target_role: String::from("hmd"),
            payload_encoding: PayloadEncoding::MessagePack,
            study: None,
        }
    }
}

impl StreamerConfig {
    /// Interval between pipeline evaluations; a zero send rate is treated as 1Hz
    pub fn send_interval(&self) -> Duration {
        if self.send_rate == 0 {
            warn!("Send rate of 0Hz is invalid; using 1Hz instead");
            Duration::from_secs(1)
        } else {
            Duration::from_nanos(1_000_000_000 / self.send_rate as u64)
        }
    }

    pub fn body_expiry(&self) -> Option<Duration> {
        if self.body_expire_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.body_expire_ms))
        }
    }

    pub fn parse_remote_config(&mut self, payload: &[u8]) -> Result<()> {
        match rmp_serde::from_slice::<StreamerConfig>(payload) {
            Ok(config) => {
                *self = config;
                Ok(())
            }
            Err(e) => Err(anyhow!("Failed to parse Config from message: {}", e)),
        }
    }

    pub fn write_config_to_file(&self, config_file_path: &str) -> Result<()> {
        debug!("Current state of config: {:?}", self);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, text)
            .map_err(|e| anyhow!("Error writing config to {}: {}", config_file_path, e))?;
        info!("Wrote config to file: {:?}", config_file_path);
        Ok(())
    }

    pub fn save_and_republish(
        &self,
        tether_agent: &TetherAgent,
        config_output: &ChannelDefinition,
        config_file_path: &str,
    ) -> Result<()> {
        info!("Saving config to disk and re-publishing via Tether...");
        self.write_config_to_file(config_file_path)?;

        let payload = rmp_serde::to_vec_named(self)?;
        tether_agent.send(config_output, Some(&payload))?;
        Ok(())
    }
}

pub fn load_config_from_file(config_file_path: &str) -> Result<StreamerConfig> {
    match fs::read_to_string(config_file_path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Streamer Config file not found, will create a default one at {}",
                &config_file_path
            );
            let config = StreamerConfig::default();
            debug!("Created init config object {:?}", config);
            if let Err(e) = config.write_config_to_file(config_file_path) {
                warn!("Could not create default config file: {}", e);
            }
            Ok(config)
        }
        Err(e) => Err(anyhow!(
            "Failed to load Streamer Config from disk; error: {:?}",
            e
        )),
        Ok(s) => {
            info!("Loaded Streamer config OK from \"{}\"", config_file_path);
            parse_config_text(&s)
        }
    }
}

pub fn parse_config_text(text: &str) -> Result<StreamerConfig> {
    match serde_json::from_str::<StreamerConfig>(text) {
        Ok(loaded_config) => {
            debug!("Config parsed data from file: {:?}", &loaded_config);
            Ok(loaded_config)
        }
        Err(e) => Err(anyhow!("Failed to parse config data: {}", e)),
    }
}
