use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    systems::{session_target::SessionTargetResolver, transmitter::PayloadEncoding},
    transport::{MessageKind, Transport},
};

pub const MAX_BLOCK_ID: u8 = 4;

/// Latin square of (1-based) conditions; row is participant, column is block
const CONDITION_SET: [[u8; 4]; 4] = [[1, 2, 4, 3], [2, 3, 1, 4], [3, 4, 2, 1], [4, 1, 3, 2]];

/// Which participant, task, block and (derived) condition the headset should run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyConfiguration {
    pub p_id: u32,
    pub participant_id: String,
    pub task: u8,
    pub block_id: u8,
    /// 0-based cue condition index
    pub condition: u8,
}

/// The message actually sent to the headset
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyConfigurationMessage {
    pub participant_id: String,
    pub task: u8,
    pub block_id: u8,
    pub condition: u8,
}

impl Default for StudyConfiguration {
    fn default() -> Self {
        StudyConfiguration {
            p_id: 1,
            participant_id: String::from("P1"),
            task: 0,
            block_id: 1,
            condition: 0,
        }
    }
}

/// 0-based condition for a participant number and (1-based) block
pub fn condition_for(p_id: u32, block_id: u8) -> Result<u8> {
    if p_id == 0 {
        return Err(anyhow!("Participant number must be 1 or more"));
    }
    if block_id == 0 || block_id > MAX_BLOCK_ID {
        return Err(anyhow!("Block ID must be between 1~{}!", MAX_BLOCK_ID));
    }
    let row = ((p_id - 1) % CONDITION_SET.len() as u32) as usize;
    Ok(CONDITION_SET[row][block_id as usize - 1] - 1)
}

impl StudyConfiguration {
    pub fn new(p_id: u32, task: u8, block_id: u8) -> Result<Self> {
        let mut config = StudyConfiguration {
            p_id,
            participant_id: String::new(),
            task,
            block_id,
            condition: 0,
        };
        config.assign()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.participant_id.trim().is_empty() {
            return Err(anyhow!("Participant ID cannot be empty!"));
        }
        if self.block_id == 0 || self.block_id > MAX_BLOCK_ID {
            return Err(anyhow!("Block ID must be between 1~{}!", MAX_BLOCK_ID));
        }
        Ok(())
    }

    /// Derive participant ID and condition from participant number and block
    pub fn assign(&mut self) -> Result<()> {
        self.condition = condition_for(self.p_id, self.block_id)?;
        self.participant_id = format!("P{}", self.p_id);
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "Participant: {}, Task: {}, Block: {}, Condition: {}",
            self.participant_id, self.task, self.block_id, self.condition
        )
    }

    pub fn to_message(&self) -> StudyConfigurationMessage {
        StudyConfigurationMessage {
            participant_id: self.participant_id.clone(),
            task: self.task,
            block_id: self.block_id,
            condition: self.condition,
        }
    }

    /// Validate, assign the condition and send to the current session target.
    /// Returns the status text to show on success.
    pub fn send_to_target(
        &mut self,
        session_target: &SessionTargetResolver,
        transport: &mut dyn Transport,
        encoding: PayloadEncoding,
    ) -> Result<String> {
        let Some(target) = session_target.target() else {
            return Err(anyhow!("{} not connected!", session_target.target_role()));
        };
        self.validate()?;
        self.assign()?;

        let payload = encoding.encode(&self.to_message())?;
        transport.send(&target.id, MessageKind::StudyConfiguration, &payload)?;
        info!("Sent study configuration to {}: {}", target.id, self.describe());
        Ok(format!("Configuration sent! {}", self.describe()))
    }
}

/// Log anything that looks wrong, without refusing to start
pub fn warn_if_invalid(study: &StudyConfiguration) {
    if let Err(e) = study.validate() {
        warn!("Study configuration: {}", e);
    }
    if study.p_id == 0 {
        warn!("Study configuration: participant number should be 1 or more");
    }
}
