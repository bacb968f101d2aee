use anyhow::{anyhow, Result};

/// The kinds of message this agent addresses to a single session participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    RelativeTransform,
    StudyConfiguration,
}

impl MessageKind {
    pub fn channel_name(&self) -> &'static str {
        match self {
            MessageKind::RelativeTransform => "relativeTransform",
            MessageKind::StudyConfiguration => "studyConfiguration",
        }
    }
}

/// Reliable, ordered delivery of an opaque payload to one named participant.
/// Implementations must never broadcast.
pub trait Transport {
    fn send(&mut self, target_id: &str, kind: MessageKind, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub target_id: String,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

/// Keeps every message in memory instead of delivering it; can be told to
/// fail, to simulate a broken connection.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    pub sent: Vec<SentMessage>,
    pub failing: bool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        InMemoryTransport::default()
    }

    pub fn sent_of_kind(&self, kind: MessageKind) -> impl Iterator<Item = &SentMessage> {
        self.sent.iter().filter(move |m| m.kind == kind)
    }
}

impl Transport for InMemoryTransport {
    fn send(&mut self, target_id: &str, kind: MessageKind, payload: &[u8]) -> Result<()> {
        if self.failing {
            return Err(anyhow!("transport unavailable"));
        }
        self.sent.push(SentMessage {
            target_id: String::from(target_id),
            kind,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
