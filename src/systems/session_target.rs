use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub role: String,
}

impl Participant {
    pub fn new(id: &str, role: &str) -> Self {
        Participant {
            id: String::from(id),
            role: String::from(role),
        }
    }
}

/// Roster notifications from the session layer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RosterEvent {
    /// We joined the session; these are the other participants already in it
    Joined { participants: Vec<Participant> },
    Entered { participant: Participant },
    Left { participant: Participant },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetChange {
    Connected(Participant),
    Disconnected(Participant),
}

impl TargetChange {
    pub fn status_text(&self) -> String {
        match self {
            TargetChange::Connected(p) => {
                format!("{} connected! Ready to send configuration.", p.role)
            }
            TargetChange::Disconnected(p) => {
                format!("{} disconnected. Waiting for reconnection...", p.role)
            }
        }
    }
}

/// Holds (at most) one participant to address messages to: the first one
/// seen with the expected role.
pub struct SessionTargetResolver {
    target_role: String,
    target: Option<Participant>,
    roster: IndexMap<String, Participant>,
}

impl SessionTargetResolver {
    pub fn new(target_role: &str) -> Self {
        SessionTargetResolver {
            target_role: String::from(target_role),
            target: None,
            roster: IndexMap::new(),
        }
    }

    pub fn handle_roster_event(&mut self, event: &RosterEvent) -> Option<TargetChange> {
        match event {
            RosterEvent::Joined { participants } => self.on_joined_session(participants),
            RosterEvent::Entered { participant } => self.on_participant_entered(participant),
            RosterEvent::Left { participant } => self.on_participant_left(participant),
        }
    }

    pub fn on_joined_session(&mut self, others: &[Participant]) -> Option<TargetChange> {
        self.roster.clear();
        for p in others {
            self.roster.insert(p.id.clone(), p.clone());
        }

        let found = self
            .roster
            .values()
            .find(|p| p.role == self.target_role)
            .cloned();

        match found {
            Some(p) => {
                if self.target.as_ref() == Some(&p) {
                    None
                } else {
                    Some(self.establish(p))
                }
            }
            None => match self.target.take() {
                // Rejoined, and our previous target is no longer there
                Some(previous) => {
                    warn!(
                        "Target participant {} missing from roster after (re)joining",
                        previous.id
                    );
                    Some(TargetChange::Disconnected(previous))
                }
                None => {
                    debug!("Joined session; no \"{}\" participant yet", self.target_role);
                    None
                }
            },
        }
    }

    pub fn on_participant_entered(&mut self, participant: &Participant) -> Option<TargetChange> {
        info!(
            "Participant entered: {} ({})",
            participant.id, participant.role
        );
        self.roster
            .insert(participant.id.clone(), participant.clone());

        if self.is_connected() || participant.role != self.target_role {
            None
        } else {
            Some(self.establish(participant.clone()))
        }
    }

    pub fn on_participant_left(&mut self, participant: &Participant) -> Option<TargetChange> {
        debug!("Participant left: {} ({})", participant.id, participant.role);
        self.roster.shift_remove(&participant.id);

        match &self.target {
            Some(target) if target.id == participant.id => {
                info!("Target participant {} left the session", target.id);
                self.target.take().map(TargetChange::Disconnected)
            }
            _ => None,
        }
    }

    fn establish(&mut self, participant: Participant) -> TargetChange {
        info!(
            "Established connection to \"{}\" participant {}",
            participant.role, participant.id
        );
        self.target = Some(participant.clone());
        TargetChange::Connected(participant)
    }

    pub fn target(&self) -> Option<&Participant> {
        self.target.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    pub fn target_role(&self) -> &str {
        &self.target_role
    }

    /// Other participants currently in the session, in the order they joined
    pub fn roster(&self) -> impl Iterator<Item = &Participant> {
        self.roster.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmd(id: &str) -> Participant {
        Participant::new(id, "hmd")
    }

    #[test]
    fn test_joined_session_picks_first_matching_participant() {
        let mut resolver = SessionTargetResolver::new("hmd");
        assert!(!resolver.is_connected());

        let change = resolver.on_joined_session(&[
            Participant::new("observer", "desktop"),
            hmd("hmd-1"),
            hmd("hmd-2"),
        ]);
        assert_eq!(change, Some(TargetChange::Connected(hmd("hmd-1"))));
        assert_eq!(resolver.target(), Some(&hmd("hmd-1")));
        assert_eq!(resolver.roster().count(), 3);
    }

    #[test]
    fn test_joined_session_without_target() {
        let mut resolver = SessionTargetResolver::new("hmd");
        let change = resolver.on_joined_session(&[Participant::new("observer", "desktop")]);
        assert_eq!(change, None);
        assert!(!resolver.is_connected());
    }

    #[test]
    fn test_entered_only_connects_matching_role_once() {
        let mut resolver = SessionTargetResolver::new("hmd");
        assert_eq!(
            resolver.on_participant_entered(&Participant::new("tablet", "phone")),
            None
        );
        assert!(!resolver.is_connected());

        assert_eq!(
            resolver.on_participant_entered(&hmd("hmd-1")),
            Some(TargetChange::Connected(hmd("hmd-1")))
        );
        // Already connected; a second headset does not steal the target
        assert_eq!(resolver.on_participant_entered(&hmd("hmd-2")), None);
        assert_eq!(resolver.target(), Some(&hmd("hmd-1")));
    }

    #[test]
    fn test_only_target_leaving_disconnects() {
        let mut resolver = SessionTargetResolver::new("hmd");
        resolver.on_participant_entered(&hmd("hmd-1"));
        resolver.on_participant_entered(&hmd("hmd-2"));

        assert_eq!(resolver.on_participant_left(&hmd("hmd-2")), None);
        assert!(resolver.is_connected());

        assert_eq!(
            resolver.on_participant_left(&hmd("hmd-1")),
            Some(TargetChange::Disconnected(hmd("hmd-1")))
        );
        assert!(!resolver.is_connected());
        assert!(resolver.target().is_none());
    }

    #[test]
    fn test_churn() {
        let mut resolver = SessionTargetResolver::new("hmd");
        resolver.handle_roster_event(&RosterEvent::Entered {
            participant: hmd("hmd-1"),
        });
        resolver.handle_roster_event(&RosterEvent::Left {
            participant: hmd("hmd-1"),
        });
        assert!(!resolver.is_connected());

        // Late-arriving non-matching participant never becomes the target
        resolver.handle_roster_event(&RosterEvent::Entered {
            participant: Participant::new("hmd-1", "desktop"),
        });
        assert!(!resolver.is_connected());

        let change = resolver.handle_roster_event(&RosterEvent::Entered {
            participant: hmd("hmd-3"),
        });
        assert_eq!(change, Some(TargetChange::Connected(hmd("hmd-3"))));
    }

    #[test]
    fn test_rejoin_without_previous_target_disconnects() {
        let mut resolver = SessionTargetResolver::new("hmd");
        resolver.on_joined_session(&[hmd("hmd-1")]);
        assert_eq!(resolver.on_joined_session(&[hmd("hmd-1")]), None);

        let change = resolver.on_joined_session(&[Participant::new("observer", "desktop")]);
        assert_eq!(change, Some(TargetChange::Disconnected(hmd("hmd-1"))));
        assert!(!resolver.is_connected());
    }

    #[test]
    fn test_roster_event_wire_format() {
        let json = r#"{"event":"entered","participant":{"id":"abc","role":"hmd"}}"#;
        let event: RosterEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            RosterEvent::Entered {
                participant: hmd("abc")
            }
        );

        let joined = RosterEvent::Joined {
            participants: vec![hmd("abc")],
        };
        let payload = rmp_serde::to_vec_named(&joined).unwrap();
        let decoded: RosterEvent = rmp_serde::from_slice(&payload).unwrap();
        assert_eq!(decoded, joined);
    }
}
