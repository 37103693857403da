//! Vereinfachte Ereignisse fuer die Anruf-Oberflaeche

use port_core::{Direction, EngineEvent, Fingerprint, SessionId, SessionState, TerminationReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Eingehender Anruf klingelt bzw. ausgehender Anruf wartet auf Annahme
    Ringing {
        session_id: SessionId,
        direction: Direction,
        remote: Fingerprint,
    },
    Connected {
        session_id: SessionId,
    },
    Ended {
        session_id: SessionId,
        reason: TerminationReason,
    },
}

impl UiEvent {
    /// Uebersetzt ein Engine-Ereignis; Zwischenzustaende und Diagnosen
    /// ergeben `None`.
    pub fn aus_engine(event: &EngineEvent) -> Option<Self> {
        let EngineEvent::Transition {
            session_id,
            remote,
            to,
            ..
        } = event
        else {
            return None;
        };

        match *to {
            SessionState::Ringing(direction) => Some(Self::Ringing {
                session_id: *session_id,
                direction,
                remote: remote.clone(),
            }),
            SessionState::Active => Some(Self::Connected {
                session_id: *session_id,
            }),
            SessionState::Terminated(reason) => Some(Self::Ended {
                session_id: *session_id,
                reason,
            }),
            SessionState::Idle | SessionState::Negotiating | SessionState::Ending => None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Ringing { session_id, .. }
            | Self::Connected { session_id }
            | Self::Ended { session_id, .. } => *session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use port_core::CallRole;

    fn transition(from: SessionState, to: SessionState) -> EngineEvent {
        EngineEvent::Transition {
            session_id: SessionId::new(),
            remote: Fingerprint::from_digest(&[7; 32]),
            role: CallRole::Callee,
            from,
            to,
        }
    }

    #[test]
    fn klingeln_traegt_richtung_und_gegenstelle() {
        let event = transition(SessionState::Idle, SessionState::Ringing(Direction::Inbound));
        match UiEvent::aus_engine(&event) {
            Some(UiEvent::Ringing { direction, remote, .. }) => {
                assert_eq!(direction, Direction::Inbound);
                assert_eq!(remote, Fingerprint::from_digest(&[7; 32]));
            }
            andere => panic!("Ringing erwartet, erhalten: {andere:?}"),
        }
    }

    #[test]
    fn zwischenzustaende_werden_ausgelassen() {
        let event = transition(
            SessionState::Ringing(Direction::Inbound),
            SessionState::Negotiating,
        );
        assert_eq!(UiEvent::aus_engine(&event), None);
        let event = transition(SessionState::Active, SessionState::Ending);
        assert_eq!(UiEvent::aus_engine(&event), None);
    }

    #[test]
    fn ende_mit_grund() {
        let event = transition(
            SessionState::Ending,
            SessionState::Terminated(TerminationReason::Completed),
        );
        assert!(matches!(
            UiEvent::aus_engine(&event),
            Some(UiEvent::Ended {
                reason: TerminationReason::Completed,
                ..
            })
        ));
    }

    #[test]
    fn kandidaten_sind_kein_ui_ereignis() {
        let event = EngineEvent::RemoteCandidate {
            session_id: SessionId::new(),
            candidate: vec![1, 2, 3],
        };
        assert_eq!(UiEvent::aus_engine(&event), None);
    }
}
