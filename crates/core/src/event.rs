//! Engine-Ereignisse
//!
//! Die State Machine veroeffentlicht Zustandswechsel und Diagnosen ueber
//! einen `tokio::sync::broadcast`-Kanal (siehe `port-signaling::engine`).
//! Die Call-Helper-Fassade uebersetzt sie in vereinfachte UI-Ereignisse.
//! Ereignisse enthalten nie Schluesselmaterial.

use crate::types::{CallRole, Fingerprint, SessionId, SessionState};

/// Alle Ereignisse die ueber den Engine-Bus fliessen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Eine Session hat ihren Zustand gewechselt
    Transition {
        session_id: SessionId,
        remote: Fingerprint,
        role: CallRole,
        from: SessionState,
        to: SessionState,
    },
    /// Entschluesselter ICE-Kandidat der Gegenstelle
    RemoteCandidate {
        session_id: SessionId,
        candidate: Vec<u8>,
    },
    /// Diagnose: Signale wurden wegen einer Sequenz-Luecke verworfen
    SequenceGap {
        session_id: SessionId,
        erwartet: u64,
        verworfen: Vec<u64>,
    },
}

impl EngineEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Transition { session_id, .. }
            | Self::RemoteCandidate { session_id, .. }
            | Self::SequenceGap { session_id, .. } => *session_id,
        }
    }
}
