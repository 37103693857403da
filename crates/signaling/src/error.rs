//! Fehlertypen der State Machine

use port_core::{Fingerprint, SessionId, SessionState};
use port_db::StoreError;
use thiserror::Error;

/// Fehler der lokalen Anruf-Operationen (Fassade -> Engine)
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Unbekannte Session: {0}")]
    UnknownSession(SessionId),

    /// Mit dieser Gegenstelle laeuft bereits eine nicht-terminale Session
    #[error("Mit {remote} laeuft bereits Session {bestehend}")]
    DuplicateSession {
        remote: Fingerprint,
        bestehend: SessionId,
    },

    #[error("Operation im Zustand {state} nicht erlaubt (Session {session_id})")]
    InvalidState {
        session_id: SessionId,
        state: SessionState,
    },

    /// Der Session-Actor wurde beendet bevor er antworten konnte
    #[error("Session {0} ist geschlossen")]
    SessionClosed(SessionId),

    #[error("Anruf an die eigene Identitaet nicht moeglich")]
    EigeneIdentitaet,

    #[error("Speicherfehler: {0}")]
    Store(#[from] StoreError),

    #[error("Engine wird heruntergefahren")]
    Heruntergefahren,
}

/// Fehler eines Sendeversuchs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Zeitueberschreitung beim Senden")]
    Timeout,

    #[error("Gegenstelle nicht erreichbar: {0}")]
    Unreachable(String),

    /// Endgueltig abgelehnt, wird nicht wiederholt
    #[error("Nachricht abgelehnt: {0}")]
    Rejected(String),

    /// Lokales Auflegen hat den laufenden Sendevorgang abgebrochen
    #[error("Sendevorgang abgebrochen")]
    Abgebrochen,
}

impl SendError {
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unreachable(_))
    }
}
