//! Eingehende und ausgehende Signale
//!
//! `IncomingSignal` entsteht ausschliesslich im Push-Intake und wird von der
//! State Machine genau einmal konsumiert (Move in den Session-Actor).
//! `SignalingMessage` ist das ausgehende Gegenstueck.

use chrono::{DateTime, Utc};

use crate::types::{Fingerprint, SessionId, SignalKind};

/// Normalisiertes, verifiziertes Signal aus einem VoIP-Push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingSignal {
    pub session_id: SessionId,
    /// Monotone Sequenz-Nummer des Absenders (von der Signatur abgedeckt)
    pub seq: u64,
    pub kind: SignalKind,
    /// Fingerprint des Absenders (aus `sender_key` berechnet)
    pub sender: Fingerprint,
    /// Ed25519-Identitaetsschluessel des Absenders
    pub sender_key: [u8; 32],
    /// Empfaenger laut Umschlag (die lokale Identitaet)
    pub recipient: Fingerprint,
    /// Handshake-Daten oder versiegelte Bytes, je nach `kind`
    pub payload: Vec<u8>,
    /// Ed25519-Signatur ueber das Signal-Transkript
    pub signature: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// Ausgehende Signalisierungs-Nachricht an `recipient`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingMessage {
    pub session_id: SessionId,
    pub seq: u64,
    pub kind: SignalKind,
    pub recipient: Fingerprint,
    pub payload: Vec<u8>,
}

impl SignalingMessage {
    pub fn neu(
        session_id: SessionId,
        seq: u64,
        kind: SignalKind,
        recipient: Fingerprint,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            session_id,
            seq,
            kind,
            recipient,
            payload,
        }
    }
}
