//! Gemeinsame Identifikations- und Zustandstypen
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen Session-IDs
//! und Identitaeten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opake, eindeutige Session-ID eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// 16 Bytes fuer Transkripte und AAD
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parst eine SessionId aus ihrer Textform
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Laenge eines Fingerprints in Hex-Zeichen (SHA-256)
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Identitaet der Gegenstelle: SHA-256 ueber den Ed25519-Identitaetsschluessel,
/// kleingeschrieben hex-kodiert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Erstellt einen Fingerprint aus einem Digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parst einen Fingerprint aus Hex-Text (64 Zeichen)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.len() != FINGERPRINT_HEX_LEN || hex::decode(&s).is_err() {
            return None;
        }
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kurzform fuer Logs
    pub fn kurz(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SignalKind
// ---------------------------------------------------------------------------

/// Art eines Signals (eingehend und ausgehend identisch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Invite,
    Answer,
    Cancel,
    IceCandidate,
    Hangup,
    /// Unbekannter Inhalt – wird verworfen, nie als Fehler behandelt
    Unknown,
}

impl SignalKind {
    /// Ein-Byte-Tag fuer Signatur-Transkripte und AAD
    pub fn tag(&self) -> u8 {
        match self {
            Self::Invite => 1,
            Self::Answer => 2,
            Self::Cancel => 3,
            Self::IceCandidate => 4,
            Self::Hangup => 5,
            Self::Unknown => 0xFF,
        }
    }

    /// Wire-Name im Push-Umschlag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Answer => "answer",
            Self::Cancel => "cancel",
            Self::IceCandidate => "ice_candidate",
            Self::Hangup => "hangup",
            Self::Unknown => "unknown",
        }
    }

    /// Unbekannte Namen ergeben `Unknown`, nie einen Fehler
    pub fn from_wire(name: &str) -> Self {
        match name {
            "invite" => Self::Invite,
            "answer" => Self::Answer,
            "cancel" => Self::Cancel,
            "ice_candidate" => Self::IceCandidate,
            "hangup" => Self::Hangup,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rollen und Zustaende
// ---------------------------------------------------------------------------

/// Lokale Rolle in einem Anruf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallRole {
    Caller,
    Callee,
}

/// Richtung des Klingelns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Grund fuer das Ende einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    Completed,
    Rejected,
    Cancelled,
    Timeout,
    Error,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lebenszyklus einer Call-Session
///
/// ```text
/// Idle -> Ringing(Outbound|Inbound) -> Negotiating -> Active -> Ending -> Terminated
/// ```
/// `Terminated` ist absorbierend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ringing(Direction),
    Negotiating,
    Active,
    Ending,
    Terminated(TerminationReason),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Ringing(_))
    }

    /// Kurzname fuer Logs und Metriken
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ringing(Direction::Outbound) => "ringing_outbound",
            Self::Ringing(Direction::Inbound) => "ringing_inbound",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Terminated(_) => "terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminated(reason) => write!(f, "terminated({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
