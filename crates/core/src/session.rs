//! Call-Session-Datensatz und Schluesselmaterial
//!
//! `CallSession` gehoert waehrend ihrer Lebenszeit exklusiv dem
//! Session-Actor. Persistiert wird nur ein `SessionSnapshot`, und dieser
//! ausschliesslich in versiegelter Form (siehe `port-db::vault`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CallRole, Fingerprint, SessionId, SessionState, SignalKind};

// ---------------------------------------------------------------------------
// SecretBytes / SessionKeyMaterial
// ---------------------------------------------------------------------------

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Laenge eines Signalisierungs-Schluessels
pub const SESSION_KEY_LEN: usize = 32;

/// Symmetrischer Signalisierungs-Schluessel einer Session (Ergebnis der
/// Schluesselvereinbarung). Nie im Klartext persistiert.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeyMaterial(SecretBytes);

impl SessionKeyMaterial {
    /// Gibt `None` zurueck wenn die Laenge nicht 32 Bytes betraegt
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() != SESSION_KEY_LEN {
            let _ = SecretBytes::new(bytes);
            return None;
        }
        Some(Self(SecretBytes::new(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for SessionKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKeyMaterial([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Handshake-Material
// ---------------------------------------------------------------------------

/// Zwischenstand der Schluesselvereinbarung bis der Session-Schluessel steht.
///
/// Wird mit der Session versiegelt abgelegt, damit ein Neustart waehrend
/// `Ringing` die Vereinbarung noch abschliessen kann. Nach der Ableitung
/// wird es verworfen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMaterial {
    /// Geheimer Teil des eigenen ephemeren X25519-Schluessels
    #[serde(with = "secret_b64")]
    pub local_secret: Option<SecretBytes>,
    pub local_nonce: Option<[u8; 32]>,
    pub remote_public: Option<[u8; 32]>,
    pub remote_nonce: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Transition-Historie
// ---------------------------------------------------------------------------

/// Ausloeser eines Zustandswechsels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    LocalStart,
    LocalAnswer,
    LocalReject,
    LocalEnd,
    Signal { kind: SignalKind, seq: u64 },
    ResponseTimeout,
    AnswerTimeout,
    KeyAgreementComplete,
    Fehler(String),
}

/// Ein Eintrag der geordneten Transition-Historie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: SessionState,
    pub to: SessionState,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

/// Eine Anruf-Session mit vollstaendiger Historie
#[derive(Debug, Clone)]
pub struct CallSession {
    pub id: SessionId,
    pub state: SessionState,
    pub local_role: CallRole,
    pub remote_identity: Fingerprint,
    /// Erst nach der Schluesselvereinbarung gesetzt
    pub session_key: Option<SessionKeyMaterial>,
    /// Nur waehrend der Schluesselvereinbarung gesetzt
    pub handshake: Option<HandshakeMaterial>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<TransitionRecord>,
    /// Zuletzt angewendete Sequenz-Nummer der Gegenstelle
    pub last_applied_seq: u64,
    /// Naechste eigene Sequenz-Nummer fuer ausgehende Signale
    pub next_outbound_seq: u64,
}

impl CallSession {
    /// Neue ausgehende Session (lokaler Start) mit frischer ID
    pub fn neu_ausgehend(remote_identity: Fingerprint) -> Self {
        Self::neu(SessionId::new(), CallRole::Caller, remote_identity)
    }

    /// Neue eingehende Session fuer die ID aus dem `Invite`
    pub fn neu_eingehend(id: SessionId, remote_identity: Fingerprint) -> Self {
        Self::neu(id, CallRole::Callee, remote_identity)
    }

    fn neu(id: SessionId, local_role: CallRole, remote_identity: Fingerprint) -> Self {
        let jetzt = Utc::now();
        Self {
            id,
            state: SessionState::Idle,
            local_role,
            remote_identity,
            session_key: None,
            handshake: None,
            created_at: jetzt,
            updated_at: jetzt,
            history: Vec::new(),
            last_applied_seq: 0,
            next_outbound_seq: 1,
        }
    }

    /// Wechselt den Zustand und haengt einen Historien-Eintrag an.
    ///
    /// Aus `Terminated` heraus wird nichts mehr veraendert; der Rueckgabewert
    /// ist dann `false`.
    pub fn wechseln(&mut self, to: SessionState, trigger: Trigger) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let jetzt = Utc::now();
        self.history.push(TransitionRecord {
            from: self.state,
            to,
            trigger,
            at: jetzt,
        });
        self.state = to;
        self.updated_at = jetzt;
        true
    }

    /// Vergibt die naechste ausgehende Sequenz-Nummer
    pub fn naechste_seq(&mut self) -> u64 {
        let seq = self.next_outbound_seq;
        self.next_outbound_seq += 1;
        seq
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Erstellt den serialisierbaren Snapshot (nur fuer die Versiegelung)
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            local_role: self.local_role,
            remote_identity: self.remote_identity.clone(),
            session_key: self
                .session_key
                .as_ref()
                .map(|k| SecretBytes::new(k.as_bytes().to_vec())),
            handshake: self.handshake.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            history: self.history.clone(),
            last_applied_seq: self.last_applied_seq,
            next_outbound_seq: self.next_outbound_seq,
        }
    }

    /// Stellt eine Session aus einem entsiegelten Snapshot wieder her
    pub fn aus_snapshot(snapshot: SessionSnapshot) -> Self {
        let session_key = snapshot
            .session_key
            .as_ref()
            .and_then(|k| SessionKeyMaterial::from_bytes(k.as_bytes().to_vec()));
        Self {
            id: snapshot.id,
            state: snapshot.state,
            local_role: snapshot.local_role,
            remote_identity: snapshot.remote_identity.clone(),
            session_key,
            handshake: snapshot.handshake.clone(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            history: snapshot.history.clone(),
            last_applied_seq: snapshot.last_applied_seq,
            next_outbound_seq: snapshot.next_outbound_seq,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Serialisierbare Form einer `CallSession`.
///
/// Enthaelt den Session-Schluessel und darf daher nur als Klartext einer
/// Speicher-Versiegelung serialisiert werden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub local_role: CallRole,
    pub remote_identity: Fingerprint,
    #[serde(with = "secret_b64")]
    pub session_key: Option<SecretBytes>,
    #[serde(default)]
    pub handshake: Option<HandshakeMaterial>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<TransitionRecord>,
    pub last_applied_seq: u64,
    pub next_outbound_seq: u64,
}

mod secret_b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SecretBytes;

    pub fn serialize<S: Serializer>(
        value: &Option<SecretBytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(secret) => serializer.serialize_some(&STANDARD.encode(secret.as_bytes())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretBytes>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| {
            STANDARD
                .decode(t.as_bytes())
                .map(SecretBytes::new)
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
