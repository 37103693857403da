//! JSON-Umschlag eines VoIP-Pushes
//!
//! ```json
//! {
//!   "aps":  { "call_from": "<fingerprint>" },
//!   "port": { "v": 1, "session_id": "...", "seq": 1, "kind": "invite",
//!             "sender_key": "<b64>", "payload": "<b64>", "signature": "<b64>" }
//! }
//! ```
//!
//! `aps.call_from` bleibt kompatibel zu dem Schluessel, den die Plattform
//! fuer die Anruf-Anzeige liest. Zusaetzliche Schluessel in `aps` (z.B.
//! `alert`) werden ignoriert.

use base64::{engine::general_purpose::STANDARD, Engine};
use port_core::{Fingerprint, SessionId, SignalKind, SignalingMessage};
use port_crypto::{sign_signal, Identity};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Aktuelle Umschlag-Version
pub const ENVELOPE_VERSION: u32 = 1;

/// Laenge einer Ed25519-Signatur
const SIGNATURE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Serde-Strukturen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub aps: ApsSection,
    pub port: PortSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApsSection {
    pub call_from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSection {
    pub v: u32,
    pub session_id: String,
    pub seq: u64,
    pub kind: String,
    pub sender_key: String,
    pub payload: String,
    pub signature: String,
}

/// Typisierte Felder eines strukturell gueltigen Umschlags.
///
/// Noch NICHT authentifiziert: Signatur und Absender-Bindung prueft erst
/// der Push-Intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
    pub call_from: Fingerprint,
    pub session_id: SessionId,
    pub seq: u64,
    pub kind: SignalKind,
    pub sender_key: [u8; 32],
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl PushEnvelope {
    /// Baut und signiert den Umschlag fuer eine ausgehende Nachricht
    pub fn signieren(identity: &Identity, message: &SignalingMessage) -> Self {
        let signature = sign_signal(
            identity,
            &message.session_id,
            message.seq,
            message.kind,
            &message.recipient,
            &message.payload,
        );
        Self {
            aps: ApsSection {
                call_from: identity.fingerprint().as_str().to_string(),
            },
            port: PortSection {
                v: ENVELOPE_VERSION,
                session_id: message.session_id.to_string(),
                seq: message.seq,
                kind: message.kind.as_str().to_string(),
                sender_key: STANDARD.encode(identity.public_key_bytes()),
                payload: STANDARD.encode(&message.payload),
                signature: STANDARD.encode(signature),
            },
        }
    }

    /// Parst rohe Push-Bytes
    pub fn from_slice(raw: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(raw).map_err(|e| ProtocolError::malformed(e.to_string()))
    }

    pub fn to_vec(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Serialisierung(e.to_string()))
    }

    /// Dekodiert alle Felder in ihre typisierte Form
    pub fn zerlegen(&self) -> ProtocolResult<DecodedEnvelope> {
        let port = &self.port;
        if port.v != ENVELOPE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(port.v));
        }
        if port.seq == 0 {
            return Err(ProtocolError::malformed("seq beginnt bei 1"));
        }

        let call_from = Fingerprint::parse(&self.aps.call_from)
            .ok_or_else(|| ProtocolError::malformed("aps.call_from ist kein Fingerprint"))?;
        let session_id = SessionId::parse(&port.session_id)
            .ok_or_else(|| ProtocolError::malformed("session_id ist keine UUID"))?;

        let sender_key: [u8; 32] = decode_b64("sender_key", &port.sender_key)?
            .try_into()
            .map_err(|_| ProtocolError::malformed("sender_key muss 32 Bytes haben"))?;

        let signature = decode_b64("signature", &port.signature)?;
        if signature.len() != SIGNATURE_LEN {
            return Err(ProtocolError::malformed(format!(
                "signature muss {SIGNATURE_LEN} Bytes haben"
            )));
        }

        Ok(DecodedEnvelope {
            call_from,
            session_id,
            seq: port.seq,
            kind: SignalKind::from_wire(&port.kind),
            sender_key,
            payload: decode_b64("payload", &port.payload)?,
            signature,
        })
    }
}

fn decode_b64(feld: &str, text: &str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(text.as_bytes())
        .map_err(|e| ProtocolError::malformed(format!("{feld}: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn nachricht(kind: SignalKind) -> (Identity, SignalingMessage) {
        let identity = Identity::generate();
        let recipient = Identity::generate().fingerprint();
        let msg = SignalingMessage::neu(SessionId::new(), 1, kind, recipient, vec![0xAB; 64]);
        (identity, msg)
    }

    #[test]
    fn signierter_umschlag_laesst_sich_zerlegen() {
        let (identity, msg) = nachricht(SignalKind::Invite);
        let envelope = PushEnvelope::signieren(&identity, &msg);

        let raw = envelope.to_vec().unwrap();
        let decoded = PushEnvelope::from_slice(&raw).unwrap().zerlegen().unwrap();

        assert_eq!(decoded.session_id, msg.session_id);
        assert_eq!(decoded.seq, 1);
        assert_eq!(decoded.kind, SignalKind::Invite);
        assert_eq!(decoded.call_from, identity.fingerprint());
        assert_eq!(decoded.sender_key, identity.public_key_bytes());
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn unbekannte_art_ist_kein_formatfehler() {
        let (identity, msg) = nachricht(SignalKind::Invite);
        let mut envelope = PushEnvelope::signieren(&identity, &msg);
        envelope.port.kind = "video_upgrade".to_string();
        assert_eq!(envelope.zerlegen().unwrap().kind, SignalKind::Unknown);
    }

    #[test]
    fn falsche_version_wird_abgelehnt() {
        let (identity, msg) = nachricht(SignalKind::Answer);
        let mut envelope = PushEnvelope::signieren(&identity, &msg);
        envelope.port.v = 2;
        assert_eq!(envelope.zerlegen(), Err(ProtocolError::UnsupportedVersion(2)));
    }

    #[test]
    fn kaputtes_base64_ist_formatfehler() {
        let (identity, msg) = nachricht(SignalKind::Answer);
        let mut envelope = PushEnvelope::signieren(&identity, &msg);
        envelope.port.payload = "%%%".to_string();
        assert!(matches!(envelope.zerlegen(), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn fehlende_felder_sind_formatfehler() {
        let raw = br#"{"aps":{"call_from":"ab"},"port":{"v":1}}"#;
        assert!(matches!(
            PushEnvelope::from_slice(raw),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(PushEnvelope::from_slice(b"kein json").is_err());
    }

    #[test]
    fn zusaetzliche_aps_felder_werden_ignoriert() {
        let (identity, msg) = nachricht(SignalKind::Invite);
        let envelope = PushEnvelope::signieren(&identity, &msg);
        let mut value = serde_json::to_value(&envelope).unwrap();
        value["aps"]["alert"] = serde_json::json!("Eingehender Anruf");

        let raw = serde_json::to_vec(&value).unwrap();
        assert_eq!(PushEnvelope::from_slice(&raw).unwrap(), envelope);
    }

    #[test]
    fn seq_null_ist_ungueltig() {
        let (identity, msg) = nachricht(SignalKind::Invite);
        let mut envelope = PushEnvelope::signieren(&identity, &msg);
        envelope.port.seq = 0;
        assert!(matches!(envelope.zerlegen(), Err(ProtocolError::Malformed(_))));
    }
}
