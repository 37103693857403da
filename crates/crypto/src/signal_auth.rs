//! Signatur-Transkript fuer Push-Signale
//!
//! Jedes Signal wird vom Absender ueber ein festes Transkript signiert:
//!
//! ```text
//! "port-signal-v1" | session_id(16) | seq(u64 BE) | kind_tag(u8)
//!   | recipient(64 ASCII) | payload_len(u32 BE) | payload
//! ```
//!
//! Die Sequenz-Nummer ist Teil des Transkripts und damit gegen
//! Umsortierung durch den Push-Kanal geschuetzt.

use port_core::{Fingerprint, IncomingSignal, SessionId, SignalKind};

use crate::error::{CryptoError, CryptoResult};
use crate::identity::{fingerprint_of, Identity};

const SIGNAL_DOMAIN: &[u8] = b"port-signal-v1";

/// Baut das zu signierende Transkript
pub fn signal_transcript(
    session_id: &SessionId,
    seq: u64,
    kind: SignalKind,
    recipient: &Fingerprint,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(SIGNAL_DOMAIN.len() + 16 + 8 + 1 + 64 + 4 + payload.len());
    out.extend_from_slice(SIGNAL_DOMAIN);
    out.extend_from_slice(session_id.as_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.push(kind.tag());
    out.extend_from_slice(recipient.as_str().as_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Associated Data fuer versiegelte Signal-Payloads (ICE, Hangup)
pub fn signal_ad(session_id: &SessionId, seq: u64, kind: SignalKind) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + 8 + 1);
    out.extend_from_slice(session_id.as_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.push(kind.tag());
    out
}

/// Signiert ein ausgehendes Signal mit der lokalen Identitaet
pub fn sign_signal(
    identity: &Identity,
    session_id: &SessionId,
    seq: u64,
    kind: SignalKind,
    recipient: &Fingerprint,
    payload: &[u8],
) -> Vec<u8> {
    identity.sign(&signal_transcript(session_id, seq, kind, recipient, payload))
}

/// Prueft Absender-Bindung und Signatur eines eingehenden Signals
pub fn verify_signal(signal: &IncomingSignal) -> CryptoResult<()> {
    if fingerprint_of(&signal.sender_key) != signal.sender {
        return Err(CryptoError::authentifizierung(
            "Absender-Fingerprint passt nicht zum Schluessel",
        ));
    }

    let transcript = signal_transcript(
        &signal.session_id,
        signal.seq,
        signal.kind,
        &signal.recipient,
        &signal.payload,
    );
    if !Identity::verify(&transcript, &signal.signature, &signal.sender_key) {
        return Err(CryptoError::authentifizierung("Signal-Signatur ungueltig"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
