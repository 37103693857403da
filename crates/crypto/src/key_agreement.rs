//! X25519 Schluesselvereinbarung fuer Anruf-Sessions
//!
//! Ablauf:
//! 1. Invite   - Anrufer sendet ephemeren Public Key + frische Nonce
//! 2. Answer   - Angerufener sendet seinen ephemeren Public Key + Nonce
//! 3. Beide leiten via HKDF-SHA256 denselben Session-Schluessel ab
//!
//! Das Transkript bindet Session-ID, beide Fingerprints und beide Nonces
//! ein. Damit wird ein Schluessel nie ueber Sessions hinweg wiederverwendet.

use hkdf::Hkdf;
use port_core::{Fingerprint, SecretBytes, SessionId, SessionKeyMaterial};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::SIGNALING_KEY_INFO;

/// Laenge eines Handshake-Payloads: Public Key (32) + Nonce (32)
pub const HANDSHAKE_LEN: usize = 64;

/// Ephemeres X25519-Schluessel-Paar einer Session
pub struct EphemeralKeypair {
    secret: StaticSecret,
    public_key: [u8; 32],
}

impl EphemeralKeypair {
    /// Erstellt ein frisches Schluessel-Paar
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = X25519PublicKey::from(&secret).to_bytes();
        Self { secret, public_key }
    }

    /// Stellt ein Schluessel-Paar aus dem gesicherten Handshake-Material wieder her
    pub fn from_secret_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
                erwartet: 32,
                erhalten: bytes.len(),
            })?;
        let secret = StaticSecret::from(bytes);
        let public_key = X25519PublicKey::from(&secret).to_bytes();
        Ok(Self { secret, public_key })
    }

    /// Geheimer Teil fuer die versiegelte Ablage
    pub fn secret_bytes(&self) -> SecretBytes {
        SecretBytes::new(self.secret.to_bytes().to_vec())
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public_key
    }
}

impl std::fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EphemeralKeypair {{ secret: [REDACTED] }}")
    }
}

/// 32 frische Zufallsbytes fuer das Transkript
pub fn fresh_nonce() -> [u8; 32] {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    buf
}

// ---------------------------------------------------------------------------
// Handshake-Payload
// ---------------------------------------------------------------------------

/// Inhalt von `Invite` und `Answer`: `[eph_public(32)] [nonce(32)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub eph_public: [u8; 32],
    pub nonce: [u8; 32],
}

impl Handshake {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_LEN);
        out.extend_from_slice(&self.eph_public);
        out.extend_from_slice(&self.nonce);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != HANDSHAKE_LEN {
            return Err(CryptoError::format(format!(
                "Handshake erwartet {HANDSHAKE_LEN} Bytes, erhalten {}",
                bytes.len()
            )));
        }
        let mut eph_public = [0u8; 32];
        let mut nonce = [0u8; 32];
        eph_public.copy_from_slice(&bytes[..32]);
        nonce.copy_from_slice(&bytes[32..]);
        Ok(Self { eph_public, nonce })
    }
}

// ---------------------------------------------------------------------------
// Transkript
// ---------------------------------------------------------------------------

/// Gebundener Kontext der Schluesselableitung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub session_id: SessionId,
    pub caller: Fingerprint,
    pub callee: Fingerprint,
    pub caller_nonce: [u8; 32],
    pub callee_nonce: [u8; 32],
}

impl Transcript {
    /// `[session_id(16)] [caller(64)] [callee(64)]`
    fn info_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIGNALING_KEY_INFO.len() + 16 + 128);
        out.extend_from_slice(SIGNALING_KEY_INFO);
        out.extend_from_slice(self.session_id.as_bytes());
        out.extend_from_slice(self.caller.as_str().as_bytes());
        out.extend_from_slice(self.callee.as_str().as_bytes());
        out
    }

    fn salt(&self) -> [u8; 64] {
        let mut salt = [0u8; 64];
        salt[..32].copy_from_slice(&self.caller_nonce);
        salt[32..].copy_from_slice(&self.callee_nonce);
        salt
    }
}

/// Leitet den Signalisierungs-Schluessel einer Session ab
///
/// Deterministisch fuer identische Eingaben. Nicht beitragende DH-Ergebnisse
/// (Low-Order-Punkte der Gegenstelle) werden abgelehnt.
pub fn derive_session_key(
    local: &EphemeralKeypair,
    remote_public: &[u8; 32],
    transcript: &Transcript,
) -> CryptoResult<SessionKeyMaterial> {
    let remote = X25519PublicKey::from(*remote_public);
    let shared = local.secret.diffie_hellman(&remote);
    if !shared.was_contributory() {
        return Err(CryptoError::KeyDerivation(
            "DH-Ergebnis nicht beitragend (ungueltiger Public Key)".to_string(),
        ));
    }

    // IKM = DH-Output, Salt = caller_nonce || callee_nonce
    let hk = Hkdf::<Sha256>::new(Some(&transcript.salt()), shared.as_bytes());
    let mut okm = vec![0u8; 32];
    hk.expand(&transcript.info_bytes(), &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    SessionKeyMaterial::from_bytes(okm)
        .ok_or_else(|| CryptoError::KeyDerivation("Schluessel-Laenge".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
