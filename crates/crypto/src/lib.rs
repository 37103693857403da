//! # port-crypto
//!
//! Crypto Engine der Port-Anruf-Pipeline. Reine CPU-Operationen, kein I/O;
//! alle Fehler werden als Werte zurueckgegeben.
//!
//! ## Module
//! - `identity` - Ed25519 Langzeit-Identitaet des Geraets, Fingerprints
//! - `key_agreement` - X25519 + HKDF Ableitung des Session-Schluessels
//! - `aead` - AES-256-GCM `seal` / `open` fuer Signalisierungs-Payloads
//! - `storage` - Master-Key und Versiegelung fuer die Ablage (eigene Domaene)
//! - `signal_auth` - Signatur-Transkript fuer Push-Signale
//! - `error` - Fehlertypen
//!
//! ## Schluesseltrennung
//! Signalisierungs- und Speicher-Schluessel werden nie ohne Domain-Tag aus
//! demselben Material abgeleitet:
//! `port-signaling-key-v1` bzw. `port-storage-key-v1`.

pub mod aead;
pub mod error;
pub mod identity;
pub mod key_agreement;
pub mod signal_auth;
pub mod storage;

// Bequeme Re-Exports
pub use aead::{open, seal};
pub use error::{CryptoError, CryptoResult};
pub use identity::{fingerprint_of, Identity};
pub use key_agreement::{derive_session_key, fresh_nonce, EphemeralKeypair, Handshake, Transcript};
pub use port_core::{SecretBytes, SessionKeyMaterial};
pub use signal_auth::{sign_signal, signal_ad, signal_transcript, verify_signal};
pub use storage::{open_from_storage, seal_for_storage, MasterKey};

/// HKDF-Info fuer Signalisierungs-Schluessel
pub const SIGNALING_KEY_INFO: &[u8] = b"port-signaling-key-v1";

/// HKDF-Info fuer Speicher-Schluessel
pub const STORAGE_KEY_INFO: &[u8] = b"port-storage-key-v1";
