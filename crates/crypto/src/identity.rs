//! Langzeit-Identitaet des Geraets (Ed25519)
//!
//! Jedes Geraet besitzt ein Ed25519-Schluessel-Paar. Der oeffentliche
//! Schluessel reist in jedem Push-Umschlag mit; die Gegenstelle wird
//! ueber den SHA-256-Fingerprint dieses Schluessels identifiziert.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use port_core::Fingerprint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Langzeit-Identitaet (privater Ed25519-Schluessel)
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generiert ein neues Ed25519-Schluessel-Paar
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Erstellt eine Identity aus einem privaten Schluessel (32 Bytes)
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: 32,
                    erhalten: bytes.len(),
                })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    /// Gibt den privaten Schluessel als Bytes zurueck (fuer Persistenz)
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Gibt den oeffentlichen Schluessel als Bytes zurueck
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Fingerprint der eigenen Identitaet
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.public_key_bytes())
    }

    /// Signiert Daten mit dem privaten Schluessel
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.signing_key.sign(data).to_bytes().to_vec()
    }

    /// Verifiziert eine Signatur mit einem oeffentlichen Schluessel
    pub fn verify(data: &[u8], signature_bytes: &[u8], public_key_bytes: &[u8; 32]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key_bytes) else {
            return false;
        };
        let Ok(sig_array) = signature_bytes.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(sig_array);
        verifying_key.verify_strict(data, &signature).is_ok()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity {{ fingerprint: {} }}", self.fingerprint().kurz())
    }
}

/// SHA-256-Fingerprint eines Ed25519-Identitaetsschluessels
pub fn fingerprint_of(public_key: &[u8; 32]) -> Fingerprint {
    let digest: [u8; 32] = Sha256::digest(public_key).into();
    Fingerprint::from_digest(&digest)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_signieren_und_verifizieren() {
        let identity = Identity::generate();
        let data = b"Hallo, Port!";

        let signature = identity.sign(data);
        assert_eq!(signature.len(), 64);

        let pub_key = identity.public_key_bytes();
        assert!(Identity::verify(data, &signature, &pub_key));
    }

    #[test]
    fn falsche_signatur_wird_abgelehnt() {
        let identity = Identity::generate();
        let data = b"Hallo, Port!";

        let mut signature = identity.sign(data);
        signature[0] ^= 0xFF;

        assert!(!Identity::verify(data, &signature, &identity.public_key_bytes()));
    }

    #[test]
    fn verschiedene_keys_ablehnen() {
        let id1 = Identity::generate();
        let id2 = Identity::generate();
        let sig = id1.sign(b"Testdaten");
        assert!(!Identity::verify(b"Testdaten", &sig, &id2.public_key_bytes()));
    }

    #[test]
    fn kurze_signatur_wird_abgelehnt() {
        let identity = Identity::generate();
        assert!(!Identity::verify(b"x", &[0u8; 10], &identity.public_key_bytes()));
    }

    #[test]
    fn identity_from_bytes_roundtrip() {
        let identity = Identity::generate();
        let restored = Identity::from_bytes(&identity.private_key_bytes()).unwrap();
        assert_eq!(restored.public_key_bytes(), identity.public_key_bytes());
        assert_eq!(restored.fingerprint(), identity.fingerprint());
    }

    #[test]
    fn identity_from_bytes_falsche_laenge() {
        let result = Identity::from_bytes(&[0u8; 31]);
        assert!(matches!(
            result,
            Err(CryptoError::UngueltigeSchluesselLaenge { erwartet: 32, erhalten: 31 })
        ));
    }

    #[test]
    fn fingerprint_ist_stabil() {
        let identity = Identity::generate();
        let fp = fingerprint_of(&identity.public_key_bytes());
        assert_eq!(fp, identity.fingerprint());
        assert_eq!(fp.as_str().len(), 64);
    }
}
