//! Versiegelung fuer die Ablage (at-rest)
//!
//! Der Master-Key liegt auf dem Geraet und verlaesst die Crypto Engine nur
//! zur Persistenz in der Schluesseldatei. Der eigentliche Speicher-Schluessel
//! wird per HKDF mit eigenem Domain-Tag abgeleitet und ist damit von allen
//! Signalisierungs-Schluesseln getrennt.

use hkdf::Hkdf;
use port_core::SecretBytes;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

use crate::aead::{open_raw, seal_raw};
use crate::error::{CryptoError, CryptoResult};
use crate::STORAGE_KEY_INFO;

/// Geraete-residenter Master-Key (32 Bytes)
#[derive(Clone)]
pub struct MasterKey(SecretBytes);

impl MasterKey {
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(SecretBytes::new(bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: 32,
                erhalten: bytes.len(),
            });
        }
        Ok(Self(SecretBytes::new(bytes.to_vec())))
    }

    /// Rohbytes fuer die Schluesseldatei
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn storage_key(&self) -> CryptoResult<SecretBytes> {
        let hk = Hkdf::<Sha256>::new(None, self.0.as_bytes());
        let mut okm = vec![0u8; 32];
        hk.expand(STORAGE_KEY_INFO, &mut okm)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(SecretBytes::new(okm))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Versiegelt einen serialisierten Datensatz fuer die Ablage.
///
/// `associated_data` bindet den Blob an seinen Datensatz (Session-ID +
/// Version), damit Blobs nicht zwischen Zeilen vertauscht werden koennen.
pub fn seal_for_storage(master: &MasterKey, record: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = master.storage_key()?;
    seal_raw(key.as_bytes(), record, associated_data)
}

/// Oeffnet einen abgelegten Blob
pub fn open_from_storage(master: &MasterKey, blob: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = master.storage_key()?;
    open_raw(key.as_bytes(), blob, associated_data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead;
    use port_core::SessionKeyMaterial;

    #[test]
    fn roundtrip() {
        let master = MasterKey::generate();
        let blob = seal_for_storage(&master, b"{\"state\":\"Active\"}", b"id|1").unwrap();
        assert_eq!(
            open_from_storage(&master, &blob, b"id|1").unwrap(),
            b"{\"state\":\"Active\"}"
        );
    }

    #[test]
    fn anderer_master_key_schlaegt_fehl() {
        let blob = seal_for_storage(&MasterKey::generate(), b"record", b"").unwrap();
        assert!(matches!(
            open_from_storage(&MasterKey::generate(), &blob, b""),
            Err(CryptoError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn blob_ist_an_datensatz_gebunden() {
        let master = MasterKey::generate();
        let blob = seal_for_storage(&master, b"record", b"session-a").unwrap();
        assert!(open_from_storage(&master, &blob, b"session-b").is_err());
    }

    #[test]
    fn domaenen_sind_getrennt() {
        // Derselbe Rohschluessel als Signalisierungs-Schluessel darf
        // Speicher-Blobs nicht oeffnen.
        let master = MasterKey::from_bytes(&[9u8; 32]).unwrap();
        let blob = seal_for_storage(&master, b"record", b"").unwrap();
        let signaling = SessionKeyMaterial::from_bytes(vec![9u8; 32]).unwrap();
        assert!(aead::open(&signaling, &blob, b"").is_err());
    }

    #[test]
    fn master_key_laenge_wird_geprueft() {
        assert!(MasterKey::from_bytes(&[0u8; 16]).is_err());
        let master = MasterKey::generate();
        let restored = MasterKey::from_bytes(master.as_bytes()).unwrap();
        let blob = seal_for_storage(&master, b"x", b"").unwrap();
        assert_eq!(open_from_storage(&restored, &blob, b"").unwrap(), b"x");
    }
}
