//! Authentifizierte Verschluesselung (AES-256-GCM)
//!
//! ## Format
//! ```text
//! [nonce(12)] [ciphertext + auth_tag(16)]
//! ```
//! Die Nonce wird pro Aufruf zufaellig gezogen. Associated Data wird nicht
//! mitgesendet, sondern vom Aufrufer aus dem Kontext rekonstruiert.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use port_core::SessionKeyMaterial;
use rand_core::{OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Versiegelt `plaintext` unter dem Session-Schluessel
pub fn seal(key: &SessionKeyMaterial, plaintext: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    seal_raw(key.as_bytes(), plaintext, associated_data)
}

/// Oeffnet versiegelte Bytes. `AuthenticationFailed` bei falschem Schluessel,
/// falscher AAD oder manipuliertem Inhalt.
pub fn open(key: &SessionKeyMaterial, sealed: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    open_raw(key.as_bytes(), sealed, associated_data)
}

pub(crate) fn seal_raw(key_bytes: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher(key_bytes)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = AesNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn open_raw(key_bytes: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::format(format!(
            "Versiegelte Daten zu kurz: {} Bytes",
            sealed.len()
        )));
    }
    let cipher = cipher(key_bytes)?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = AesNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::authentifizierung("Auth-Tag ungueltig"))
}

fn cipher(key_bytes: &[u8]) -> CryptoResult<Aes256Gcm> {
    if key_bytes.len() != 32 {
        return Err(CryptoError::UngueltigeSchluesselLaenge {
            erwartet: 32,
            erhalten: key_bytes.len(),
        });
    }
    let key = Key::<Aes256Gcm>::from_slice(key_bytes);
    Ok(Aes256Gcm::new(key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> SessionKeyMaterial {
        SessionKeyMaterial::from_bytes(vec![b; 32]).unwrap()
    }

    #[test]
    fn roundtrip() {
        let k = key(1);
        for plaintext in [&b""[..], b"candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host"] {
            let sealed = seal(&k, plaintext, b"ad").unwrap();
            assert_eq!(open(&k, &sealed, b"ad").unwrap(), plaintext);
        }
    }

    #[test]
    fn falscher_schluessel_schlaegt_fehl() {
        let sealed = seal(&key(1), b"Geheim", b"ad").unwrap();
        assert!(matches!(
            open(&key(2), &sealed, b"ad"),
            Err(CryptoError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn falsche_aad_schlaegt_fehl() {
        let sealed = seal(&key(1), b"Geheim", b"ad-1").unwrap();
        assert!(matches!(
            open(&key(1), &sealed, b"ad-2"),
            Err(CryptoError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn manipulierter_ciphertext_schlaegt_fehl() {
        let mut sealed = seal(&key(1), b"Original", b"").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            open(&key(1), &sealed, b""),
            Err(CryptoError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn zu_kurze_daten_sind_formatfehler() {
        assert!(matches!(
            open(&key(1), &[0u8; 5], b""),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn nonce_ist_pro_aufruf_frisch() {
        let k = key(1);
        let a = seal(&k, b"gleich", b"").unwrap();
        let b = seal(&k, b"gleich", b"").unwrap();
        assert_ne!(a, b);
    }
}
