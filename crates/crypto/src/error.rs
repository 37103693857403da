//! Fehlertypen fuer die Crypto Engine

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Manipulierte Daten oder falscher Schluessel. Fatal fuer das
    /// betroffene Signal, wird nie mit einem anderen Schluessel wiederholt.
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    AuthenticationFailed(String),

    #[error("Ungueltiges Format: {0}")]
    InvalidFormat(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),
}

impl CryptoError {
    pub fn authentifizierung(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
