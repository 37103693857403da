//! Fehlertypen fuer Wire-Formate

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Strukturell ungueltiger Umschlag (fehlende Felder, Base64, UUID ...)
    #[error("Ungueltiger Umschlag: {0}")]
    Malformed(String),

    #[error("Nicht unterstuetzte Version: {0}")]
    UnsupportedVersion(u32),

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(String),
}

impl ProtocolError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
