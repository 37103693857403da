//! Fehlertypen fuer Port
//!
//! Zentraler Fehler-Enum fuer die Prozessgrenze (App-Kontext).
//! Die Komponenten-Crates definieren eigene Fehler; diese werden hier nur
//! als Text gefuehrt, damit `port-core` ein Blatt-Crate bleibt.

use thiserror::Error;

/// Globaler Result-Alias fuer Port
pub type Result<T> = std::result::Result<T, PortError>;

/// Fehler an der Prozessgrenze
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Speicherfehler: {0}")]
    Speicher(String),

    #[error("Kryptografie-Fehler: {0}")]
    Krypto(String),

    #[error("Anruf-Fehler: {0}")]
    Anruf(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PortError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
