//! Fehlertypen fuer den Session Store

use port_core::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O-Fehler der Datenbank; voruebergehend, wird wiederholt
    #[error("Speicher nicht verfuegbar: {0}")]
    StorageUnavailable(String),

    /// Versiegelung konnte nicht verifiziert werden. Der Datensatz liegt
    /// danach in der Quarantaene.
    #[error("Datensatz {session_id} beschaedigt: {grund}")]
    CorruptRecord { session_id: SessionId, grund: String },

    /// Terminale Datensaetze werden nicht mehr ueberschrieben
    #[error("Datensatz {0} ist terminal und unveraenderlich")]
    Immutable(SessionId),

    #[error("Nicht unterstuetzte Datensatz-Version: {0}")]
    UnsupportedVersion(u32),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl StoreError {
    pub fn korrupt(session_id: SessionId, grund: impl Into<String>) -> Self {
        Self::CorruptRecord {
            session_id,
            grund: grund.into(),
        }
    }

    /// Gibt true zurueck wenn ein erneuter Versuch sinnvoll ist
    pub fn ist_voruebergehend(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
