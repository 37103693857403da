//! Repository-Trait und Speicher-Konfiguration
//!
//! Der Store kennt nur versiegelte Bytes (`StoredRecord`). Ver- und
//! Entsiegelung passieren im `SessionVault` oberhalb dieser Schicht.

use port_core::SessionId;
use port_protocol::StoredRecord;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Standard-Datenbankname (App-Group-Container der iOS-App)
pub const DATABASE_NAME: &str = "numberless.db";

/// Konfiguration des SQLite-Speichers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherConfig {
    /// Verbindungs-URL, z.B. "sqlite://numberless.db"
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// WAL-Modus (Leser blockieren Schreiber nicht)
    pub sqlite_wal: bool,
}

impl Default for SpeicherConfig {
    fn default() -> Self {
        Self {
            url: format!("sqlite://{DATABASE_NAME}"),
            max_verbindungen: 4,
            sqlite_wal: true,
        }
    }
}

/// Ein Eintrag der Quarantaene-Tabelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantaeneEintrag {
    pub session_id: String,
    pub version: u32,
    pub reason: String,
}

/// Dauerhafte Ablage versiegelter Session-Datensaetze
///
/// Schreibzugriffe pro Session-ID sind serialisiert, Lesezugriffe nicht.
/// Ein `put` ist nach Rueckkehr dauerhaft.
#[allow(async_fn_in_trait)]
pub trait SessionRepository: Send + Sync {
    /// Legt einen Datensatz an oder ersetzt ihn (`Immutable` wenn der
    /// gespeicherte Datensatz bereits terminal ist)
    async fn put(&self, record: &StoredRecord) -> StoreResult<()>;

    async fn get(&self, id: SessionId) -> StoreResult<Option<StoredRecord>>;

    async fn delete(&self, id: SessionId) -> StoreResult<bool>;

    /// IDs aller nicht-terminalen Datensaetze
    async fn list_active(&self) -> StoreResult<Vec<SessionId>>;

    /// Verschiebt einen Datensatz in die Quarantaene
    async fn quarantine(&self, id: SessionId, reason: &str) -> StoreResult<()>;

    async fn list_quarantined(&self) -> StoreResult<Vec<QuarantaeneEintrag>>;
}
