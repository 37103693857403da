//! Schema der abgelegten Session-Datensaetze
//!
//! Ein Datensatz traegt den versiegelten `SessionSnapshot` plus die wenigen
//! Klartext-Spalten, die der Speicher zum Filtern braucht (terminal,
//! Zeitstempel). Die Version steckt in der AAD der Versiegelung, ein
//! Herabstufen der Spalte fuehrt also zu `AuthenticationFailed`.

use chrono::{DateTime, Utc};
use port_core::SessionId;

/// Aktuelles Layout der versiegelten Nutzlast
pub const RECORD_VERSION: u32 = 1;

/// Eine Zeile der `sessions`-Tabelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub session_id: SessionId,
    pub sealed_payload: Vec<u8>,
    pub version: u32,
    pub terminal: bool,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn neu(session_id: SessionId, sealed_payload: Vec<u8>, terminal: bool) -> Self {
        Self {
            session_id,
            sealed_payload,
            version: RECORD_VERSION,
            terminal,
            updated_at: Utc::now(),
        }
    }
}

/// Associated Data der Speicher-Versiegelung: `b"rec" | session_id | version BE`
pub fn record_ad(session_id: &SessionId, version: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + 16 + 4);
    out.extend_from_slice(b"rec");
    out.extend_from_slice(session_id.as_bytes());
    out.extend_from_slice(&version.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_bindet_id_und_version() {
        let id = SessionId::new();
        assert_ne!(record_ad(&id, 1), record_ad(&id, 2));
        assert_ne!(record_ad(&id, 1), record_ad(&SessionId::new(), 1));
    }

    #[test]
    fn neuer_datensatz_hat_aktuelle_version() {
        let record = StoredRecord::neu(SessionId::new(), vec![1, 2], true);
        assert_eq!(record.version, RECORD_VERSION);
        assert!(record.terminal);
    }
}
