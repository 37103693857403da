//! Versiegelte Ablage von Call-Sessions
//!
//! Der Vault ist die einzige Stelle, an der ein `SessionSnapshot` in
//! Klartext existiert: direkt vor dem Versiegeln und direkt nach dem
//! Oeffnen. In der Datenbank liegt ausschliesslich der versiegelte Blob.

use std::time::Duration;

use port_core::{CallSession, SessionId, SessionSnapshot};
use port_crypto::{open_from_storage, seal_for_storage, CryptoError, MasterKey};
use port_protocol::{record_ad, StoredRecord, RECORD_VERSION};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::repository::{QuarantaeneEintrag, SessionRepository};
use crate::sqlite::SqliteDb;

/// Wiederholungs-Parameter fuer voruebergehende Speicherfehler
#[derive(Debug, Clone, Copy)]
pub struct Wiederholung {
    pub versuche: u32,
    pub basis: Duration,
}

impl Default for Wiederholung {
    fn default() -> Self {
        Self {
            versuche: 3,
            basis: Duration::from_millis(100),
        }
    }
}

/// Session Store mit Versiegelung
#[derive(Debug, Clone)]
pub struct SessionVault {
    db: SqliteDb,
    master: MasterKey,
    wiederholung: Wiederholung,
}

impl SessionVault {
    pub fn neu(db: SqliteDb, master: MasterKey) -> Self {
        Self {
            db,
            master,
            wiederholung: Wiederholung::default(),
        }
    }

    /// Ersetzt die Wiederholungs-Parameter fuer voruebergehende Fehler
    pub fn mit_wiederholung(mut self, wiederholung: Wiederholung) -> Self {
        self.wiederholung = wiederholung;
        self
    }

    pub fn wiederholung(&self) -> Wiederholung {
        self.wiederholung
    }

    pub fn db(&self) -> &SqliteDb {
        &self.db
    }

    /// Versiegelt und speichert den aktuellen Stand einer Session.
    ///
    /// Nach Rueckkehr ist der Datensatz dauerhaft.
    pub async fn save(&self, session: &CallSession) -> StoreResult<()> {
        let klartext = serde_json::to_vec(&session.snapshot())
            .map_err(|e| StoreError::Serialisierung(e.to_string()))?;
        let sealed = seal_for_storage(
            &self.master,
            &klartext,
            &record_ad(&session.id, RECORD_VERSION),
        )
        .map_err(|e| StoreError::Serialisierung(e.to_string()))?;

        let record = StoredRecord::neu(session.id, sealed, session.is_terminal());
        self.wiederholen(|| self.db.put(&record)).await?;
        debug!(session_id = %session.id, state = %session.state, "Session gespeichert");
        Ok(())
    }

    /// Laedt und oeffnet eine Session.
    ///
    /// Schlaegt die Verifikation fehl, wird der Datensatz in die Quarantaene
    /// verschoben und `CorruptRecord` zurueckgegeben.
    pub async fn load(&self, id: SessionId) -> StoreResult<Option<CallSession>> {
        let record = match self.wiederholen(|| self.db.get(id)).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(StoreError::CorruptRecord { grund, .. }) => {
                return Err(self.in_quarantaene(id, grund).await);
            }
            Err(e) => return Err(e),
        };

        if record.version != RECORD_VERSION {
            return Err(StoreError::UnsupportedVersion(record.version));
        }

        let klartext = match open_from_storage(
            &self.master,
            &record.sealed_payload,
            &record_ad(&id, record.version),
        ) {
            Ok(bytes) => bytes,
            Err(e @ (CryptoError::AuthenticationFailed(_) | CryptoError::InvalidFormat(_))) => {
                return Err(self.in_quarantaene(id, e.to_string()).await);
            }
            Err(e) => return Err(StoreError::Serialisierung(e.to_string())),
        };

        let snapshot: SessionSnapshot = match serde_json::from_slice(&klartext) {
            Ok(s) => s,
            Err(e) => return Err(self.in_quarantaene(id, format!("Snapshot: {e}")).await),
        };
        if snapshot.id != id {
            return Err(self.in_quarantaene(id, "Snapshot gehoert zu anderer Session").await);
        }

        Ok(Some(CallSession::aus_snapshot(snapshot)))
    }

    /// Existiert bereits ein Datensatz (aktiv oder terminal) fuer diese ID?
    pub async fn existiert(&self, id: SessionId) -> StoreResult<bool> {
        match self.wiederholen(|| self.db.get(id)).await {
            Ok(record) => Ok(record.is_some()),
            // Beschaedigt, aber vorhanden
            Err(StoreError::CorruptRecord { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    pub async fn list_active(&self) -> StoreResult<Vec<SessionId>> {
        self.wiederholen(|| self.db.list_active()).await
    }

    pub async fn list_quarantined(&self) -> StoreResult<Vec<QuarantaeneEintrag>> {
        self.db.list_quarantined().await
    }

    async fn in_quarantaene(&self, id: SessionId, grund: impl Into<String>) -> StoreError {
        let grund = grund.into();
        if let Err(e) = self.db.quarantine(id, &grund).await {
            warn!(session_id = %id, fehler = %e, "Quarantaene fehlgeschlagen");
        }
        StoreError::korrupt(id, grund)
    }

    /// Fuehrt `op` aus und wiederholt voruebergehende Fehler mit
    /// exponentiellem Backoff
    async fn wiederholen<T, F, Fut>(&self, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let mut versuch = 0u32;
        loop {
            match op().await {
                Err(e) if e.ist_voruebergehend() && versuch < self.wiederholung.versuche => {
                    let warten = self.wiederholung.basis * 2u32.pow(versuch);
                    warn!(versuch = versuch + 1, fehler = %e, ?warten, "Speicherfehler, neuer Versuch");
                    tokio::time::sleep(warten).await;
                    versuch += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    async fn vault(versuche: u32) -> SessionVault {
        let db = SqliteDb::in_memory().await.unwrap();
        SessionVault::neu(db, MasterKey::generate()).mit_wiederholung(Wiederholung {
            versuche,
            basis: Duration::from_millis(1),
        })
    }

    #[tokio::test]
    async fn voruebergehender_fehler_wird_wiederholt() {
        let vault = vault(2).await;
        let aufrufe = AtomicU32::new(0);

        let ergebnis: StoreResult<()> = vault
            .wiederholen(|| async {
                aufrufe.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::StorageUnavailable("weg".into()))
            })
            .await;

        assert!(matches!(ergebnis, Err(StoreError::StorageUnavailable(_))));
        // erster Versuch plus zwei Wiederholungen
        assert_eq!(aufrufe.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wiederholung_endet_beim_ersten_erfolg() {
        let vault = vault(5).await;
        let aufrufe = AtomicU32::new(0);

        let ergebnis = vault
            .wiederholen(|| async {
                if aufrufe.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StoreError::StorageUnavailable("kurz weg".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(ergebnis.unwrap(), 7);
        assert_eq!(aufrufe.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dauerhafter_fehler_wird_nicht_wiederholt() {
        let vault = vault(3).await;
        let aufrufe = AtomicU32::new(0);
        let id = SessionId::new();

        let ergebnis: StoreResult<()> = vault
            .wiederholen(|| async {
                aufrufe.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Immutable(id))
            })
            .await;

        assert!(matches!(ergebnis, Err(StoreError::Immutable(_))));
        assert_eq!(aufrufe.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn speichern_auf_geschlossenem_pool_scheitert_nach_wiederholungen() {
        let vault = vault(2).await;
        vault.db().schliessen().await;
        let session = CallSession::neu_ausgehend(port_core::Fingerprint::from_digest(&[1u8; 32]));

        let start = std::time::Instant::now();
        let ergebnis = vault.save(&session).await;

        assert!(matches!(ergebnis, Err(StoreError::StorageUnavailable(_))));
        // 1 ms + 2 ms Backoff
        assert!(start.elapsed() >= Duration::from_millis(3));
    }
}
