//! SQLite Connection Pool mit WAL-Modus und `synchronous = FULL`

use dashmap::DashMap;
use port_core::SessionId;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StoreResult;
use crate::repository::SpeicherConfig;

/// Wrapper um den SQLite Connection Pool
///
/// Haelt zusaetzlich eine Schreibsperre pro Session-ID, damit zwei
/// Schreibvorgaenge fuer dieselbe Session nie verschraenkt laufen.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
    sperren: Arc<DashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SqliteDb {
    /// Oeffnet (oder erstellt) die Datenbank und fuehrt Migrationen aus
    pub async fn oeffnen(config: &SpeicherConfig) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(if config.sqlite_wal {
                SqliteJournalMode::Wal
            } else {
                SqliteJournalMode::Delete
            })
            // Ein abgeschlossener Commit ist nach Rueckkehr auf der Platte
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_verbindungen)
            .connect_with(opts)
            .await?;

        info!(url = %config.url, wal = config.sqlite_wal, "SQLite-Pool geoeffnet");

        let db = Self::aus_pool(pool);
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    /// Erstellt eine In-Memory-Datenbank fuer Tests
    pub async fn in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // In-Memory benoetigt mindestens 1 persistente Verbindung
            .min_connections(1)
            .connect_with(opts)
            .await?;

        let db = Self::aus_pool(pool);
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    fn aus_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            sperren: Arc::new(DashMap::new()),
        }
    }

    pub async fn migrationen_ausfuehren(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Datenbank-Migrationen abgeschlossen");
        Ok(())
    }

    /// Schliesst den Pool; laufende Abfragen werden noch beendet
    pub async fn schliessen(&self) {
        self.pool.close().await;
        info!("SQLite-Pool geschlossen");
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn schreib_sperre(&self, id: SessionId) -> Arc<Mutex<()>> {
        self.sperren
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Entfernt die Sperre, sofern ausser dem Aufrufer niemand mehr auf
    /// sie wartet. Ein wartender Schreiber behaelt sonst einen Mutex, den
    /// ein spaeterer Schreiber nicht mehr sieht.
    pub(crate) fn sperre_freigeben(&self, id: &SessionId, sperre: &Arc<Mutex<()>>) {
        // Map-Eintrag plus Kopie des Aufrufers
        self.sperren
            .remove_if(id, |_, s| Arc::ptr_eq(s, sperre) && Arc::strong_count(s) == 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sperre_bleibt_solange_ein_schreiber_wartet() {
        let db = SqliteDb::in_memory().await.unwrap();
        let id = SessionId::new();

        let erste = db.schreib_sperre(id);
        let wartend = db.schreib_sperre(id);
        assert!(Arc::ptr_eq(&erste, &wartend));

        db.sperre_freigeben(&id, &erste);
        // Der wartende Schreiber und ein neuer teilen denselben Mutex
        let neu = db.schreib_sperre(id);
        assert!(Arc::ptr_eq(&wartend, &neu));
    }

    #[tokio::test]
    async fn sperre_ohne_wartende_wird_entfernt() {
        let db = SqliteDb::in_memory().await.unwrap();
        let id = SessionId::new();

        let sperre = db.schreib_sperre(id);
        db.sperre_freigeben(&id, &sperre);
        assert!(db.sperren.is_empty());

        let neu = db.schreib_sperre(id);
        assert!(!Arc::ptr_eq(&sperre, &neu));
    }
}
