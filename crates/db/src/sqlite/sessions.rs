//! SQLite-Implementierung des SessionRepository

use chrono::{DateTime, Utc};
use port_core::SessionId;
use port_protocol::StoredRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::repository::{QuarantaeneEintrag, SessionRepository};
use crate::sqlite::pool::SqliteDb;

impl SessionRepository for SqliteDb {
    async fn put(&self, record: &StoredRecord) -> StoreResult<()> {
        let id = record.session_id;
        let sperre = self.schreib_sperre(id);
        let _guard = sperre.lock().await;

        let mut tx = self.pool.begin().await?;

        let bestehend: Option<bool> =
            sqlx::query_scalar("SELECT terminal FROM sessions WHERE session_id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        if bestehend == Some(true) {
            tx.rollback().await?;
            return Err(StoreError::Immutable(id));
        }

        sqlx::query(
            "INSERT INTO sessions (session_id, sealed_payload, version, terminal, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                sealed_payload = excluded.sealed_payload,
                version        = excluded.version,
                terminal       = excluded.terminal,
                updated_at     = excluded.updated_at",
        )
        .bind(id.to_string())
        .bind(&record.sealed_payload)
        .bind(record.version as i64)
        .bind(record.terminal)
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if record.terminal {
            self.sperre_freigeben(&id, &sperre);
        }
        debug!(session_id = %id, terminal = record.terminal, "Datensatz geschrieben");
        Ok(())
    }

    async fn get(&self, id: SessionId) -> StoreResult<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT session_id, sealed_payload, version, terminal, updated_at
             FROM sessions WHERE session_id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_record(id, &r)).transpose()
    }

    async fn delete(&self, id: SessionId) -> StoreResult<bool> {
        let sperre = self.schreib_sperre(id);
        let _guard = sperre.lock().await;

        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.sperre_freigeben(&id, &sperre);
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> StoreResult<Vec<SessionId>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT session_id FROM sessions WHERE terminal = 0 ORDER BY updated_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids
            .iter()
            .filter_map(|text| {
                let id = SessionId::parse(text);
                if id.is_none() {
                    warn!(session_id = %text, "Ungueltige Session-ID in der Datenbank");
                }
                id
            })
            .collect())
    }

    async fn quarantine(&self, id: SessionId, reason: &str) -> StoreResult<()> {
        let sperre = self.schreib_sperre(id);
        let _guard = sperre.lock().await;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO quarantined_sessions (session_id, sealed_payload, version, reason, quarantined_at)
             SELECT session_id, sealed_payload, version, ?, ? FROM sessions WHERE session_id = ?",
        )
        .bind(reason)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.sperre_freigeben(&id, &sperre);
        warn!(session_id = %id, reason, "Datensatz in Quarantaene verschoben");
        Ok(())
    }

    async fn list_quarantined(&self) -> StoreResult<Vec<QuarantaeneEintrag>> {
        let rows = sqlx::query(
            "SELECT session_id, version, reason FROM quarantined_sessions ORDER BY quarantined_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> StoreResult<QuarantaeneEintrag> {
                Ok(QuarantaeneEintrag {
                    session_id: r.try_get("session_id")?,
                    version: r.try_get::<i64, _>("version")? as u32,
                    reason: r.try_get("reason")?,
                })
            })
            .collect()
    }
}

fn row_to_record(id: SessionId, row: &SqliteRow) -> StoreResult<StoredRecord> {
    let version: i64 = row.try_get("version")?;
    let updated_at: String = row.try_get("updated_at")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| StoreError::korrupt(id, format!("updated_at: {e}")))?
        .with_timezone(&Utc);
    let version = u32::try_from(version)
        .map_err(|_| StoreError::korrupt(id, format!("version {version} ausserhalb des Bereichs")))?;

    Ok(StoredRecord {
        session_id: id,
        sealed_payload: row.try_get("sealed_payload")?,
        version,
        terminal: row.try_get("terminal")?,
        updated_at,
    })
}
