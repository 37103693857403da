//! Integration-Tests fuer SessionRepository (In-Memory SQLite)

use chrono::Utc;
use port_core::SessionId;
use port_db::{SessionRepository, SqliteDb, StoreError};
use port_protocol::StoredRecord;

async fn db() -> SqliteDb {
    SqliteDb::in_memory().await.expect("In-Memory DB konnte nicht erstellt werden")
}

fn record(id: SessionId, payload: &[u8], terminal: bool) -> StoredRecord {
    StoredRecord::neu(id, payload.to_vec(), terminal)
}

#[tokio::test]
async fn datensatz_schreiben_und_laden() {
    let db = db().await;
    let id = SessionId::new();

    db.put(&record(id, b"blob-1", false)).await.unwrap();
    let geladen = db.get(id).await.unwrap().unwrap();

    assert_eq!(geladen.session_id, id);
    assert_eq!(geladen.sealed_payload, b"blob-1");
    assert!(!geladen.terminal);
    assert!(db.get(SessionId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn datensatz_ueberschreiben_bis_terminal() {
    let db = db().await;
    let id = SessionId::new();

    db.put(&record(id, b"v1", false)).await.unwrap();
    db.put(&record(id, b"v2", true)).await.unwrap();
    assert_eq!(db.get(id).await.unwrap().unwrap().sealed_payload, b"v2");

    let err = db.put(&record(id, b"v3", false)).await.unwrap_err();
    assert!(matches!(err, StoreError::Immutable(x) if x == id));
    assert_eq!(db.get(id).await.unwrap().unwrap().sealed_payload, b"v2");
}

#[tokio::test]
async fn aktive_sessions_auflisten() {
    let db = db().await;
    let aktiv = SessionId::new();
    let beendet = SessionId::new();

    db.put(&record(aktiv, b"a", false)).await.unwrap();
    db.put(&record(beendet, b"b", true)).await.unwrap();

    assert_eq!(db.list_active().await.unwrap(), vec![aktiv]);
}

#[tokio::test]
async fn quarantaene_verschiebt_statt_zu_loeschen() {
    let db = db().await;
    let id = SessionId::new();
    db.put(&record(id, b"kaputt", false)).await.unwrap();

    db.quarantine(id, "Auth-Tag ungueltig").await.unwrap();

    assert!(db.get(id).await.unwrap().is_none());
    let eintraege = db.list_quarantined().await.unwrap();
    assert_eq!(eintraege.len(), 1);
    assert_eq!(eintraege[0].session_id, id.to_string());
    assert_eq!(eintraege[0].reason, "Auth-Tag ungueltig");

    let blob: Vec<u8> = sqlx::query_scalar("SELECT sealed_payload FROM quarantined_sessions")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(blob, b"kaputt");
}

#[tokio::test]
async fn loeschen() {
    let db = db().await;
    let id = SessionId::new();
    db.put(&record(id, b"x", true)).await.unwrap();

    assert!(db.delete(id).await.unwrap());
    assert!(!db.delete(id).await.unwrap());
    assert!(db.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn parallele_schreibvorgaenge_derselben_session() {
    let db = db().await;
    let id = SessionId::new();

    let mut tasks = Vec::new();
    for i in 0..10u8 {
        let db = db.clone();
        tasks.push(tokio::spawn(async move {
            let mut r = StoredRecord::neu(id, vec![i], false);
            r.updated_at = Utc::now();
            db.put(&r).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let geladen = db.get(id).await.unwrap().unwrap();
    assert_eq!(geladen.sealed_payload.len(), 1);
    assert_eq!(db.list_active().await.unwrap(), vec![id]);
}

#[tokio::test]
async fn gleichzeitige_schreiber_mit_mehreren_verbindungen() {
    let dir = tempfile::tempdir().unwrap();
    let config = port_db::SpeicherConfig {
        url: format!("sqlite://{}", dir.path().join("port.db").display()),
        max_verbindungen: 4,
        sqlite_wal: true,
    };
    let db = SqliteDb::oeffnen(&config).await.unwrap();
    let id = SessionId::new();

    let mut tasks = Vec::new();
    for i in 0..16u8 {
        let db = db.clone();
        tasks.push(tokio::spawn(async move {
            db.put(&record(id, &[i], i == 15)).await
        }));
    }
    let mut ergebnisse = Vec::new();
    for t in tasks {
        ergebnisse.push(t.await.unwrap());
    }

    // Jeder Schreiber sieht einen abgeschlossenen Vorgaenger: entweder
    // geschrieben oder nach dem terminalen Datensatz abgewiesen
    for ergebnis in &ergebnisse {
        assert!(
            matches!(ergebnis, Ok(()) | Err(StoreError::Immutable(_))),
            "unerwartetes Ergebnis: {ergebnis:?}"
        );
    }
    assert!(ergebnisse[15].is_ok());
    assert!(db.get(id).await.unwrap().unwrap().terminal);
    assert!(matches!(
        db.put(&record(id, b"danach", false)).await,
        Err(StoreError::Immutable(_))
    ));
    db.schliessen().await;
}
