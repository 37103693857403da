//! Integration-Tests fuer Aufbau, Abbau und Wiederanlauf des Port-Kontexts

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use port_app::{PortConfig, PortContext};
use port_core::{Direction, SessionId, SessionState};
use port_protocol::PushFrame;
use port_signaling::{KanalTransport, SignalingTransport};
use tokio::sync::mpsc;

fn config_in(dir: &Path) -> PortConfig {
    let mut config = PortConfig::default();
    config.speicher.url = format!("sqlite://{}", dir.join("port.db").display());
    config.speicher.schluessel_verzeichnis = dir.join("keys").display().to_string();
    config.anruf.sende_backoff_ms = 10;
    config
}

async fn starten(dir: &Path) -> (PortContext, mpsc::Receiver<PushFrame>) {
    let (tx, rx) = mpsc::channel(16);
    let ctx = PortContext::init(config_in(dir), move |identity| {
        Arc::new(KanalTransport::neu(identity, tx)) as Arc<dyn SignalingTransport>
    })
    .await
    .unwrap();
    (ctx, rx)
}

async fn naechster_frame(rx: &mut mpsc::Receiver<PushFrame>) -> PushFrame {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("kein ausgehender Frame")
        .expect("Ausgang geschlossen")
}

async fn warten_auf_zustand(ctx: &PortContext, id: SessionId, ziel: SessionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.helper.zustand(id).await.ok() != Some(ziel) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Zustand {ziel} nicht erreicht"));
}

#[tokio::test]
async fn identitaet_ueberlebt_neustart() {
    let dir = tempfile::tempdir().unwrap();

    let (ctx, _rx) = starten(dir.path()).await;
    let fingerprint = ctx.identity.fingerprint();
    ctx.teardown().await;

    let (ctx, _rx) = starten(dir.path()).await;
    assert_eq!(ctx.identity.fingerprint(), fingerprint);
    assert!(dir.path().join("keys").join("master.key").exists());
    ctx.teardown().await;
}

#[tokio::test]
async fn speicher_wiederholung_kommt_aus_der_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.anruf.speicher_wiederholungen = 5;
    config.anruf.speicher_backoff_ms = 7;

    let (tx, _rx) = mpsc::channel(16);
    let ctx = PortContext::init(config, move |identity| {
        Arc::new(KanalTransport::neu(identity, tx)) as Arc<dyn SignalingTransport>
    })
    .await
    .unwrap();

    let wiederholung = ctx.engine().vault().wiederholung();
    assert_eq!(wiederholung.versuche, 5);
    assert_eq!(wiederholung.basis, Duration::from_millis(7));
    ctx.teardown().await;
}

#[tokio::test]
async fn anruf_zwischen_zwei_kontexten() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let (a, mut ausgang_a) = starten(dir_a.path()).await;
    let (b, mut ausgang_b) = starten(dir_b.path()).await;

    let id = a.helper.start_call(b.identity.fingerprint()).await.unwrap();

    let invite = naechster_frame(&mut ausgang_a).await;
    assert_eq!(invite.to, b.identity.fingerprint().as_str());
    b.push_empfangen(&invite.push.to_vec().unwrap()).await.unwrap();
    warten_auf_zustand(&b, id, SessionState::Ringing(Direction::Inbound)).await;

    b.helper.answer(id).await.unwrap();
    let answer = naechster_frame(&mut ausgang_b).await;
    a.push_empfangen(&answer.push.to_vec().unwrap()).await.unwrap();

    warten_auf_zustand(&a, id, SessionState::Active).await;
    warten_auf_zustand(&b, id, SessionState::Active).await;

    a.teardown().await;
    b.teardown().await;
}

#[tokio::test]
async fn push_fuer_fremdes_geraet_wird_abgelehnt() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let dir_c = tempfile::tempdir().unwrap();
    let (a, mut ausgang_a) = starten(dir_a.path()).await;
    let (b, _) = starten(dir_b.path()).await;
    let (c, _) = starten(dir_c.path()).await;

    a.helper.start_call(b.identity.fingerprint()).await.unwrap();
    let invite = naechster_frame(&mut ausgang_a).await;

    // C ist nicht Empfaenger des signierten Transkripts
    assert!(c.push_empfangen(&invite.push.to_vec().unwrap()).await.is_err());
    assert!(c.engine().aktive_sessions().is_empty());

    for ctx in [a, b, c] {
        ctx.teardown().await;
    }
}

#[tokio::test]
async fn klingelnder_anruf_wird_nach_neustart_fortgesetzt() {
    let dir = tempfile::tempdir().unwrap();
    let gegenstelle = port_crypto::Identity::generate().fingerprint();

    let (ctx, mut rx) = starten(dir.path()).await;
    let id = ctx.helper.start_call(gegenstelle).await.unwrap();
    naechster_frame(&mut rx).await;
    ctx.teardown().await;

    let (ctx, _rx) = starten(dir.path()).await;
    assert_eq!(ctx.engine().aktive_sessions(), vec![id]);
    assert_eq!(
        ctx.helper.zustand(id).await.unwrap(),
        SessionState::Ringing(Direction::Outbound)
    );
    ctx.teardown().await;
}
