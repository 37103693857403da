//! Integration-Tests fuer die Call-Helper-Fassade

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use port_callhelper::{CallHelper, UiEvent};
use port_core::{Direction, SessionState, TerminationReason};
use port_crypto::{Identity, MasterKey};
use port_db::{SessionVault, SqliteDb};
use port_observability::PortMetrics;
use port_protocol::PushFrame;
use port_signaling::{AnrufConfig, CallEngine, KanalTransport};
use tokio::sync::mpsc;

async fn helper() -> (CallHelper, mpsc::Receiver<PushFrame>) {
    let identity = Arc::new(Identity::generate());
    let (tx, rx) = mpsc::channel(16);
    let engine = CallEngine::neu(
        Arc::clone(&identity),
        SessionVault::neu(SqliteDb::in_memory().await.unwrap(), MasterKey::generate()),
        Arc::new(KanalTransport::neu(identity, tx)),
        AnrufConfig::default(),
        PortMetrics::neu().unwrap(),
    );
    (CallHelper::neu(engine), rx)
}

async fn warten_bis<F: Fn() -> bool>(bedingung: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !bedingung() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Bedingung nicht erfuellt");
}

#[tokio::test]
async fn ausgehender_anruf_meldet_klingeln_und_ende() {
    let (helper, mut ausgang) = helper().await;
    let gesehen = Arc::new(Mutex::new(Vec::new()));
    let senke = Arc::clone(&gesehen);
    let _abo = helper.on_session_event(move |event| senke.lock().push(event));

    let remote = Identity::generate().fingerprint();
    let id = helper.start_call(remote.clone()).await.unwrap();
    assert_eq!(ausgang.recv().await.unwrap().push.port.kind, "invite");

    helper.hangup(id).await.unwrap();
    warten_bis(|| gesehen.lock().len() == 2).await;

    let gesehen = gesehen.lock().clone();
    assert_eq!(
        gesehen,
        vec![
            UiEvent::Ringing {
                session_id: id,
                direction: Direction::Outbound,
                remote,
            },
            UiEvent::Ended {
                session_id: id,
                reason: TerminationReason::Cancelled,
            },
        ]
    );
    assert_eq!(
        helper.zustand(id).await.unwrap(),
        SessionState::Terminated(TerminationReason::Cancelled)
    );
}

#[tokio::test]
async fn gedroppter_handle_beendet_abonnement() {
    let (helper, _ausgang) = helper().await;
    let anzahl = Arc::new(Mutex::new(0usize));
    let zaehler = Arc::clone(&anzahl);
    let abo = helper.on_session_event(move |_| *zaehler.lock() += 1);

    let erste = helper.start_call(Identity::generate().fingerprint()).await.unwrap();
    warten_bis(|| *anzahl.lock() == 1).await;

    drop(abo);
    helper.hangup(erste).await.unwrap();
    helper.start_call(Identity::generate().fingerprint()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*anzahl.lock(), 1);
}
