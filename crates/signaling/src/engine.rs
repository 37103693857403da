//! CallEngine – Registry und Einstiegspunkt der State Machine
//!
//! Die Engine haelt pro nicht-terminaler Session ein `SessionHandle`
//! (Mailbox + Abbruch-Token) und leitet eingehende Signale sowie lokale
//! Befehle an den zugehoerigen Session-Actor weiter. Pro Gegenstelle gibt es
//! hoechstens eine nicht-terminale Session.
//!
//! Signale fuer noch unbekannte Sessions (das `Invite` ist noch unterwegs)
//! warten begrenzt im Waisen-Puffer.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use port_core::{
    CallSession, EngineEvent, Fingerprint, IncomingSignal, SessionId, SessionState, SignalKind,
};
use port_crypto::Identity;
use port_db::{SessionVault, StoreError};
use port_observability::PortMetrics;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::{Antwort, Befehl, SessionActor};
use crate::config::AnrufConfig;
use crate::error::CallError;
use crate::transport::SignalingTransport;

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

/// Handle auf einen laufenden Session-Actor
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    pub tx: mpsc::Sender<Befehl>,
    /// Bricht laufende Sendevorgaenge ab (lokales Auflegen)
    pub abbruch: CancellationToken,
}

/// Von Engine und allen Actors geteilter Zustand
pub(crate) struct EngineInner {
    pub identity: Arc<Identity>,
    pub lokal: Fingerprint,
    pub vault: SessionVault,
    pub transport: Arc<dyn SignalingTransport>,
    pub config: AnrufConfig,
    pub metriken: PortMetrics,
    pub sessions: DashMap<SessionId, SessionHandle>,
    /// Gegenstelle -> nicht-terminale Session
    pub peers: DashMap<Fingerprint, SessionId>,
    pub waisen: Mutex<Waisen>,
    pub events: broadcast::Sender<EngineEvent>,
    pub shutdown: CancellationToken,
    pub tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Signale fuer Sessions, deren `Invite` noch fehlt
#[derive(Debug, Default)]
pub(crate) struct Waisen {
    eintraege: HashMap<SessionId, Vec<(Instant, IncomingSignal)>>,
    anzahl: usize,
}

impl Waisen {
    /// Entfernt Eintraege, die aelter als `max_alter` sind. Gibt die Anzahl zurueck.
    fn aufraeumen(&mut self, jetzt: Instant, max_alter: std::time::Duration) -> usize {
        let vorher = self.anzahl;
        self.eintraege.retain(|_, signale| {
            signale.retain(|(angekommen, _)| *angekommen + max_alter > jetzt);
            !signale.is_empty()
        });
        self.anzahl = self.eintraege.values().map(Vec::len).sum();
        vorher - self.anzahl
    }

    fn ablegen(&mut self, jetzt: Instant, signal: IncomingSignal) {
        self.eintraege
            .entry(signal.session_id)
            .or_default()
            .push((jetzt, signal));
        self.anzahl += 1;
    }

    fn entnehmen(&mut self, id: SessionId) -> Vec<IncomingSignal> {
        let signale = self.eintraege.remove(&id).unwrap_or_default();
        self.anzahl -= signale.len();
        signale.into_iter().map(|(_, s)| s).collect()
    }

    fn len(&self) -> usize {
        self.anzahl
    }
}

// ---------------------------------------------------------------------------
// CallEngine
// ---------------------------------------------------------------------------

/// State Machine aller Call-Sessions eines Geraets
#[derive(Clone)]
pub struct CallEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for CallEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEngine")
            .field("lokal", &self.inner.lokal.kurz())
            .field("sessions", &self.inner.sessions.len())
            .finish()
    }
}

impl CallEngine {
    pub fn neu(
        identity: Arc<Identity>,
        vault: SessionVault,
        transport: Arc<dyn SignalingTransport>,
        config: AnrufConfig,
        metriken: PortMetrics,
    ) -> Self {
        let (events, _) = broadcast::channel(config.ereignis_kapazitaet.max(1));
        let lokal = identity.fingerprint();
        Self {
            inner: Arc::new(EngineInner {
                identity,
                lokal,
                vault,
                transport,
                config,
                metriken,
                sessions: DashMap::new(),
                peers: DashMap::new(),
                waisen: Mutex::new(Waisen::default()),
                events,
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fingerprint der lokalen Identitaet
    pub fn lokal(&self) -> &Fingerprint {
        &self.inner.lokal
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.inner.identity
    }

    pub fn metriken(&self) -> &PortMetrics {
        &self.inner.metriken
    }

    pub fn vault(&self) -> &SessionVault {
        &self.inner.vault
    }

    pub fn abonnieren(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// IDs aller Sessions mit laufendem Actor
    pub fn aktive_sessions(&self) -> Vec<SessionId> {
        self.inner.sessions.iter().map(|e| *e.key()).collect()
    }

    // -----------------------------------------------------------------------
    // Lokale Operationen
    // -----------------------------------------------------------------------

    /// Startet einen ausgehenden Anruf.
    ///
    /// Die Session ist bei Rueckkehr gespeichert; das `Invite` wird danach
    /// im Hintergrund zugestellt.
    pub async fn start_call(&self, remote: Fingerprint) -> Result<SessionId, CallError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(CallError::Heruntergefahren);
        }
        if remote == self.inner.lokal {
            return Err(CallError::EigeneIdentitaet);
        }

        let session = CallSession::neu_ausgehend(remote.clone());
        let id = session.id;
        match self.inner.peers.entry(remote.clone()) {
            Entry::Occupied(e) => {
                return Err(CallError::DuplicateSession {
                    remote,
                    bestehend: *e.get(),
                })
            }
            Entry::Vacant(e) => {
                e.insert(id);
            }
        }

        info!(session_id = %id, remote = remote.kurz(), "Ausgehender Anruf");
        let tx = self.spawnen(session, false);
        anfragen(id, &tx, Befehl::Starten).await?;
        Ok(id)
    }

    pub async fn answer(&self, id: SessionId) -> Result<(), CallError> {
        self.befehl(id, Befehl::Annehmen).await
    }

    /// Lehnt einen eingehenden Anruf ab. Im Zustand `Ringing(Inbound)` ist
    /// nie ein Sendevorgang offen, daher wird nichts abgebrochen.
    pub async fn reject(&self, id: SessionId) -> Result<(), CallError> {
        self.befehl(id, Befehl::Ablehnen).await
    }

    /// Beendet eine Session in jedem nicht-terminalen Zustand
    pub async fn hangup(&self, id: SessionId) -> Result<(), CallError> {
        self.abbrechen(id);
        self.befehl(id, Befehl::Beenden).await
    }

    /// Versiegelt einen lokalen ICE-Kandidaten und sendet ihn
    pub async fn send_candidate(&self, id: SessionId, candidate: Vec<u8>) -> Result<(), CallError> {
        self.befehl(id, |antwort| Befehl::Kandidat(candidate, antwort))
            .await
    }

    /// Aktueller Zustand: vom laufenden Actor, sonst aus dem Speicher
    pub async fn zustand(&self, id: SessionId) -> Result<SessionState, CallError> {
        if let Some(tx) = self.sender(id) {
            let (antwort_tx, antwort_rx) = oneshot::channel();
            if tx.send(Befehl::Abfrage(antwort_tx)).await.is_ok() {
                if let Ok(state) = antwort_rx.await {
                    return Ok(state);
                }
            }
        }
        match self.inner.vault.load(id).await? {
            Some(session) => Ok(session.state),
            None => Err(CallError::UnknownSession(id)),
        }
    }

    fn sender(&self, id: SessionId) -> Option<mpsc::Sender<Befehl>> {
        self.inner.sessions.get(&id).map(|h| h.tx.clone())
    }

    fn abbrechen(&self, id: SessionId) {
        if let Some(handle) = self.inner.sessions.get(&id) {
            handle.abbruch.cancel();
        }
    }

    async fn befehl(
        &self,
        id: SessionId,
        bauen: impl FnOnce(Antwort) -> Befehl,
    ) -> Result<(), CallError> {
        let tx = self.sender(id).ok_or(CallError::UnknownSession(id))?;
        anfragen(id, &tx, bauen).await
    }

    fn spawnen(&self, session: CallSession, wiederhergestellt: bool) -> mpsc::Sender<Befehl> {
        let id = session.id;
        let (tx, rx) = mpsc::channel(self.inner.config.mailbox_groesse.max(1));
        let abbruch = self.inner.shutdown.child_token();
        self.inner.sessions.insert(
            id,
            SessionHandle {
                tx: tx.clone(),
                abbruch: abbruch.clone(),
            },
        );

        let actor = SessionActor::neu(
            session,
            rx,
            Arc::clone(&self.inner),
            abbruch,
            wiederhergestellt,
        );
        let handle = tokio::spawn(actor.ausfuehren());

        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
        tx
    }

    // -----------------------------------------------------------------------
    // Eingehende Signale
    // -----------------------------------------------------------------------

    /// Routet ein verifiziertes Signal aus dem Push-Intake
    pub async fn eingang(&self, signal: IncomingSignal) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        if let Some(tx) = self.sender(signal.session_id) {
            if tx.send(Befehl::Signal(signal)).await.is_err() {
                debug!("Actor bereits beendet, Signal verworfen");
            }
            return;
        }

        if signal.kind == SignalKind::Invite {
            self.invite_eingang(signal).await;
        } else {
            self.waise_ablegen(signal).await;
        }
    }

    async fn invite_eingang(&self, signal: IncomingSignal) {
        let id = signal.session_id;
        if signal.seq != 1 {
            warn!(session_id = %id, seq = signal.seq, "Invite mit unerwarteter Sequenz verworfen");
            self.inner.metriken.signal_verworfen("invalid_invite");
            return;
        }

        match self.inner.vault.existiert(id).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(session_id = %id, "Invite fuer bekannte Session verworfen");
                self.inner.metriken.signal_verworfen("duplicate");
                return;
            }
            Err(e) => {
                warn!(session_id = %id, fehler = %e, "Invite verworfen, Speicher nicht lesbar");
                self.inner.metriken.signal_verworfen("store_unavailable");
                return;
            }
        }

        let remote = signal.sender.clone();
        match self.inner.peers.entry(remote.clone()) {
            Entry::Occupied(e) => {
                warn!(
                    session_id = %id,
                    bestehend = %e.get(),
                    remote = remote.kurz(),
                    "Invite von Gegenstelle mit laufender Session verworfen"
                );
                self.inner.metriken.signal_verworfen("busy");
                return;
            }
            Entry::Vacant(e) => {
                e.insert(id);
            }
        }

        info!(session_id = %id, remote = remote.kurz(), "Eingehender Anruf");
        let tx = self.spawnen(CallSession::neu_eingehend(id, remote), false);
        let waisen = self.inner.waisen.lock().entnehmen(id);

        let _ = tx.send(Befehl::Signal(signal)).await;
        for waise in waisen {
            let _ = tx.send(Befehl::Signal(waise)).await;
        }
    }

    async fn waise_ablegen(&self, signal: IncomingSignal) {
        let id = signal.session_id;
        match self.inner.vault.existiert(id).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(session_id = %id, kind = signal.kind.as_str(), "Signal fuer beendete Session verworfen");
                self.inner.metriken.signal_verworfen("stale");
                return;
            }
            Err(e) => warn!(session_id = %id, fehler = %e, "Speicher nicht lesbar, Signal wird gepuffert"),
        }

        let weiterleiten = {
            let mut waisen = self.inner.waisen.lock();
            // Das Invite kann inzwischen eingetroffen sein
            if let Some(tx) = self.sender(id) {
                Some((tx, signal))
            } else {
                let jetzt = Instant::now();
                let abgelaufen = waisen.aufraeumen(jetzt, self.inner.config.luecken_timeout());
                if abgelaufen > 0 {
                    self.inner
                        .metriken
                        .signals_dropped_total
                        .with_label_values(&["orphan_expired"])
                        .inc_by(abgelaufen as u64);
                }
                if waisen.len() >= self.inner.config.waisen_kapazitaet {
                    warn!(session_id = %id, "Waisen-Puffer voll, Signal verworfen");
                    self.inner.metriken.signal_verworfen("orphan_overflow");
                } else {
                    debug!(session_id = %id, seq = signal.seq, "Signal fuer unbekannte Session gepuffert");
                    waisen.ablegen(jetzt, signal);
                }
                None
            }
        };

        if let Some((tx, signal)) = weiterleiten {
            let _ = tx.send(Befehl::Signal(signal)).await;
        }
    }

    // -----------------------------------------------------------------------
    // Wiederherstellung und Shutdown
    // -----------------------------------------------------------------------

    /// Startet Actors fuer alle nicht-terminalen Sessions im Speicher.
    ///
    /// Beschaedigte Datensaetze landen in der Quarantaene und werden
    /// uebersprungen. Gibt die Anzahl wiederhergestellter Sessions zurueck.
    pub async fn recover(&self) -> Result<usize, CallError> {
        let ids = self.inner.vault.list_active().await?;
        let mut anzahl = 0;

        for id in ids {
            if self.inner.sessions.contains_key(&id) {
                continue;
            }
            let session = match self.inner.vault.load(id).await {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(e @ StoreError::StorageUnavailable(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(session_id = %id, fehler = %e, "Session nicht wiederherstellbar");
                    continue;
                }
            };
            if session.is_terminal() {
                continue;
            }

            match self.inner.peers.entry(session.remote_identity.clone()) {
                Entry::Occupied(e) => {
                    warn!(session_id = %id, bestehend = %e.get(), "Zweite Session zur selben Gegenstelle uebersprungen");
                    continue;
                }
                Entry::Vacant(e) => {
                    e.insert(id);
                }
            }
            self.spawnen(session, true);
            anzahl += 1;
        }

        info!(anzahl, "Sessions wiederhergestellt");
        Ok(anzahl)
    }

    /// Beendet alle Actors. Persistierte Sessions bleiben fuer `recover`
    /// erhalten.
    pub async fn herunterfahren(&self) {
        self.inner.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(fehler = %e, "Session-Actor abgebrochen");
            }
        }
        self.inner.sessions.clear();
        self.inner.peers.clear();
        info!("CallEngine heruntergefahren");
    }
}

async fn anfragen(
    id: SessionId,
    tx: &mpsc::Sender<Befehl>,
    bauen: impl FnOnce(Antwort) -> Befehl,
) -> Result<(), CallError> {
    let (antwort_tx, antwort_rx) = oneshot::channel();
    tx.send(bauen(antwort_tx))
        .await
        .map_err(|_| CallError::SessionClosed(id))?;
    antwort_rx.await.map_err(|_| CallError::SessionClosed(id))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn signal(id: SessionId, seq: u64) -> IncomingSignal {
        IncomingSignal {
            session_id: id,
            seq,
            kind: SignalKind::IceCandidate,
            sender: Fingerprint::from_digest(&[3; 32]),
            sender_key: [0; 32],
            recipient: Fingerprint::from_digest(&[4; 32]),
            payload: vec![],
            signature: vec![0; 64],
            received_at: Utc::now(),
        }
    }

    #[test]
    fn waisen_werden_pro_session_entnommen() {
        let mut w = Waisen::default();
        let a = SessionId::new();
        let b = SessionId::new();
        let jetzt = Instant::now();
        w.ablegen(jetzt, signal(a, 2));
        w.ablegen(jetzt, signal(a, 3));
        w.ablegen(jetzt, signal(b, 2));
        assert_eq!(w.len(), 3);

        let entnommen: Vec<u64> = w.entnehmen(a).iter().map(|s| s.seq).collect();
        assert_eq!(entnommen, vec![2, 3]);
        assert_eq!(w.len(), 1);
        assert!(w.entnehmen(a).is_empty());
    }

    #[test]
    fn alte_waisen_verfallen() {
        let mut w = Waisen::default();
        let start = Instant::now();
        w.ablegen(start, signal(SessionId::new(), 2));
        w.ablegen(start + Duration::from_secs(2), signal(SessionId::new(), 2));

        assert_eq!(w.aufraeumen(start + Duration::from_secs(3), Duration::from_secs(3)), 1);
        assert_eq!(w.len(), 1);
    }
}
