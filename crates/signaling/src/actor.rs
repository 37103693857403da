//! Session-Actor – ein tokio-Task pro Call-Session
//!
//! Der Actor besitzt die `CallSession` exklusiv. Alles, was die Session
//! veraendert (eingehende Signale, lokale Befehle, Timer), laeuft seriell
//! durch seine Mailbox. Nach jedem Schritt wird der geaenderte Stand
//! versiegelt gespeichert und erst danach werden die Ereignisse
//! veroeffentlicht.
//!
//! ## Zustaende
//! ```text
//! Idle -> Ringing(Outbound|Inbound) -> Negotiating -> Active -> Ending -> Terminated
//! ```
//! Jeder Fehler (Crypto, Speicher, Senden) endet in `Terminated(Error)` und
//! betrifft nur diese eine Session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use port_core::{
    CallSession, Direction, EngineEvent, HandshakeMaterial, IncomingSignal, SessionId,
    SessionKeyMaterial, SessionState, SignalKind, SignalingMessage, TerminationReason, Trigger,
};
use port_crypto::{
    derive_session_key, fresh_nonce, open, seal, signal_ad, verify_signal, CryptoError,
    CryptoResult, EphemeralKeypair, Handshake, Transcript,
};
use port_db::StoreError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::EngineInner;
use crate::error::{CallError, SendError};
use crate::sequencer::{Einordnung, Sequencer};
use crate::transport::send_with_retry;

pub(crate) type Antwort = oneshot::Sender<Result<(), CallError>>;

/// Nachrichten an einen Session-Actor
#[derive(Debug)]
pub(crate) enum Befehl {
    Starten(Antwort),
    Signal(IncomingSignal),
    Annehmen(Antwort),
    Ablehnen(Antwort),
    Beenden(Antwort),
    Kandidat(Vec<u8>, Antwort),
    Abfrage(oneshot::Sender<SessionState>),
}

pub(crate) struct SessionActor {
    session: CallSession,
    sequencer: Sequencer,
    rx: mpsc::Receiver<Befehl>,
    inner: Arc<EngineInner>,
    abbruch: CancellationToken,
    wiederhergestellt: bool,
    /// Ablauf des Klingel-Timers (Antwort- bzw. Annahme-Timeout)
    klingel_frist: Option<Instant>,
    /// Ungespeicherte Aenderungen seit dem letzten `festschreiben`
    geaendert: bool,
    ausstehend: Vec<EngineEvent>,
}

impl SessionActor {
    pub(crate) fn neu(
        session: CallSession,
        rx: mpsc::Receiver<Befehl>,
        inner: Arc<EngineInner>,
        abbruch: CancellationToken,
        wiederhergestellt: bool,
    ) -> Self {
        let sequencer = Sequencer::neu(session.last_applied_seq, inner.config.sequenz_fenster);
        Self {
            session,
            sequencer,
            rx,
            inner,
            abbruch,
            wiederhergestellt,
            klingel_frist: None,
            geaendert: false,
            ausstehend: Vec::new(),
        }
    }

    fn id(&self) -> SessionId {
        self.session.id
    }

    /// Verarbeitungsschleife bis `Terminated` oder Engine-Shutdown
    pub(crate) async fn ausfuehren(mut self) {
        debug!(
            session_id = %self.id(),
            remote = self.session.remote_identity.kurz(),
            state = %self.session.state,
            "Session-Actor gestartet"
        );

        if self.wiederhergestellt {
            self.wiederaufnehmen().await;
            let _ = self.festschreiben().await;
        }

        let shutdown = self.inner.shutdown.clone();
        while !self.session.is_terminal() {
            let frist = self.naechste_frist();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(session_id = %self.id(), "Engine-Shutdown, Actor beendet");
                    break;
                }
                befehl = self.rx.recv() => match befehl {
                    Some(befehl) => self.befehl(befehl).await,
                    None => break,
                },
                _ = schlafen_bis(frist) => self.fristen_pruefen().await,
            }
            let _ = self.festschreiben().await;
        }

        self.abmelden();
    }

    async fn befehl(&mut self, befehl: Befehl) {
        match befehl {
            Befehl::Starten(antwort) => self.starten(antwort).await,
            Befehl::Signal(signal) => self.signal_empfangen(signal).await,
            Befehl::Annehmen(antwort) => self.annehmen(antwort).await,
            Befehl::Ablehnen(antwort) => self.ablehnen(antwort).await,
            Befehl::Beenden(antwort) => self.beenden(antwort).await,
            Befehl::Kandidat(kandidat, antwort) => self.kandidat_senden(kandidat, antwort).await,
            Befehl::Abfrage(antwort) => {
                let _ = antwort.send(self.session.state);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Zustandswechsel, Speichern, Ereignisse
    // -----------------------------------------------------------------------

    fn wechseln(&mut self, to: SessionState, trigger: Trigger) {
        let from = self.session.state;
        if !self.session.wechseln(to, trigger) {
            return;
        }
        self.geaendert = true;
        info!(session_id = %self.id(), %from, %to, "Zustandswechsel");

        if !to.is_ringing() {
            self.klingel_frist = None;
        }
        if let SessionState::Terminated(grund) = to {
            self.session.handshake = None;
            self.session.session_key = None;
            self.inner.metriken.anruf_beendet(grund.as_str());
        }

        self.ausstehend.push(EngineEvent::Transition {
            session_id: self.id(),
            remote: self.session.remote_identity.clone(),
            role: self.session.local_role,
            from,
            to,
        });
    }

    fn fehler(&mut self, grund: impl std::fmt::Display) {
        warn!(session_id = %self.id(), state = %self.session.state, %grund, "Session mit Fehler beendet");
        self.wechseln(
            SessionState::Terminated(TerminationReason::Error),
            Trigger::Fehler(grund.to_string()),
        );
    }

    fn seq_vergeben(&mut self) -> u64 {
        self.geaendert = true;
        self.session.naechste_seq()
    }

    /// Speichert ungesicherte Aenderungen und veroeffentlicht danach die
    /// gesammelten Ereignisse.
    ///
    /// Scheitert das Speichern endgueltig, endet die Session mit `Error`.
    async fn festschreiben(&mut self) -> Result<(), StoreError> {
        let mut ergebnis = Ok(());
        if self.geaendert {
            self.geaendert = false;
            if let Err(e) = self.speichern().await {
                error!(session_id = %self.id(), fehler = %e, "Session konnte nicht gespeichert werden");
                if !self.session.is_terminal() {
                    self.fehler(format!("Speicherfehler: {e}"));
                    self.geaendert = false;
                    if let Err(e) = self.speichern().await {
                        warn!(session_id = %self.id(), fehler = %e, "Terminaler Stand nicht gespeichert");
                    }
                }
                ergebnis = Err(e);
            }
        }

        for event in self.ausstehend.drain(..) {
            // Keine Abonnenten ist kein Fehler
            let _ = self.inner.events.send(event);
        }
        ergebnis
    }

    async fn speichern(&self) -> Result<(), StoreError> {
        let start = std::time::Instant::now();
        let ergebnis = self.inner.vault.save(&self.session).await;
        self.inner
            .metriken
            .store_write_seconds
            .observe(start.elapsed().as_secs_f64());
        ergebnis
    }

    fn abmelden(&self) {
        let id = self.id();
        self.inner.sessions.remove(&id);
        self.inner
            .peers
            .remove_if(&self.session.remote_identity, |_, bestehend| *bestehend == id);
        debug!(session_id = %id, state = %self.session.state, "Session-Actor beendet");
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    async fn senden(
        &self,
        kind: SignalKind,
        seq: u64,
        payload: Vec<u8>,
        abbrechbar: bool,
    ) -> Result<(), SendError> {
        let nachricht = SignalingMessage::neu(
            self.id(),
            seq,
            kind,
            self.session.remote_identity.clone(),
            payload,
        );
        let abbruch = abbrechbar.then_some(&self.abbruch);
        send_with_retry(
            self.inner.transport.as_ref(),
            &nachricht,
            self.inner.config.sende_politik(),
            abbruch,
        )
        .await
    }

    /// Wertet das Ergebnis eines Sendevorgangs aus. `true` bei Erfolg.
    fn gesendet(&mut self, kind: SignalKind, ergebnis: Result<(), SendError>) -> bool {
        match ergebnis {
            Ok(()) => true,
            Err(SendError::Abgebrochen) => {
                debug!(session_id = %self.id(), kind = kind.as_str(), "Senden durch lokales Auflegen abgebrochen");
                false
            }
            Err(e) => {
                self.fehler(format!("{kind} nicht zustellbar: {e}"));
                false
            }
        }
    }

    /// Abschliessende Signale (Hangup, Cancel) nach dem Terminalzustand.
    /// Ein Fehlschlag aendert den Endgrund nicht mehr.
    async fn abschliessend_senden(&self, kind: SignalKind, seq: u64, payload: Vec<u8>) {
        if let Err(e) = self.senden(kind, seq, payload, false).await {
            warn!(session_id = %self.id(), kind = kind.as_str(), fehler = %e, "Abschliessendes Signal nicht zugestellt");
        }
    }

    fn versiegeln(&self, kind: SignalKind, seq: u64, klartext: &[u8]) -> CryptoResult<Vec<u8>> {
        let schluessel = self.schluessel()?;
        seal(schluessel, klartext, &signal_ad(&self.session.id, seq, kind))
    }

    fn oeffnen(&self, signal: &IncomingSignal) -> CryptoResult<Vec<u8>> {
        let schluessel = self.schluessel()?;
        open(
            schluessel,
            &signal.payload,
            &signal_ad(&signal.session_id, signal.seq, signal.kind),
        )
    }

    fn schluessel(&self) -> CryptoResult<&SessionKeyMaterial> {
        self.session
            .session_key
            .as_ref()
            .ok_or_else(|| CryptoError::KeyDerivation("kein Session-Schluessel".to_string()))
    }

    // -----------------------------------------------------------------------
    // Lokale Befehle
    // -----------------------------------------------------------------------

    fn ungueltig(&self) -> CallError {
        CallError::InvalidState {
            session_id: self.id(),
            state: self.session.state,
        }
    }

    /// Antwort nach einem Schritt: Endete er mit einem Fehler, ist die
    /// Session fuer den Aufrufer geschlossen.
    fn ergebnis(&self) -> Result<(), CallError> {
        match self.session.state {
            SessionState::Terminated(TerminationReason::Error) => Err(CallError::SessionClosed(self.id())),
            _ => Ok(()),
        }
    }

    async fn starten(&mut self, antwort: Antwort) {
        if self.session.state != SessionState::Idle {
            let _ = antwort.send(Err(self.ungueltig()));
            return;
        }

        let paar = EphemeralKeypair::generate();
        let nonce = fresh_nonce();
        let handshake = Handshake {
            eph_public: paar.public_key(),
            nonce,
        };
        self.session.handshake = Some(HandshakeMaterial {
            local_secret: Some(paar.secret_bytes()),
            local_nonce: Some(nonce),
            ..Default::default()
        });

        self.inner.metriken.anruf_begonnen("outbound");
        self.wechseln(SessionState::Ringing(Direction::Outbound), Trigger::LocalStart);
        self.klingel_frist = Some(Instant::now() + self.inner.config.antwort_timeout());
        let seq = self.seq_vergeben();

        if let Err(e) = self.festschreiben().await {
            let _ = antwort.send(Err(CallError::Store(e)));
            return;
        }
        let _ = antwort.send(Ok(()));

        let ergebnis = self.senden(SignalKind::Invite, seq, handshake.to_bytes(), true).await;
        self.gesendet(SignalKind::Invite, ergebnis);
    }

    async fn annehmen(&mut self, antwort: Antwort) {
        if self.session.state != SessionState::Ringing(Direction::Inbound) {
            let _ = antwort.send(Err(self.ungueltig()));
            return;
        }

        let paar = EphemeralKeypair::generate();
        let nonce = fresh_nonce();
        let schluessel = match self.schluessel_als_angerufener(&paar, nonce) {
            Ok(k) => k,
            Err(e) => {
                self.fehler(format!("Schluesselvereinbarung: {e}"));
                let _ = antwort.send(self.ergebnis());
                return;
            }
        };

        self.wechseln(SessionState::Negotiating, Trigger::LocalAnswer);
        self.session.session_key = Some(schluessel);
        self.session.handshake = None;
        let seq = self.seq_vergeben();

        if let Err(e) = self.festschreiben().await {
            let _ = antwort.send(Err(CallError::Store(e)));
            return;
        }
        let _ = antwort.send(Ok(()));

        let handshake = Handshake {
            eph_public: paar.public_key(),
            nonce,
        };
        let ergebnis = self.senden(SignalKind::Answer, seq, handshake.to_bytes(), true).await;
        if self.gesendet(SignalKind::Answer, ergebnis) {
            self.wechseln(SessionState::Active, Trigger::KeyAgreementComplete);
        }
    }

    async fn ablehnen(&mut self, antwort: Antwort) {
        if self.session.state != SessionState::Ringing(Direction::Inbound) {
            let _ = antwort.send(Err(self.ungueltig()));
            return;
        }
        self.ablehnen_mit(Trigger::LocalReject, antwort).await;
    }

    async fn ablehnen_mit(&mut self, trigger: Trigger, antwort: Antwort) {
        let seq = self.seq_vergeben();
        self.wechseln(SessionState::Terminated(TerminationReason::Rejected), trigger);
        let _ = self.festschreiben().await;
        let _ = antwort.send(Ok(()));
        // Noch kein Session-Schluessel: Hangup bleibt unversiegelt
        self.abschliessend_senden(SignalKind::Hangup, seq, Vec::new()).await;
    }

    async fn beenden(&mut self, antwort: Antwort) {
        match self.session.state {
            SessionState::Ringing(Direction::Outbound) => {
                let seq = self.seq_vergeben();
                self.wechseln(
                    SessionState::Terminated(TerminationReason::Cancelled),
                    Trigger::LocalEnd,
                );
                let _ = self.festschreiben().await;
                let _ = antwort.send(Ok(()));
                self.abschliessend_senden(SignalKind::Cancel, seq, Vec::new()).await;
            }
            SessionState::Ringing(Direction::Inbound) => {
                self.ablehnen_mit(Trigger::LocalEnd, antwort).await;
            }
            SessionState::Negotiating | SessionState::Active => {
                let seq = self.seq_vergeben();
                let versiegelt = match self.versiegeln(SignalKind::Hangup, seq, &[]) {
                    Ok(v) => v,
                    Err(e) => {
                        self.fehler(format!("Hangup versiegeln: {e}"));
                        let _ = antwort.send(self.ergebnis());
                        return;
                    }
                };
                self.wechseln(SessionState::Ending, Trigger::LocalEnd);
                let _ = self.festschreiben().await;
                let _ = antwort.send(Ok(()));

                self.abschliessend_senden(SignalKind::Hangup, seq, versiegelt).await;
                self.wechseln(
                    SessionState::Terminated(TerminationReason::Completed),
                    Trigger::LocalEnd,
                );
            }
            _ => {
                let _ = antwort.send(Err(self.ungueltig()));
            }
        }
    }

    async fn kandidat_senden(&mut self, kandidat: Vec<u8>, antwort: Antwort) {
        if !matches!(
            self.session.state,
            SessionState::Negotiating | SessionState::Active
        ) {
            let _ = antwort.send(Err(self.ungueltig()));
            return;
        }

        let seq = self.seq_vergeben();
        let versiegelt = match self.versiegeln(SignalKind::IceCandidate, seq, &kandidat) {
            Ok(v) => v,
            Err(e) => {
                self.fehler(format!("Kandidat versiegeln: {e}"));
                let _ = antwort.send(self.ergebnis());
                return;
            }
        };
        if let Err(e) = self.festschreiben().await {
            let _ = antwort.send(Err(CallError::Store(e)));
            return;
        }

        let ergebnis = self.senden(SignalKind::IceCandidate, seq, versiegelt, true).await;
        self.gesendet(SignalKind::IceCandidate, ergebnis);
        let _ = antwort.send(self.ergebnis());
    }

    // -----------------------------------------------------------------------
    // Eingehende Signale
    // -----------------------------------------------------------------------

    async fn signal_empfangen(&mut self, signal: IncomingSignal) {
        if signal.sender != self.session.remote_identity {
            warn!(
                session_id = %self.id(),
                sender = signal.sender.kurz(),
                "Signal von fremdem Absender verworfen"
            );
            self.inner.metriken.signal_verworfen("foreign_sender");
            return;
        }

        match self.sequencer.einordnen(signal, Instant::now()) {
            Einordnung::Anwenden(signale) => {
                for signal in signale {
                    self.session.last_applied_seq = signal.seq;
                    self.geaendert = true;
                    if self.session.is_terminal() {
                        self.inner.metriken.signal_verworfen("terminated");
                        continue;
                    }
                    self.signal_anwenden(signal).await;
                }
            }
            Einordnung::Gepuffert => {
                debug!(
                    session_id = %self.id(),
                    erwartet = self.sequencer.last_applied() + 1,
                    gepuffert = self.sequencer.gepuffert(),
                    "Signal gepuffert"
                );
            }
            Einordnung::Duplikat => {
                debug!(session_id = %self.id(), "Doppeltes Signal verworfen");
                self.inner.metriken.signal_verworfen("duplicate");
            }
            Einordnung::Luecke { erwartet, verworfen } => self.luecke_melden(erwartet, verworfen),
        }
    }

    fn luecke_melden(&mut self, erwartet: u64, verworfen: Vec<u64>) {
        warn!(session_id = %self.id(), erwartet, ?verworfen, "Sequenz-Luecke, Signale verworfen");
        self.inner
            .metriken
            .signals_dropped_total
            .with_label_values(&["gap"])
            .inc_by(verworfen.len() as u64);
        self.ausstehend.push(EngineEvent::SequenceGap {
            session_id: self.id(),
            erwartet,
            verworfen,
        });
    }

    async fn signal_anwenden(&mut self, signal: IncomingSignal) {
        let trigger = Trigger::Signal {
            kind: signal.kind,
            seq: signal.seq,
        };

        match (self.session.state, signal.kind) {
            (SessionState::Idle, SignalKind::Invite) => self.invite_verarbeiten(&signal, trigger),
            (SessionState::Ringing(Direction::Outbound), SignalKind::Answer) => {
                self.answer_verarbeiten(&signal, trigger)
            }
            (SessionState::Ringing(_), SignalKind::Cancel) => self.wechseln(
                SessionState::Terminated(TerminationReason::Cancelled),
                trigger,
            ),
            (SessionState::Ringing(Direction::Outbound), SignalKind::Hangup) => self.wechseln(
                SessionState::Terminated(TerminationReason::Rejected),
                trigger,
            ),
            (SessionState::Ringing(Direction::Inbound), SignalKind::Hangup) => self.wechseln(
                SessionState::Terminated(TerminationReason::Cancelled),
                trigger,
            ),
            (SessionState::Negotiating | SessionState::Active, SignalKind::Hangup) => {
                match self.oeffnen(&signal) {
                    Ok(_) => {
                        self.wechseln(SessionState::Ending, trigger.clone());
                        self.wechseln(
                            SessionState::Terminated(TerminationReason::Completed),
                            trigger,
                        );
                    }
                    Err(e) => self.fehler(format!("Hangup: {e}")),
                }
            }
            (SessionState::Negotiating | SessionState::Active, SignalKind::IceCandidate) => {
                match self.oeffnen(&signal) {
                    Ok(candidate) => {
                        debug!(session_id = %self.id(), seq = signal.seq, "ICE-Kandidat empfangen");
                        self.ausstehend.push(EngineEvent::RemoteCandidate {
                            session_id: self.id(),
                            candidate,
                        });
                    }
                    Err(e) => self.fehler(format!("ICE-Kandidat: {e}")),
                }
            }
            (state, kind) => {
                let grund = if kind == SignalKind::Unknown {
                    "unknown"
                } else {
                    "unexpected"
                };
                debug!(session_id = %self.id(), %state, kind = kind.as_str(), "Signal ignoriert");
                self.inner.metriken.signal_verworfen(grund);
            }
        }
    }

    fn invite_verarbeiten(&mut self, signal: &IncomingSignal, trigger: Trigger) {
        self.inner.metriken.anruf_begonnen("inbound");

        // Erneute Pruefung: das Signal koennte die Engine ohne Intake erreicht haben
        let handshake = match verify_signal(signal).and_then(|()| Handshake::from_bytes(&signal.payload)) {
            Ok(h) => h,
            Err(e) => {
                self.fehler(format!("Invite: {e}"));
                return;
            }
        };

        self.session.handshake = Some(HandshakeMaterial {
            remote_public: Some(handshake.eph_public),
            remote_nonce: Some(handshake.nonce),
            ..Default::default()
        });
        self.wechseln(SessionState::Ringing(Direction::Inbound), trigger);
        self.klingel_frist = Some(Instant::now() + self.inner.config.annahme_timeout());
    }

    fn answer_verarbeiten(&mut self, signal: &IncomingSignal, trigger: Trigger) {
        let schluessel = match Handshake::from_bytes(&signal.payload)
            .and_then(|remote| self.schluessel_als_anrufer(&remote))
        {
            Ok(k) => k,
            Err(e) => {
                self.fehler(format!("Answer: {e}"));
                return;
            }
        };

        self.wechseln(SessionState::Negotiating, trigger);
        self.session.session_key = Some(schluessel);
        self.session.handshake = None;
        self.wechseln(SessionState::Active, Trigger::KeyAgreementComplete);
    }

    fn schluessel_als_anrufer(&self, remote: &Handshake) -> CryptoResult<SessionKeyMaterial> {
        let material = self.handshake_material()?;
        let secret = material
            .local_secret
            .as_ref()
            .ok_or_else(|| CryptoError::format("eigener ephemerer Schluessel fehlt"))?;
        let caller_nonce = material
            .local_nonce
            .ok_or_else(|| CryptoError::format("eigene Nonce fehlt"))?;
        let lokal = EphemeralKeypair::from_secret_bytes(secret.as_bytes())?;

        let transcript = Transcript {
            session_id: self.id(),
            caller: self.inner.lokal.clone(),
            callee: self.session.remote_identity.clone(),
            caller_nonce,
            callee_nonce: remote.nonce,
        };
        derive_session_key(&lokal, &remote.eph_public, &transcript)
    }

    fn schluessel_als_angerufener(
        &self,
        lokal: &EphemeralKeypair,
        callee_nonce: [u8; 32],
    ) -> CryptoResult<SessionKeyMaterial> {
        let material = self.handshake_material()?;
        let remote_public = material
            .remote_public
            .ok_or_else(|| CryptoError::format("ephemerer Schluessel des Anrufers fehlt"))?;
        let caller_nonce = material
            .remote_nonce
            .ok_or_else(|| CryptoError::format("Nonce des Anrufers fehlt"))?;

        let transcript = Transcript {
            session_id: self.id(),
            caller: self.session.remote_identity.clone(),
            callee: self.inner.lokal.clone(),
            caller_nonce,
            callee_nonce,
        };
        derive_session_key(lokal, &remote_public, &transcript)
    }

    fn handshake_material(&self) -> CryptoResult<&HandshakeMaterial> {
        self.session
            .handshake
            .as_ref()
            .ok_or_else(|| CryptoError::format("kein Handshake-Material"))
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    fn naechste_frist(&self) -> Option<Instant> {
        let luecke = self
            .sequencer
            .naechste_frist(self.inner.config.luecken_timeout());
        match (self.klingel_frist, luecke) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn fristen_pruefen(&mut self) {
        let jetzt = Instant::now();

        let verworfen = self
            .sequencer
            .abgelaufene_verwerfen(jetzt, self.inner.config.luecken_timeout());
        if !verworfen.is_empty() {
            let erwartet = self.sequencer.last_applied() + 1;
            self.luecke_melden(erwartet, verworfen);
        }

        if matches!(self.klingel_frist, Some(frist) if frist <= jetzt) {
            self.klingel_frist = None;
            self.zeitueberschreitung().await;
        }
    }

    async fn zeitueberschreitung(&mut self) {
        match self.session.state {
            SessionState::Ringing(Direction::Inbound) => {
                info!(session_id = %self.id(), "Eingehender Anruf nicht angenommen");
                self.wechseln(
                    SessionState::Terminated(TerminationReason::Timeout),
                    Trigger::AnswerTimeout,
                );
            }
            SessionState::Ringing(Direction::Outbound) => {
                info!(session_id = %self.id(), "Keine Antwort der Gegenstelle");
                let seq = self.seq_vergeben();
                self.wechseln(
                    SessionState::Terminated(TerminationReason::Timeout),
                    Trigger::ResponseTimeout,
                );
                let _ = self.festschreiben().await;
                self.abschliessend_senden(SignalKind::Cancel, seq, Vec::new()).await;
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Wiederherstellung
    // -----------------------------------------------------------------------

    /// Setzt eine aus dem Speicher geladene Session fort
    async fn wiederaufnehmen(&mut self) {
        self.inner.metriken.sessions_active.inc();
        info!(session_id = %self.id(), state = %self.session.state, "Session wiederhergestellt");

        match self.session.state {
            SessionState::Ringing(richtung) => {
                let timeout = match richtung {
                    Direction::Outbound => self.inner.config.antwort_timeout(),
                    Direction::Inbound => self.inner.config.annahme_timeout(),
                };
                self.klingel_frist = Some(Instant::now() + self.restzeit(timeout));
            }
            SessionState::Idle => {
                self.fehler("Session vor dem ersten Signal unterbrochen");
            }
            SessionState::Negotiating => {
                // Ob die Gegenstelle unser Answer erhalten hat, ist unbekannt
                let seq = self.seq_vergeben();
                let hangup = self.versiegeln(SignalKind::Hangup, seq, &[]);
                self.fehler("Schluesselvereinbarung unterbrochen");
                let _ = self.festschreiben().await;
                if let Ok(versiegelt) = hangup {
                    self.abschliessend_senden(SignalKind::Hangup, seq, versiegelt).await;
                }
            }
            SessionState::Ending => {
                let seq = self.seq_vergeben();
                let hangup = self.versiegeln(SignalKind::Hangup, seq, &[]);
                self.wechseln(
                    SessionState::Terminated(TerminationReason::Completed),
                    Trigger::LocalEnd,
                );
                let _ = self.festschreiben().await;
                if let Ok(versiegelt) = hangup {
                    self.abschliessend_senden(SignalKind::Hangup, seq, versiegelt).await;
                }
            }
            SessionState::Active | SessionState::Terminated(_) => {}
        }
    }

    /// Verbleibende Klingeldauer seit dem Eintritt in `Ringing`
    fn restzeit(&self, timeout: Duration) -> Duration {
        let seit = self
            .session
            .history
            .iter()
            .rev()
            .find(|eintrag| eintrag.to.is_ringing())
            .map(|eintrag| eintrag.at)
            .unwrap_or(self.session.updated_at);
        let vergangen = (Utc::now() - seit).to_std().unwrap_or_default();
        timeout.saturating_sub(vergangen)
    }
}

async fn schlafen_bis(frist: Option<Instant>) {
    match frist {
        Some(frist) => tokio::time::sleep_until(frist).await,
        None => std::future::pending().await,
    }
}
