//! CallHelper – Anruf-API fuer die Oberflaeche

use port_core::{Fingerprint, SessionId, SessionState};
use port_signaling::{CallEngine, CallError};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::event::UiEvent;

/// Abonnement von `CallHelper::on_session_event`.
///
/// Solange der Handle lebt, wird der Callback aufgerufen. Drop beendet das
/// Abonnement.
#[derive(Debug)]
pub struct SubscriptionHandle {
    _guard: DropGuard,
}

impl SubscriptionHandle {
    /// Beendet das Abonnement explizit
    pub fn abmelden(self) {}
}

/// Duenne Fassade ueber der `CallEngine`
#[derive(Debug, Clone)]
pub struct CallHelper {
    engine: CallEngine,
}

impl CallHelper {
    pub fn neu(engine: CallEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CallEngine {
        &self.engine
    }

    pub async fn start_call(&self, remote: Fingerprint) -> Result<SessionId, CallError> {
        self.engine.start_call(remote).await
    }

    pub async fn answer(&self, id: SessionId) -> Result<(), CallError> {
        self.engine.answer(id).await
    }

    pub async fn reject(&self, id: SessionId) -> Result<(), CallError> {
        self.engine.reject(id).await
    }

    pub async fn hangup(&self, id: SessionId) -> Result<(), CallError> {
        self.engine.hangup(id).await
    }

    /// Reicht einen lokalen ICE-Kandidaten an die Gegenstelle weiter
    pub async fn send_candidate(&self, id: SessionId, candidate: Vec<u8>) -> Result<(), CallError> {
        self.engine.send_candidate(id, candidate).await
    }

    pub async fn zustand(&self, id: SessionId) -> Result<SessionState, CallError> {
        self.engine.zustand(id).await
    }

    /// Registriert einen Callback fuer UI-Ereignisse.
    ///
    /// Der Callback laeuft in einem eigenen Task und sieht die Ereignisse
    /// einer Session in Engine-Reihenfolge.
    pub fn on_session_event<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(UiEvent) + Send + Sync + 'static,
    {
        let mut rx = self.engine.abonnieren();
        let token = CancellationToken::new();
        let abbruch = token.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = abbruch.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(event) => {
                        if let Some(ui) = UiEvent::aus_engine(&event) {
                            callback(ui);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(verpasst = n, "UI-Abonnent zu langsam, Ereignisse verpasst");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("UI-Abonnement beendet");
        });

        SubscriptionHandle {
            _guard: token.drop_guard(),
        }
    }
}
