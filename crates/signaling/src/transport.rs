//! Ausgehender Signalisierungs-Transport
//!
//! Die Engine kennt nur den `SignalingTransport`-Trait. Zwei Implementierungen
//! liegen bei:
//! - `KanalTransport` signiert Umschlaege und reicht sie an einen
//!   `mpsc`-Kanal weiter (z.B. an einen Relay-Task des Agenten)
//! - `StreamTransport` schreibt signierte Frames direkt auf einen Byte-Stream
//!
//! Wiederholungen mit Backoff erledigt `send_with_retry`; der Transport selbst
//! versucht genau einmal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use port_core::SignalingMessage;
use port_crypto::Identity;
use port_protocol::{FrameCodec, PushEnvelope, PushFrame};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SendError;

/// Zustellung ausgehender Signale an die Gegenstelle
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Ein einzelner Zustellversuch
    async fn send(&self, message: &SignalingMessage) -> Result<(), SendError>;
}

// ---------------------------------------------------------------------------
// Wiederholung
// ---------------------------------------------------------------------------

/// Zeitlimit und Backoff fuer ausgehende Signale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendePolitik {
    /// Zeitlimit pro Versuch
    pub timeout: Duration,
    /// Wiederholungen nach dem ersten Versuch
    pub wiederholungen: u32,
    /// Wartezeit vor der ersten Wiederholung, danach verdoppelt
    pub basis: Duration,
}

impl Default for SendePolitik {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            wiederholungen: 3,
            basis: Duration::from_millis(500),
        }
    }
}

/// Sendet mit Zeitlimit und exponentiellem Backoff.
///
/// `Rejected` wird nie wiederholt. Wird `abbruch` ausgeloest, endet der
/// Vorgang sofort mit `SendError::Abgebrochen`.
pub async fn send_with_retry(
    transport: &dyn SignalingTransport,
    message: &SignalingMessage,
    politik: SendePolitik,
    abbruch: Option<&CancellationToken>,
) -> Result<(), SendError> {
    let mut versuch = 0u32;
    loop {
        let ergebnis = abbrechbar(abbruch, async {
            match tokio::time::timeout(politik.timeout, transport.send(message)).await {
                Ok(r) => r,
                Err(_) => Err(SendError::Timeout),
            }
        })
        .await;

        match ergebnis {
            Ok(()) => {
                debug!(
                    session_id = %message.session_id,
                    seq = message.seq,
                    kind = message.kind.as_str(),
                    "Signal gesendet"
                );
                return Ok(());
            }
            Err(e) if e.ist_wiederholbar() && versuch < politik.wiederholungen => {
                let warten = politik.basis * 2u32.pow(versuch);
                warn!(
                    session_id = %message.session_id,
                    kind = message.kind.as_str(),
                    versuch = versuch + 1,
                    fehler = %e,
                    ?warten,
                    "Senden fehlgeschlagen, neuer Versuch"
                );
                abbrechbar(abbruch, async {
                    tokio::time::sleep(warten).await;
                    Ok(())
                })
                .await?;
                versuch += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn abbrechbar<F>(abbruch: Option<&CancellationToken>, fut: F) -> Result<(), SendError>
where
    F: std::future::Future<Output = Result<(), SendError>>,
{
    match abbruch {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(SendError::Abgebrochen),
            r = fut => r,
        },
        None => fut.await,
    }
}

// ---------------------------------------------------------------------------
// KanalTransport
// ---------------------------------------------------------------------------

/// Signiert Signale und uebergibt sie als `PushFrame` an einen Kanal
#[derive(Debug, Clone)]
pub struct KanalTransport {
    identity: Arc<Identity>,
    tx: mpsc::Sender<PushFrame>,
}

impl KanalTransport {
    pub fn neu(identity: Arc<Identity>, tx: mpsc::Sender<PushFrame>) -> Self {
        Self { identity, tx }
    }
}

#[async_trait]
impl SignalingTransport for KanalTransport {
    async fn send(&self, message: &SignalingMessage) -> Result<(), SendError> {
        let frame = PushFrame {
            to: message.recipient.as_str().to_string(),
            push: PushEnvelope::signieren(&self.identity, message),
        };
        self.tx
            .send(frame)
            .await
            .map_err(|_| SendError::Unreachable("Ausgangskanal geschlossen".to_string()))
    }
}

// ---------------------------------------------------------------------------
// StreamTransport
// ---------------------------------------------------------------------------

/// Schreibt signierte Frames (`FrameCodec`) auf einen Byte-Stream
pub struct StreamTransport<W> {
    identity: Arc<Identity>,
    framed: Mutex<FramedWrite<W, FrameCodec>>,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn neu(identity: Arc<Identity>, writer: W) -> Self {
        Self {
            identity,
            framed: Mutex::new(FramedWrite::new(writer, FrameCodec::new())),
        }
    }
}

impl<W> std::fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("identity", &self.identity.fingerprint().kurz())
            .finish()
    }
}

#[async_trait]
impl<W> SignalingTransport for StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: &SignalingMessage) -> Result<(), SendError> {
        let frame = PushFrame {
            to: message.recipient.as_str().to_string(),
            push: PushEnvelope::signieren(&self.identity, message),
        };
        let mut framed = self.framed.lock().await;
        framed.send(frame).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => SendError::Rejected(e.to_string()),
            _ => SendError::Unreachable(e.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
