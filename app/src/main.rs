//! Port Agent – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und baut den
//! Port-Kontext auf. Eingehende Pushes und Befehle kommen zeilenweise ueber
//! stdin, ausgehende Signale gehen als JSON-Zeilen (`PushFrame`) an stdout.
//! Logs landen auf stderr.

use std::sync::Arc;

use anyhow::Result;
use port_app::eingabe::{Eingabe, EingabeError};
use port_app::{PortConfig, PortContext};
use port_observability::logging_initialisieren;
use port_protocol::PushFrame;
use port_signaling::{KanalTransport, SignalingTransport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Puffer zwischen Engine und stdout
const AUSGANG_PUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = PortConfig::pfad_aus_umgebung();
    let config = PortConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Port Agent wird initialisiert"
    );

    let (tx, ausgang) = mpsc::channel::<PushFrame>(AUSGANG_PUFFER);
    let ctx = PortContext::init(config, move |identity| {
        Arc::new(KanalTransport::neu(identity, tx)) as Arc<dyn SignalingTransport>
    })
    .await?;
    tracing::info!(fingerprint = %ctx.identity.fingerprint(), "Lokale Identitaet");

    let schreiber = tokio::spawn(frames_schreiben(ausgang));
    let abo = ctx.helper.on_session_event(|event| {
        tracing::info!(?event, "UI-Ereignis");
    });

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown-Signal empfangen");
                break;
            }
            zeile = zeilen.next_line() => match zeile? {
                Some(zeile) => verarbeiten(&ctx, &zeile).await,
                None => {
                    tracing::info!("Eingabe geschlossen");
                    break;
                }
            },
        }
    }

    abo.abmelden();
    ctx.teardown().await;
    // Mit dem Kontext ist auch der letzte Sender weg, der Schreiber endet
    schreiber.await?;
    Ok(())
}

async fn verarbeiten(ctx: &PortContext, zeile: &str) {
    let eingabe = match Eingabe::parse(zeile) {
        Ok(eingabe) => eingabe,
        Err(EingabeError::Leer) => return,
        Err(e) => {
            tracing::warn!(fehler = %e, "Eingabe ignoriert");
            return;
        }
    };

    let helper = &ctx.helper;
    let ergebnis = match eingabe {
        Eingabe::Push(raw) => {
            if let Err(e) = ctx.push_empfangen(&raw).await {
                tracing::debug!(fehler = %e, "Push verworfen");
            }
            Ok(())
        }
        Eingabe::Anrufen(remote) => helper.start_call(remote).await.map(|id| {
            tracing::info!(session_id = %id, "Anruf gestartet");
        }),
        Eingabe::Annehmen(id) => helper.answer(id).await,
        Eingabe::Ablehnen(id) => helper.reject(id).await,
        Eingabe::Auflegen(id) => helper.hangup(id).await,
        Eingabe::Kandidat(id, kandidat) => helper.send_candidate(id, kandidat).await,
        Eingabe::Zustand(id) => helper.zustand(id).await.map(|zustand| {
            tracing::info!(session_id = %id, %zustand, "Session-Zustand");
        }),
        Eingabe::Token(typ, token) => {
            ctx.tokens.aktualisieren(typ, &token);
            Ok(())
        }
        Eingabe::Metriken => {
            match ctx.metriken.exportieren() {
                Ok(text) => eprintln!("{text}"),
                Err(e) => tracing::warn!(fehler = %e, "Metrik-Export fehlgeschlagen"),
            }
            Ok(())
        }
    };

    if let Err(e) = ergebnis {
        tracing::warn!(fehler = %e, "Befehl fehlgeschlagen");
    }
}

async fn frames_schreiben(mut ausgang: mpsc::Receiver<PushFrame>) {
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = ausgang.recv().await {
        let mut zeile = match serde_json::to_vec(&frame) {
            Ok(zeile) => zeile,
            Err(e) => {
                tracing::warn!(fehler = %e, "Frame nicht serialisierbar");
                continue;
            }
        };
        zeile.push(b'\n');
        if let Err(e) = stdout.write_all(&zeile).await {
            tracing::error!(fehler = %e, "stdout nicht beschreibbar");
            break;
        }
        let _ = stdout.flush().await;
    }
}
