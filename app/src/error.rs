//! Fehler beim Aufbau des Prozess-Kontexts

use std::path::PathBuf;

use port_crypto::CryptoError;
use port_db::StoreError;
use port_signaling::CallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KontextError {
    #[error("Schluesseldatei '{}': {quelle}", pfad.display())]
    Schluesseldatei {
        pfad: PathBuf,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Ungueltiger Schluessel: {0}")]
    Schluessel(#[from] CryptoError),

    #[error("Session Store: {0}")]
    Speicher(#[from] StoreError),

    #[error("Wiederherstellung fehlgeschlagen: {0}")]
    Wiederherstellung(#[from] CallError),

    #[error("Metriken: {0}")]
    Metriken(String),
}
