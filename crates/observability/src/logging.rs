//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `PORT_LOG_LEVEL`: EnvFilter-Direktive (z.B. `info`, `port_signaling=debug`)
//! - `PORT_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Session-IDs werden als Felder (`session_id = %id`) geloggt, nie als Teil
//! der Nachricht. Schluesselmaterial taucht in keinem Feld auf.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "PORT_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "PORT_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten aus der
/// Konfiguration. Darf pro Prozess nur einmal erfolgreich aufgerufen werden.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| format.to_string());

    // Logs gehen nach stderr, stdout gehoert den ausgehenden Frames
    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        _ => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging-Initialisierung fehlgeschlagen: {e}"))
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("JSON"));
        assert!(!log_format_gueltig(""));
    }

    #[test]
    fn zweite_initialisierung_schlaegt_fehl() {
        // Erster Aufruf kann je nach Testreihenfolge schon passiert sein
        let _ = logging_initialisieren("info", "text");
        assert!(logging_initialisieren("debug", "json").is_err());
    }
}
