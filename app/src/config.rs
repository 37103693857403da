//! Agent-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, der Agent laeuft also auch ohne Konfigurationsdatei.

use port_db::{SpeicherConfig, DATABASE_NAME};
use port_signaling::AnrufConfig;
use serde::{Deserialize, Serialize};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const CONFIG_ENV: &str = "PORT_CONFIG";
pub const STANDARD_CONFIG_PFAD: &str = "port.toml";

/// Vollstaendige Agent-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub speicher: SpeicherEinstellungen,
    /// Timeouts, Fenster und Wiederholungen der State Machine
    pub anruf: AnrufConfig,
    pub logging: LoggingEinstellungen,
}

/// Datenbank und Schluesseldateien
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub sqlite_wal: bool,
    /// Verzeichnis fuer Master-Key und Identitaetsschluessel
    pub schluessel_verzeichnis: String,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            url: format!("sqlite://{DATABASE_NAME}"),
            max_verbindungen: 4,
            sqlite_wal: true,
            schluessel_verzeichnis: ".port".into(),
        }
    }
}

impl SpeicherEinstellungen {
    pub fn speicher_config(&self) -> SpeicherConfig {
        SpeicherConfig {
            url: self.url.clone(),
            max_verbindungen: self.max_verbindungen,
            sqlite_wal: self.sqlite_wal,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: trace, debug, info, warn, error
    pub level: String,
    /// Format: "text" oder "json"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl PortConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Pfad aus `PORT_CONFIG`, sonst `port.toml`
    pub fn pfad_aus_umgebung() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| STANDARD_CONFIG_PFAD.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = PortConfig::default();
        assert_eq!(cfg.speicher.url, "sqlite://numberless.db");
        assert!(cfg.speicher.sqlite_wal);
        assert_eq!(cfg.anruf.annahme_timeout_sek, 60);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [speicher]
            url = "sqlite:///tmp/port.db"

            [anruf]
            antwort_timeout_sek = 30
            sequenz_fenster = 8

            [logging]
            format = "json"
        "#;
        let cfg: PortConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.speicher.url, "sqlite:///tmp/port.db");
        assert_eq!(cfg.anruf.antwort_timeout_sek, 30);
        assert_eq!(cfg.anruf.sequenz_fenster, 8);
        assert_eq!(cfg.logging.format, "json");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.anruf.annahme_timeout_sek, 60);
        assert_eq!(cfg.speicher.max_verbindungen, 4);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let cfg = PortConfig::laden("/nicht/vorhanden/port.toml").unwrap();
        assert_eq!(cfg.speicher.schluessel_verzeichnis, ".port");
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("port.toml");
        std::fs::write(&pfad, "[anruf]\nsequenz_fenster = \"viele\"").unwrap();
        assert!(PortConfig::laden(pfad.to_str().unwrap()).is_err());
    }
}
