//! Konfiguration der Anruf-Pipeline (`[anruf]`-Abschnitt)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Zeitlimits, Fenster und Wiederholungen der State Machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnrufConfig {
    /// Wartezeit auf `Answer` nach eigenem `Invite`
    pub antwort_timeout_sek: u64,
    /// Klingeldauer eines eingehenden Anrufs ohne lokale Annahme
    pub annahme_timeout_sek: u64,
    /// Maximaler Abstand zur letzten angewendeten Sequenz-Nummer
    pub sequenz_fenster: u64,
    /// Wie lange ein Signal auf seinen Vorgaenger wartet
    pub luecken_timeout_ms: u64,
    /// Zeitlimit pro Sendeversuch
    pub sende_timeout_sek: u64,
    /// Wiederholungen nach dem ersten Sendeversuch
    pub sende_wiederholungen: u32,
    pub sende_backoff_ms: u64,
    /// Wiederholungen bei voruebergehenden Speicherfehlern
    pub speicher_wiederholungen: u32,
    pub speicher_backoff_ms: u64,
    /// Obergrenze fuer Signale unbekannter Sessions (ueber alle Sessions)
    pub waisen_kapazitaet: usize,
    /// Groesse der Mailbox pro Session-Actor
    pub mailbox_groesse: usize,
    /// Kapazitaet des Ereignis-Busses
    pub ereignis_kapazitaet: usize,
}

impl Default for AnrufConfig {
    fn default() -> Self {
        Self {
            antwort_timeout_sek: 60,
            annahme_timeout_sek: 60,
            sequenz_fenster: 5,
            luecken_timeout_ms: 3_000,
            sende_timeout_sek: 10,
            sende_wiederholungen: 3,
            sende_backoff_ms: 500,
            speicher_wiederholungen: 3,
            speicher_backoff_ms: 100,
            waisen_kapazitaet: 32,
            mailbox_groesse: 32,
            ereignis_kapazitaet: 256,
        }
    }
}

impl AnrufConfig {
    pub fn antwort_timeout(&self) -> Duration {
        Duration::from_secs(self.antwort_timeout_sek)
    }

    pub fn annahme_timeout(&self) -> Duration {
        Duration::from_secs(self.annahme_timeout_sek)
    }

    pub fn luecken_timeout(&self) -> Duration {
        Duration::from_millis(self.luecken_timeout_ms)
    }

    pub fn sende_politik(&self) -> crate::transport::SendePolitik {
        crate::transport::SendePolitik {
            timeout: Duration::from_secs(self.sende_timeout_sek),
            wiederholungen: self.sende_wiederholungen,
            basis: Duration::from_millis(self.sende_backoff_ms),
        }
    }

    pub fn speicher_wiederholung(&self) -> port_db::Wiederholung {
        port_db::Wiederholung {
            versuche: self.speicher_wiederholungen,
            basis: Duration::from_millis(self.speicher_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let cfg = AnrufConfig::default();
        assert_eq!(cfg.annahme_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.sequenz_fenster, 5);
        assert_eq!(cfg.sende_politik().wiederholungen, 3);
        assert_eq!(cfg.sende_politik().timeout, Duration::from_secs(10));
    }
}
