//! Fehlertypen des Push Intake

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// Strukturell ungueltig: fehlende Felder, falsche Version, Base64 ...
    #[error("Ungueltiger Push: {0}")]
    MalformedPayload(String),

    /// Signatur oder Absender-Bindung ungueltig
    #[error("Nicht authentifizierter Push: {0}")]
    UnauthenticatedPayload(String),
}

impl IntakeError {
    /// Label fuer `port_push_rejected_total{kind}`
    pub fn metrik_label(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed",
            Self::UnauthenticatedPayload(_) => "unauthenticated",
        }
    }
}
