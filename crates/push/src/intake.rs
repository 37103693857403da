//! Normalisierung eingehender VoIP-Pushes

use chrono::Utc;
use port_core::{Fingerprint, IncomingSignal};
use port_crypto::{fingerprint_of, verify_signal};
use port_observability::PortMetrics;
use port_protocol::{PushEnvelope, ProtocolError};
use tracing::{debug, warn};

use crate::error::IntakeError;

/// Uebersetzt rohe Push-Bytes in verifizierte Signale
///
/// Der Empfaenger im Signatur-Transkript ist immer die lokale Identitaet.
/// Ein Push, der fuer ein anderes Geraet signiert wurde, scheitert daher an
/// der Signaturpruefung.
#[derive(Debug, Clone)]
pub struct PushIntake {
    lokal: Fingerprint,
    metriken: Option<PortMetrics>,
}

impl PushIntake {
    pub fn neu(lokal: Fingerprint) -> Self {
        Self {
            lokal,
            metriken: None,
        }
    }

    pub fn mit_metriken(mut self, metriken: PortMetrics) -> Self {
        self.metriken = Some(metriken);
        self
    }

    pub fn lokal(&self) -> &Fingerprint {
        &self.lokal
    }

    /// Normalisiert einen Push.
    ///
    /// Reine Transformation: derselbe Input ergibt (bis auf `received_at`)
    /// dasselbe Ergebnis. Duplikate werden erst im Sequencer erkannt.
    pub fn normalize(&self, raw: &[u8]) -> Result<IncomingSignal, IntakeError> {
        let result = self.normalisieren(raw);
        match &result {
            Ok(signal) => debug!(
                session_id = %signal.session_id,
                seq = signal.seq,
                kind = signal.kind.as_str(),
                sender = signal.sender.kurz(),
                "Push angenommen"
            ),
            Err(e) => {
                warn!(fehler = %e, "Push verworfen");
                if let Some(m) = &self.metriken {
                    m.push_abgelehnt(e.metrik_label());
                }
            }
        }
        result
    }

    fn normalisieren(&self, raw: &[u8]) -> Result<IncomingSignal, IntakeError> {
        let decoded = PushEnvelope::from_slice(raw)
            .and_then(|envelope| envelope.zerlegen())
            .map_err(|e| match e {
                ProtocolError::UnsupportedVersion(v) => {
                    IntakeError::MalformedPayload(format!("Version {v} nicht unterstuetzt"))
                }
                other => IntakeError::MalformedPayload(other.to_string()),
            })?;

        let sender = fingerprint_of(&decoded.sender_key);
        if sender != decoded.call_from {
            return Err(IntakeError::UnauthenticatedPayload(
                "call_from passt nicht zum Absender-Schluessel".to_string(),
            ));
        }
        if sender == self.lokal {
            return Err(IntakeError::MalformedPayload(
                "Absender ist die lokale Identitaet".to_string(),
            ));
        }

        let signal = IncomingSignal {
            session_id: decoded.session_id,
            seq: decoded.seq,
            kind: decoded.kind,
            sender,
            sender_key: decoded.sender_key,
            recipient: self.lokal.clone(),
            payload: decoded.payload,
            signature: decoded.signature,
            received_at: Utc::now(),
        };

        verify_signal(&signal).map_err(|e| IntakeError::UnauthenticatedPayload(e.to_string()))?;
        Ok(signal)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use port_core::{SessionId, SignalKind, SignalingMessage};
    use port_crypto::Identity;

    struct Aufbau {
        absender: Identity,
        empfaenger: Identity,
        intake: PushIntake,
    }

    fn aufbau() -> Aufbau {
        let empfaenger = Identity::generate();
        let intake = PushIntake::neu(empfaenger.fingerprint());
        Aufbau {
            absender: Identity::generate(),
            empfaenger,
            intake,
        }
    }

    fn push(absender: &Identity, an: &Fingerprint, seq: u64, kind: SignalKind) -> PushEnvelope {
        let msg = SignalingMessage::neu(SessionId::new(), seq, kind, an.clone(), vec![7u8; 64]);
        PushEnvelope::signieren(absender, &msg)
    }

    #[test]
    fn gueltiger_push_wird_normalisiert() {
        let a = aufbau();
        let envelope = push(&a.absender, &a.empfaenger.fingerprint(), 1, SignalKind::Invite);

        let signal = a.intake.normalize(&envelope.to_vec().unwrap()).unwrap();
        assert_eq!(signal.kind, SignalKind::Invite);
        assert_eq!(signal.seq, 1);
        assert_eq!(signal.sender, a.absender.fingerprint());
        assert_eq!(signal.recipient, a.empfaenger.fingerprint());
        assert_eq!(signal.payload, vec![7u8; 64]);
    }

    #[test]
    fn ungueltige_signatur_ist_unauthentifiziert() {
        let a = aufbau();
        let mut envelope = push(&a.absender, &a.empfaenger.fingerprint(), 1, SignalKind::Invite);
        // Signatur eines anderen Schluessels einsetzen
        let fremd = push(&Identity::generate(), &a.empfaenger.fingerprint(), 1, SignalKind::Invite);
        envelope.port.signature = fremd.port.signature;

        assert!(matches!(
            a.intake.normalize(&envelope.to_vec().unwrap()),
            Err(IntakeError::UnauthenticatedPayload(_))
        ));
    }

    #[test]
    fn call_from_muss_zum_schluessel_passen() {
        let a = aufbau();
        let mut envelope = push(&a.absender, &a.empfaenger.fingerprint(), 1, SignalKind::Invite);
        envelope.aps.call_from = Identity::generate().fingerprint().as_str().to_string();

        assert!(matches!(
            a.intake.normalize(&envelope.to_vec().unwrap()),
            Err(IntakeError::UnauthenticatedPayload(_))
        ));
    }

    #[test]
    fn push_fuer_anderes_geraet_wird_abgelehnt() {
        let a = aufbau();
        let anderes = Identity::generate().fingerprint();
        let envelope = push(&a.absender, &anderes, 1, SignalKind::Invite);

        assert!(matches!(
            a.intake.normalize(&envelope.to_vec().unwrap()),
            Err(IntakeError::UnauthenticatedPayload(_))
        ));
    }

    #[test]
    fn kaputtes_json_ist_malformed() {
        let a = aufbau();
        assert!(matches!(
            a.intake.normalize(b"{\"aps\":{}}"),
            Err(IntakeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn falsche_version_ist_malformed() {
        let a = aufbau();
        let mut envelope = push(&a.absender, &a.empfaenger.fingerprint(), 1, SignalKind::Answer);
        envelope.port.v = 9;
        assert!(matches!(
            a.intake.normalize(&envelope.to_vec().unwrap()),
            Err(IntakeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn unbekannte_art_wird_durchgereicht() {
        let a = aufbau();
        let msg = SignalingMessage::neu(
            SessionId::new(),
            2,
            SignalKind::Unknown,
            a.empfaenger.fingerprint(),
            vec![],
        );
        let envelope = PushEnvelope::signieren(&a.absender, &msg);
        let signal = a.intake.normalize(&envelope.to_vec().unwrap()).unwrap();
        assert_eq!(signal.kind, SignalKind::Unknown);
    }

    #[test]
    fn ablehnungen_werden_gezaehlt() {
        let a = aufbau();
        let metriken = PortMetrics::neu().unwrap();
        let intake = a.intake.clone().mit_metriken(metriken.clone());

        let _ = intake.normalize(b"kein json");
        assert_eq!(
            metriken
                .push_rejected_total
                .with_label_values(&["malformed"])
                .get(),
            1
        );
    }
}
