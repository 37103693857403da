//! Zeilenweise Eingabe des Agents
//!
//! Jede Zeile auf stdin ist entweder ein roher VoIP-Push (JSON, beginnt mit
//! `{`) oder ein Befehl der lokalen Oberflaeche:
//!
//! ```text
//! call <fingerprint>
//! answer <session-id>
//! reject <session-id>
//! hangup <session-id>
//! candidate <session-id> <hex>
//! token <voip|standard> <hex>
//! state <session-id>
//! metrics
//! ```

use port_core::{Fingerprint, SessionId};
use port_push::PushTyp;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingabe {
    Push(Vec<u8>),
    Anrufen(Fingerprint),
    Annehmen(SessionId),
    Ablehnen(SessionId),
    Auflegen(SessionId),
    Kandidat(SessionId, Vec<u8>),
    Token(PushTyp, Vec<u8>),
    Zustand(SessionId),
    Metriken,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EingabeError {
    #[error("Leere Zeile")]
    Leer,

    #[error("Unbekannter Befehl: {0}")]
    Unbekannt(String),

    #[error("Argument fehlt: {0}")]
    FehlendesArgument(&'static str),

    #[error("Ungueltiges Argument {was}: {wert}")]
    Ungueltig { was: &'static str, wert: String },
}

impl Eingabe {
    pub fn parse(zeile: &str) -> Result<Self, EingabeError> {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            return Err(EingabeError::Leer);
        }
        if zeile.starts_with('{') {
            return Ok(Self::Push(zeile.as_bytes().to_vec()));
        }

        let mut teile = zeile.split_whitespace();
        let befehl = teile.next().unwrap_or_default();
        match befehl {
            "call" => {
                let wert = argument(&mut teile, "fingerprint")?;
                Fingerprint::parse(wert)
                    .map(Self::Anrufen)
                    .ok_or_else(|| ungueltig("fingerprint", wert))
            }
            "answer" => session(&mut teile).map(Self::Annehmen),
            "reject" => session(&mut teile).map(Self::Ablehnen),
            "hangup" => session(&mut teile).map(Self::Auflegen),
            "state" => session(&mut teile).map(Self::Zustand),
            "candidate" => {
                let id = session(&mut teile)?;
                let kandidat = hex_argument(&mut teile, "candidate")?;
                Ok(Self::Kandidat(id, kandidat))
            }
            "token" => {
                let wert = argument(&mut teile, "typ")?;
                let typ = PushTyp::from_platform(wert).ok_or_else(|| ungueltig("typ", wert))?;
                let token = hex_argument(&mut teile, "token")?;
                Ok(Self::Token(typ, token))
            }
            "metrics" => Ok(Self::Metriken),
            anderes => Err(EingabeError::Unbekannt(anderes.to_string())),
        }
    }
}

fn argument<'a>(
    teile: &mut impl Iterator<Item = &'a str>,
    was: &'static str,
) -> Result<&'a str, EingabeError> {
    teile.next().ok_or(EingabeError::FehlendesArgument(was))
}

fn session<'a>(teile: &mut impl Iterator<Item = &'a str>) -> Result<SessionId, EingabeError> {
    let wert = argument(teile, "session-id")?;
    SessionId::parse(wert).ok_or_else(|| ungueltig("session-id", wert))
}

fn hex_argument<'a>(
    teile: &mut impl Iterator<Item = &'a str>,
    was: &'static str,
) -> Result<Vec<u8>, EingabeError> {
    let wert = argument(teile, was)?;
    hex::decode(wert).map_err(|_| ungueltig(was, wert))
}

fn ungueltig(was: &'static str, wert: &str) -> EingabeError {
    EingabeError::Ungueltig {
        was,
        wert: wert.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_zeile_ist_push() {
        let zeile = r#"{"port":{"v":1}}"#;
        assert_eq!(
            Eingabe::parse(zeile).unwrap(),
            Eingabe::Push(zeile.as_bytes().to_vec())
        );
    }

    #[test]
    fn befehle_mit_session_id() {
        let id = SessionId::new();
        assert_eq!(
            Eingabe::parse(&format!("hangup {id}")).unwrap(),
            Eingabe::Auflegen(id)
        );
        assert_eq!(
            Eingabe::parse(&format!("  answer {id}  ")).unwrap(),
            Eingabe::Annehmen(id)
        );
        assert_eq!(
            Eingabe::parse(&format!("candidate {id} 0a0b")).unwrap(),
            Eingabe::Kandidat(id, vec![0x0a, 0x0b])
        );
    }

    #[test]
    fn token_befehl() {
        assert_eq!(
            Eingabe::parse("token voip deadbeef").unwrap(),
            Eingabe::Token(PushTyp::Voip, vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert!(matches!(
            Eingabe::parse("token fax 00"),
            Err(EingabeError::Ungueltig { was: "typ", .. })
        ));
    }

    #[test]
    fn fehlerhafte_eingaben() {
        assert_eq!(Eingabe::parse("   "), Err(EingabeError::Leer));
        assert_eq!(
            Eingabe::parse("dial x"),
            Err(EingabeError::Unbekannt("dial".into()))
        );
        assert_eq!(
            Eingabe::parse("answer"),
            Err(EingabeError::FehlendesArgument("session-id"))
        );
        assert!(matches!(
            Eingabe::parse("hangup keine-uuid"),
            Err(EingabeError::Ungueltig { was: "session-id", .. })
        ));
        assert!(matches!(
            Eingabe::parse("call zz"),
            Err(EingabeError::Ungueltig { was: "fingerprint", .. })
        ));
    }
}
