//! Registry fuer Push-Tokens
//!
//! Das Betriebssystem meldet neue Tokens beliebig oft, meist unveraendert.
//! Abonnenten (z.B. die Token-Uebermittlung an den eigenen Server) werden
//! nur benachrichtigt, wenn sich ein Token tatsaechlich aendert.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

/// Art des Push-Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushTyp {
    /// VoIP-Push (weckt die App fuer eingehende Anrufe)
    Voip,
    /// Regulaerer Benachrichtigungs-Push
    Standard,
}

impl PushTyp {
    /// Name wie ihn die Plattform meldet
    pub fn from_platform(name: &str) -> Option<Self> {
        match name {
            "PKPushTypeVoIP" | "voip" => Some(Self::Voip),
            "standard" | "apns" => Some(Self::Standard),
            _ => None,
        }
    }
}

/// Benachrichtigung ueber ein geaendertes oder entzogenes Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub typ: PushTyp,
    /// Hex-kodiertes Token, `None` wenn das Token invalidiert wurde
    pub token_hex: Option<String>,
}

#[derive(Debug)]
pub struct PushTokenRegistry {
    tokens: Mutex<HashMap<PushTyp, Vec<u8>>>,
    sender: watch::Sender<Option<TokenUpdate>>,
}

impl Default for PushTokenRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

impl PushTokenRegistry {
    pub fn neu() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            tokens: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Speichert ein gemeldetes Token. Gibt `true` zurueck wenn es neu war.
    pub fn aktualisieren(&self, typ: PushTyp, token: &[u8]) -> bool {
        {
            let mut tokens = self.tokens.lock();
            if tokens.get(&typ).map(Vec::as_slice) == Some(token) {
                return false;
            }
            tokens.insert(typ, token.to_vec());
        }

        let token_hex = hex::encode(token);
        info!(?typ, token_laenge = token.len(), "Push-Token aktualisiert");
        self.sender.send_replace(Some(TokenUpdate {
            typ,
            token_hex: Some(token_hex),
        }));
        true
    }

    /// Entfernt ein Token (Plattform hat es fuer ungueltig erklaert)
    pub fn invalidieren(&self, typ: PushTyp) -> bool {
        if self.tokens.lock().remove(&typ).is_none() {
            return false;
        }
        info!(?typ, "Push-Token invalidiert");
        self.sender.send_replace(Some(TokenUpdate {
            typ,
            token_hex: None,
        }));
        true
    }

    pub fn token_hex(&self, typ: PushTyp) -> Option<String> {
        self.tokens.lock().get(&typ).map(hex::encode)
    }

    pub fn abonnieren(&self) -> watch::Receiver<Option<TokenUpdate>> {
        self.sender.subscribe()
    }
}
