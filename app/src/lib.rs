//! # port-app
//!
//! Prozess-Kontext des Port Agents. `PortContext::init` baut die gesamte
//! Pipeline auf (Schluessel, Session Store, Push Intake, Call Engine,
//! CallHelper) und stellt unterbrochene Sessions wieder her;
//! `PortContext::teardown` faehrt sie geordnet herunter.

pub mod config;
pub mod eingabe;
pub mod error;
pub mod schluessel;

use std::path::Path;
use std::sync::Arc;

use port_callhelper::CallHelper;
use port_crypto::Identity;
use port_db::{SessionVault, SqliteDb};
use port_observability::PortMetrics;
use port_push::{IntakeError, PushIntake, PushTokenRegistry};
use port_signaling::{CallEngine, SignalingTransport};
use tracing::info;

pub use config::PortConfig;
pub use error::KontextError;

/// Alle langlebigen Komponenten eines laufenden Agents
pub struct PortContext {
    pub config: PortConfig,
    pub identity: Arc<Identity>,
    pub metriken: PortMetrics,
    pub intake: PushIntake,
    pub tokens: PushTokenRegistry,
    pub helper: CallHelper,
    db: SqliteDb,
}

impl std::fmt::Debug for PortContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortContext")
            .field("lokal", &self.identity.fingerprint())
            .field("helper", &self.helper)
            .finish_non_exhaustive()
    }
}

impl PortContext {
    /// Baut den Kontext auf.
    ///
    /// `transport` bekommt die geladene Identitaet, damit ausgehende Signale
    /// signiert werden koennen. Sessions aus einem frueheren Lauf werden vor
    /// der Rueckgabe wiederhergestellt.
    pub async fn init<F>(config: PortConfig, transport: F) -> Result<Self, KontextError>
    where
        F: FnOnce(Arc<Identity>) -> Arc<dyn SignalingTransport>,
    {
        let verzeichnis = Path::new(&config.speicher.schluessel_verzeichnis);
        let master = schluessel::master_key_laden(verzeichnis)?;
        let identity = Arc::new(schluessel::identitaet_laden(verzeichnis)?);
        let lokal = identity.fingerprint();

        let metriken = PortMetrics::neu().map_err(|e| KontextError::Metriken(e.to_string()))?;

        let db = SqliteDb::oeffnen(&config.speicher.speicher_config()).await?;
        let vault = SessionVault::neu(db.clone(), master)
            .mit_wiederholung(config.anruf.speicher_wiederholung());

        let intake = PushIntake::neu(lokal.clone()).mit_metriken(metriken.clone());
        let engine = CallEngine::neu(
            Arc::clone(&identity),
            vault,
            transport(Arc::clone(&identity)),
            config.anruf.clone(),
            metriken.clone(),
        );

        let wiederhergestellt = engine.recover().await?;
        info!(
            fingerprint = lokal.kurz(),
            wiederhergestellt, "Port-Kontext initialisiert"
        );

        Ok(Self {
            config,
            identity,
            metriken,
            intake,
            tokens: PushTokenRegistry::neu(),
            helper: CallHelper::neu(engine),
            db,
        })
    }

    pub fn engine(&self) -> &CallEngine {
        self.helper.engine()
    }

    /// Nimmt einen rohen VoIP-Push entgegen und reicht ihn an die Engine
    pub async fn push_empfangen(&self, raw: &[u8]) -> Result<(), IntakeError> {
        let signal = self.intake.normalize(raw)?;
        self.engine().eingang(signal).await;
        Ok(())
    }

    /// Stoppt alle Session-Actors und schliesst den Store
    pub async fn teardown(self) {
        self.engine().herunterfahren().await;
        self.db.schliessen().await;
        info!("Port-Kontext heruntergefahren");
    }
}
