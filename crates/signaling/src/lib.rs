//! port-signaling – Call Session State Machine
//!
//! Jede Call-Session lebt in einem eigenen tokio-Task (Session-Actor), der
//! eingehende Signale, lokale Befehle und Timer seriell verarbeitet. Die
//! `CallEngine` routet zwischen Push-Intake, Fassade und Actors.
//!
//! ## Architektur
//!
//! ```text
//! PushIntake ──IncomingSignal──> CallEngine::eingang
//!                                    │  (Registry: SessionId -> Mailbox,
//!                                    │   Gegenstelle -> SessionId, Waisen)
//!                                    v
//!                              SessionActor (pro Session ein Task)
//!                                    │  Sequencer -> Zustandswechsel
//!                                    ├──> SessionVault (versiegelt speichern)
//!                                    ├──> SignalingTransport (send_with_retry)
//!                                    └──> broadcast<EngineEvent>
//! ```

mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod sequencer;
pub mod transport;

// Bequeme Re-Exporte
pub use config::AnrufConfig;
pub use engine::CallEngine;
pub use error::{CallError, SendError};
pub use sequencer::{Einordnung, Sequencer};
pub use transport::{send_with_retry, KanalTransport, SendePolitik, SignalingTransport, StreamTransport};
