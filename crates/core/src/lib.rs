//! port-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt das Vokabular bereit, das alle Port-Crates teilen:
//! Session-IDs, Signal-Arten, Session-Zustaende, den `CallSession`-Datensatz
//! und die Engine-Ereignisse.

pub mod error;
pub mod event;
pub mod session;
pub mod signal;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PortError, Result};
pub use event::EngineEvent;
pub use session::{
    CallSession, HandshakeMaterial, SecretBytes, SessionKeyMaterial, SessionSnapshot,
    TransitionRecord, Trigger,
};
pub use signal::{IncomingSignal, SignalingMessage};
pub use types::{
    CallRole, Direction, Fingerprint, SessionId, SessionState, SignalKind, TerminationReason,
};
