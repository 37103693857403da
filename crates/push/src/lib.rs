//! port-push - Push Intake
//!
//! Erste Station jedes eingehenden VoIP-Pushes: rohe Bytes werden in ein
//! verifiziertes `IncomingSignal` uebersetzt oder mit einem klassifizierten
//! Fehler verworfen. Kein Zustand, keine Deduplizierung.
//!
//! Daneben haelt `PushTokenRegistry` das zuletzt gemeldete Push-Token pro
//! Push-Typ vor.

pub mod error;
pub mod intake;
pub mod token;

pub use error::IntakeError;
pub use intake::PushIntake;
pub use token::{PushTokenRegistry, PushTyp, TokenUpdate};
