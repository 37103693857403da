//! port-callhelper – Fassade fuer die UI-Schicht
//!
//! `CallHelper` buendelt die Anruf-Operationen der `CallEngine` und
//! uebersetzt deren Ereignisse in drei einfache UI-Ereignisse: es klingelt,
//! verbunden, beendet. Schluesselmaterial verlaesst die Engine nie.

pub mod event;
pub mod helper;

pub use event::UiEvent;
pub use helper::{CallHelper, SubscriptionHandle};
