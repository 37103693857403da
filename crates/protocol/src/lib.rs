//! port-protocol - Wire-Formate der Port-Anruf-Pipeline
//!
//! - `envelope` - JSON-Umschlag eines VoIP-Pushes (`aps` + `port`)
//! - `record` - Schema der versiegelten Session-Datensaetze
//! - `wire` - Laengen-praefixierter Frame-Codec fuer ausgehende Signale
//!
//! Binaere Felder reisen als Base64 (Standard-Alphabet mit Padding).

pub mod envelope;
pub mod error;
pub mod record;
pub mod wire;

pub use envelope::{DecodedEnvelope, PushEnvelope, ENVELOPE_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use record::{record_ad, StoredRecord, RECORD_VERSION};
pub use wire::{FrameCodec, PushFrame};
