//! Frame-Codec fuer ausgehende Signale
//!
//! Fuer Transports, die signierte Push-Umschlaege ueber einen Byte-Stream
//! an ein Relay schicken. Jeder Frame ist ein `PushFrame` als JSON mit
//! vorangestellter Laenge (u32 big-endian).
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE)                   | PushFrame |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Ein VoIP-Push ist klein; Frames ueber 64 KiB werden abgelehnt.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::envelope::PushEnvelope;

/// Maximale JSON-Groesse eines Frames (64 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Ein adressierter Push: Ziel-Fingerprint + signierter Umschlag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFrame {
    pub to: String,
    pub push: PushEnvelope,
}

/// tokio-util Codec fuer `PushFrame`s
///
/// Die Rahmung uebernimmt `LengthDelimitedCodec`, dieser Codec fuegt nur
/// JSON und die Groessengrenze hinzu. Alle Formatfehler sind `InvalidData`.
#[derive(Debug)]
pub struct FrameCodec {
    rahmen: LengthDelimitedCodec,
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        let rahmen = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .big_endian()
            .max_frame_length(max_frame_size)
            .new_codec();
        Self {
            rahmen,
            max_frame_size,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn ungueltig(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl Decoder for FrameCodec {
    type Item = PushFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PushFrame>, io::Error> {
        let Some(json) = self.rahmen.decode(src)? else {
            return Ok(None);
        };
        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| ungueltig(format!("PushFrame nicht lesbar: {e}")))
    }
}

impl Encoder<PushFrame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: PushFrame, dst: &mut BytesMut) -> Result<(), io::Error> {
        let json = serde_json::to_vec(&frame)
            .map_err(|e| ungueltig(format!("PushFrame nicht serialisierbar: {e}")))?;
        // LengthDelimitedCodec meldet das als InvalidInput
        if json.len() > self.max_frame_size {
            return Err(ungueltig(format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                json.len(),
                self.max_frame_size
            )));
        }
        self.rahmen.encode(Bytes::from(json), dst)
    }
}
