//! JSON envelope for a single frame.
//!
//! ```json
//! {"message":"hello","crc_checksum":907060870,"flag_last":1}
//! ```
//!
//! `message` carries each payload byte as the character with the same code
//! point (ISO-8859-1), so plain ASCII travels verbatim while any byte
//! sequence, including NUL and split UTF-8, still round-trips exactly.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::{Frame, FRAME_CAPACITY};
use crate::error::{FrameError, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    message: String,
    crc_checksum: u32,
    flag_last: u8,
}

/// Serialize a frame to envelope bytes.
pub fn encode(frame: &Frame) -> Result<Vec<u8>> {
    if frame.payload.len() > FRAME_CAPACITY {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max: FRAME_CAPACITY,
        });
    }

    let envelope = Envelope {
        message: frame.payload.iter().map(|&byte| char::from(byte)).collect(),
        crc_checksum: frame.checksum,
        flag_last: u8::from(frame.last),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Parse envelope bytes back into a frame.
///
/// The checksum is taken as claimed; callers verify it with [`Frame::verify`].
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    let last = match envelope.flag_last {
        0 => false,
        1 => true,
        other => {
            return Err(FrameError::InvalidEnvelope(format!(
                "flag_last must be 0 or 1, got {other}"
            )))
        }
    };

    let payload = envelope
        .message
        .chars()
        .map(|ch| {
            u8::try_from(ch).map_err(|_| {
                FrameError::InvalidEnvelope(format!(
                    "message contains non-byte character U+{:04X}",
                    u32::from(ch)
                ))
            })
        })
        .collect::<Result<Vec<u8>>>()?;

    if payload.len() > FRAME_CAPACITY {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: FRAME_CAPACITY,
        });
    }

    Ok(Frame {
        payload: Bytes::from(payload),
        checksum: envelope.crc_checksum,
        last,
    })
}
