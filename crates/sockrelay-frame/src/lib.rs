//! Checksummed message framing for sockrelay.
//!
//! A logical message is split into frames of at most [`FRAME_CAPACITY`]
//! bytes. Each frame travels as a JSON envelope carrying its payload text,
//! a CRC-32 of the payload and a last-frame flag. The receiver recomputes
//! the checksum and acknowledges every frame; a failed check makes the
//! sender retransmit the same frame.
//!
//! Message layout on the wire (all integers host-native byte order):
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ Count (u64)  │ Count × frame unit                           │
//! └──────────────┴──────────────────────────────────────────────┘
//!
//! raw unit:        ┌────────────┬────────────────┐   ◄── ack (u8)
//!                  │ Len (u64)  │ Envelope bytes │
//!                  └────────────┴────────────────┘
//!
//! compressed unit: ┌────────────┬────────────┬────────────┐   ◄── ack (u8)
//!                  │ Gz (u64)   │ Len (u64)  │ Gzip bytes │
//!                  └────────────┴────────────┴────────────┘
//! ```
//!
//! A count of zero carries no frames and means the peer is leaving.

pub mod codec;
pub mod compress;
pub mod config;
pub mod envelope;
pub mod error;
pub mod profile;
pub mod reader;
pub mod receive;
pub mod transmit;
pub mod writer;

pub use codec::{checksum, frame_count, pack, unpack, Frame, Message, FRAME_CAPACITY};
pub use config::{LinkConfig, DEFAULT_MAX_ENVELOPE, DEFAULT_MAX_RETRANSMITS};
pub use error::{FrameError, Result};
pub use profile::{ClientProfile, Direction, WirePath};
pub use reader::FrameReader;
pub use receive::Receiver;
pub use transmit::{send_goodbye, SendStats, Transmitter};
pub use writer::{AckStatus, FrameWriter, REPLY_MARKER};
