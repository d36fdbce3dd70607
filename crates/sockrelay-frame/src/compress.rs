//! Whole-envelope gzip compression.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{FrameError, Result};

/// Gzip-compress an encoded envelope.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| FrameError::Compression(format!("gzip write failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| FrameError::Compression(format!("gzip finish failed: {e}")))
}

/// Decompress a gzip stream that must inflate to exactly `expected_len` bytes.
pub fn gunzip(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    // One extra byte so an over-long stream is detected without inflating it all.
    GzDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| FrameError::Compression(format!("gzip read failed: {e}")))?;

    if out.len() != expected_len {
        return Err(FrameError::Compression(format!(
            "inflated to {} bytes, expected {expected_len}",
            out.len()
        )));
    }
    Ok(out)
}
