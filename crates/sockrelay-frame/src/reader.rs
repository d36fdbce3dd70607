use std::io::{ErrorKind, Read};

use crate::error::{FrameError, Result};
use crate::writer::AckStatus;

/// Reads protocol headers and frame units from any `Read` stream.
///
/// Handles partial reads internally; every call returns a complete value or
/// an error.
pub struct FrameReader<T> {
    inner: T,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read a frame-count header.
    ///
    /// Returns `None` on a clean EOF before the first header byte.
    pub fn read_count(&mut self) -> Result<Option<u64>> {
        let mut raw = [0u8; 8];
        if !self.fill(&mut raw, true)? {
            return Ok(None);
        }
        Ok(Some(u64::from_ne_bytes(raw)))
    }

    /// Read a length header, rejecting values above `max`.
    pub fn read_len(&mut self, max: usize) -> Result<usize> {
        let len = self.read_u64()?;
        if len > max as u64 {
            return Err(FrameError::EnvelopeTooLarge { size: len, max });
        }
        // Bounded by `max`, so the cast cannot truncate.
        Ok(len as usize)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.fill(&mut out, false)?;
        Ok(out)
    }

    pub fn read_ack(&mut self) -> Result<AckStatus> {
        AckStatus::from_byte(self.read_u8()?)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut raw = [0u8; 1];
        self.fill(&mut raw, false)?;
        Ok(raw[0])
    }

    /// Handshake value.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.fill(&mut raw, false)?;
        Ok(u32::from_ne_bytes(raw))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        self.fill(&mut raw, false)?;
        Ok(u64::from_ne_bytes(raw))
    }

    /// Fill `buf` completely. With `eof_ok`, an EOF before the first byte
    /// returns `Ok(false)` instead of `ConnectionClosed`.
    fn fill(&mut self, buf: &mut [u8], eof_ok: bool) -> Result<bool> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 && eof_ok => return Ok(false),
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(true)
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
