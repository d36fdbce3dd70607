use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Marker byte the server writes ahead of every reply.
pub const REPLY_MARKER: u8 = 0;

/// Per-frame acknowledgement sent by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckStatus {
    Ok = 0,
    Fail = 1,
}

impl AckStatus {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(AckStatus::Ok),
            1 => Ok(AckStatus::Fail),
            other => Err(FrameError::InvalidAck(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Writes protocol headers and frame units to any `Write` stream.
///
/// Each call assembles its bytes in an internal buffer and hands them to the
/// stream in one go, so a unit is never interleaved with a partial header.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Handshake value.
    pub fn send_u32(&mut self, value: u32) -> Result<()> {
        self.buf.clear();
        self.buf.put_u32_ne(value);
        self.write_buf()
    }

    /// Frame-count header. Zero announces a graceful disconnect.
    pub fn send_count(&mut self, count: u64) -> Result<()> {
        self.buf.clear();
        self.buf.put_u64_ne(count);
        self.write_buf()
    }

    pub fn send_ack(&mut self, status: AckStatus) -> Result<()> {
        self.buf.clear();
        self.buf.put_u8(status.as_byte());
        self.write_buf()
    }

    pub fn send_marker(&mut self) -> Result<()> {
        self.buf.clear();
        self.buf.put_u8(REPLY_MARKER);
        self.write_buf()
    }

    /// Raw unit: length header then envelope bytes. Returns bytes written.
    pub fn send_raw_envelope(&mut self, envelope: &[u8]) -> Result<usize> {
        self.buf.clear();
        self.buf.put_u64_ne(envelope.len() as u64);
        self.buf.put_slice(envelope);
        let written = self.buf.len();
        self.write_buf()?;
        Ok(written)
    }

    /// Compressed unit: compressed length, original length, gzip bytes.
    /// Returns bytes written.
    pub fn send_compressed_envelope(&mut self, gzipped: &[u8], original_len: usize) -> Result<usize> {
        self.buf.clear();
        self.buf.put_u64_ne(gzipped.len() as u64);
        self.buf.put_u64_ne(original_len as u64);
        self.buf.put_slice(gzipped);
        let written = self.buf.len();
        self.write_buf()?;
        Ok(written)
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // A write timeout on the socket surfaces as WouldBlock or TimedOut.
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
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
