use bytes::{Bytes, BytesMut};

/// Maximum payload bytes carried by one frame.
///
/// One byte short of a 4 KiB packet, leaving room for a terminator in
/// peers that store the payload as a C string.
pub const FRAME_CAPACITY: usize = 4095;

/// One bounded chunk of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The payload chunk.
    pub payload: Bytes,
    /// CRC-32 of `payload` as claimed by the sender.
    pub checksum: u32,
    /// Whether this is the final frame of its message.
    pub last: bool,
}

impl Frame {
    /// Create a frame whose checksum is computed from `payload`.
    pub fn new(payload: impl Into<Bytes>, last: bool) -> Self {
        let payload = payload.into();
        Self {
            checksum: checksum(&payload),
            payload,
            last,
        }
    }

    /// Recompute the checksum over the carried payload and compare.
    pub fn verify(&self) -> bool {
        checksum(&self.payload) == self.checksum
    }
}

/// An ordered sequence of frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    frames: Vec<Frame>,
}

impl Message {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Append a frame after the current last one.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the message ends with a frame flagged as last.
    pub fn is_terminated(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.last)
    }

    /// Total payload bytes across all frames.
    pub fn payload_len(&self) -> usize {
        self.frames.iter().map(|frame| frame.payload.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// CRC-32 (IEEE) over raw payload bytes.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Number of frames a payload of `size` bytes packs into.
///
/// An empty payload still takes one frame.
pub fn frame_count(size: usize) -> usize {
    size.div_ceil(FRAME_CAPACITY).max(1)
}

/// Split the first `size` bytes of `payload` into frames.
///
/// `size` is clamped to the payload length, so bytes past it are never read.
/// Only the final frame is flagged as last.
pub fn pack(payload: &[u8], size: usize) -> Message {
    let size = size.min(payload.len());
    let data = Bytes::copy_from_slice(&payload[..size]);
    let count = frame_count(size);

    let mut message = Message::with_capacity(count);
    for index in 0..count {
        let start = index * FRAME_CAPACITY;
        let end = (start + FRAME_CAPACITY).min(size);
        message.push(Frame::new(data.slice(start..end), index + 1 == count));
    }
    message
}

/// Concatenate frame payloads in order.
pub fn unpack(message: &Message) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(message.payload_len());
    for frame in message {
        out.extend_from_slice(&frame.payload);
    }
    out.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn pack_unpack_boundary_sizes() {
        let c = FRAME_CAPACITY;
        for size in [0, 1, c - 1, c, c + 1, 10 * c] {
            let payload = sample(size);
            let message = pack(&payload, payload.len());

            assert_eq!(message.len(), frame_count(size), "size {size}");
            assert_eq!(unpack(&message), payload, "size {size}");
        }
    }

    #[test]
    fn frame_count_is_ceiling_with_minimum_one() {
        assert_eq!(frame_count(0), 1);
        assert_eq!(frame_count(1), 1);
        assert_eq!(frame_count(FRAME_CAPACITY), 1);
        assert_eq!(frame_count(FRAME_CAPACITY + 1), 2);
        assert_eq!(frame_count(9000), 3);
    }

    #[test]
    fn only_final_frame_is_last() {
        let payload = sample(3 * FRAME_CAPACITY + 7);
        let message = pack(&payload, payload.len());

        let last_flags: Vec<bool> = message.iter().map(|frame| frame.last).collect();
        assert_eq!(last_flags, vec![false, false, false, true]);
        assert!(message.is_terminated());
    }

    #[test]
    fn empty_payload_packs_to_single_empty_last_frame() {
        let message = pack(b"", 0);

        assert_eq!(message.len(), 1);
        let frame = &message.frames()[0];
        assert!(frame.payload.is_empty());
        assert!(frame.last);
        assert!(frame.verify());
    }

    #[test]
    fn pack_never_reads_past_size() {
        let payload = b"hello, world";
        let message = pack(payload, 5);

        assert_eq!(unpack(&message), b"hello");
    }

    #[test]
    fn pack_clamps_oversized_size() {
        let message = pack(b"abc", 100);
        assert_eq!(unpack(&message), b"abc");
    }

    #[test]
    fn checksum_covers_exact_chunk() {
        let payload = sample(FRAME_CAPACITY + 10);
        let message = pack(&payload, payload.len());

        assert_eq!(
            message.frames()[0].checksum,
            checksum(&payload[..FRAME_CAPACITY])
        );
        assert_eq!(
            message.frames()[1].checksum,
            checksum(&payload[FRAME_CAPACITY..])
        );
    }

    #[test]
    fn embedded_nul_is_preserved() {
        let payload = b"before\0after\0";
        let message = pack(payload, payload.len());
        assert_eq!(unpack(&message), payload);
    }

    #[test]
    fn verify_detects_mutation() {
        let mut frame = Frame::new(Bytes::from_static(b"hello"), true);
        assert!(frame.verify());

        frame.payload = Bytes::from_static(b"hellp");
        assert!(!frame.verify());
    }
}
