//! Packet extraction from a continuously overwritten circular byte buffer.
//!
//! The link driver fills a ring buffer and advances its write cursor on its
//! own (DMA or interrupt). [`PacketReceiver`] keeps only a read cursor and
//! treats the ring as a lazy byte sequence: it never blocks and never asks the
//! driver to restart.

use crate::packet::{decode, Packet, PACKET_LENGTH, RAW_PACKET_LENGTH, START1, START2};

/// A circular byte buffer with an externally advanced write cursor.
pub trait ByteRing {
    /// Ring size in bytes. Must be larger than [`RAW_PACKET_LENGTH`].
    fn capacity(&self) -> usize;

    /// Index of the next byte the driver will write.
    fn write_cursor(&self) -> usize;

    /// Byte at `index`, which is always `< capacity()`.
    fn byte_at(&self, index: usize) -> u8;
}

/// Fixed-size ring buffer fed by software, e.g. from a UART read loop.
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    write: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            write: 0,
        }
    }

    /// Append one byte, overwriting the oldest data when full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buf[self.write] = byte;
        self.write = (self.write + 1) % N;
    }

    /// Append a slice of bytes.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteRing for RingBuffer<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn write_cursor(&self) -> usize {
        self.write
    }

    fn byte_at(&self, index: usize) -> u8 {
        self.buf[index % N]
    }
}

/// Scans a [`ByteRing`] for framed packets.
///
/// Each call to [`poll`](Self::poll) returns at most one packet. Bytes that
/// do not start a framing marker are skipped one at a time, so after any
/// corruption the receiver loses only the bytes up to the next marker.
#[derive(Debug, Default)]
pub struct PacketReceiver {
    read: usize,
    staging: [u8; PACKET_LENGTH],
}

impl PacketReceiver {
    /// Create a receiver reading from index 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read: 0,
            staging: [0u8; PACKET_LENGTH],
        }
    }

    /// Current read cursor.
    #[inline]
    #[must_use]
    pub fn read_cursor(&self) -> usize {
        self.read
    }

    /// Move the read cursor, e.g. to skip stale data after a driver restart.
    pub fn set_read_cursor(&mut self, index: usize) {
        self.read = index;
    }

    /// Number of unread bytes in `ring`.
    #[must_use]
    pub fn pending<R: ByteRing>(&self, ring: &R) -> usize {
        let size = ring.capacity();
        if size == 0 {
            return 0;
        }
        let write = ring.write_cursor() % size;
        let read = self.read % size;
        (write + size - read) % size
    }

    /// Extract the next packet, if a complete one is available.
    pub fn poll<R: ByteRing>(&mut self, ring: &R) -> Option<Packet> {
        let size = ring.capacity();
        if size <= RAW_PACKET_LENGTH {
            return None;
        }
        self.read %= size;
        let mut delta = self.pending(ring);

        while delta >= RAW_PACKET_LENGTH {
            if self.at_marker(ring) {
                self.fetch(ring);
                return Some(decode(&self.staging));
            }
            self.read = (self.read + 1) % size;
            delta -= 1;
        }
        None
    }

    fn at_marker<R: ByteRing>(&self, ring: &R) -> bool {
        let size = ring.capacity();
        ring.byte_at(self.read) == START1 && ring.byte_at((self.read + 1) % size) == START2
    }

    /// Copy one packet (without its marker) into staging and move past it.
    fn fetch<R: ByteRing>(&mut self, ring: &R) {
        let size = ring.capacity();
        let body = (self.read + 2) % size;
        for (i, slot) in self.staging.iter_mut().enumerate() {
            *slot = ring.byte_at((body + i) % size);
        }
        self.read = (self.read + RAW_PACKET_LENGTH) % size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    fn keyboard_packet() -> Packet {
        Packet::new(PacketType::KeyboardReport, &[0x02, 0, 0x04, 0, 0, 0, 0, 0])
    }

    #[test]
    fn test_garbage_then_packet() {
        let mut ring = RingBuffer::<64>::new();
        ring.push_slice(&[0x01, 0xAA, 0x13, 0x55, 0xAA]);
        ring.push_slice(&keyboard_packet().encode_framed());

        let mut rx = PacketReceiver::new();
        assert_eq!(rx.poll(&ring), Some(keyboard_packet()));
        assert_eq!(rx.read_cursor(), 5 + RAW_PACKET_LENGTH);
        assert_eq!(rx.pending(&ring), 0);
        assert_eq!(rx.poll(&ring), None);
    }

    #[test]
    fn test_incomplete_packet_waits() {
        let mut ring = RingBuffer::<64>::new();
        let raw = keyboard_packet().encode_framed();
        ring.push_slice(&raw[..RAW_PACKET_LENGTH - 1]);

        let mut rx = PacketReceiver::new();
        assert_eq!(rx.poll(&ring), None);
        assert_eq!(rx.read_cursor(), 0);

        ring.push(raw[RAW_PACKET_LENGTH - 1]);
        assert_eq!(rx.poll(&ring), Some(keyboard_packet()));
    }

    #[test]
    fn test_one_packet_per_poll() {
        let mut ring = RingBuffer::<64>::new();
        let first = Packet::new(PacketType::OutputSelect, &[1]);
        let second = Packet::new(PacketType::OutputSelect, &[0]);
        ring.push_slice(&first.encode_framed());
        ring.push_slice(&second.encode_framed());

        let mut rx = PacketReceiver::new();
        assert_eq!(rx.poll(&ring), Some(first));
        assert_eq!(rx.pending(&ring), RAW_PACKET_LENGTH);
        assert_eq!(rx.poll(&ring), Some(second));
        assert_eq!(rx.poll(&ring), None);
    }

    #[test]
    fn test_packet_wraps_around_ring() {
        let mut ring = RingBuffer::<16>::new();
        let mut rx = PacketReceiver::new();

        // Garbage is skipped until fewer than a packet's worth remains.
        ring.push_slice(&[0u8; 12]);
        assert_eq!(rx.poll(&ring), None);
        assert_eq!(rx.read_cursor(), 2);

        // The next packet straddles the end of the ring.
        rx.set_read_cursor(12);
        let packet = Packet::new(PacketType::SetVal, &[74, 0x45]);
        ring.push_slice(&packet.encode_framed());
        assert_eq!(ring.write_cursor(), 7);
        assert_eq!(rx.poll(&ring), Some(packet));
        assert_eq!(rx.read_cursor(), (12 + RAW_PACKET_LENGTH) % 16);
    }

    #[test]
    fn test_marker_split_by_garbage_resyncs() {
        let mut ring = RingBuffer::<64>::new();
        // A lone START1 followed by a non-marker byte is skipped.
        ring.push_slice(&[0xAA, 0x00, 0xAA]);
        let packet = Packet::new(PacketType::FlashLed, &[]);
        ring.push_slice(&packet.encode_framed());

        let mut rx = PacketReceiver::new();
        assert_eq!(rx.poll(&ring), Some(packet));
        assert_eq!(rx.read_cursor(), 3 + RAW_PACKET_LENGTH);
    }

    #[test]
    fn test_marker_bytes_inside_payload() {
        let mut ring = RingBuffer::<64>::new();
        let tricky = Packet::new(PacketType::SetVal, &[0xAA, 0x55, 0xAA, 0x55]);
        let next = Packet::new(PacketType::Reboot, &[]);
        ring.push_slice(&tricky.encode_framed());
        ring.push_slice(&next.encode_framed());

        let mut rx = PacketReceiver::new();
        assert_eq!(rx.poll(&ring), Some(tricky));
        assert_eq!(rx.poll(&ring), Some(next));
    }
}
