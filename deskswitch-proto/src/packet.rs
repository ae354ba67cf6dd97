//! Fixed-length link packets and their wire encoding.
//!
//! # Wire format
//!
//! ```text
//! 0xAA 0x55 <type> <payload: 8 bytes>
//! ```
//!
//! The payload is always zero-padded to its full width. There is no checksum:
//! the framing marker and the fixed length are the only integrity checks, and
//! the receiver resynchronises byte by byte after corruption.

/// First framing marker byte.
pub const START1: u8 = 0xAA;

/// Second framing marker byte.
pub const START2: u8 = 0x55;

/// Framing marker length.
pub const START_LENGTH: usize = 2;

/// Payload width in bytes.
pub const PACKET_DATA_LENGTH: usize = 8;

/// Encoded packet length: type tag plus payload.
pub const PACKET_LENGTH: usize = 1 + PACKET_DATA_LENGTH;

/// Packet length on the wire, including the framing marker.
pub const RAW_PACKET_LENGTH: usize = START_LENGTH + PACKET_LENGTH;

/// Number of 16-bit words in the payload.
pub const PACKET_DATA_WORDS: usize = PACKET_DATA_LENGTH / 2;

/// Link packet types.
///
/// Tag values are part of the wire contract shared by both boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Combined keyboard report from the peer.
    KeyboardReport = 1,
    /// Absolute mouse report from the peer.
    MouseAbs = 2,
    /// Active output changed on the peer.
    OutputSelect = 3,
    /// Keyboard LED state from the peer's host.
    SetReport = 6,
    /// Blink the local indicator LED.
    FlashLed = 9,
    /// Erase persisted configuration and reload defaults.
    WipeConfig = 10,
    /// Periodic liveness / info broadcast.
    Heartbeat = 12,
    /// Set relative-mouse / gaming mode.
    ToggleGaming = 13,
    /// Consumer control usage.
    ConsumerControl = 14,
    /// System control usage.
    SystemControl = 15,
    /// Persist configuration.
    SaveConfig = 18,
    /// Reboot the board.
    Reboot = 19,
    /// Read one field.
    GetVal = 20,
    /// Write one field.
    SetVal = 21,
    /// Read every field.
    GetAllVals = 22,
    /// Encapsulated packet.
    Proxy = 23,
}

impl PacketType {
    /// Raw tag value.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// Error returned when a tag does not name a known [`PacketType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownPacketType(pub u8);

impl core::fmt::Display for UnknownPacketType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown packet type {}", self.0)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = UnknownPacketType;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            1 => Self::KeyboardReport,
            2 => Self::MouseAbs,
            3 => Self::OutputSelect,
            6 => Self::SetReport,
            9 => Self::FlashLed,
            10 => Self::WipeConfig,
            12 => Self::Heartbeat,
            13 => Self::ToggleGaming,
            14 => Self::ConsumerControl,
            15 => Self::SystemControl,
            18 => Self::SaveConfig,
            19 => Self::Reboot,
            20 => Self::GetVal,
            21 => Self::SetVal,
            22 => Self::GetAllVals,
            23 => Self::Proxy,
            other => return Err(UnknownPacketType(other)),
        })
    }
}

/// A single link packet: type tag plus zero-padded payload.
///
/// The tag is kept raw so that packets with unknown tags can still be
/// represented; the dispatcher ignores them.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub tag: u8,
    pub data: [u8; PACKET_DATA_LENGTH],
}

impl Packet {
    /// Create a packet, copying `payload` and zero-padding the rest.
    ///
    /// Payload bytes beyond [`PACKET_DATA_LENGTH`] are dropped.
    #[must_use]
    pub fn new(kind: PacketType, payload: &[u8]) -> Self {
        Self::from_tag(kind.tag(), payload)
    }

    /// Same as [`Packet::new`] but with a raw tag.
    #[must_use]
    pub fn from_tag(tag: u8, payload: &[u8]) -> Self {
        let mut data = [0u8; PACKET_DATA_LENGTH];
        let len = payload.len().min(PACKET_DATA_LENGTH);
        data[..len].copy_from_slice(&payload[..len]);
        Self { tag, data }
    }

    /// The packet type, or `None` for an unknown tag.
    #[inline]
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::try_from(self.tag).ok()
    }

    /// Read payload word `index` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `index >= PACKET_DATA_WORDS`.
    #[inline]
    #[must_use]
    pub fn word(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.data[index * 2], self.data[index * 2 + 1]])
    }

    /// Write payload word `index` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `index >= PACKET_DATA_WORDS`.
    #[inline]
    pub fn set_word(&mut self, index: usize, value: u16) {
        self.data[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Serialize to `[tag, payload...]`.
    #[must_use]
    pub fn encode(&self) -> [u8; PACKET_LENGTH] {
        encode(self)
    }

    /// Serialize with the framing marker in front.
    #[must_use]
    pub fn encode_framed(&self) -> [u8; RAW_PACKET_LENGTH] {
        let mut raw = [0u8; RAW_PACKET_LENGTH];
        raw[0] = START1;
        raw[1] = START2;
        raw[START_LENGTH..].copy_from_slice(&encode(self));
        raw
    }

    /// Serialize the framed packet into a `heapless::Vec`.
    #[cfg(feature = "heapless")]
    #[must_use]
    pub fn to_vec(&self) -> heapless::Vec<u8, RAW_PACKET_LENGTH> {
        let mut vec = heapless::Vec::new();
        // Capacity equals the framed length, this cannot fail.
        let _ = vec.extend_from_slice(&self.encode_framed());
        vec
    }

    /// Write the framed packet to an `embedded_io::Write` implementation.
    ///
    /// # Errors
    ///
    /// Returns the writer's error if the write fails.
    #[cfg(feature = "embedded-io")]
    pub fn write_framed_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), W::Error> {
        writer.write_all(&self.encode_framed())
    }
}

impl From<PacketType> for Packet {
    fn from(kind: PacketType) -> Self {
        Self::new(kind, &[])
    }
}

/// Encode a packet. Total over every representable packet.
#[inline]
#[must_use]
pub fn encode(packet: &Packet) -> [u8; PACKET_LENGTH] {
    let mut buf = [0u8; PACKET_LENGTH];
    buf[0] = packet.tag;
    buf[1..].copy_from_slice(&packet.data);
    buf
}

/// Decode a packet. Total over every fixed-length buffer.
#[inline]
#[must_use]
pub fn decode(buf: &[u8; PACKET_LENGTH]) -> Packet {
    let mut data = [0u8; PACKET_DATA_LENGTH];
    data.copy_from_slice(&buf[1..]);
    Packet { tag: buf[0], data }
}
