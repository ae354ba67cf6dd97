//! Wire types and framing for the deskswitch inter-board link.
//!
//! This crate provides everything needed to talk to the other board:
//!
//! - **Types**: HID payloads exchanged between boards
//!   - [`KeyboardReport`] - Boot-protocol keyboard report
//!   - [`MouseReport`] - Absolute mouse report
//!   - [`OutputId`] - Output selector (A or B)
//!
//! - **Packets**: Fixed-length link messages
//!   - [`Packet`] - Type tag plus 8-byte payload
//!   - [`PacketType`] - Known packet tags
//!   - [`encode()`] / [`decode()`] - Pure, total codec
//!
//! - **Receiving**: Extract packets from a byte stream
//!   - [`ByteRing`] - Circular buffer with an external write cursor
//!   - [`PacketReceiver`] - Marker scan, one packet per poll
//!
//! # Wire Format
//!
//! ```text
//! 0xAA 0x55 <type> <d0> <d1> <d2> <d3> <d4> <d5> <d6> <d7>
//! ```
//!
//! Every packet is exactly [`RAW_PACKET_LENGTH`] bytes on the wire. Multi-byte
//! values inside the payload are little-endian.
//!
//! # Examples
//!
//! ```
//! use deskswitch_proto::{Packet, PacketType, PacketReceiver, RingBuffer};
//!
//! let packet = Packet::new(PacketType::OutputSelect, &[1]);
//!
//! let mut ring = RingBuffer::<64>::new();
//! ring.push_slice(&[0x00, 0x13]);
//! ring.push_slice(&packet.encode_framed());
//!
//! let mut rx = PacketReceiver::new();
//! assert_eq!(rx.poll(&ring), Some(packet));
//! assert_eq!(rx.poll(&ring), None);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//! - **`heapless`**: Enable [`Packet::to_vec()`]
//! - **`embedded-io`**: Enable [`Packet::write_framed_io()`] for I/O peripherals

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod packet;
pub mod receiver;
pub mod types;

pub use packet::{
    decode, encode, Packet, PacketType, UnknownPacketType, PACKET_DATA_LENGTH, PACKET_DATA_WORDS,
    PACKET_LENGTH, RAW_PACKET_LENGTH, START1, START2, START_LENGTH,
};
pub use receiver::{ByteRing, PacketReceiver, RingBuffer};
pub use types::{
    is_valid_output, other_output, KeyboardReport, MouseReport, OutputId, CONSUMER_CONTROL_LENGTH,
    KBD_REPORT_LENGTH, KEYS_IN_REPORT, MOUSE_REPORT_LENGTH, NUM_OUTPUTS, OUTPUT_A, OUTPUT_B,
    SYSTEM_CONTROL_LENGTH,
};
