//! UART link to the other board.
//!
//! Received bytes land in [`RX_RING`], which the device loop scans for packets
//! with a [`PacketReceiver`](deskswitch_proto::PacketReceiver). Outgoing
//! packets are written by [`UartLinkSink`] from the other core.
//!
//! # Pins
//!
//! Uses UART0:
//! - GPIO 12: TX
//! - GPIO 13: RX

use core::cell::RefCell;

use deskswitch_core::{LinkSink, OutputError};
use deskswitch_proto::{RingBuffer, RAW_PACKET_LENGTH};
use embassy_rp::uart::{Async, Error as UartError, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Link speed, 8N1.
pub const LINK_BAUDRATE: u32 = 921_600;

/// Receive ring size. Must stay larger than one raw packet.
pub const RX_RING_LENGTH: usize = 1024;

pub type RxRing = RingBuffer<RX_RING_LENGTH>;

/// Bytes received from the peer, written by [`pump_rx`] only.
pub static RX_RING: Mutex<CriticalSectionRawMutex, RefCell<RxRing>> =
    Mutex::new(RefCell::new(RingBuffer::new()));

/// Move received bytes into [`RX_RING`] forever.
///
/// Line errors are logged and the byte is skipped; the packet receiver
/// resynchronises on the next start marker.
pub async fn pump_rx(mut rx: UartRx<'static, Async>) -> ! {
    let mut byte = [0u8; 1];
    loop {
        match rx.read(&mut byte).await {
            Ok(()) => RX_RING.lock(|ring| ring.borrow_mut().push(byte[0])),
            Err(UartError::Overrun) => defmt::warn!("link RX overrun"),
            Err(e) => defmt::debug!("link RX error: {:?}", e),
        }
    }
}

/// Transmits framed packets on the link UART.
pub struct UartLinkSink {
    tx: UartTx<'static, Async>,
}

impl UartLinkSink {
    #[must_use]
    pub fn new(tx: UartTx<'static, Async>) -> Self {
        Self { tx }
    }
}

impl LinkSink for UartLinkSink {
    async fn send(&mut self, frame: &[u8; RAW_PACKET_LENGTH]) -> Result<(), OutputError> {
        self.tx.write(frame).await.map_err(|_| OutputError::Io)
    }
}
