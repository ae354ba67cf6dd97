//! Deskswitch firmware for RP2040.
//!
//! One board of a two-board keyboard/mouse switch. Each board is plugged into
//! its own computer and the two talk over a UART link. Keyboards and mice are
//! attached to either board; their input is delivered to whichever computer
//! is currently selected.
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | UART0 TX | 12   | Link to the other board |
//! | UART0 RX | 13   | Link from the other board |
//! | LED      | 25   | On-board LED (active output indicator) |
//!
//! # Architecture
//!
//! The firmware splits the work between both cores:
//!
//! - **Core 0**: USB device stack, UART receive pump and the device loop that
//!   owns [`DeviceState`](deskswitch_core::DeviceState). It processes local
//!   input, dispatches packets and hands HID reports to the host.
//! - **Core 1**: Drains the link queue onto the UART and feeds the watchdog
//!   as long as core 0 keeps checking in.
//!
//! # Modules
//!
//! - [`board`]: Flash config storage, LEDs, reset and watchdog
//! - [`link`]: UART receive ring and the [`LinkSink`](deskswitch_core::LinkSink) transmitter
//! - [`usb_output`]: USB HID interfaces and the [`ReportSink`](deskswitch_core::ReportSink)
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent reset)
//! - **`board-a`** (default): This board drives output A
//! - **`board-b`**: This board drives output B

#![no_std]

#[cfg(all(feature = "board-a", feature = "board-b"))]
compile_error!("Cannot enable both `board-a` and `board-b` features - a board drives exactly one output");

#[cfg(not(any(feature = "board-a", feature = "board-b")))]
compile_error!("Select a board role with the `board-a` or `board-b` feature");

use deskswitch_core::FirmwareInfo;
use deskswitch_proto::OutputId;

pub mod board;
pub mod link;
pub mod usb_output;

/// The output this board is wired to.
#[cfg(feature = "board-a")]
pub const BOARD_ROLE: OutputId = deskswitch_proto::OUTPUT_A;

/// The output this board is wired to.
#[cfg(all(feature = "board-b", not(feature = "board-a")))]
pub const BOARD_ROLE: OutputId = deskswitch_proto::OUTPUT_B;

/// Reported to the peer in heartbeats and through the field table.
pub const FIRMWARE_VERSION: u16 = 0x0100;

#[must_use]
pub const fn firmware_info() -> FirmwareInfo {
    FirmwareInfo {
        version: FIRMWARE_VERSION,
        checksum: 0,
    }
}

pub use board::{
    run_led, LedCommand, RpPlatform, RpWatchdog, KEYBOARD_LEDS, LED_COMMANDS, LOCAL_INPUT,
};
pub use link::{pump_rx, UartLinkSink, LINK_BAUDRATE, RX_RING};
pub use usb_output::{
    configure_usb_hid, run_usb, DeviceStateHandler, HidStates, KeyboardLedHandler, UsbHidOutput,
    HOST_LEDS, USB_CONFIGURED, USB_SUSPENDED, WAKE_REQUEST,
};
