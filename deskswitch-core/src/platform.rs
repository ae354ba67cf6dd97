//! Hardware seams: board services, HID and link sinks, watchdog.

use core::future::Future;
use deskswitch_proto::RAW_PACKET_LENGTH;

use crate::config::Config;
use crate::queue::HidReport;

/// Error type for sink operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// USB/UART I/O error.
    Io,
    /// Device not ready (e.g., USB not configured by the host).
    NotReady,
    /// Endpoint busy.
    Busy,
}

/// Error type for configuration storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash erase or program failed.
    Io,
}

/// Board services used by the state machine.
///
/// Every method is expected to return promptly; none may block on the peer
/// or the host.
pub trait Platform {
    /// Monotonic microsecond clock.
    fn now_us(&self) -> u64;

    /// Drive the on-board indicator LED.
    fn set_onboard_led(&mut self, on: bool);

    /// Set the LED byte (Num/Caps/Scroll...) on locally attached keyboards.
    fn set_keyboard_leds(&mut self, leds: u8);

    /// Briefly flash the on-board LED.
    fn blink_led(&mut self);

    /// Read the stored configuration, if a valid one exists.
    fn load_config(&mut self) -> Option<Config>;

    /// Persist `config`.
    fn save_config(&mut self, config: &Config) -> Result<(), StorageError>;

    /// Erase the stored configuration.
    fn wipe_config(&mut self) -> Result<(), StorageError>;

    /// Reset the board. May return if the reset is deferred.
    fn reboot(&mut self);
}

/// Async destination for host-bound HID reports.
pub trait ReportSink {
    /// Send one report to the host.
    fn send(&mut self, report: &HidReport) -> impl Future<Output = Result<(), OutputError>>;

    /// Check if the interface can accept a report now.
    fn is_ready(&self) -> bool;

    /// Whether the host has suspended the bus.
    fn is_suspended(&self) -> bool {
        false
    }

    /// Ask a suspended host to resume. Nothing to do by default.
    fn wake_host(&mut self) {}
}

/// Async transmitter for framed link packets.
pub trait LinkSink {
    /// Transmit one framed packet.
    fn send(
        &mut self,
        frame: &[u8; RAW_PACKET_LENGTH],
    ) -> impl Future<Output = Result<(), OutputError>>;
}

/// Hardware watchdog.
pub trait Watchdog {
    fn feed(&mut self);
}
