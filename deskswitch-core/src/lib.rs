//! Platform-agnostic behaviour of a deskswitch board.
//!
//! Two boards share one keyboard and mouse between two computers. This crate
//! holds everything that does not touch hardware, so it runs unchanged on the
//! RP2040 and in host tests.
//!
//! # Overview
//!
//! - [`state`]: The per-board [`DeviceState`] and the cross-core [`Shared`] flags
//! - [`aggregator`]: Keyboard state union across local keyboards and the peer
//! - [`keyboard`]: Local input routing, hotkeys and null mode
//! - [`switch`]: Active output transitions and LEDs
//! - [`dispatch`]: Handlers for packets received from the peer
//! - [`fields`]: Numbered remote access to state and config fields
//! - [`scheduler`] / [`tasks`]: Periodic task table and the standard task bodies
//! - [`platform`]: Traits the firmware implements ([`Platform`], sinks, [`Watchdog`])
//!
//! # Concurrency
//!
//! [`DeviceState`] belongs to the USB context and is passed around by `&mut`.
//! The only data crossing cores is in [`Shared`] (atomics) and the two
//! single-producer/single-consumer queues in [`queue`].
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded use)
//! - **`log`**: Log through the `log` facade when `defmt` is off

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod fmt;

pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod fields;
pub mod keyboard;
pub mod platform;
pub mod queue;
pub mod scheduler;
pub mod state;
pub mod switch;
pub mod tasks;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use aggregator::{KeyboardAggregator, MAX_DEVICES};
pub use config::{Config, ConfigError, FirmwareInfo, OutputConfig};
pub use dispatch::{dispatch, MAX_PROXY_DEPTH};
pub use keyboard::{process_input, InputEvent};
pub use platform::{LinkSink, OutputError, Platform, ReportSink, StorageError, Watchdog};
pub use queue::{HidQueue, HidReport, LinkQueue, Outbox};
pub use scheduler::{hz, run_tasks, Clock, Task, EVERY_PASS};
pub use state::{DeviceState, PeerInfo, Shared};
pub use switch::{restore_leds, set_active_output, toggle_output};
