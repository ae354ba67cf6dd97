//! Mock board and queue harness for unit tests.

extern crate std;

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::vec::Vec;

use deskswitch_proto::{OutputId, Packet};

use crate::config::{Config, FirmwareInfo};
use crate::platform::{Platform, StorageError};
use crate::queue::{HidConsumer, HidQueue, HidReport, LinkConsumer, LinkQueue, Outbox};
use crate::state::{DeviceState, Shared};

pub const TEST_FIRMWARE: FirmwareInfo = FirmwareInfo {
    version: 0x0102,
    checksum: 0xDEAD_BEEF,
};

/// Records every call made through [`Platform`].
#[derive(Debug, Default)]
pub struct MockPlatform {
    pub now: u64,
    pub onboard_led: Option<bool>,
    pub keyboard_leds: Vec<u8>,
    pub blinks: usize,
    pub stored: Option<Config>,
    pub saves: usize,
    pub wipes: usize,
    pub reboots: usize,
}

impl Platform for MockPlatform {
    fn now_us(&self) -> u64 {
        self.now
    }

    fn set_onboard_led(&mut self, on: bool) {
        self.onboard_led = Some(on);
    }

    fn set_keyboard_leds(&mut self, leds: u8) {
        self.keyboard_leds.push(leds);
    }

    fn blink_led(&mut self) {
        self.blinks += 1;
    }

    fn load_config(&mut self) -> Option<Config> {
        self.stored
    }

    fn save_config(&mut self, config: &Config) -> Result<(), StorageError> {
        self.saves += 1;
        self.stored = Some(*config);
        Ok(())
    }

    fn wipe_config(&mut self) -> Result<(), StorageError> {
        self.wipes += 1;
        self.stored = None;
        Ok(())
    }

    fn reboot(&mut self) {
        self.reboots += 1;
    }
}

/// Owns the queue storage a [`Rig`] borrows from.
pub struct Harness {
    hid: HidQueue,
    link: LinkQueue,
    shared: Shared,
    role: OutputId,
    stored: Option<Config>,
}

/// A device state wired to mock queues and platform.
pub struct Rig<'q> {
    pub state: DeviceState<'q, MockPlatform>,
    pub hid: HidConsumer<'q>,
    pub link: LinkConsumer<'q>,
}

impl Harness {
    pub fn new(role: OutputId) -> Self {
        Self::with_config(role, None)
    }

    pub fn with_config(role: OutputId, stored: Option<Config>) -> Self {
        Self {
            hid: HidQueue::new(),
            link: LinkQueue::new(),
            shared: Shared::new(),
            role,
            stored,
        }
    }

    /// A fresh state with USB configured, as after enumeration.
    pub fn rig(&mut self) -> Rig<'_> {
        let (hp, hc) = self.hid.split();
        let (lp, lc) = self.link.split();
        let platform = MockPlatform {
            stored: self.stored,
            ..MockPlatform::default()
        };
        let mut state = DeviceState::new(
            self.role,
            TEST_FIRMWARE,
            Outbox::new(hp, lp),
            &self.shared,
            platform,
        );
        state.usb_connected = true;
        Rig {
            state,
            hid: hc,
            link: lc,
        }
    }
}

impl Rig<'_> {
    /// Drain and return everything queued for the host.
    pub fn hid_reports(&mut self) -> Vec<HidReport> {
        core::iter::from_fn(|| self.hid.dequeue()).collect()
    }

    /// Drain and return everything queued for the peer.
    pub fn packets(&mut self) -> Vec<Packet> {
        core::iter::from_fn(|| self.link.dequeue()).collect()
    }
}

/// Run a future that never returns `Pending` to completion.
pub fn block_on<F: Future>(mut f: F) -> F::Output {
    fn noop_raw_waker() -> RawWaker {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            noop_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
    let mut cx = Context::from_waker(&waker);

    // SAFETY: We don't move f after pinning
    let mut f = unsafe { Pin::new_unchecked(&mut f) };

    match f.as_mut().poll(&mut cx) {
        Poll::Ready(result) => result,
        Poll::Pending => panic!("Mock future returned Pending unexpectedly"),
    }
}
