//! Device state owned by the USB context, plus the few fields shared across cores.

use deskswitch_proto::{OutputId, PacketReceiver, NUM_OUTPUTS, OUTPUT_A};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::aggregator::KeyboardAggregator;
use crate::config::{Config, FirmwareInfo};
use crate::platform::Platform;
use crate::queue::Outbox;
use crate::scheduler::Clock;

/// Fields written by one core and read by the other.
///
/// These are the only cross-core state; everything else lives in
/// [`DeviceState`] and is touched by the USB context alone.
#[derive(Debug, Default)]
pub struct Shared {
    usb_last_pass: AtomicU64,
    reboot_requested: AtomicBool,
}

impl Shared {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            usb_last_pass: AtomicU64::new(0),
            reboot_requested: AtomicBool::new(false),
        }
    }

    /// Record that the USB context completed a loop pass at `now_us`.
    pub fn mark_alive(&self, now_us: u64) {
        self.usb_last_pass.store(now_us, Ordering::Release);
    }

    /// Timestamp of the last completed USB loop pass.
    #[must_use]
    pub fn last_pass(&self) -> u64 {
        self.usb_last_pass.load(Ordering::Acquire)
    }

    pub fn request_reboot(&self) {
        self.reboot_requested.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested.load(Ordering::Acquire)
    }
}

/// What the peer last told us about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerInfo {
    pub firmware_version: u16,
    pub active_output: OutputId,
    pub last_seen_us: u64,
}

/// Everything one board knows, for the lifetime of the firmware.
pub struct DeviceState<'q, P> {
    /// Output this board is wired to.
    pub role: OutputId,
    /// Output currently receiving keyboard and mouse input.
    pub active_output: OutputId,
    pub keyboards: KeyboardAggregator,
    /// Latest mouse button mask from the peer.
    pub mouse_buttons: u8,
    pub gaming_mode: bool,
    /// Kill switch: while set, no input is forwarded anywhere.
    pub null_mode: bool,
    /// A keyboard is attached to this board.
    pub keyboard_connected: bool,
    /// The host has configured our USB device.
    pub usb_connected: bool,
    pub last_activity: [u64; NUM_OUTPUTS],
    pub keyboard_leds: [u8; NUM_OUTPUTS],
    pub config: Config,
    pub firmware: FirmwareInfo,
    pub peer: Option<PeerInfo>,
    pub receiver: PacketReceiver,
    pub outbox: Outbox<'q>,
    pub shared: &'q Shared,
    pub platform: P,
}

impl<'q, P: Platform> DeviceState<'q, P> {
    /// Build the initial state, loading the stored config or falling back to defaults.
    pub fn new(
        role: OutputId,
        firmware: FirmwareInfo,
        outbox: Outbox<'q>,
        shared: &'q Shared,
        mut platform: P,
    ) -> Self {
        let config = platform.load_config().unwrap_or_default();
        Self {
            role,
            active_output: OUTPUT_A,
            keyboards: KeyboardAggregator::new(),
            mouse_buttons: 0,
            gaming_mode: false,
            null_mode: false,
            keyboard_connected: false,
            usb_connected: false,
            last_activity: [0; NUM_OUTPUTS],
            keyboard_leds: [0; NUM_OUTPUTS],
            config,
            firmware,
            peer: None,
            receiver: PacketReceiver::new(),
            outbox,
            shared,
            platform,
        }
    }

    /// Whether input should be delivered to this board's own host.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_output == self.role
    }

    /// The output on the far side of the link.
    #[inline]
    #[must_use]
    pub fn other_role(&self) -> OutputId {
        deskswitch_proto::other_output(self.role)
    }

    #[inline]
    #[must_use]
    pub fn now(&self) -> u64 {
        self.platform.now_us()
    }

    #[inline]
    #[must_use]
    pub fn reboot_requested(&self) -> bool {
        self.shared.reboot_requested()
    }

    /// Stamp local activity now.
    pub fn touch(&mut self) {
        let now = self.now();
        if let Some(slot) = self.last_activity.get_mut(self.role as usize) {
            *slot = now;
        }
    }

    /// Reload config from storage, or defaults if none is stored.
    pub fn reload_config(&mut self) {
        self.config = self.platform.load_config().unwrap_or_default();
    }
}

impl<P: Platform> Clock for DeviceState<'_, P> {
    fn now_us(&self) -> u64 {
        self.now()
    }
}
