//! Bodies of the periodic tasks run by both cores.

use deskswitch_proto::{Packet, PacketReceiver, PacketType};

use crate::dispatch::dispatch;
use crate::platform::{LinkSink, Platform, ReportSink, Watchdog};
use crate::queue::{HidConsumer, LinkConsumer};
use crate::scheduler::Clock;
use crate::state::{DeviceState, Shared};

/// The watchdog is only fed while the USB context has checked in this recently.
pub const HANG_TIMEOUT_US: u64 = 500_000;

/// Record that the USB context is making progress.
pub fn mark_alive<P: Platform>(state: &mut DeviceState<'_, P>) {
    state.shared.mark_alive(state.now());
}

/// Announce our firmware version and active output to the peer.
pub fn heartbeat<P: Platform>(state: &mut DeviceState<'_, P>) {
    let mut packet = Packet::from(PacketType::Heartbeat);
    packet.set_word(0, state.firmware.version);
    packet.set_word(2, u16::from(state.active_output));
    state.outbox.send_packet(packet);
}

/// Take at most one packet off the receive ring and dispatch it.
///
/// `poll` runs the receiver against the ring, typically while holding the
/// ring's lock. The packet is dispatched after `poll` returns.
pub fn receive_packet<P: Platform>(
    state: &mut DeviceState<'_, P>,
    poll: impl FnOnce(&mut PacketReceiver) -> Option<Packet>,
) {
    if let Some(packet) = poll(&mut state.receiver) {
        dispatch(state, &packet);
    }
}

/// Feed the watchdog if nothing is wrong.
///
/// The liveness stamp is read before the clock so a stamp written in between
/// can never look like it came from the future. Once a reboot is requested
/// the watchdog is starved on purpose. Returns whether it was fed.
pub fn kick_watchdog<W: Watchdog>(
    shared: &Shared,
    now_us: impl FnOnce() -> u64,
    watchdog: &mut W,
) -> bool {
    let last_pass = shared.last_pass();
    let now = now_us();

    if shared.reboot_requested() {
        return false;
    }
    if now.saturating_sub(last_pass) < HANG_TIMEOUT_US {
        watchdog.feed();
        return true;
    }
    false
}

/// Task context of the background core: it only looks after the watchdog.
pub struct WatchdogContext<'a, W> {
    pub shared: &'a Shared,
    pub watchdog: W,
    /// Monotonic microsecond clock.
    pub now_us: fn() -> u64,
}

impl<'a, W: Watchdog> WatchdogContext<'a, W> {
    pub fn new(shared: &'a Shared, watchdog: W, now_us: fn() -> u64) -> Self {
        Self {
            shared,
            watchdog,
            now_us,
        }
    }
}

impl<W> Clock for WatchdogContext<'_, W> {
    fn now_us(&self) -> u64 {
        (self.now_us)()
    }
}

/// Scheduler entry for [`kick_watchdog`].
pub fn watchdog_task<W: Watchdog>(ctx: &mut WatchdogContext<'_, W>) {
    kick_watchdog(ctx.shared, ctx.now_us, &mut ctx.watchdog);
}

/// Hand the oldest queued report to the host.
///
/// The report stays queued unless the sink accepts it, so it is retried on
/// the next pass. A suspended host is asked to wake up instead. Returns
/// whether a report was delivered.
pub async fn drain_hid<S: ReportSink>(
    queue: &mut HidConsumer<'_>,
    sink: &mut S,
    usb_connected: bool,
) -> bool {
    if !usb_connected || !sink.is_ready() {
        return false;
    }
    if queue.peek().is_none() {
        return false;
    }
    if sink.is_suspended() {
        sink.wake_host();
        return false;
    }
    let Some(report) = queue.peek().copied() else {
        return false;
    };
    match sink.send(&report).await {
        Ok(()) => {
            queue.dequeue();
            true
        }
        Err(e) => {
            trace!("HID send deferred: {:?}", e);
            false
        }
    }
}

/// Transmit the oldest queued packet to the peer.
///
/// Same retry rule as [`drain_hid`].
pub async fn drain_link<S: LinkSink>(queue: &mut LinkConsumer<'_>, sink: &mut S) -> bool {
    let Some(packet) = queue.peek().copied() else {
        return false;
    };
    match sink.send(&packet.encode_framed()).await {
        Ok(()) => {
            queue.dequeue();
            true
        }
        Err(e) => {
            warn!("link send failed: {:?}", e);
            false
        }
    }
}
