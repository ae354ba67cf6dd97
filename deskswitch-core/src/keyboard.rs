//! Local input path: keyboards, mice, consumer/system controls and host LEDs.
//!
//! Input from devices attached to this board goes to the local host when this
//! board drives the active output, otherwise over the link to the peer.

use deskswitch_proto::{
    KeyboardReport, MouseReport, PacketType, CONSUMER_CONTROL_LENGTH, KBD_REPORT_LENGTH,
};

use crate::platform::Platform;
use crate::queue::HidReport;
use crate::state::DeviceState;
use crate::switch::{restore_leds, toggle_output};

/// HID usage of the Help key, which toggles null mode.
pub const HOTKEY_NULL_MODE: u8 = 0x75;

/// Something that happened on a device attached to this board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    /// Raw boot-protocol report from local keyboard `source`.
    Keyboard {
        source: u8,
        report: [u8; KBD_REPORT_LENGTH],
    },
    Mouse(MouseReport),
    Consumer([u8; CONSUMER_CONTROL_LENGTH]),
    System(u8),
    /// A keyboard was plugged in (`true`) or the last one removed.
    KeyboardAttached(bool),
}

/// Route one local input event.
pub fn process_input<P: Platform>(state: &mut DeviceState<'_, P>, event: &InputEvent) {
    match event {
        InputEvent::Keyboard { source, report } => {
            process_keyboard_report(state, usize::from(*source), report);
        }
        InputEvent::Mouse(report) => process_mouse_report(state, report),
        InputEvent::Consumer(report) => process_consumer_report(state, *report),
        InputEvent::System(usage) => process_system_report(state, *usage),
        InputEvent::KeyboardAttached(attached) => {
            state.keyboard_connected = *attached;
            if *attached {
                restore_leds(state);
            }
        }
    }
}

/// Queue a keyboard report for the host.
///
/// Dropped while USB is unconfigured or null mode is on, whether the report
/// came from a local keyboard or from the peer.
pub fn queue_keyboard_report<P: Platform>(state: &mut DeviceState<'_, P>, report: &KeyboardReport) {
    if !state.usb_connected || state.null_mode {
        return;
    }
    state.outbox.queue_hid(HidReport::Keyboard(*report));
}

/// Forget every held key and, unless null mode is on, tell the host.
pub fn release_all_keys<P: Platform>(state: &mut DeviceState<'_, P>) {
    state.keyboards.clear();
    queue_keyboard_report(state, &KeyboardReport::EMPTY);
}

/// Deliver the combined keyboard state to whichever host is active.
pub fn send_key<P: Platform>(state: &mut DeviceState<'_, P>) {
    let combined = state.keyboards.combine();

    if state.is_active() {
        queue_keyboard_report(state, &combined);
        state.touch();
    } else {
        state
            .outbox
            .send(PacketType::KeyboardReport, &combined.to_bytes());
    }
}

/// Handle a raw keyboard report from local keyboard `source`.
///
/// Reports shorter than a boot-protocol report are dropped, as is everything
/// once a reboot has been requested. The toggle and null-mode hotkeys are
/// consumed here and never reach a host.
pub fn process_keyboard_report<P: Platform>(
    state: &mut DeviceState<'_, P>,
    source: usize,
    raw: &[u8],
) {
    let Some(report) = KeyboardReport::from_bytes(raw) else {
        return;
    };
    if state.reboot_requested() {
        return;
    }

    state.keyboards.update_local(source, &report);

    if report.contains(state.config.hotkey_toggle) {
        toggle_output(state);
        return;
    }

    if report.contains(HOTKEY_NULL_MODE) {
        toggle_null_mode(state);
        return;
    }

    if state.null_mode {
        return;
    }
    send_key(state);
}

/// Flip null mode. Entering it releases held keys first.
pub fn toggle_null_mode<P: Platform>(state: &mut DeviceState<'_, P>) {
    if state.null_mode {
        state.null_mode = false;
        info!("null mode off");
    } else {
        release_all_keys(state);
        state.null_mode = true;
        info!("null mode on");
    }
}

/// Route a consumer control report (e.g. media keys).
pub fn process_consumer_report<P: Platform>(
    state: &mut DeviceState<'_, P>,
    report: [u8; CONSUMER_CONTROL_LENGTH],
) {
    if state.null_mode {
        return;
    }
    if state.is_active() {
        state.outbox.queue_hid(HidReport::Consumer(report));
        state.touch();
    } else {
        state.outbox.send(PacketType::ConsumerControl, &report);
    }
}

/// Route a system control usage (power, sleep, wake).
pub fn process_system_report<P: Platform>(state: &mut DeviceState<'_, P>, usage: u8) {
    if state.null_mode {
        return;
    }
    if state.is_active() {
        state.outbox.queue_hid(HidReport::System(usage));
        state.touch();
    } else {
        state.outbox.send_value(PacketType::SystemControl, usage);
    }
}

/// Route an absolute mouse report.
pub fn process_mouse_report<P: Platform>(state: &mut DeviceState<'_, P>, report: &MouseReport) {
    if state.null_mode {
        return;
    }
    if state.is_active() {
        state.outbox.queue_hid(HidReport::Mouse(*report));
        state.touch();
    } else {
        state.outbox.send(PacketType::MouseAbs, &report.to_bytes());
    }
}

/// Handle a keyboard LED output report from our own host.
///
/// The LED byte is stored for this board's output and mirrored to the peer,
/// which drives the LEDs when the keyboard is attached there.
pub fn process_host_leds<P: Platform>(state: &mut DeviceState<'_, P>, leds: u8) {
    if let Some(slot) = state.keyboard_leds.get_mut(state.role as usize) {
        *slot = leds;
    }
    state.outbox.send_value(PacketType::SetReport, leds);
    restore_leds(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEY_PAUSE;
    use crate::testing::Harness;
    use deskswitch_proto::{Packet, OUTPUT_A, OUTPUT_B};

    const KEY_A: u8 = 0x04;

    fn raw(modifier: u8, keys: &[u8]) -> [u8; KBD_REPORT_LENGTH] {
        KeyboardReport::with_keys(modifier, keys).to_bytes()
    }

    #[test]
    fn test_active_board_queues_locally() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.platform.now = 500;

        process_keyboard_report(&mut rig.state, 0, &raw(0x02, &[KEY_A]));

        assert_eq!(
            rig.hid_reports(),
            [HidReport::Keyboard(KeyboardReport::with_keys(0x02, &[KEY_A]))]
        );
        assert!(rig.packets().is_empty());
        assert_eq!(rig.state.last_activity[OUTPUT_A as usize], 500);
    }

    #[test]
    fn test_inactive_board_forwards_to_peer() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();

        process_keyboard_report(&mut rig.state, 1, &raw(0, &[KEY_A]));

        assert!(rig.hid_reports().is_empty());
        assert_eq!(
            rig.packets(),
            [Packet::new(PacketType::KeyboardReport, &raw(0, &[KEY_A]))]
        );
    }

    #[test]
    fn test_short_report_dropped() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        process_keyboard_report(&mut rig.state, 0, &[0, 0, KEY_A]);
        assert!(rig.hid_reports().is_empty());
    }

    #[test]
    fn test_reboot_pending_drops_input() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.shared.request_reboot();
        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_A]));
        assert!(rig.hid_reports().is_empty());
        assert!(rig.state.keyboards.combine().is_empty());
    }

    #[test]
    fn test_toggle_hotkey_switches_and_is_swallowed() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();

        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_PAUSE]));

        assert_eq!(rig.state.active_output, OUTPUT_B);
        // Only the release from the switch reaches the host.
        assert_eq!(
            rig.hid_reports(),
            [HidReport::Keyboard(KeyboardReport::EMPTY)]
        );
        assert_eq!(
            rig.packets(),
            [Packet::new(PacketType::OutputSelect, &[OUTPUT_B])]
        );
    }

    #[test]
    fn test_null_mode_blocks_everything() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();

        process_keyboard_report(&mut rig.state, 0, &raw(0, &[HOTKEY_NULL_MODE]));
        assert!(rig.state.null_mode);
        assert_eq!(
            rig.hid_reports(),
            [HidReport::Keyboard(KeyboardReport::EMPTY)]
        );

        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_A]));
        process_consumer_report(&mut rig.state, [0xE9, 0, 0, 0]);
        process_system_report(&mut rig.state, 0x82);
        process_mouse_report(&mut rig.state, &MouseReport::default());
        release_all_keys(&mut rig.state);
        assert!(rig.hid_reports().is_empty());
        assert!(rig.packets().is_empty());

        process_keyboard_report(&mut rig.state, 0, &raw(0, &[HOTKEY_NULL_MODE]));
        assert!(!rig.state.null_mode);
        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_A]));
        assert_eq!(rig.hid_reports().len(), 1);
    }

    #[test]
    fn test_usb_disconnected_drops_keyboard_reports() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.usb_connected = false;
        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_A]));
        assert!(rig.hid_reports().is_empty());
    }

    #[test]
    fn test_held_key_released_by_switch() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        process_keyboard_report(&mut rig.state, 0, &raw(0, &[KEY_A]));
        crate::switch::set_active_output(&mut rig.state, OUTPUT_B);
        assert!(rig.state.keyboards.combine().is_empty());
    }

    #[test]
    fn test_controls_and_mouse_routing() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        let mouse = MouseReport {
            buttons: 1,
            x: 100,
            y: 200,
            ..MouseReport::default()
        };

        process_consumer_report(&mut rig.state, [0xCD, 0, 0, 0]);
        process_system_report(&mut rig.state, 0x81);
        process_mouse_report(&mut rig.state, &mouse);
        assert_eq!(
            rig.packets(),
            [
                Packet::new(PacketType::ConsumerControl, &[0xCD, 0, 0, 0]),
                Packet::new(PacketType::SystemControl, &[0x81]),
                Packet::new(PacketType::MouseAbs, &mouse.to_bytes()),
            ]
        );

        rig.state.active_output = OUTPUT_B;
        process_system_report(&mut rig.state, 0x81);
        process_mouse_report(&mut rig.state, &mouse);
        assert_eq!(
            rig.hid_reports(),
            [HidReport::System(0x81), HidReport::Mouse(mouse)]
        );
    }

    #[test]
    fn test_host_leds_stored_and_mirrored() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        rig.state.keyboard_connected = true;
        rig.state.active_output = OUTPUT_B;

        process_host_leds(&mut rig.state, 0x02);

        assert_eq!(rig.state.keyboard_leds, [0, 0x02]);
        assert_eq!(rig.packets(), [Packet::new(PacketType::SetReport, &[0x02])]);
        assert_eq!(rig.state.platform.keyboard_leds, [0x02]);
    }

    #[test]
    fn test_input_events_routed() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.keyboard_leds = [0x01, 0];

        process_input(&mut rig.state, &InputEvent::KeyboardAttached(true));
        assert!(rig.state.keyboard_connected);
        assert_eq!(rig.state.platform.keyboard_leds, [0x01]);

        process_input(
            &mut rig.state,
            &InputEvent::Keyboard {
                source: 0,
                report: raw(0, &[KEY_A]),
            },
        );
        process_input(&mut rig.state, &InputEvent::System(0x83));
        assert_eq!(
            rig.hid_reports(),
            [
                HidReport::Keyboard(KeyboardReport::with_keys(0, &[KEY_A])),
                HidReport::System(0x83),
            ]
        );
    }
}
