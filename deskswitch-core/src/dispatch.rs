//! Packet dispatch: maps each received packet type to its handler.
//!
//! Handlers never report failure. Anything malformed or not applicable is
//! dropped, and unknown tags are ignored.

use deskswitch_proto::{
    is_valid_output, KeyboardReport, MouseReport, Packet, PacketType, CONSUMER_CONTROL_LENGTH,
};

use crate::fields;
use crate::keyboard::{queue_keyboard_report, release_all_keys};
use crate::platform::Platform;
use crate::queue::HidReport;
use crate::state::{DeviceState, PeerInfo};
use crate::switch::restore_leds;

/// Nesting limit for PROXY packets, counting the outer wrapper.
pub const MAX_PROXY_DEPTH: usize = 4;

/// Handle one packet received from the peer or the host.
pub fn dispatch<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    let Some(kind) = packet.packet_type() else {
        trace!("ignoring unknown packet tag {}", packet.tag);
        return;
    };
    trace!("rx {:?}", kind);

    match kind {
        PacketType::KeyboardReport => handle_keyboard(state, packet),
        PacketType::MouseAbs => handle_mouse(state, packet),
        PacketType::OutputSelect => handle_output_select(state, packet),
        PacketType::SetReport => handle_set_report(state, packet),
        PacketType::FlashLed => state.platform.blink_led(),
        PacketType::WipeConfig => handle_wipe_config(state),
        PacketType::Heartbeat => handle_heartbeat(state, packet),
        PacketType::ToggleGaming => state.gaming_mode = packet.data[0] != 0,
        PacketType::ConsumerControl => {
            let mut report = [0u8; CONSUMER_CONTROL_LENGTH];
            report.copy_from_slice(&packet.data[..CONSUMER_CONTROL_LENGTH]);
            state.outbox.queue_hid(HidReport::Consumer(report));
        }
        PacketType::SystemControl => {
            state.outbox.queue_hid(HidReport::System(packet.data[0]));
        }
        PacketType::SaveConfig => {
            if let Err(e) = state.platform.save_config(&state.config) {
                warn!("config save failed: {:?}", e);
            }
        }
        PacketType::Reboot => {
            state.shared.request_reboot();
            state.platform.reboot();
        }
        PacketType::GetVal => handle_get_val(state, packet.data[0]),
        PacketType::SetVal => {
            fields::set_value(state, &packet.data);
        }
        PacketType::GetAllVals => {
            for position in 0..fields::len() {
                let index = fields::lookup_by_position(position).index;
                handle_get_val(state, index);
            }
        }
        PacketType::Proxy => handle_proxy(state, packet),
    }
}

/// Number of PROXY wrappers at the front of `packet`, the packet itself included.
fn proxy_depth(packet: &Packet) -> usize {
    let proxy = PacketType::Proxy.tag();
    if packet.tag != proxy {
        return 0;
    }
    1 + packet.data.iter().take_while(|&&tag| tag == proxy).count()
}

/// Unwrap the inner packet and send it to the peer, where it is handled as
/// if it had originated there. This is how the host reaches the other board.
fn handle_proxy<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    if proxy_depth(packet) >= MAX_PROXY_DEPTH {
        warn!("proxy nesting too deep, dropped");
        return;
    }
    let inner = Packet::from_tag(packet.data[0], &packet.data[1..]);
    state.outbox.send_packet(inner);
}

/// Merge the peer's keyboard state and deliver the union to our host.
fn handle_keyboard<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    let Some(report) = KeyboardReport::from_bytes(&packet.data) else {
        return;
    };
    state.keyboards.update_remote(&report);
    let combined = state.keyboards.combine();
    queue_keyboard_report(state, &combined);
    state.touch();
}

fn handle_mouse<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    let Some(report) = MouseReport::from_bytes(&packet.data) else {
        return;
    };
    state.outbox.queue_hid(HidReport::Mouse(report));
    state.mouse_buttons = report.buttons;
    state.touch();
}

/// The peer switched outputs. Follow it without echoing back.
fn handle_output_select<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    let output = packet.data[0];
    if !is_valid_output(output) {
        return;
    }
    state.active_output = output;
    if state.usb_connected {
        release_all_keys(state);
    }
    restore_leds(state);
}

/// LED state from the peer's host, stored under the peer's output.
fn handle_set_report<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    let other = state.other_role() as usize;
    if let Some(slot) = state.keyboard_leds.get_mut(other) {
        *slot = packet.data[0];
    }
    if state.keyboard_connected && !state.is_active() {
        restore_leds(state);
    }
}

fn handle_wipe_config<P: Platform>(state: &mut DeviceState<'_, P>) {
    if let Err(e) = state.platform.wipe_config() {
        warn!("config wipe failed: {:?}", e);
    }
    state.reload_config();
}

fn handle_heartbeat<P: Platform>(state: &mut DeviceState<'_, P>, packet: &Packet) {
    state.peer = Some(PeerInfo {
        firmware_version: packet.word(0),
        active_output: packet.word(2) as u8,
        last_seen_us: state.now(),
    });
}

/// Reply to the host on the vendor interface.
fn handle_get_val<P: Platform>(state: &mut DeviceState<'_, P>, index: u8) {
    if let Some(reply) = fields::get_value(state, index) {
        state.outbox.queue_hid(HidReport::Vendor(reply.encode_framed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::switch::set_active_output;
    use crate::testing::{Harness, TEST_FIRMWARE};
    use deskswitch_proto::{OUTPUT_A, OUTPUT_B};

    const KEY_A: u8 = 0x04;
    const KEY_B: u8 = 0x05;
    const KEY_C: u8 = 0x06;

    fn vendor_reply(index: u8, value: &[u8]) -> HidReport {
        let mut payload = [0u8; 8];
        payload[0] = index;
        payload[1..1 + value.len()].copy_from_slice(value);
        HidReport::Vendor(Packet::new(PacketType::GetVal, &payload).encode_framed())
    }

    #[test]
    fn test_remote_keyboard_merged_with_local() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.platform.now = 77;
        rig.state
            .keyboards
            .update_local(0, &KeyboardReport::with_keys(0x01, &[KEY_A]));
        rig.state
            .keyboards
            .update_local(1, &KeyboardReport::with_keys(0x02, &[KEY_B]));
        rig.state
            .keyboards
            .update_local(2, &KeyboardReport::with_keys(0x00, &[KEY_A]));

        let remote = KeyboardReport::with_keys(0x04, &[KEY_C]);
        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::KeyboardReport, &remote.to_bytes()),
        );

        assert_eq!(
            rig.hid_reports(),
            [HidReport::Keyboard(KeyboardReport::with_keys(
                0x07,
                &[KEY_A, KEY_B, KEY_C]
            ))]
        );
        assert_eq!(rig.state.last_activity[OUTPUT_A as usize], 77);
    }

    #[test]
    fn test_mouse_queued_and_buttons_tracked() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        let mouse = MouseReport {
            buttons: 0x03,
            x: 1000,
            y: -1,
            ..MouseReport::default()
        };
        dispatch(&mut rig.state, &Packet::new(PacketType::MouseAbs, &mouse.to_bytes()));
        assert_eq!(rig.hid_reports(), [HidReport::Mouse(mouse)]);
        assert_eq!(rig.state.mouse_buttons, 0x03);
    }

    #[test]
    fn test_output_select_does_not_echo() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        dispatch(&mut rig.state, &Packet::new(PacketType::OutputSelect, &[OUTPUT_B]));

        assert_eq!(rig.state.active_output, OUTPUT_B);
        assert!(rig.packets().is_empty());
        assert_eq!(rig.hid_reports(), [HidReport::Keyboard(KeyboardReport::EMPTY)]);
        assert_eq!(rig.state.platform.onboard_led, Some(true));
    }

    #[test]
    fn test_output_select_invalid_ignored() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        dispatch(&mut rig.state, &Packet::new(PacketType::OutputSelect, &[7]));
        assert_eq!(rig.state.active_output, OUTPUT_A);
    }

    #[test]
    fn test_output_select_without_usb_keeps_queue_empty() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();
        rig.state.usb_connected = false;
        dispatch(&mut rig.state, &Packet::new(PacketType::OutputSelect, &[OUTPUT_B]));
        assert!(rig.hid_reports().is_empty());
    }

    #[test]
    fn test_set_report_stored_for_peer() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.keyboard_connected = true;
        rig.state.active_output = OUTPUT_B;

        dispatch(&mut rig.state, &Packet::new(PacketType::SetReport, &[0x02]));

        assert_eq!(rig.state.keyboard_leds, [0, 0x02]);
        assert_eq!(rig.state.platform.keyboard_leds, [0x02]);
    }

    #[test]
    fn test_set_report_while_active_only_stores() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.keyboard_connected = true;
        dispatch(&mut rig.state, &Packet::new(PacketType::SetReport, &[0x01]));
        assert_eq!(rig.state.keyboard_leds, [0, 0x01]);
        assert!(rig.state.platform.keyboard_leds.is_empty());
    }

    #[test]
    fn test_platform_commands() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();

        dispatch(&mut rig.state, &Packet::from(PacketType::FlashLed));
        rig.state.config.version = 9;
        dispatch(&mut rig.state, &Packet::from(PacketType::SaveConfig));
        assert_eq!(rig.state.platform.stored.map(|c| c.version), Some(9));

        dispatch(&mut rig.state, &Packet::from(PacketType::WipeConfig));
        assert_eq!(rig.state.config, Config::default());
        assert_eq!(rig.state.platform.stored, None);

        dispatch(&mut rig.state, &Packet::from(PacketType::Reboot));
        assert!(rig.state.reboot_requested());

        let p = &rig.state.platform;
        assert_eq!((p.blinks, p.saves, p.wipes, p.reboots), (1, 1, 1, 1));
    }

    #[test]
    fn test_controls_forwarded_to_host() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::ConsumerControl, &[0xE2, 0x00, 0, 0, 9]),
        );
        dispatch(&mut rig.state, &Packet::new(PacketType::SystemControl, &[0x82]));
        assert_eq!(
            rig.hid_reports(),
            [HidReport::Consumer([0xE2, 0, 0, 0]), HidReport::System(0x82)]
        );
    }

    #[test]
    fn test_gaming_and_heartbeat() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.platform.now = 5_000;

        dispatch(&mut rig.state, &Packet::new(PacketType::ToggleGaming, &[1]));
        assert!(rig.state.gaming_mode);

        let mut hb = Packet::from(PacketType::Heartbeat);
        hb.set_word(0, 0x0203);
        hb.set_word(2, OUTPUT_B as u16);
        dispatch(&mut rig.state, &hb);
        assert_eq!(
            rig.state.peer,
            Some(PeerInfo {
                firmware_version: 0x0203,
                active_output: OUTPUT_B,
                last_seen_us: 5_000,
            })
        );
    }

    #[test]
    fn test_peer_version_readable_after_heartbeat() {
        let mut h = Harness::new(OUTPUT_B);
        let mut rig = h.rig();

        dispatch(&mut rig.state, &Packet::new(PacketType::GetVal, &[84]));
        assert_eq!(rig.hid_reports(), [vendor_reply(84, &[0, 0])]);

        let mut hb = Packet::from(PacketType::Heartbeat);
        hb.set_word(0, 0x0305);
        dispatch(&mut rig.state, &hb);
        dispatch(&mut rig.state, &Packet::new(PacketType::GetVal, &[84]));
        assert_eq!(rig.hid_reports(), [vendor_reply(84, &[0x05, 0x03])]);
    }

    #[test]
    fn test_get_val_after_switches() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        set_active_output(&mut rig.state, OUTPUT_B);
        set_active_output(&mut rig.state, OUTPUT_A);
        rig.hid_reports();

        dispatch(&mut rig.state, &Packet::new(PacketType::GetVal, &[0]));
        assert_eq!(rig.hid_reports(), [vendor_reply(0, &[OUTPUT_A])]);
    }

    #[test]
    fn test_set_val_read_only_ignored() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        dispatch(&mut rig.state, &Packet::new(PacketType::SetVal, &[78, 0xFF, 0xFF]));
        dispatch(&mut rig.state, &Packet::new(PacketType::SetVal, &[0, 1]));
        assert_eq!(rig.state.firmware, TEST_FIRMWARE);
        assert_eq!(rig.state.active_output, OUTPUT_A);

        dispatch(&mut rig.state, &Packet::new(PacketType::SetVal, &[74, 0x68]));
        assert_eq!(rig.state.config.hotkey_toggle, 0x68);
    }

    #[test]
    fn test_get_all_walks_table_in_order() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        dispatch(&mut rig.state, &Packet::from(PacketType::GetAllVals));

        let replies = rig.hid_reports();
        assert_eq!(replies.len(), fields::len());
        assert_eq!(replies[0], vendor_reply(0, &[OUTPUT_A]));
        assert_eq!(replies[fields::len() - 1], vendor_reply(84, &[0, 0]));
    }

    #[test]
    fn test_proxy_forwards_inner_packet_to_peer() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::Proxy, &[PacketType::FlashLed.tag()]),
        );
        assert_eq!(rig.state.platform.blinks, 0);
        assert_eq!(rig.packets(), [Packet::from(PacketType::FlashLed)]);

        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::Proxy, &[PacketType::GetVal.tag(), 78]),
        );
        assert!(rig.hid_reports().is_empty());
        assert_eq!(rig.packets(), [Packet::new(PacketType::GetVal, &[78])]);
    }

    #[test]
    fn test_proxy_depth_capped() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        let proxy = PacketType::Proxy.tag();
        let flash = PacketType::FlashLed.tag();

        // Three wrappers go out with one stripped, four are dropped.
        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::Proxy, &[proxy, proxy, flash]),
        );
        assert_eq!(rig.packets(), [Packet::from_tag(proxy, &[proxy, flash])]);

        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::Proxy, &[proxy, proxy, proxy, flash]),
        );
        assert!(rig.packets().is_empty());
        assert_eq!(rig.state.platform.blinks, 0);
    }

    #[test]
    fn test_null_mode_blocks_peer_keyboard() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        rig.state.null_mode = true;

        let remote = KeyboardReport::with_keys(0, &[KEY_A]);
        dispatch(
            &mut rig.state,
            &Packet::new(PacketType::KeyboardReport, &remote.to_bytes()),
        );
        assert!(rig.hid_reports().is_empty());
        assert_eq!(rig.state.keyboards.remote(), &remote);
    }

    #[test]
    fn test_unknown_tag_ignored() {
        let mut h = Harness::new(OUTPUT_A);
        let mut rig = h.rig();
        dispatch(&mut rig.state, &Packet::from_tag(0x42, &[1, 2, 3]));
        assert!(rig.hid_reports().is_empty());
        assert!(rig.packets().is_empty());
    }
}
