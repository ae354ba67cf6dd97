//! Active output transitions and LED indication.

use deskswitch_proto::{is_valid_output, other_output, OutputId, PacketType, OUTPUT_B};

use crate::keyboard::release_all_keys;
use crate::platform::Platform;
use crate::state::DeviceState;

/// Num Lock, Caps Lock and Scroll Lock.
pub const LED_INDICATOR_MASK: u8 = 0x07;

/// Make `new_output` the active output and tell the peer.
///
/// Records the output, restores LEDs, sends OUTPUT_SELECT and releases every
/// held key so nothing stays stuck on the previous host. Selecting the current
/// output repeats all of it. Ids outside the fixed output set are ignored.
pub fn set_active_output<P: Platform>(state: &mut DeviceState<'_, P>, new_output: OutputId) {
    if !is_valid_output(new_output) {
        warn!("ignoring switch to invalid output {}", new_output);
        return;
    }
    debug!("active output -> {}", new_output);

    state.active_output = new_output;
    restore_leds(state);
    state.outbox.send_value(PacketType::OutputSelect, new_output);
    release_all_keys(state);
}

/// Switch to whichever output is not active.
pub fn toggle_output<P: Platform>(state: &mut DeviceState<'_, P>) {
    let next = other_output(state.active_output);
    set_active_output(state, next);
}

/// Bring LEDs in line with the active output.
///
/// The on-board LED is lit while this board is active. A locally attached
/// keyboard shows either the active host's lock state or, in indicator mode,
/// all lock LEDs while output B is active.
pub fn restore_leds<P: Platform>(state: &mut DeviceState<'_, P>) {
    let active = state.is_active();
    state.platform.set_onboard_led(active);

    if !state.keyboard_connected {
        return;
    }

    let leds = if state.config.kbd_led_as_indicator {
        if state.active_output == OUTPUT_B {
            LED_INDICATOR_MASK
        } else {
            0
        }
    } else {
        state
            .keyboard_leds
            .get(state.active_output as usize)
            .copied()
            .unwrap_or(0)
    };
    state.platform.set_keyboard_leds(leds);
}
