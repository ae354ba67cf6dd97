//! Remote field access: a numbered table of device state fields that the peer
//! or a configuration tool can read and write over the link.
//!
//! Values travel little-endian in the packet payload right after the field
//! index byte. Booleans read as `0`/`1`; any nonzero write sets them.

use deskswitch_proto::{OutputId, Packet, PacketType, OUTPUT_A, OUTPUT_B, PACKET_DATA_LENGTH};

use crate::state::DeviceState;

/// Storage type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldType {
    U8,
    U16,
    U32,
    I32,
}

impl FieldType {
    /// Width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::I32 => 4,
        }
    }
}

/// A device state location reachable through the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    ActiveOutput,
    MouseButtons,
    OutputNumber(OutputId),
    OutputSpeedX(OutputId),
    OutputSpeedY(OutputId),
    OutputOs(OutputId),
    ConfigVersion,
    ForceMouseBootMode,
    ForceKbdBootProtocol,
    KbdLedAsIndicator,
    HotkeyToggle,
    EnforcePorts,
    FirmwareVersion,
    FirmwareChecksum,
    KeyboardConnected,
    GamingMode,
    /// Firmware version from the peer's last heartbeat, 0 if none was seen.
    PeerFirmwareVersion,
}

/// One row of the field table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldEntry {
    pub index: u8,
    pub read_only: bool,
    pub ty: FieldType,
    pub width: usize,
    pub field: Field,
}

const fn entry(index: u8, read_only: bool, ty: FieldType, field: Field) -> FieldEntry {
    FieldEntry {
        index,
        read_only,
        ty,
        width: ty.width(),
        field,
    }
}

const RO: bool = true;
const RW: bool = false;

/// Every remotely accessible field, in wire order.
pub static FIELD_MAP: [FieldEntry; 21] = [
    entry(0, RO, FieldType::U8, Field::ActiveOutput),
    entry(3, RO, FieldType::U8, Field::MouseButtons),
    // Output A
    entry(10, RW, FieldType::U32, Field::OutputNumber(OUTPUT_A)),
    entry(12, RW, FieldType::I32, Field::OutputSpeedX(OUTPUT_A)),
    entry(13, RW, FieldType::I32, Field::OutputSpeedY(OUTPUT_A)),
    entry(16, RW, FieldType::U8, Field::OutputOs(OUTPUT_A)),
    // Output B
    entry(40, RW, FieldType::U32, Field::OutputNumber(OUTPUT_B)),
    entry(42, RW, FieldType::I32, Field::OutputSpeedX(OUTPUT_B)),
    entry(43, RW, FieldType::I32, Field::OutputSpeedY(OUTPUT_B)),
    entry(46, RW, FieldType::U8, Field::OutputOs(OUTPUT_B)),
    // Common config
    entry(70, RW, FieldType::U32, Field::ConfigVersion),
    entry(71, RW, FieldType::U8, Field::ForceMouseBootMode),
    entry(72, RW, FieldType::U8, Field::ForceKbdBootProtocol),
    entry(73, RW, FieldType::U8, Field::KbdLedAsIndicator),
    entry(74, RW, FieldType::U8, Field::HotkeyToggle),
    entry(76, RW, FieldType::U8, Field::EnforcePorts),
    // Firmware
    entry(78, RO, FieldType::U16, Field::FirmwareVersion),
    entry(79, RO, FieldType::U32, Field::FirmwareChecksum),
    entry(80, RO, FieldType::U8, Field::KeyboardConnected),
    entry(82, RO, FieldType::U8, Field::GamingMode),
    // Peer
    entry(84, RO, FieldType::U16, Field::PeerFirmwareVersion),
];

/// Find the entry with wire index `index`.
#[must_use]
pub fn lookup(index: u8) -> Option<&'static FieldEntry> {
    FIELD_MAP.iter().find(|e| e.index == index)
}

/// Entry at table position `position`, clamped to the last entry.
#[must_use]
pub fn lookup_by_position(position: usize) -> &'static FieldEntry {
    &FIELD_MAP[position.min(FIELD_MAP.len() - 1)]
}

/// Number of table entries.
#[must_use]
pub const fn len() -> usize {
    FIELD_MAP.len()
}

/// Largest field width; a value always fits after the index byte.
pub const MAX_FIELD_WIDTH: usize = PACKET_DATA_LENGTH - 1;

/// Raw little-endian bytes of a field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldBytes {
    buf: [u8; 4],
    len: usize,
}

impl FieldBytes {
    fn new(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len(),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

fn output_slot(output: OutputId) -> usize {
    (output as usize).min(deskswitch_proto::NUM_OUTPUTS - 1)
}

/// Read the current value of `field`.
#[must_use]
pub fn read<P>(state: &DeviceState<'_, P>, field: Field) -> FieldBytes {
    let config = &state.config;
    match field {
        Field::ActiveOutput => FieldBytes::new(&[state.active_output]),
        Field::MouseButtons => FieldBytes::new(&[state.mouse_buttons]),
        Field::OutputNumber(o) => FieldBytes::new(&config.output[output_slot(o)].number.to_le_bytes()),
        Field::OutputSpeedX(o) => FieldBytes::new(&config.output[output_slot(o)].speed_x.to_le_bytes()),
        Field::OutputSpeedY(o) => FieldBytes::new(&config.output[output_slot(o)].speed_y.to_le_bytes()),
        Field::OutputOs(o) => FieldBytes::new(&[config.output[output_slot(o)].os]),
        Field::ConfigVersion => FieldBytes::new(&config.version.to_le_bytes()),
        Field::ForceMouseBootMode => FieldBytes::new(&[config.force_mouse_boot_mode as u8]),
        Field::ForceKbdBootProtocol => FieldBytes::new(&[config.force_kbd_boot_protocol as u8]),
        Field::KbdLedAsIndicator => FieldBytes::new(&[config.kbd_led_as_indicator as u8]),
        Field::HotkeyToggle => FieldBytes::new(&[config.hotkey_toggle]),
        Field::EnforcePorts => FieldBytes::new(&[config.enforce_ports as u8]),
        Field::FirmwareVersion => FieldBytes::new(&state.firmware.version.to_le_bytes()),
        Field::FirmwareChecksum => FieldBytes::new(&state.firmware.checksum.to_le_bytes()),
        Field::KeyboardConnected => FieldBytes::new(&[state.keyboard_connected as u8]),
        Field::GamingMode => FieldBytes::new(&[state.gaming_mode as u8]),
        Field::PeerFirmwareVersion => {
            let version = state.peer.map_or(0, |peer| peer.firmware_version);
            FieldBytes::new(&version.to_le_bytes())
        }
    }
}

/// Overwrite `field` from little-endian `bytes`.
///
/// Only writable fields have an effect; `bytes` must hold at least the
/// field's width.
fn write<P>(state: &mut DeviceState<'_, P>, field: Field, bytes: &[u8]) {
    let u32_at = || u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let config = &mut state.config;
    match field {
        Field::OutputNumber(o) => config.output[output_slot(o)].number = u32_at(),
        Field::OutputSpeedX(o) => config.output[output_slot(o)].speed_x = u32_at() as i32,
        Field::OutputSpeedY(o) => config.output[output_slot(o)].speed_y = u32_at() as i32,
        Field::OutputOs(o) => config.output[output_slot(o)].os = bytes[0],
        Field::ConfigVersion => config.version = u32_at(),
        Field::ForceMouseBootMode => config.force_mouse_boot_mode = bytes[0] != 0,
        Field::ForceKbdBootProtocol => config.force_kbd_boot_protocol = bytes[0] != 0,
        Field::KbdLedAsIndicator => config.kbd_led_as_indicator = bytes[0] != 0,
        Field::HotkeyToggle => config.hotkey_toggle = bytes[0],
        Field::EnforcePorts => config.enforce_ports = bytes[0] != 0,
        Field::ActiveOutput
        | Field::MouseButtons
        | Field::FirmwareVersion
        | Field::FirmwareChecksum
        | Field::KeyboardConnected
        | Field::GamingMode
        | Field::PeerFirmwareVersion => {}
    }
}

/// Build the GET_VAL reply for wire index `index`, or `None` if unknown.
#[must_use]
pub fn get_value<P>(state: &DeviceState<'_, P>, index: u8) -> Option<Packet> {
    let entry = lookup(index)?;
    let value = read(state, entry.field);

    let mut payload = [0u8; PACKET_DATA_LENGTH];
    payload[0] = index;
    payload[1..1 + entry.width].copy_from_slice(value.as_slice());
    Some(Packet::new(PacketType::GetVal, &payload))
}

/// Apply a SET_VAL payload (`index`, then the value bytes).
///
/// Returns `true` if a field was written. Unknown indices and read-only
/// fields are left untouched.
pub fn set_value<P>(state: &mut DeviceState<'_, P>, payload: &[u8; PACKET_DATA_LENGTH]) -> bool {
    let Some(entry) = lookup(payload[0]) else {
        return false;
    };
    if entry.read_only {
        return false;
    }
    write(state, entry.field, &payload[1..1 + entry.width]);
    true
}
