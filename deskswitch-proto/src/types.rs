//! HID report payloads carried over the link: keyboard, absolute mouse,
//! consumer and system control.

/// Output identifier. Output A is `0`, output B is `1`.
pub type OutputId = u8;

/// First output (board A drives it).
pub const OUTPUT_A: OutputId = 0;

/// Second output (board B drives it).
pub const OUTPUT_B: OutputId = 1;

/// Number of outputs in the base design.
pub const NUM_OUTPUTS: usize = 2;

/// Maximum simultaneous key codes in a boot-protocol keyboard report.
pub const KEYS_IN_REPORT: usize = 6;

/// Keyboard report size in bytes.
pub const KBD_REPORT_LENGTH: usize = 8;

/// Absolute mouse report size in bytes.
pub const MOUSE_REPORT_LENGTH: usize = 8;

/// Consumer control report size in bytes.
pub const CONSUMER_CONTROL_LENGTH: usize = 4;

/// System control report size in bytes.
pub const SYSTEM_CONTROL_LENGTH: usize = 1;

/// Returns `true` if `output` names one of the fixed outputs.
#[inline]
#[must_use]
pub const fn is_valid_output(output: OutputId) -> bool {
    (output as usize) < NUM_OUTPUTS
}

/// The output that is not `output`.
#[inline]
#[must_use]
pub const fn other_output(output: OutputId) -> OutputId {
    output ^ 1
}

/// Standard USB HID boot-protocol keyboard report.
///
/// Layout (8 bytes):
/// ```text
/// Byte 0: Modifier keys (bitfield)
/// Byte 1: Reserved (0x00)
/// Byte 2-7: Up to 6 simultaneous key codes
/// ```
///
/// Invariant kept by every mutator in this crate: no nonzero key code
/// appears twice and unused slots are zero.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte.
    pub reserved: u8,
    /// Pressed key codes, zero means empty slot.
    pub keycodes: [u8; KEYS_IN_REPORT],
}

impl KeyboardReport {
    /// All keys released.
    pub const EMPTY: Self = Self {
        modifier: 0,
        reserved: 0,
        keycodes: [0; KEYS_IN_REPORT],
    };

    /// Build a report from a modifier mask and a list of keys.
    ///
    /// Duplicates and zero codes are skipped, keys past capacity are dropped.
    #[must_use]
    pub fn with_keys(modifier: u8, keys: &[u8]) -> Self {
        let mut report = Self {
            modifier,
            ..Self::EMPTY
        };
        for &key in keys {
            report.press(key);
        }
        report
    }

    /// Parse from raw report bytes. Returns `None` if `data` is too short.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < KBD_REPORT_LENGTH {
            return None;
        }
        Some(Self {
            modifier: data[0],
            reserved: data[1],
            keycodes: [data[2], data[3], data[4], data[5], data[6], data[7]],
        })
    }

    /// Serialize into the 8-byte wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KBD_REPORT_LENGTH] {
        let mut buf = [0u8; KBD_REPORT_LENGTH];
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..].copy_from_slice(&self.keycodes);
        buf
    }

    /// Check whether `key` is present in the report.
    ///
    /// Zero is never reported as pressed.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: u8) -> bool {
        key != 0 && self.keycodes.contains(&key)
    }

    /// Add `key` to the first free slot.
    ///
    /// Returns `false` if the key is zero, already present, or the report is full.
    pub fn press(&mut self, key: u8) -> bool {
        if key == 0 || self.contains(key) {
            return false;
        }
        match self.keycodes.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = key;
                true
            }
            None => false,
        }
    }

    /// Number of occupied key slots.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keycodes.iter().filter(|&&k| k != 0).count()
    }

    /// Returns `true` if no keys or modifiers are pressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

/// Absolute-position mouse report exchanged between boards.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i16,
    pub y: i16,
    pub wheel: i8,
    pub pan: i8,
    pub mode: u8,
}

impl MouseReport {
    /// Parse from raw report bytes. Returns `None` if `data` is too short.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < MOUSE_REPORT_LENGTH {
            return None;
        }
        Some(Self {
            buttons: data[0],
            x: i16::from_le_bytes([data[1], data[2]]),
            y: i16::from_le_bytes([data[3], data[4]]),
            wheel: data[5] as i8,
            pan: data[6] as i8,
            mode: data[7],
        })
    }

    /// Serialize into the 8-byte wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MOUSE_REPORT_LENGTH] {
        let x = self.x.to_le_bytes();
        let y = self.y.to_le_bytes();
        [
            self.buttons,
            x[0],
            x[1],
            y[0],
            y[1],
            self.wheel as u8,
            self.pan as u8,
            self.mode,
        ]
    }
}
