//! Persistent configuration and its flash image.

use deskswitch_proto::{OutputId, NUM_OUTPUTS, OUTPUT_A, OUTPUT_B};

/// Operating system hints for an output.
pub const OS_UNSUPPORTED: u8 = 0;
pub const OS_LINUX: u8 = 1;
pub const OS_MACOS: u8 = 2;
pub const OS_WINDOWS: u8 = 3;
pub const OS_ANDROID: u8 = 4;
pub const OS_OTHER: u8 = 255;

/// HID usage of the Pause key, the default output toggle hotkey.
pub const KEY_PAUSE: u8 = 0x48;

/// Default mouse speed factors.
pub const MOUSE_SPEED_X: i32 = 16;
pub const MOUSE_SPEED_Y: i32 = 28;

/// Image header magic ("DSKC", little-endian).
pub const CONFIG_MAGIC: u32 = u32::from_le_bytes(*b"DSKC");

/// Layout revision of [`Config::to_bytes`].
pub const CONFIG_FORMAT: u8 = 1;

const OUTPUT_IMAGE_LENGTH: usize = 13;

/// Size of a serialized [`Config`].
pub const CONFIG_IMAGE_LENGTH: usize = 4 + 1 + NUM_OUTPUTS * OUTPUT_IMAGE_LENGTH + 4 + 5;

/// Per-output settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputConfig {
    /// Output this entry describes.
    pub number: u32,
    pub speed_x: i32,
    pub speed_y: i32,
    /// One of the `OS_*` constants.
    pub os: u8,
}

impl OutputConfig {
    const fn new(number: OutputId, os: u8) -> Self {
        Self {
            number: number as u32,
            speed_x: MOUSE_SPEED_X,
            speed_y: MOUSE_SPEED_Y,
            os,
        }
    }
}

/// User configuration, persisted by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub output: [OutputConfig; NUM_OUTPUTS],
    /// User-assigned config revision.
    pub version: u32,
    pub force_mouse_boot_mode: bool,
    pub force_kbd_boot_protocol: bool,
    /// Drive keyboard LEDs as an active-output indicator.
    pub kbd_led_as_indicator: bool,
    /// HID usage that toggles the active output.
    pub hotkey_toggle: u8,
    pub enforce_ports: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: [
                OutputConfig::new(OUTPUT_A, OS_WINDOWS),
                OutputConfig::new(OUTPUT_B, OS_LINUX),
            ],
            version: 0,
            force_mouse_boot_mode: false,
            force_kbd_boot_protocol: false,
            kbd_led_as_indicator: false,
            hotkey_toggle: KEY_PAUSE,
            enforce_ports: false,
        }
    }
}

/// Error decoding a stored configuration image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Fewer than [`CONFIG_IMAGE_LENGTH`] bytes.
    TooShort,
    /// Header magic mismatch (erased or foreign data).
    BadMagic,
    /// Image written by an incompatible layout revision.
    UnsupportedFormat(u8),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooShort => f.write_str("config image too short"),
            Self::BadMagic => f.write_str("config image magic mismatch"),
            Self::UnsupportedFormat(v) => write!(f, "unsupported config format {v}"),
        }
    }
}

impl Config {
    /// Serialize into a fixed little-endian image.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CONFIG_IMAGE_LENGTH] {
        let mut buf = [0u8; CONFIG_IMAGE_LENGTH];
        let mut w = Writer { buf: &mut buf, pos: 0 };

        w.put(&CONFIG_MAGIC.to_le_bytes());
        w.put(&[CONFIG_FORMAT]);
        for out in &self.output {
            w.put(&out.number.to_le_bytes());
            w.put(&out.speed_x.to_le_bytes());
            w.put(&out.speed_y.to_le_bytes());
            w.put(&[out.os]);
        }
        w.put(&self.version.to_le_bytes());
        w.put(&[
            self.force_mouse_boot_mode as u8,
            self.force_kbd_boot_protocol as u8,
            self.kbd_led_as_indicator as u8,
            self.hotkey_toggle,
            self.enforce_ports as u8,
        ]);
        buf
    }

    /// Parse an image produced by [`Config::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the image is truncated, erased, or from an
    /// incompatible layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        if data.len() < CONFIG_IMAGE_LENGTH {
            return Err(ConfigError::TooShort);
        }
        let mut r = Reader { buf: data, pos: 0 };

        if r.u32() != CONFIG_MAGIC {
            return Err(ConfigError::BadMagic);
        }
        let format = r.u8();
        if format != CONFIG_FORMAT {
            return Err(ConfigError::UnsupportedFormat(format));
        }

        let mut output = Self::default().output;
        for out in &mut output {
            out.number = r.u32();
            out.speed_x = r.u32() as i32;
            out.speed_y = r.u32() as i32;
            out.os = r.u8();
        }

        Ok(Self {
            output,
            version: r.u32(),
            force_mouse_boot_mode: r.u8() != 0,
            force_kbd_boot_protocol: r.u8() != 0,
            kbd_led_as_indicator: r.u8() != 0,
            hotkey_toggle: r.u8(),
            enforce_ports: r.u8() != 0,
        })
    }
}

/// Identity of the running firmware image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareInfo {
    pub version: u16,
    pub checksum: u32,
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

// Callers check the total length up front.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u32(&mut self) -> u32 {
        let b = &self.buf[self.pos..self.pos + 4];
        self.pos += 4;
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}
