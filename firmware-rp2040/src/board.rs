//! Board services: config storage in flash, LEDs, deferred reset and the
//! hardware watchdog.

use deskswitch_core::config::CONFIG_IMAGE_LENGTH;
use deskswitch_core::{Config, InputEvent, Platform, StorageError, Watchdog};
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::{FLASH, WATCHDOG};
use embassy_rp::watchdog::Watchdog as RpHardwareWatchdog;
use embassy_rp::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

/// Size of the QSPI flash on the Pico.
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// The config lives in the last erase sector, which `memory.x` keeps free.
pub const CONFIG_OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;

/// Smallest programmable unit used for config writes.
const PAGE_SIZE: usize = 256;

/// The watchdog resets the chip if not fed within this time.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(500);

const BLINK_TIME: Duration = Duration::from_millis(120);

/// Request for the LED task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum LedCommand {
    Set(bool),
    Blink,
}

pub static LED_COMMANDS: Channel<CriticalSectionRawMutex, LedCommand, 4> = Channel::new();

/// LED byte for locally attached keyboards, picked up by the USB host stack.
pub static KEYBOARD_LEDS: Signal<CriticalSectionRawMutex, u8> = Signal::new();

/// Events from devices attached to this board, produced by the USB host stack.
pub static LOCAL_INPUT: Channel<CriticalSectionRawMutex, InputEvent, 16> = Channel::new();

pub type BoardFlash = Flash<'static, FLASH, Blocking, FLASH_SIZE>;

/// [`Platform`] implementation for the RP2040.
pub struct RpPlatform {
    flash: BoardFlash,
}

impl RpPlatform {
    #[must_use]
    pub fn new(flash: BoardFlash) -> Self {
        Self { flash }
    }

    fn led(command: LedCommand) {
        if LED_COMMANDS.try_send(command).is_err() {
            defmt::trace!("LED queue full");
        }
    }
}

impl Platform for RpPlatform {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }

    fn set_onboard_led(&mut self, on: bool) {
        Self::led(LedCommand::Set(on));
    }

    fn set_keyboard_leds(&mut self, leds: u8) {
        KEYBOARD_LEDS.signal(leds);
    }

    fn blink_led(&mut self) {
        Self::led(LedCommand::Blink);
    }

    fn load_config(&mut self) -> Option<Config> {
        let mut image = [0u8; CONFIG_IMAGE_LENGTH];
        if let Err(e) = self.flash.blocking_read(CONFIG_OFFSET, &mut image) {
            defmt::warn!("config read failed: {:?}", e);
            return None;
        }
        match Config::from_bytes(&image) {
            Ok(config) => Some(config),
            Err(e) => {
                defmt::info!("no stored config ({:?}), using defaults", e);
                None
            }
        }
    }

    fn save_config(&mut self, config: &Config) -> Result<(), StorageError> {
        let mut page = [0xFFu8; PAGE_SIZE];
        page[..CONFIG_IMAGE_LENGTH].copy_from_slice(&config.to_bytes());

        self.wipe_config()?;
        self.flash
            .blocking_write(CONFIG_OFFSET, &page)
            .map_err(|e| {
                defmt::error!("config write failed: {:?}", e);
                StorageError::Io
            })
    }

    fn wipe_config(&mut self) -> Result<(), StorageError> {
        self.flash
            .blocking_erase(CONFIG_OFFSET, CONFIG_OFFSET + ERASE_SIZE as u32)
            .map_err(|e| {
                defmt::error!("config erase failed: {:?}", e);
                StorageError::Io
            })
    }

    /// The reset is left to the watchdog, which the other core stops feeding
    /// once a reboot is requested. Queued packets still go out meanwhile.
    fn reboot(&mut self) {
        defmt::info!("reboot requested, waiting for watchdog");
    }
}

/// Hardware watchdog, started on creation.
pub struct RpWatchdog {
    inner: RpHardwareWatchdog,
}

impl RpWatchdog {
    #[must_use]
    pub fn start(peripheral: Peri<'static, WATCHDOG>) -> Self {
        let mut inner = RpHardwareWatchdog::new(peripheral);
        inner.pause_on_debug(true);
        inner.start(WATCHDOG_TIMEOUT);
        Self { inner }
    }
}

impl Watchdog for RpWatchdog {
    fn feed(&mut self) {
        self.inner.feed();
    }
}

/// Drive the on-board LED from [`LED_COMMANDS`].
pub async fn run_led(mut led: Output<'static>) -> ! {
    let mut lit = false;
    loop {
        match LED_COMMANDS.receive().await {
            LedCommand::Set(on) => {
                lit = on;
                led.set_level(on.into());
            }
            LedCommand::Blink => {
                led.set_level((!lit).into());
                Timer::after(BLINK_TIME).await;
                led.set_level(lit.into());
            }
        }
    }
}
