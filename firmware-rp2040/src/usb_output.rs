//! USB HID device: keyboard, absolute mouse, consumer and system control, and
//! a vendor interface for the configuration protocol.
//!
//! Each report type gets its own HID interface so that no report IDs are
//! needed and the keyboard stays boot-protocol compatible.

use deskswitch_core::{HidReport, OutputError, ReportSink};
use deskswitch_proto::RAW_PACKET_LENGTH;
use embassy_futures::select::{select, Either};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};
use embassy_usb::class::hid::{
    Config as HidConfig, HidBootProtocol, HidReader, HidReaderWriter, HidSubclass, HidWriter,
    ReportId, RequestHandler, State,
};
use embassy_usb::control::OutResponse;
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Handler, UsbDevice};
use portable_atomic::{AtomicBool, Ordering};
use usbd_hid::descriptor::{
    KeyboardReport as KeyboardDescriptor, MediaKeyboardReport, SerializedDescriptor,
    SystemControlReport,
};

pub type UsbDriver = Driver<'static, USB>;

/// Absolute mouse report length on the wire (the mode byte stays internal).
pub const ABS_MOUSE_REPORT_LENGTH: usize = 7;

/// Consumer control usage length on the wire.
pub const CONSUMER_REPORT_LENGTH: usize = 2;

/// A report the host has not collected within this time is retried later.
const WRITE_TIMEOUT: Duration = Duration::from_millis(5);

/// Set while the host has the device configured.
pub static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Set while the host has suspended the bus.
pub static USB_SUSPENDED: AtomicBool = AtomicBool::new(false);

/// Raised when a report is waiting for a suspended host.
pub static WAKE_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Latest keyboard LED byte written by the host.
pub static HOST_LEDS: Signal<CriticalSectionRawMutex, u8> = Signal::new();

/// Absolute mouse: 5 buttons, 15-bit X/Y, wheel and horizontal pan.
pub const ABS_MOUSE_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    //
    // --- Buttons ---
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x05, //     Usage Maximum (Button 5)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x05, //     Report Count (5)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x03, //     Report Size (3)
    0x81, 0x03, //     Input (Constant) - padding
    //
    // --- Position ---
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x16, 0x00, 0x00, // Logical Minimum (0)
    0x26, 0xFF, 0x7F, // Logical Maximum (32767)
    0x95, 0x02, //     Report Count (2)
    0x75, 0x10, //     Report Size (16)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    //
    // --- Wheel ---
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x08, //     Report Size (8)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    //
    // --- Pan ---
    0x05, 0x0C, //     Usage Page (Consumer)
    0x0A, 0x38, 0x02, // Usage (AC Pan)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    //
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// Vendor interface: one framed link packet in each direction.
pub const VENDOR_DESCRIPTOR: &[u8] = &[
    0x06, 0x00, 0xFF, // Usage Page (Vendor Defined 0xFF00)
    0x09, 0x01, // Usage (0x01)
    0xA1, 0x01, // Collection (Application)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x75, 0x08, //   Report Size (8)
    0x95, RAW_PACKET_LENGTH as u8, // Report Count
    0x09, 0x02, //   Usage (0x02)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x09, 0x03, //   Usage (0x03)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0xC0, // End Collection
];

/// HID state storage for every interface, kept in one static.
pub struct HidStates {
    pub keyboard: State<'static>,
    pub mouse: State<'static>,
    pub consumer: State<'static>,
    pub system: State<'static>,
    pub vendor: State<'static>,
}

impl HidStates {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyboard: State::new(),
            mouse: State::new(),
            consumer: State::new(),
            system: State::new(),
            vendor: State::new(),
        }
    }
}

impl Default for HidStates {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks whether the host has configured or suspended the device.
pub struct DeviceStateHandler;

impl Handler for DeviceStateHandler {
    fn reset(&mut self) {
        USB_SUSPENDED.store(false, Ordering::Release);
    }

    fn configured(&mut self, configured: bool) {
        USB_CONFIGURED.store(configured, Ordering::Release);
        defmt::info!("USB configured: {}", configured);
    }

    fn suspended(&mut self, suspended: bool) {
        USB_SUSPENDED.store(suspended, Ordering::Release);
        defmt::debug!("USB suspended: {}", suspended);
    }
}

/// Receives keyboard LED output reports from the host.
pub struct KeyboardLedHandler;

impl RequestHandler for KeyboardLedHandler {
    fn get_report(&mut self, _id: ReportId, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    fn set_report(&mut self, _id: ReportId, data: &[u8]) -> OutResponse {
        if let Some(&leds) = data.last() {
            HOST_LEDS.signal(leds);
        }
        OutResponse::Accepted
    }

    fn set_idle_ms(&mut self, _id: Option<ReportId>, _duration_ms: u32) {}

    fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
        None
    }
}

/// Host-bound HID writers, one per interface.
pub struct UsbHidOutput {
    keyboard: HidWriter<'static, UsbDriver, 8>,
    mouse: HidWriter<'static, UsbDriver, ABS_MOUSE_REPORT_LENGTH>,
    consumer: HidWriter<'static, UsbDriver, CONSUMER_REPORT_LENGTH>,
    system: HidWriter<'static, UsbDriver, 1>,
    vendor: HidWriter<'static, UsbDriver, RAW_PACKET_LENGTH>,
}

impl ReportSink for UsbHidOutput {
    async fn send(&mut self, report: &HidReport) -> Result<(), OutputError> {
        let write = async {
            match report {
                HidReport::Keyboard(k) => self.keyboard.write(&k.to_bytes()).await,
                HidReport::Mouse(m) => {
                    self.mouse
                        .write(&m.to_bytes()[..ABS_MOUSE_REPORT_LENGTH])
                        .await
                }
                HidReport::Consumer(c) => self.consumer.write(&c[..CONSUMER_REPORT_LENGTH]).await,
                HidReport::System(usage) => self.system.write(&[*usage]).await,
                HidReport::Vendor(frame) => self.vendor.write(frame).await,
            }
        };

        match with_timeout(WRITE_TIMEOUT, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(EndpointError::Disabled)) => Err(OutputError::NotReady),
            Ok(Err(EndpointError::BufferOverflow)) => Err(OutputError::Io),
            Err(_) => Err(OutputError::Busy),
        }
    }

    fn is_ready(&self) -> bool {
        USB_CONFIGURED.load(Ordering::Acquire)
    }

    fn is_suspended(&self) -> bool {
        USB_SUSPENDED.load(Ordering::Acquire)
    }

    fn wake_host(&mut self) {
        WAKE_REQUEST.signal(());
    }
}

/// Run the USB stack, waking a suspended host when [`WAKE_REQUEST`] is raised.
pub async fn run_usb(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    loop {
        device.run_until_suspend().await;
        match select(device.wait_resume(), WAKE_REQUEST.wait()).await {
            Either::First(()) => {}
            Either::Second(()) => {
                if device.remote_wakeup().await.is_err() {
                    defmt::warn!("host refused remote wakeup");
                }
            }
        }
    }
}

fn hid_config(
    report_descriptor: &'static [u8],
    request_handler: Option<&'static mut dyn RequestHandler>,
    max_packet_size: u16,
) -> HidConfig<'static> {
    HidConfig {
        report_descriptor,
        request_handler,
        poll_ms: 1,
        max_packet_size,
        hid_subclass: HidSubclass::No,
        hid_boot_protocol: HidBootProtocol::None,
    }
}

/// Register every HID interface with the USB builder.
///
/// Returns the host-bound writers and the vendor interface reader that
/// carries configuration packets from the host.
pub fn configure_usb_hid(
    builder: &mut Builder<'static, UsbDriver>,
    states: &'static mut HidStates,
    led_handler: &'static mut KeyboardLedHandler,
) -> (UsbHidOutput, HidReader<'static, UsbDriver, RAW_PACKET_LENGTH>) {
    let keyboard_config = HidConfig {
        hid_subclass: HidSubclass::Boot,
        hid_boot_protocol: HidBootProtocol::Keyboard,
        ..hid_config(KeyboardDescriptor::desc(), Some(led_handler), 8)
    };
    let keyboard = HidWriter::new(builder, &mut states.keyboard, keyboard_config);

    let mouse = HidWriter::new(
        builder,
        &mut states.mouse,
        hid_config(ABS_MOUSE_DESCRIPTOR, None, 8),
    );
    let consumer = HidWriter::new(
        builder,
        &mut states.consumer,
        hid_config(MediaKeyboardReport::desc(), None, 8),
    );
    let system = HidWriter::new(
        builder,
        &mut states.system,
        hid_config(SystemControlReport::desc(), None, 8),
    );

    let vendor = HidReaderWriter::<_, RAW_PACKET_LENGTH, RAW_PACKET_LENGTH>::new(
        builder,
        &mut states.vendor,
        hid_config(VENDOR_DESCRIPTOR, None, 16),
    );
    let (vendor_reader, vendor_writer) = vendor.split();

    (
        UsbHidOutput {
            keyboard,
            mouse,
            consumer,
            system,
            vendor: vendor_writer,
        },
        vendor_reader,
    )
}
