#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use deskswitch_core::keyboard::process_host_leds;
use deskswitch_core::queue::{HidConsumer, LinkConsumer};
use deskswitch_core::tasks::{
    drain_hid, drain_link, heartbeat, mark_alive, receive_packet, watchdog_task, WatchdogContext,
};
use deskswitch_core::{
    dispatch, hz, process_input, run_tasks, DeviceState, HidQueue, LinkQueue, Outbox, Shared,
    Task, EVERY_PASS,
};
use deskswitch_proto::{Packet, PacketReceiver, RingBuffer, RAW_PACKET_LENGTH};
use deskswitch_rp2040::usb_output::UsbDriver;
use deskswitch_rp2040::{
    configure_usb_hid, firmware_info, pump_rx, run_led, run_usb, DeviceStateHandler, HidStates,
    KeyboardLedHandler, RpPlatform, RpWatchdog, UartLinkSink, UsbHidOutput, BOARD_ROLE,
    HOST_LEDS, LINK_BAUDRATE, LOCAL_INPUT, RX_RING, USB_CONFIGURED,
};
use embassy_executor::{Executor, Spawner};
use embassy_futures::yield_now;
use embassy_rp::bind_interrupts;
use embassy_rp::flash::Flash;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{UART0, USB};
use embassy_rp::uart::{Async, Config as UartConfig, Uart, UartRx};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use embassy_usb::class::hid::HidReader;
use embassy_usb::{Builder, Config as UsbConfig, UsbDevice};
use portable_atomic::Ordering;
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART0_IRQ => embassy_rp::uart::InterruptHandler<UART0>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

type State = DeviceState<'static, RpPlatform>;

/// Liveness and reboot flags shared by both cores.
static SHARED: Shared = Shared::new();

static HID_QUEUE: StaticCell<HidQueue> = StaticCell::new();
static LINK_QUEUE: StaticCell<LinkQueue> = StaticCell::new();

/// Packets the host sent on the vendor interface, dispatched by the device loop.
static CONFIG_PACKETS: Channel<CriticalSectionRawMutex, Packet, 4> = Channel::new();

static CORE1_STACK: StaticCell<Stack<4096>> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

/// USB device configuration buffers.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

static HID_STATES: StaticCell<HidStates> = StaticCell::new();
static LED_HANDLER: StaticCell<KeyboardLedHandler> = StaticCell::new();
static DEVICE_HANDLER: StaticCell<DeviceStateHandler> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("deskswitch starting, role {}", BOARD_ROLE);

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Link UART ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = LINK_BAUDRATE;

    let uart = Uart::new(
        p.UART0,
        p.PIN_12, // TX
        p.PIN_13, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (uart_tx, uart_rx) = uart.split();

    // --- Queues between the device loop and the output paths ---
    let (hid_tx, hid_rx) = HID_QUEUE.init(HidQueue::new()).split();
    let (link_tx, link_rx) = LINK_QUEUE.init(LinkQueue::new()).split();

    // --- Core 1: link transmit and watchdog ---
    let watchdog = RpWatchdog::start(p.WATCHDOG);
    let link_sink = UartLinkSink::new(uart_tx);
    spawn_core1(p.CORE1, CORE1_STACK.init(Stack::new()), move || {
        let executor1 = EXECUTOR1.init(Executor::new());
        executor1.run(|spawner| spawner.spawn(link_task(link_rx, link_sink, watchdog).unwrap()))
    });

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0xD5C1);
    usb_config.manufacturer = Some("Deskswitch");
    usb_config.product = Some("Deskswitch KVM");
    usb_config.serial_number = Some(if cfg!(feature = "board-b") { "B" } else { "A" });
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;
    usb_config.supports_remote_wakeup = true;

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );
    builder.handler(DEVICE_HANDLER.init(DeviceStateHandler));

    let (usb_output, vendor_reader) = configure_usb_hid(
        &mut builder,
        HID_STATES.init(HidStates::new()),
        LED_HANDLER.init(KeyboardLedHandler),
    );
    let usb_device = builder.build();

    // --- Device state ---
    let platform = RpPlatform::new(Flash::new_blocking(p.FLASH));
    let state = DeviceState::new(
        BOARD_ROLE,
        firmware_info(),
        Outbox::new(hid_tx, link_tx),
        &SHARED,
        platform,
    );

    let led = Output::new(p.PIN_25, Level::Low);

    spawner.spawn(usb_task(usb_device).unwrap());
    spawner.spawn(link_rx_task(uart_rx).unwrap());
    spawner.spawn(vendor_task(vendor_reader).unwrap());
    spawner.spawn(led_task(led).unwrap());
    spawner.spawn(device_task(state, hid_rx, usb_output).unwrap());

    info!("deskswitch initialized");
}

/// USB device task - runs the USB stack and wakes the host on demand.
#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) {
    run_usb(device).await
}

/// Moves bytes from the link UART into the receive ring.
#[embassy_executor::task]
async fn link_rx_task(rx: UartRx<'static, Async>) {
    pump_rx(rx).await
}

#[embassy_executor::task]
async fn led_task(led: Output<'static>) {
    run_led(led).await
}

/// Frames vendor reports from the host into packets for the device loop.
#[embassy_executor::task]
async fn vendor_task(mut reader: HidReader<'static, UsbDriver, RAW_PACKET_LENGTH>) {
    let mut ring = RingBuffer::<64>::new();
    let mut receiver = PacketReceiver::new();
    let mut report = [0u8; RAW_PACKET_LENGTH];

    loop {
        match reader.read(&mut report).await {
            Ok(n) => ring.push_slice(&report[..n]),
            Err(e) => {
                warn!("vendor read failed: {:?}", e);
                continue;
            }
        }
        while let Some(packet) = receiver.poll(&ring) {
            CONFIG_PACKETS.send(packet).await;
        }
    }
}

fn now_us() -> u64 {
    Instant::now().as_micros()
}

/// Dispatch at most one packet from the link receive ring.
fn receive_step(state: &mut State) {
    // The lock only covers framing; handlers may write flash.
    receive_packet(state, |rx| RX_RING.lock(|ring| rx.poll(&*ring.borrow())));
}

/// Core 0 device loop: owns the state and feeds the host.
#[embassy_executor::task]
async fn device_task(mut state: State, mut hid_rx: HidConsumer<'static>, mut output: UsbHidOutput) {
    let mut table: [Task<State>; 3] = [
        Task::new(mark_alive, EVERY_PASS),
        Task::new(receive_step, EVERY_PASS),
        Task::new(heartbeat, hz(1)),
    ];
    let is_active = state.is_active();
    state.platform.set_onboard_led(is_active);

    loop {
        state.usb_connected = USB_CONFIGURED.load(Ordering::Acquire);

        while let Ok(event) = LOCAL_INPUT.try_receive() {
            process_input(&mut state, &event);
        }
        if let Some(leds) = HOST_LEDS.try_take() {
            process_host_leds(&mut state, leds);
        }
        while let Ok(packet) = CONFIG_PACKETS.try_receive() {
            dispatch(&mut state, &packet);
        }

        run_tasks(&mut state, &mut table);
        drain_hid(&mut hid_rx, &mut output, state.usb_connected).await;
        yield_now().await;
    }
}

/// Core 1 loop: transmits queued packets and feeds the watchdog.
#[embassy_executor::task]
async fn link_task(
    mut link_rx: LinkConsumer<'static>,
    mut sink: UartLinkSink,
    watchdog: RpWatchdog,
) {
    let mut ctx = WatchdogContext::new(&SHARED, watchdog, now_us);
    let mut table: [Task<WatchdogContext<'static, RpWatchdog>>; 1] =
        [Task::new(watchdog_task, hz(100))];
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        run_tasks(&mut ctx, &mut table);
        while drain_link(&mut link_rx, &mut sink).await {}
        ticker.next().await;
    }
}
