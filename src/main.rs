//! Homecage Access-Control Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter          SerialHostLink   LogEventSink        │
//! │  (Weight+Door+Tag+Clock)  (HostLink/UART0) (EventSink)         │
//! │  NvsAdapter (ConfigPort)  Watchdog (TWDT)                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Drift · Safety                                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{info, warn};

use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_svc::hal::units::Hertz;

use homecage_ac::adapters::hardware::HardwareAdapter;
use homecage_ac::adapters::log_sink::LogEventSink;
use homecage_ac::adapters::nvs::NvsAdapter;
use homecage_ac::adapters::serial_link::SerialHostLink;
use homecage_ac::adapters::time::MonotonicClock;
use homecage_ac::adapters::uart::UartTransport;
use homecage_ac::app::ports::ConfigPort;
use homecage_ac::app::service::AppService;
use homecage_ac::config::AcConfig;
use homecage_ac::drivers::doors::DoorBank;
use homecage_ac::drivers::watchdog::Watchdog;
use homecage_ac::pins::*;
use homecage_ac::sensors::hx711::{Gain, Hx711};
use homecage_ac::sensors::{LoadCell, TagReader};

type OutPin = PinDriver<'static, AnyOutputPin, Output>;
type InPin = PinDriver<'static, AnyInputPin, Input>;

fn output(gpio: i32) -> Result<OutPin> {
    // SAFETY: every number comes from `pins`, and each is claimed once.
    let pin = unsafe { AnyOutputPin::new(gpio) };
    PinDriver::output(pin).with_context(|| format!("GPIO{gpio} as output"))
}

fn input(gpio: i32) -> Result<InPin> {
    // SAFETY: as for `output`.
    let pin = unsafe { AnyInputPin::new(gpio) };
    PinDriver::input(pin).with_context(|| format!("GPIO{gpio} as input"))
}

fn outputs<const N: usize>(gpios: [i32; N]) -> Result<[OutPin; N]> {
    let pins = gpios.iter().map(|&g| output(g)).collect::<Result<Vec<_>>>()?;
    pins.try_into()
        .map_err(|_| anyhow::anyhow!("pin array length mismatch"))
}

fn inputs<const N: usize>(gpios: [i32; N]) -> Result<[InPin; N]> {
    let pins = gpios.iter().map(|&g| input(g)).collect::<Result<Vec<_>>>()?;
    pins.try_into()
        .map_err(|_| anyhow::anyhow!("pin array length mismatch"))
}

fn uart(
    uart: impl esp_idf_svc::hal::peripheral::Peripheral<P = impl esp_idf_svc::hal::uart::Uart> + 'static,
    tx: i32,
    rx: i32,
    baud: u32,
) -> Result<UartTransport<'static>> {
    // SAFETY: as for `output`.
    let (tx, rx) = unsafe { (AnyIOPin::new(tx), AnyIOPin::new(rx)) };
    let cfg = UartConfig::default().baudrate(Hertz(baud));
    let driver = UartDriver::new(
        uart,
        tx,
        rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &cfg,
    )
    .context("UART init")?;
    Ok(UartTransport::new(driver))
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Homecage AC v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take().context("peripherals already taken")?;

    // ── 2. Doors first: every magnet released before anything else ──
    let doors = DoorBank::new(
        outputs(DOOR_HIGH_GPIO)?,
        outputs(DOOR_LOW_GPIO)?,
        outputs(DOOR_ENABLE_GPIO)?,
        inputs(DOOR_SENSE_GPIO)?,
    )
    .map_err(|e| anyhow::anyhow!("door drivers: {e}"))?;

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            AcConfig::default()
        }
    };

    // ── 4. Sensors ────────────────────────────────────────────
    let hx = Hx711::new(
        output(LOADCELL_SCK_GPIO)?,
        input(LOADCELL_DOUT_GPIO)?,
        Ets,
        Gain::A128,
    )
    .map_err(|e| anyhow::anyhow!("HX711: {e}"))?;
    let loadcell = LoadCell::new(hx, config.calibration);

    let rfid_link = uart(peripherals.uart1, RFID_UART_TX_GPIO, RFID_UART_RX_GPIO, RFID_BAUD)?;

    #[cfg(not(feature = "rwd-qt"))]
    let reader = homecage_ac::sensors::rfid::Priority1Reader::new(rfid_link, FreeRtos)
        .map_err(|e| anyhow::anyhow!("RFID reader: {e}"))?;
    #[cfg(feature = "rwd-qt")]
    let reader = homecage_ac::sensors::rfid::RwdQtReader::new(rfid_link, input(RFID_CTS_GPIO)?, FreeRtos)
        .map_err(|e| anyhow::anyhow!("RFID reader: {e}"))?;

    // ── 5. Host link ──────────────────────────────────────────
    let host = uart(peripherals.uart0, HOST_UART_TX_GPIO, HOST_UART_RX_GPIO, HOST_BAUD)?;

    run(loadcell, doors, reader, SerialHostLink::new(host), nvs, config)
}

fn run<R: TagReader>(
    loadcell: LoadCell<Hx711<OutPin, InPin, Ets>>,
    doors: DoorBank<OutPin, InPin>,
    reader: R,
    mut link: SerialHostLink<UartTransport<'static>>,
    nvs: NvsAdapter,
    config: AcConfig,
) -> Result<()> {
    let interval_ms = config.control_loop_interval_ms;
    let mut hw = HardwareAdapter::new(loadcell, doors, reader, MonotonicClock::new());
    let mut sink = LogEventSink::new();
    let watchdog = Watchdog::for_config(&config);
    let mut app = AppService::new(config);

    app.start(&mut hw, &mut link, &mut sink);
    info!("System ready. Entering control loop.");

    // ── Control loop ──────────────────────────────────────────
    // The host sends `reset` when it connects; that is the only way out
    // of error_state short of a power cycle.
    loop {
        app.tick(&mut hw, &mut link, &mut sink);
        app.auto_save_if_needed(&nvs);
        watchdog.feed();
        FreeRtos::delay_ms(interval_ms);
    }
}
