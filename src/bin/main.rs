#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_net::{DhcpConfig, StackResources};
use embassy_time::Timer;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::AnyPin;
use esp_hal::i2c::master::{AnyI2c, Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_println as _;
use esp32c3_spectral::as7265x::config::{DeviceSelector, Gain};
use esp32c3_spectral::as7265x::registers::AS7265X_DEVICE_TYPE;
use esp32c3_spectral::as7265x::As7265x;
use esp32c3_spectral::{config, wifi, ws};

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let radio_init: &esp_radio::Controller<'_> = &*mk_static!(
        esp_radio::Controller<'static>,
        esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller")
    );

    let (mut wifi_controller, wifi_interfaces) =
        esp_radio::wifi::new(&radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    // Station mode only; power saving off so the uplink stays responsive.
    let wifi_interface: esp_radio::wifi::WifiDevice<'_> = wifi_interfaces.sta;
    wifi_controller
        .set_power_saving(esp_radio::wifi::PowerSaveMode::None)
        .unwrap();

    let rng = esp_hal::rng::Rng::new();
    let seed = rng.random() as u64 | ((rng.random() as u64) << 32);

    let dhcp_config = DhcpConfig::default();
    let net_config = embassy_net::Config::dhcpv4(dhcp_config);

    let (network_stack, network_runner) = embassy_net::new(
        wifi_interface,
        net_config,
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed,
    );

    spawner
        .spawn(wifi::wifi_connection(
            wifi_controller,
            peripherals.GPIO8.into(),
        ))
        .ok();

    spawner.spawn(wifi::net_runner(network_runner)).ok();

    wifi::wait_for_ip(network_stack).await;

    spawner
        .spawn(spectral_sweep(
            peripherals.GPIO6.into(),
            peripherals.GPIO7.into(),
            peripherals.I2C0.into(),
        ))
        .ok();

    spawner.spawn(ws::relay_task(network_stack)).ok();

    loop {
        Timer::after_secs(1).await;
    }
}

/// Owns the I2C bus and the triad. Sweeps on a timer or on a remote request,
/// whichever comes first, and hands completed frames to the relay.
#[embassy_executor::task]
async fn spectral_sweep(sda_pin: AnyPin<'static>, scl_pin: AnyPin<'static>, i2c: AnyI2c<'static>) {
    info!("'spectral_sweep' has been started");
    let bus = I2c::new(
        i2c,
        I2cConfig::default().with_frequency(Rate::from_khz(config::I2C_FREQ_KHZ)),
    )
    .unwrap()
    .with_sda(sda_pin)
    .with_scl(scl_pin);

    let mut sensor = As7265x::new(bus, Delay::new());

    match sensor.hardware_version() {
        Ok((device_type, hw_version)) => {
            if device_type != AS7265X_DEVICE_TYPE {
                warn!("Unexpected device type {=u8:x}", device_type);
            }
            info!("AS7265x found, device type {=u8:x} hw {=u8:x}", device_type, hw_version);
        }
        Err(_) => warn!("Sensor not responding, sweeping anyway"),
    }

    // Same gain and integration time on all three dies.
    for die in DeviceSelector::ALL {
        if sensor.select_device(die).is_err() {
            warn!("Die {} not reachable during setup", die);
            continue;
        }
        let configured = sensor
            .set_gain(Gain::X16)
            .and_then(|_| sensor.set_integration_cycles(config::INTEGRATION_CYCLES));
        if configured.is_err() {
            warn!("Die {} configuration failed", die);
        }
    }
    info!("AS7265x has been initialized");

    loop {
        select(
            ws::MEASURE_REQUEST.wait(),
            Timer::after_secs(config::SWEEP_INTERVAL_SECS),
        )
        .await;

        if sensor.take_measurement().is_err() {
            warn!("Measurement did not complete");
            continue;
        }
        let frame = sensor.read_all_channels();
        if ws::FRAMES.try_send(frame).is_err() {
            warn!("Relay backlog full, frame dropped");
        }
    }
}
