#![cfg_attr(not(test), no_std)]

//! ESP32-C3 spectral sensor node.
//!
//! Reads the AS7265x triad (18 calibrated channels over a virtual-register
//! I2C protocol) and relays averaged frames as JSON over a WebSocket uplink.
//! The driver and relay logic are hardware-independent and test on the host;
//! the `esp32c3` feature pulls in the WiFi/WebSocket tasks and the firmware
//! binary.

pub mod as7265x;
pub mod relay;

#[cfg(feature = "esp32c3")]
pub mod wifi;
#[cfg(feature = "esp32c3")]
pub mod ws;

/// Build-time configuration. All endpoints and tunables are compile-time
/// constants, as in the original deployment.
pub mod config {
    /// WiFi station credentials.
    pub const WIFI_SSID: &str = "";
    pub const WIFI_PASSWORD: &str = "";

    /// WebSocket server endpoint (`ws://host:port/`).
    pub const WS_HOST: [u8; 4] = [10, 31, 204, 51];
    pub const WS_PORT: u16 = 8765;
    pub const WS_PATH: &str = "/";

    /// I2C bus clock for the sensor (the triad tops out at 400 kHz; 100 is
    /// conservative for long leads).
    pub const I2C_FREQ_KHZ: u32 = 100;

    /// Seconds between sensor sweeps.
    pub const SWEEP_INTERVAL_SECS: u64 = 1;

    /// Seconds between outbound spectral_data publishes; sweeps in between
    /// are averaged.
    pub const PUBLISH_INTERVAL_SECS: u64 = 5;

    /// Delay before reconnect attempts after a dropped uplink.
    pub const RECONNECT_DELAY_SECS: u64 = 5;

    /// Sensor integration time in 2.8 ms cycles (~280 ms), applied per die.
    pub const INTEGRATION_CYCLES: u8 = 100;
}
