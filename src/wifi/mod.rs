//! WiFi station management: association, reconnect, and address acquisition.
//!
//! The connection task keeps the station associated for the life of the
//! firmware and mirrors the link state onto an indicator pin; the relay task
//! observes the link through the network stack, not through callbacks.

use defmt::{info, warn};
use embassy_net::{Runner, Stack};
use embassy_time::Timer;
use esp_hal::gpio::{AnyPin, Level, Output, OutputConfig};
use esp_println as _;
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};

use crate::config;

/// Associates with the configured access point and re-associates after any
/// disconnect, forever. The LED pin is high while associated.
#[embassy_executor::task]
pub async fn wifi_connection(mut controller: WifiController<'static>, led_pin: AnyPin<'static>) {
    info!("wifi: connection task started");
    let mut link_led = Output::new(led_pin, Level::Low, OutputConfig::default());
    loop {
        if let WifiStaState::Connected = esp_radio::wifi::sta_state() {
            // Park here until the association drops, then back off before
            // reconnecting.
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            link_led.set_low();
            warn!("wifi: association lost");
            Timer::after_secs(config::RECONNECT_DELAY_SECS).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(config::WIFI_SSID.into())
                    .with_password(config::WIFI_PASSWORD.into()),
            );
            controller.set_config(&client_config).unwrap();
            controller.start_async().await.unwrap();
        }

        match controller.connect_async().await {
            Ok(_) => {
                info!("wifi: associated with {}", config::WIFI_SSID);
                link_led.set_high();
            }
            Err(_) => {
                warn!("wifi: association failed, retrying");
                link_led.set_low();
                Timer::after_secs(config::RECONNECT_DELAY_SECS).await;
            }
        }
    }
}

/// Drives the network stack.
#[embassy_executor::task]
pub async fn net_runner(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Blocks until the link is up and DHCP has produced an address.
pub async fn wait_for_ip(stack: Stack<'static>) {
    while !stack.is_link_up() {
        Timer::after_millis(500).await;
    }
    loop {
        if let Some(cfg) = stack.config_v4() {
            info!("wifi: address acquired: {}", defmt::Debug2Format(&cfg.address));
            break;
        }
        Timer::after_millis(500).await;
    }
}
