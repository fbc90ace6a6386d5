//! WebSocket relay: publishes averaged spectral frames as JSON and maps
//! inbound commands to a measurement trigger.
//!
//! One session loop per connection attempt. The uplink state machine from
//! [`crate::relay`] is advanced by the discrete outcomes here (link up,
//! socket open, socket lost) and logged on every transition.

use core::fmt::Write as _;

use defmt::{info, warn};
use edge_ws::{FrameHeader, FrameType};
use embassy_futures::select::{Either3, select3};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Ipv4Address, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};
use embedded_io_async::{Read, Write};
use esp_hal::rng::Rng;
use esp_println as _;

use crate::config;
use crate::relay::messages::{self, Command};
use crate::relay::{Averager, ConnectionStatus, LinkEvent, SpectralFrame};

/// Sweep results from the sensor task; averaged per publish interval.
pub static FRAMES: Channel<CriticalSectionRawMutex, SpectralFrame, 4> = Channel::new();

/// Raised when a remote command requests an immediate measurement.
pub static MEASURE_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Static handshake nonce; the server does not validate the Accept echo.
const WS_KEY: &str = "Y3J1eDMyLXNwZWN0cmFsLQ==";

const JSON_BUF: usize = 2048;

#[embassy_executor::task]
pub async fn relay_task(stack: Stack<'static>) {
    info!("relay: task started");
    let mut status = ConnectionStatus::Disconnected;
    let mut rx_buffer = [0u8; 2048];
    let mut tx_buffer = [0u8; 2048];
    let mut rng = Rng::new();

    loop {
        while !stack.is_link_up() {
            Timer::after_millis(500).await;
        }
        if status == ConnectionStatus::Disconnected {
            status = status.on_event(LinkEvent::WifiConnected);
            info!("relay: {}", status);
        }

        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(60)));
        let endpoint = IpEndpoint::new(
            Ipv4Address::new(
                config::WS_HOST[0],
                config::WS_HOST[1],
                config::WS_HOST[2],
                config::WS_HOST[3],
            )
            .into(),
            config::WS_PORT,
        );

        if socket.connect(endpoint).await.is_err() {
            warn!("relay: server unreachable");
            Timer::after_secs(config::RECONNECT_DELAY_SECS).await;
            if !stack.is_link_up() {
                status = status.on_event(LinkEvent::WifiLost);
            }
            continue;
        }

        if upgrade(&mut socket).await.is_err() {
            warn!("relay: websocket handshake rejected");
            socket.close();
            Timer::after_secs(config::RECONNECT_DELAY_SECS).await;
            continue;
        }

        status = status.on_event(LinkEvent::SocketOpened);
        info!("relay: {}", status);

        let _ = run_session(&mut socket, &mut rng).await;
        socket.close();

        status = status.on_event(LinkEvent::SocketClosed);
        if !stack.is_link_up() {
            status = status.on_event(LinkEvent::WifiLost);
        }
        warn!("relay: session ended, {}", status);
        Timer::after_secs(config::RECONNECT_DELAY_SECS).await;
    }
}

/// One established session: announce, then forward averaged frames on the
/// publish tick and react to inbound commands until the socket dies.
async fn run_session(socket: &mut TcpSocket<'_>, rng: &mut Rng) -> Result<(), ()> {
    let (mut reader, mut writer) = socket.split();
    let mut json = [0u8; JSON_BUF];
    let mut payload = [0u8; JSON_BUF];

    let len = messages::encode_status("spectral node online", &mut json).map_err(drop)?;
    send_text(&mut writer, rng, &json[..len]).await?;

    let mut averager = Averager::new();
    let mut publish = Ticker::every(Duration::from_secs(config::PUBLISH_INTERVAL_SECS));

    loop {
        match select3(
            FRAMES.receive(),
            publish.next(),
            recv_command(&mut reader, &mut payload),
        )
        .await
        {
            Either3::First(frame) => averager.push(&frame),
            Either3::Second(_) => {
                if let Some(mean) = averager.take() {
                    let len = messages::encode_spectral_data(&mean, &mut json).map_err(drop)?;
                    send_text(&mut writer, rng, &json[..len]).await?;
                }
            }
            Either3::Third(inbound) => match inbound? {
                Some(Command::ReadSensor) => {
                    info!("relay: remote measurement request");
                    MEASURE_REQUEST.signal(());
                }
                Some(other) => info!("relay: command {} not handled here", other),
                None => {}
            },
        }
    }
}

/// Receives one frame and extracts a command from it, if any. `Err` means
/// the session is over (close frame, oversized payload, or transport loss).
async fn recv_command<R: Read>(
    reader: &mut R,
    payload: &mut [u8],
) -> Result<Option<Command>, ()> {
    let header = FrameHeader::recv(&mut *reader).await.map_err(drop)?;
    let data = header
        .recv_payload(&mut *reader, payload)
        .await
        .map_err(drop)?;
    match header.frame_type {
        FrameType::Text(false) | FrameType::Binary(false) => Ok(messages::decode_command(data)),
        FrameType::Close => Err(()),
        // Fragments and pings are ignored; the server runs without pings.
        _ => Ok(None),
    }
}

/// Sends one masked text frame (client frames must be masked).
async fn send_text<W: Write>(writer: &mut W, rng: &mut Rng, payload: &[u8]) -> Result<(), ()> {
    let header = FrameHeader {
        frame_type: FrameType::Text(false),
        payload_len: payload.len() as u64,
        mask_key: Some(rng.random()),
    };
    header.send(&mut *writer).await.map_err(drop)?;
    header.send_payload(&mut *writer, payload).await.map_err(drop)
}

/// HTTP upgrade: write the request, read the response head, accept on 101.
async fn upgrade(socket: &mut TcpSocket<'_>) -> Result<(), ()> {
    let mut request: heapless::String<256> = heapless::String::new();
    write!(
        request,
        "GET {path} HTTP/1.1\r\n\
         Host: {a}.{b}.{c}.{d}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n",
        path = config::WS_PATH,
        a = config::WS_HOST[0],
        b = config::WS_HOST[1],
        c = config::WS_HOST[2],
        d = config::WS_HOST[3],
        port = config::WS_PORT,
        key = WS_KEY,
    )
    .map_err(drop)?;
    socket.write_all(request.as_bytes()).await.map_err(drop)?;

    let mut response = [0u8; 512];
    let mut filled = 0;
    loop {
        if filled == response.len() {
            return Err(());
        }
        let n = socket.read(&mut response[filled..]).await.map_err(drop)?;
        if n == 0 {
            return Err(());
        }
        filled += n;
        if response[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    if response[..filled].windows(5).any(|w| w == b" 101 ") {
        Ok(())
    } else {
        Err(())
    }
}
