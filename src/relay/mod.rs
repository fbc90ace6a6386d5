//! Relay-side plumbing between the sensor sweep and the WebSocket link.
//!
//! The link is tracked as an explicit state machine advanced by discrete
//! events instead of callback handlers: the publish loop polls the current
//! [`ConnectionStatus`] and the transport tasks feed it [`LinkEvent`]s.
//! Frames collected between publishes are averaged so one outbound message
//! summarizes the sweeps since the last one.

pub mod messages;

use crate::as7265x::channels::CHANNEL_COUNT;

/// One full 18-channel sweep result.
pub type SpectralFrame = [f32; CHANNEL_COUNT];

/// Where the uplink currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionStatus {
    /// No network association.
    Disconnected,
    /// WiFi associated and addressed, no WebSocket session.
    WifiUp,
    /// WebSocket session established.
    SocketUp,
}

/// Discrete transport events that advance [`ConnectionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    WifiConnected,
    WifiLost,
    SocketOpened,
    SocketClosed,
}

impl ConnectionStatus {
    /// Applies one event. Losing WiFi drops the socket with it; a socket
    /// cannot open without WiFi underneath.
    pub fn on_event(self, event: LinkEvent) -> Self {
        match (self, event) {
            (_, LinkEvent::WifiLost) => ConnectionStatus::Disconnected,
            (ConnectionStatus::Disconnected, LinkEvent::WifiConnected) => ConnectionStatus::WifiUp,
            (ConnectionStatus::WifiUp, LinkEvent::SocketOpened) => ConnectionStatus::SocketUp,
            (ConnectionStatus::SocketUp, LinkEvent::SocketClosed) => ConnectionStatus::WifiUp,
            (current, _) => current,
        }
    }
}

/// Element-wise running mean over whole frames.
pub struct Averager {
    sums: [f32; CHANNEL_COUNT],
    count: u32,
}

impl Averager {
    pub const fn new() -> Self {
        Self {
            sums: [0.0; CHANNEL_COUNT],
            count: 0,
        }
    }

    pub fn push(&mut self, frame: &SpectralFrame) {
        for (sum, value) in self.sums.iter_mut().zip(frame.iter()) {
            *sum += *value;
        }
        self.count += 1;
    }

    /// Returns the mean of the frames pushed since the last take and resets.
    /// `None` when nothing was collected, so empty intervals publish nothing.
    pub fn take(&mut self) -> Option<SpectralFrame> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f32;
        let mut mean = [0.0; CHANNEL_COUNT];
        for (out, sum) in mean.iter_mut().zip(self.sums.iter()) {
            *out = *sum / n;
        }
        self.sums = [0.0; CHANNEL_COUNT];
        self.count = 0;
        Some(mean)
    }
}

impl Default for Averager {
    fn default() -> Self {
        Self::new()
    }
}
