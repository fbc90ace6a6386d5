use crate::as7265x::registers::CTRL_GAIN_SHIFT;

/// One bounded polling budget: how often to sample and how many attempts to
/// make before giving up with `Error::Timeout`.
///
/// These are tuning constants, not protocol constants. The only hard rule is
/// that every poll site is bounded: a wedged sensor or bus must surface as a
/// timeout, never as a hang.
#[derive(Clone, Copy)]
pub struct PollBudget {
    /// Sleep between attempts, in milliseconds. The sleep yields the
    /// processor so other tasks keep running while the sensor is busy.
    pub interval_ms: u32,
    /// Attempts before the poll fails.
    pub max_attempts: u32,
}

impl PollBudget {
    pub const fn new(interval_ms: u32, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }
}

/// Poll budgets for the three poll sites of the protocol.
///
/// | Site        | Default      | Why                                        |
/// |-------------|--------------|--------------------------------------------|
/// | tx          | 100 × 1 ms   | Handshake slots free within a few ms       |
/// | rx          | 300 × 1 ms   | Reads of measurement-dependent registers can lag |
/// | measurement | 1000 × 10 ms | Integration runs up to hundreds of ms; 10 s ceiling leaves margin |
#[derive(Clone, Copy)]
pub struct PollConfig {
    pub tx: PollBudget,
    pub rx: PollBudget,
    pub measurement: PollBudget,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tx: PollBudget::new(1, 100),
            rx: PollBudget::new(1, 300),
            measurement: PollBudget::new(10, 1000),
        }
    }
}

/// Physical sensor die selector, written to virtual register 0x4F.
///
/// The selector is a single switch on the hardware side: every subsequent
/// virtual-register operation targets the selected die until it is changed.
/// The enum makes out-of-range selector values unrepresentable; the protocol
/// itself performs no range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceSelector {
    /// AS72651, NIR bands (R..W).
    Master = 0,
    /// AS72652, visible bands (G..L).
    Slave1 = 1,
    /// AS72653, UV bands (A..F).
    Slave2 = 2,
}

impl DeviceSelector {
    /// Sweep order used by the 18-channel reader (device-major).
    pub const ALL: [DeviceSelector; 3] = [
        DeviceSelector::Master,
        DeviceSelector::Slave1,
        DeviceSelector::Slave2,
    ];
}

/// Analog gain (ControlSetup bits 5:4), applied per selected die.
///
/// | Variant | Field | Gain  |
/// |---------|-------|-------|
/// | X1      | 00    | 1×    |
/// | X3_7    | 01    | 3.7×  |
/// | X16     | 10    | 16×   |
/// | X64     | 11    | 64×   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gain {
    X1 = 0b00,
    X3_7 = 0b01,
    X16 = 0b10,
    X64 = 0b11,
}

impl Gain {
    /// Gain value shifted into its ControlSetup field position.
    pub const fn field(self) -> u8 {
        (self as u8) << CTRL_GAIN_SHIFT
    }
}
