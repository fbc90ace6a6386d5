/// AS7265x physical register map (ams AS72651/52/53 triad, datasheet v1-00).
///
/// The triad exposes only three byte-wide registers on the I2C bus. Every
/// functional register is a *virtual* register multiplexed through these
/// three via a TX/RX handshake:
///
/// | Register | Addr | Access | Role                                        |
/// |----------|------|--------|---------------------------------------------|
/// | Status   | 0x00 | R      | Handshake flags (TX_VALID bit 1, RX_VALID bit 0) |
/// | Write    | 0x01 | W      | Virtual address (bit 7 = write op) and data bytes |
/// | Read     | 0x02 | R      | Result byte of a virtual-register read      |
///
/// Only `Status` may be polled without side effects; each `Write`/`Read`
/// transaction consumes one handshake slot.
#[derive(Clone, Copy)]
#[repr(u8)]
pub enum PhysicalRegister {
    Status = 0x00,
    Write = 0x01,
    Read = 0x02,
}

/// AS7265x virtual register map (reached only through the handshake).
///
/// Virtual addresses are 7-bit; bit 7 of the byte pushed into the `Write`
/// register selects the operation (set = write, clear = read).
///
/// | Register        | Addr | Notes                                          |
/// |-----------------|------|------------------------------------------------|
/// | HwVersionHigh   | 0x00 | Device type, 0x41 for the AS7265x triad        |
/// | HwVersionLow    | 0x01 | Hardware version                               |
/// | ControlSetup    | 0x04 | Gain (bits 5:4), one-shot start/busy (bit 3)   |
/// | IntegrationTime | 0x05 | Integration cycles, 2.8 ms per cycle           |
/// | LedControl      | 0x07 | Driver LED enable (bit 3), indicator (bit 0)   |
/// | CalDataStart    | 0x14 | First calibrated-channel register (4 bytes/channel) |
/// | DeviceSelect    | 0x4F | Die selector: 0 = master, 1/2 = slaves         |
#[derive(Clone, Copy)]
#[repr(u8)]
pub enum VirtualRegister {
    HwVersionHigh = 0x00,
    HwVersionLow = 0x01,
    ControlSetup = 0x04,
    IntegrationTime = 0x05,
    LedControl = 0x07,
    CalDataStart = 0x14,
    DeviceSelect = 0x4F,
}

/// Fixed 7-bit I2C address of the triad (all three dies share it).
pub const AS7265X_ADDR: u8 = 0x49;

/// Status bit: a previous write is still pending in the sensor firmware.
pub const STATUS_TX_VALID: u8 = 0x02;
/// Status bit: a read result is waiting in the `Read` register.
pub const STATUS_RX_VALID: u8 = 0x01;

/// Bit 7 of the address byte: marks a virtual-register write.
pub const VIRTUAL_WRITE_FLAG: u8 = 0x80;

/// ControlSetup bit 3: one-shot measurement start; reads back set while the
/// conversion is in progress.
pub const CTRL_MEASURE_START: u8 = 0x08;
/// ControlSetup bits 5:4: analog gain field.
pub const CTRL_GAIN_MASK: u8 = 0x30;
pub const CTRL_GAIN_SHIFT: u8 = 4;

/// LedControl bit 3: illumination (driver) LED enable.
pub const LED_DRV_EN: u8 = 0x08;
/// LedControl bit 0: indicator LED enable. Never touched by the measurement
/// sequence; restoring the pre-measurement LedControl value preserves it.
pub const LED_IND_EN: u8 = 0x01;

/// Expected `HwVersionHigh` value for a healthy AS7265x triad.
pub const AS7265X_DEVICE_TYPE: u8 = 0x41;

/// Base addresses of the six calibrated channels of the selected die.
/// Each channel is four consecutive virtual registers holding an IEEE-754
/// float, most-significant byte first.
pub const CAL_CHANNEL_BASES: [u8; 6] = [0x14, 0x18, 0x1C, 0x20, 0x24, 0x28];
