//! Spectral channel table for the AS7265x triad.
//!
//! Eighteen calibrated bands across three dies, six per die. The table is in
//! sweep order: device-major, channel-minor, so a flat reading index is
//! `device * 6 + slot` and lines up with
//! [`crate::as7265x::registers::CAL_CHANNEL_BASES`] per die.
//!
//! Wavelengths per die (AS7265x datasheet, figure 2):
//!
//! | Die              | Bands | Wavelengths (nm)              |
//! |------------------|-------|-------------------------------|
//! | AS72651 (master) | R..W  | 610, 680, 730, 760, 810, 860  |
//! | AS72652 (slave1) | G..L  | 560, 585, 645, 705, 900, 940  |
//! | AS72653 (slave2) | A..F  | 410, 435, 460, 485, 510, 535  |

/// One spectral band: datasheet letter name and center wavelength.
#[derive(Debug, Clone, Copy)]
pub struct ChannelInfo {
    pub name: &'static str,
    pub wavelength_nm: u16,
}

/// Calibrated channels per die.
pub const CHANNELS_PER_DEVICE: usize = 6;

/// Total calibrated channels across the triad.
pub const CHANNEL_COUNT: usize = 18;

const fn ch(name: &'static str, wavelength_nm: u16) -> ChannelInfo {
    ChannelInfo {
        name,
        wavelength_nm,
    }
}

/// All 18 bands in sweep order.
pub const CHANNELS: [ChannelInfo; CHANNEL_COUNT] = [
    // AS72651 (master)
    ch("R", 610),
    ch("S", 680),
    ch("T", 730),
    ch("U", 760),
    ch("V", 810),
    ch("W", 860),
    // AS72652 (slave1)
    ch("G", 560),
    ch("H", 585),
    ch("I", 645),
    ch("J", 705),
    ch("K", 900),
    ch("L", 940),
    // AS72653 (slave2)
    ch("A", 410),
    ch("B", 435),
    ch("C", 460),
    ch("D", 485),
    ch("E", 510),
    ch("F", 535),
];
