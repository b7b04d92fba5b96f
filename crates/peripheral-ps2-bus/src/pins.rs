//! Port bit assignments and host-line levels.
//!
//! The peripheral uses the Tiny Tapeout port layout: an 8-bit dedicated
//! input port (`ui_in`), an 8-bit dedicated output port (`uo_out`), and an
//! 8-bit bidirectional port (`uio_*`) carrying the data bus.

/// `ui_in` bit 0: PS/2 clock from the device.
pub const UI_PS2_CLK: u8 = 1 << 0;
/// `ui_in` bit 1: PS/2 data from the device.
pub const UI_PS2_DATA: u8 = 1 << 1;
/// `ui_in` bit 2: chip select.
pub const UI_CS: u8 = 1 << 2;
/// `ui_in` bit 3: data strobe.
pub const UI_DS: u8 = 1 << 3;
/// `ui_in` bit 4: read/not-write (1 = read).
pub const UI_RW: u8 = 1 << 4;

/// Bits of `ui_in` owned by the host bus.
pub const UI_HOST_MASK: u8 = UI_CS | UI_DS | UI_RW;
/// Bits of `ui_in` owned by the PS/2 device.
pub const UI_PS2_MASK: u8 = UI_PS2_CLK | UI_PS2_DATA;

/// `uo_out` bit 0: DTACK (1 = idle or complete, 0 = acknowledged).
pub const UO_DTACK: u8 = 1 << 0;
/// `uo_out` bit 1: interrupt (1 = byte ready).
pub const UO_INT: u8 = 1 << 1;

/// `uio_oe` value while the peripheral drives the data bus.
pub const OE_DRIVE: u8 = 0xFF;

/// Asserted level of the CS and DS lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Logic 1 engages the bus (the default bench wiring).
    #[default]
    ActiveHigh,
    /// Logic 0 engages the bus (68000-style CS/DS).
    ActiveLow,
}

impl Polarity {
    /// Whether a line at `level` counts as asserted.
    #[must_use]
    pub const fn is_asserted(self, level: bool) -> bool {
        match self {
            Self::ActiveHigh => level,
            Self::ActiveLow => !level,
        }
    }

    /// Pin level that asserts (or, with `false`, deasserts) a line.
    #[must_use]
    pub const fn level(self, asserted: bool) -> bool {
        match self {
            Self::ActiveHigh => asserted,
            Self::ActiveLow => !asserted,
        }
    }
}

/// Pin levels of the three host control lines (`true` = logic 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostLines {
    pub cs: bool,
    pub ds: bool,
    pub rw: bool,
}

impl HostLines {
    /// All three lines at their inactive level.
    #[must_use]
    pub const fn idle(polarity: Polarity) -> Self {
        let level = polarity.level(false);
        Self {
            cs: level,
            ds: level,
            rw: level,
        }
    }

    /// CS and DS asserted, RW driven for the given direction.
    #[must_use]
    pub const fn strobe(polarity: Polarity, read: bool) -> Self {
        let level = polarity.level(true);
        Self {
            cs: level,
            ds: level,
            rw: read,
        }
    }

    /// CS and DS released. RW keeps its level, as a host that only drops the
    /// strobes would leave it.
    #[must_use]
    pub const fn released(self, polarity: Polarity) -> Self {
        let level = polarity.level(false);
        Self {
            cs: level,
            ds: level,
            rw: self.rw,
        }
    }

    /// Both CS and DS asserted.
    #[must_use]
    pub const fn selected(self, polarity: Polarity) -> bool {
        polarity.is_asserted(self.cs) && polarity.is_asserted(self.ds)
    }

    /// Either CS or DS asserted.
    #[must_use]
    pub const fn engaged(self, polarity: Polarity) -> bool {
        polarity.is_asserted(self.cs) || polarity.is_asserted(self.ds)
    }

    #[must_use]
    pub const fn from_ui_in(value: u8) -> Self {
        Self {
            cs: value & UI_CS != 0,
            ds: value & UI_DS != 0,
            rw: value & UI_RW != 0,
        }
    }

    /// The host-owned bits of `ui_in`.
    #[must_use]
    pub const fn to_ui_bits(self) -> u8 {
        (if self.cs { UI_CS } else { 0 })
            | (if self.ds { UI_DS } else { 0 })
            | (if self.rw { UI_RW } else { 0 })
    }
}

/// Combined status byte as seen on `uo_out`.
#[must_use]
pub const fn status_byte(dtack_high: bool, interrupt: bool) -> u8 {
    (if dtack_high { UO_DTACK } else { 0 }) | (if interrupt { UO_INT } else { 0 })
}
