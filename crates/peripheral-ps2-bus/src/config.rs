//! Peripheral configuration.

use sim_core::SimTime;

use crate::pins::Polarity;

/// Longest gap between two PS/2 clock falls inside one frame before the
/// partial frame is dropped. A device clocks at 10-16.7 kHz, so a gap this
/// long only happens when it abandoned a frame.
pub const DEFAULT_FRAME_TIMEOUT: SimTime = SimTime::from_micros(500);

/// Build-time options of the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Asserted level of CS and DS.
    pub polarity: Polarity,
    /// Host clocks inserted before a read is acknowledged.
    pub read_wait_states: u8,
    /// Host clocks inserted before a write is acknowledged.
    pub write_wait_states: u8,
    /// Write-capable revision: host writes reach the data register. When
    /// false, write cycles are still acknowledged but the data is dropped.
    pub host_writable: bool,
    /// Mid-frame inter-edge timeout. `None` disables it.
    pub frame_timeout: Option<SimTime>,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::ActiveHigh,
            read_wait_states: 0,
            write_wait_states: 0,
            host_writable: true,
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
        }
    }
}
