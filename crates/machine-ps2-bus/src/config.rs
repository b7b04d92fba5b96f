//! Machine configuration.

use std::fmt;

use peripheral_ps2_bus::PeripheralConfig;
use sim_core::SimTime;

/// Errors from [`MachineConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Host clock period rounds to zero.
    ZeroHostClock,
    /// PS/2 clock period too short to split into two phases.
    ZeroPs2Clock,
    /// The decoder would time out between two legitimate clock falls.
    FrameTimeoutTooShort { timeout: SimTime, ps2_period: SimTime },
    /// A truncated frame would still be pending when the next one starts.
    FrameGapTooShort { gap: SimTime, timeout: SimTime },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroHostClock => write!(f, "host clock period must be non-zero"),
            Self::ZeroPs2Clock => write!(f, "PS/2 clock period must be at least 2 ns"),
            Self::FrameTimeoutTooShort {
                timeout,
                ps2_period,
            } => write!(
                f,
                "frame timeout {timeout} does not exceed PS/2 clock period {ps2_period}"
            ),
            Self::FrameGapTooShort { gap, timeout } => {
                write!(f, "PS/2 frame gap {gap} does not exceed frame timeout {timeout}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for creating a [`crate::Ps2BusMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Host bus clock period. 10 us gives the 100 kHz bench clock.
    pub host_clock_period: SimTime,
    /// Full PS/2 device clock period. Data changes while CLK is high and is
    /// sampled on the fall.
    pub ps2_clock_period: SimTime,
    /// Idle time between queued frames, CLK and DATA high.
    pub ps2_frame_gap: SimTime,
    /// Simulated-time limit for the blocking bus helpers.
    pub operation_limit: SimTime,
    pub peripheral: PeripheralConfig,
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_clock_period.is_zero() {
            return Err(ConfigError::ZeroHostClock);
        }
        if self.ps2_clock_period.half().is_zero() {
            return Err(ConfigError::ZeroPs2Clock);
        }
        if let Some(timeout) = self.peripheral.frame_timeout {
            if timeout <= self.ps2_clock_period {
                return Err(ConfigError::FrameTimeoutTooShort {
                    timeout,
                    ps2_period: self.ps2_clock_period,
                });
            }
            if self.ps2_frame_gap <= timeout {
                return Err(ConfigError::FrameGapTooShort {
                    gap: self.ps2_frame_gap,
                    timeout,
                });
            }
        }
        Ok(())
    }

    /// Worst-case time for one frame plus the gap after it.
    #[must_use]
    pub fn frame_time(&self) -> SimTime {
        self.ps2_clock_period * 12 + self.ps2_frame_gap
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            host_clock_period: SimTime::from_micros(10),
            ps2_clock_period: SimTime::from_micros(80),
            ps2_frame_gap: SimTime::from_millis(1),
            operation_limit: SimTime::from_millis(50),
            peripheral: PeripheralConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(MachineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_clocks_rejected() {
        let config = MachineConfig {
            host_clock_period: SimTime::ZERO,
            ..MachineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroHostClock));

        let config = MachineConfig {
            ps2_clock_period: SimTime::from_nanos(1),
            ..MachineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPs2Clock));
    }

    #[test]
    fn timeout_must_exceed_bit_time() {
        let mut config = MachineConfig::default();
        config.peripheral.frame_timeout = Some(SimTime::from_micros(80));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FrameTimeoutTooShort { .. })
        ));

        config.peripheral.frame_timeout = None;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn gap_must_exceed_timeout() {
        let mut config = MachineConfig::default();
        config.ps2_frame_gap = SimTime::from_micros(500);
        assert_eq!(
            config.validate(),
            Err(ConfigError::FrameGapTooShort {
                gap: SimTime::from_micros(500),
                timeout: SimTime::from_micros(500),
            })
        );

        config.ps2_frame_gap = SimTime::from_micros(501);
        assert_eq!(config.validate(), Ok(()));

        // Without a timeout nothing can be left pending.
        config.ps2_frame_gap = SimTime::ZERO;
        config.peripheral.frame_timeout = None;
        assert_eq!(config.validate(), Ok(()));
    }
}
