use std::fmt;

use sim_core::SimTime;

use crate::config::ConfigError;

/// Errors from driving the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    /// Configuration rejected at construction.
    Config(ConfigError),
    /// A blocking helper ran out of simulated time.
    Timeout { limit: SimTime },
    /// A bus cycle was requested while the host was still running one.
    CycleInFlight,
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Timeout { limit } => write!(f, "timed out after {limit} of simulated time"),
            Self::CycleInFlight => write!(f, "a bus cycle is already in progress"),
        }
    }
}

impl std::error::Error for MachineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for MachineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
