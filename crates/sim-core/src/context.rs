//! The per-event simulation context.

use crate::SimTime;

/// Direction of a clock transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

impl Edge {
    /// Classify a transition between two sampled levels. Returns `None` when
    /// the level did not change.
    #[must_use]
    pub fn between(previous: bool, current: bool) -> Option<Self> {
        match (previous, current) {
            (false, true) => Some(Self::Rising),
            (true, false) => Some(Self::Falling),
            _ => None,
        }
    }
}

/// Context handed to every step function.
///
/// Carries the simulated time of the edge being evaluated and which edge it
/// is. Components read time only through this, never from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimContext {
    pub now: SimTime,
    pub edge: Edge,
}

impl SimContext {
    #[must_use]
    pub const fn new(now: SimTime, edge: Edge) -> Self {
        Self { now, edge }
    }

    #[must_use]
    pub const fn rising(now: SimTime) -> Self {
        Self::new(now, Edge::Rising)
    }

    #[must_use]
    pub const fn falling(now: SimTime) -> Self {
        Self::new(now, Edge::Falling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_classification() {
        assert_eq!(Edge::between(false, true), Some(Edge::Rising));
        assert_eq!(Edge::between(true, false), Some(Edge::Falling));
        assert_eq!(Edge::between(true, true), None);
        assert_eq!(Edge::between(false, false), None);
    }
}
