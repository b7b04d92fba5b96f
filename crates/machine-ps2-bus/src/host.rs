//! Host bus master.
//!
//! Drives CS, DS, RW and the data bus the way a testbench does: inputs
//! change between clock edges, and the master looks at DTACK and the data
//! bus only after the peripheral has evaluated a rising edge.

use peripheral_ps2_bus::{Direction, HostLines, Polarity, Ps2BusPeripheral};
use sim_core::{SimContext, SimTime};

use crate::error::MachineError;

/// How the master runs a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStyle {
    /// Hold the strobes until DTACK goes low, sample, then release.
    Handshake,
    /// Assert the strobes for a single edge, then release and wait for the
    /// transfer anyway.
    Pulse,
}

/// One requested bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRequest {
    pub direction: Direction,
    /// Byte to write. Ignored for reads.
    pub data: u8,
    pub style: CycleStyle,
}

impl BusRequest {
    #[must_use]
    pub const fn write(data: u8) -> Self {
        Self {
            direction: Direction::Write,
            data,
            style: CycleStyle::Handshake,
        }
    }

    #[must_use]
    pub const fn read() -> Self {
        Self {
            direction: Direction::Read,
            data: 0,
            style: CycleStyle::Handshake,
        }
    }

    #[must_use]
    pub const fn pulse_read() -> Self {
        Self {
            direction: Direction::Read,
            data: 0,
            style: CycleStyle::Pulse,
        }
    }
}

/// A finished bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCycle {
    pub direction: Direction,
    /// Byte read or written.
    pub data: u8,
    /// Rising edges from strobe to transfer. Two with no wait states.
    pub latency: u32,
    pub started: SimTime,
    pub finished: SimTime,
}

/// What the master sees of the peripheral after an edge.
#[derive(Debug, Clone, Copy)]
pub struct BusView {
    pub dtack: bool,
    /// Internal acknowledge, before gating with the strobes.
    pub acknowledged: bool,
    pub data: u8,
}

impl BusView {
    #[must_use]
    pub fn of(peripheral: &Ps2BusPeripheral) -> Self {
        Self {
            dtack: peripheral.dtack(),
            acknowledged: peripheral.bus().acknowledged(),
            data: peripheral.uio_out(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Strobes asserted.
    Strobe,
    /// Pulse released, transfer not seen yet.
    Pulsed,
    /// Strobes released after the transfer. One more edge lets the
    /// controller leave S5.
    Release,
}

struct Active {
    request: BusRequest,
    phase: Phase,
    started: SimTime,
    edges: u32,
    latency: u32,
    data: u8,
}

/// Host side of the bus.
pub struct BusMaster {
    polarity: Polarity,
    lines: HostLines,
    data_out: u8,
    active: Option<Active>,
}

impl BusMaster {
    #[must_use]
    pub fn new(polarity: Polarity) -> Self {
        Self {
            polarity,
            lines: HostLines::idle(polarity),
            data_out: 0,
            active: None,
        }
    }

    /// Begin a cycle. The new lines take effect before the next edge.
    pub fn start(&mut self, request: BusRequest, now: SimTime) -> Result<(), MachineError> {
        if self.active.is_some() {
            return Err(MachineError::CycleInFlight);
        }
        let read = request.direction == Direction::Read;
        self.lines = HostLines::strobe(self.polarity, read);
        if !read {
            self.data_out = request.data;
        }
        self.active = Some(Active {
            request,
            phase: Phase::Strobe,
            started: now,
            edges: 0,
            latency: 0,
            data: request.data,
        });
        Ok(())
    }

    /// React to the rising edge the peripheral just evaluated. Returns the
    /// cycle once the bus is free for the next one.
    pub fn react(&mut self, ctx: &SimContext, view: &BusView) -> Option<BusCycle> {
        let active = self.active.as_mut()?;
        active.edges += 1;

        match active.phase {
            Phase::Strobe => match active.request.style {
                CycleStyle::Handshake => {
                    if !view.dtack {
                        Self::capture(active, view);
                        self.lines = self.lines.released(self.polarity);
                    }
                }
                CycleStyle::Pulse => {
                    self.lines = self.lines.released(self.polarity);
                    if view.acknowledged {
                        Self::capture(active, view);
                    } else {
                        active.phase = Phase::Pulsed;
                    }
                }
            },
            Phase::Pulsed => {
                if view.acknowledged {
                    Self::capture(active, view);
                }
            }
            Phase::Release => {
                let cycle = BusCycle {
                    direction: active.request.direction,
                    data: active.data,
                    latency: active.latency,
                    started: active.started,
                    finished: ctx.now,
                };
                self.active = None;
                return Some(cycle);
            }
        }
        None
    }

    fn capture(active: &mut Active, view: &BusView) {
        if active.request.direction == Direction::Read {
            active.data = view.data;
        }
        active.latency = active.edges;
        active.phase = Phase::Release;
    }

    /// Drop any cycle in progress and release the lines.
    pub fn abort(&mut self) {
        self.active = None;
        self.lines = HostLines::idle(self.polarity);
    }

    #[must_use]
    pub fn lines(&self) -> HostLines {
        self.lines
    }

    /// Value driven on `uio_in`.
    #[must_use]
    pub fn data_out(&self) -> u8 {
        self.data_out
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Phase name for diagnostics.
    #[must_use]
    pub fn phase_name(&self) -> &'static str {
        match self.active.as_ref().map(|a| a.phase) {
            None => "idle",
            Some(Phase::Strobe) => "strobe",
            Some(Phase::Pulsed) => "pulsed",
            Some(Phase::Release) => "release",
        }
    }
}
