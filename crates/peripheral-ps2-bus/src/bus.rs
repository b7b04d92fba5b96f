//! Asynchronous bus interface controller.
//!
//! The host engages the peripheral with CS and DS and gives the direction
//! on RW. The controller answers through DTACK after a fixed latency plus
//! any configured wait states, and holds the acknowledge until the host
//! releases the strobes. There is no timeout: a slow peripheral just
//! withholds DTACK for longer.
//!
//! ```text
//!  S0 ──sel──> S2 ──────────────> S5 ──rel──> S7 ──> S0
//!              │      ┌─wait─┐     ▲ └!rel┘     │
//!              └─wait─┴> S4 ─┴─────┘            └─sel──> S2
//!
//!  sel = CS and DS asserted, rel = CS and DS both released
//! ```
//!
//! A cycle starts only when CS and DS are both asserted, but it ends only
//! when both are released: S5 holds while either strobe is still asserted.
//! DTACK is gated the same way, low while the internal acknowledge is set
//! and either strobe is asserted.

use sim_core::{Edge, SimContext};

use crate::pins::{HostLines, OE_DRIVE, Polarity};
use crate::registers::RegisterFile;

/// Controller micro-state. Names follow 68000 bus-cycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Idle, strobes not sampled.
    S0,
    /// Strobes sampled, direction latched.
    S2,
    /// Wait state: acknowledge withheld.
    S4,
    /// Transfer done, acknowledge asserted until the host releases.
    S5,
    /// Strobes released, acknowledge and output enable withdrawn.
    S7,
}

impl BusState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::S0 => "S0",
            Self::S2 => "S2",
            Self::S4 => "S4",
            Self::S5 => "S5",
            Self::S7 => "S7",
        }
    }
}

/// Direction of a bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A completed data transfer, reported on the edge it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub direction: Direction,
    pub data: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Hold,
    Latch,
    Wait,
    Transfer,
    Release,
}

/// Host strobes as seen by the controller on one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strobes {
    /// Neither CS nor DS asserted.
    Released,
    /// Exactly one of CS and DS asserted.
    Partial,
    /// Both asserted.
    Selected,
}

impl Strobes {
    const fn of(lines: HostLines, polarity: Polarity) -> Self {
        if lines.selected(polarity) {
            Self::Selected
        } else if lines.engaged(polarity) {
            Self::Partial
        } else {
            Self::Released
        }
    }
}

/// Next state and action for one rising edge.
const fn transition(state: BusState, strobes: Strobes, waiting: bool) -> (BusState, Action) {
    match (state, strobes, waiting) {
        (BusState::S0 | BusState::S7, Strobes::Selected, _) => (BusState::S2, Action::Latch),
        (BusState::S0 | BusState::S7, _, _) => (BusState::S0, Action::Hold),
        (BusState::S2 | BusState::S4, _, true) => (BusState::S4, Action::Wait),
        (BusState::S2 | BusState::S4, _, false) => (BusState::S5, Action::Transfer),
        (BusState::S5, Strobes::Released, _) => (BusState::S7, Action::Release),
        (BusState::S5, _, _) => (BusState::S5, Action::Hold),
    }
}

/// Bus interface controller.
pub struct BusController {
    state: BusState,
    direction: Direction,
    wait_remaining: u8,
    /// Internal acknowledge, before gating with the strobes.
    ack: bool,
    output_enable: bool,
    data_out: u8,
    /// A host write reached the register in this cycle.
    write_strobe: bool,

    polarity: Polarity,
    read_wait_states: u8,
    write_wait_states: u8,
    host_writable: bool,

    cycles: u64,
    wait_clocks: u64,
}

impl BusController {
    #[must_use]
    pub fn new(
        polarity: Polarity,
        read_wait_states: u8,
        write_wait_states: u8,
        host_writable: bool,
    ) -> Self {
        Self {
            state: BusState::S0,
            direction: Direction::Read,
            wait_remaining: 0,
            ack: false,
            output_enable: false,
            data_out: 0,
            write_strobe: false,
            polarity,
            read_wait_states,
            write_wait_states,
            host_writable,
            cycles: 0,
            wait_clocks: 0,
        }
    }

    /// Evaluate one host clock edge. Only rising edges advance the machine.
    pub fn step(
        &mut self,
        ctx: &SimContext,
        lines: HostLines,
        data_in: u8,
        regs: &mut RegisterFile,
    ) -> Option<Transfer> {
        if ctx.edge != Edge::Rising {
            return None;
        }

        let strobes = Strobes::of(lines, self.polarity);
        let (next, action) = transition(self.state, strobes, self.wait_remaining > 0);
        self.state = next;

        match action {
            Action::Hold => None,
            Action::Latch => {
                self.direction = if lines.rw {
                    Direction::Read
                } else {
                    Direction::Write
                };
                self.wait_remaining = match self.direction {
                    Direction::Read => self.read_wait_states,
                    Direction::Write => self.write_wait_states,
                };
                None
            }
            Action::Wait => {
                self.wait_remaining -= 1;
                self.wait_clocks += 1;
                None
            }
            Action::Transfer => {
                self.ack = true;
                let data = match self.direction {
                    Direction::Read => {
                        self.data_out = regs.read();
                        self.output_enable = true;
                        self.data_out
                    }
                    Direction::Write => {
                        if self.host_writable {
                            regs.write(data_in);
                            self.write_strobe = true;
                        }
                        data_in
                    }
                };
                Some(Transfer {
                    direction: self.direction,
                    data,
                })
            }
            Action::Release => {
                self.ack = false;
                self.output_enable = false;
                self.write_strobe = false;
                self.cycles += 1;
                None
            }
        }
    }

    /// DTACK pin level for the given host lines (`true` = high).
    #[must_use]
    pub fn dtack(&self, lines: HostLines) -> bool {
        !(self.ack && lines.engaged(self.polarity))
    }

    /// Value driven onto the data bus.
    #[must_use]
    pub fn data_out(&self) -> u8 {
        self.data_out
    }

    /// Output-enable byte for the data bus.
    #[must_use]
    pub fn output_enable(&self) -> u8 {
        if self.output_enable { OE_DRIVE } else { 0 }
    }

    #[must_use]
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Direction latched for the current (or last) cycle.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn acknowledged(&self) -> bool {
        self.ack
    }

    /// True while a host write is being held in S5.
    #[must_use]
    pub fn write_strobe(&self) -> bool {
        self.write_strobe
    }

    #[must_use]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Bus cycles that ran to release.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Wait states inserted since reset.
    #[must_use]
    pub fn wait_clocks(&self) -> u64 {
        self.wait_clocks
    }

    pub fn reset(&mut self) {
        *self = Self::new(
            self.polarity,
            self.read_wait_states,
            self.write_wait_states,
            self.host_writable,
        );
    }
}
