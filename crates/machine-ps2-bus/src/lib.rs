//! PS/2 bus peripheral in a simulated system.
//!
//! `Ps2BusMachine` owns the peripheral, a [`BusMaster`] on the host side and
//! a [`Ps2Keyboard`] on the device side, and steps all of them from one
//! discrete-event [`Scheduler`]. The host clock and the PS/2 device clock
//! are independent event chains; events at the same instant run in the
//! order they were scheduled.

mod config;
mod error;
pub mod host;
pub mod keyboard;
#[cfg(feature = "native")]
pub mod mcp;

use std::sync::OnceLock;

use peripheral_ps2_bus::{FrameError, Ps2BusPeripheral, Transfer};
use sim_core::{Edge, Observable, Scheduler, SimContext, SimTime, Value};

pub use crate::config::{ConfigError, MachineConfig};
pub use crate::error::MachineError;
pub use crate::host::{BusCycle, BusMaster, BusRequest, BusView, CycleStyle};
pub use crate::keyboard::{FrameFault, Ps2Keyboard, encode_frame, odd_parity};
pub use peripheral_ps2_bus;
pub use sim_core;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    HostClockRise,
    Ps2HalfPeriod,
}

fn trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("PS2_BUS_TRACE").is_some())
}

/// The whole system: host, peripheral, keyboard.
pub struct Ps2BusMachine {
    config: MachineConfig,
    peripheral: Ps2BusPeripheral,
    host: BusMaster,
    keyboard: Ps2Keyboard,
    scheduler: Scheduler<Event>,
    /// A `Ps2HalfPeriod` event is in the queue.
    ps2_armed: bool,
    host_edges: u64,
    bus_cycles: u64,
    last_cycle: Option<BusCycle>,
    last_frame: Option<Result<u8, FrameError>>,
}

impl Ps2BusMachine {
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        config.validate()?;

        let host = BusMaster::new(config.peripheral.polarity);
        let mut peripheral = Ps2BusPeripheral::new(config.peripheral);
        let keyboard = Ps2Keyboard::new();
        let (clk, data) = keyboard.lines();
        peripheral.set_ps2_lines(&SimContext::rising(SimTime::ZERO), clk, data);
        peripheral.set_host_lines(host.lines());

        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(config.host_clock_period, Edge::Rising, Event::HostClockRise);

        Ok(Self {
            config,
            peripheral,
            host,
            keyboard,
            scheduler,
            ps2_armed: false,
            host_edges: 0,
            bus_cycles: 0,
            last_cycle: None,
            last_frame: None,
        })
    }

    /// Hold `rst_n` low across one host clock edge.
    ///
    /// Any bus cycle in flight is dropped and the keyboard queue is emptied.
    pub fn reset(&mut self) {
        self.host.abort();
        self.keyboard.reset();
        self.apply_host();
        let ctx = SimContext::rising(self.now());
        let (clk, data) = self.keyboard.lines();
        self.peripheral.set_ps2_lines(&ctx, clk, data);

        self.peripheral.set_rst_n(false);
        let edges = self.host_edges;
        while self.host_edges == edges {
            if self.step().is_none() {
                break;
            }
        }
        self.peripheral.set_rst_n(true);
        self.last_cycle = None;
        self.last_frame = None;
    }

    /// Process the next event. Returns its context.
    pub fn step(&mut self) -> Option<SimContext> {
        let (ctx, event) = self.scheduler.pop()?;
        match event {
            Event::HostClockRise => self.on_host_clock(&ctx),
            Event::Ps2HalfPeriod => self.on_ps2_half_period(&ctx),
        }
        Some(ctx)
    }

    /// Process every event up to and including `deadline`.
    pub fn run_until(&mut self, deadline: SimTime) {
        while self.scheduler.next_time().is_some_and(|t| t <= deadline) {
            self.step();
        }
    }

    pub fn run_for(&mut self, duration: SimTime) {
        self.run_until(self.now() + duration);
    }

    /// Step until `done` holds, or fail once the next event lies beyond
    /// `limit` from now.
    fn run_while_pending(
        &mut self,
        limit: SimTime,
        mut done: impl FnMut(&Self) -> bool,
    ) -> Result<(), MachineError> {
        let deadline = self.now() + limit;
        while !done(self) {
            match self.scheduler.next_time() {
                Some(t) if t <= deadline => {
                    self.step();
                }
                _ => return Err(MachineError::Timeout { limit }),
            }
        }
        Ok(())
    }

    fn on_host_clock(&mut self, ctx: &SimContext) {
        self.scheduler.schedule_in(
            self.config.host_clock_period,
            Edge::Rising,
            Event::HostClockRise,
        );
        self.host_edges += 1;

        if let Some(Transfer { direction, data }) = self.peripheral.clock_rising(ctx) {
            if trace_enabled() {
                eprintln!("[ps2-bus {}] bus {direction:?} {data:#04X}", ctx.now);
            }
        }

        let view = BusView::of(&self.peripheral);
        if let Some(cycle) = self.host.react(ctx, &view) {
            self.bus_cycles += 1;
            self.last_cycle = Some(cycle);
        }
        self.apply_host();
    }

    fn on_ps2_half_period(&mut self, ctx: &SimContext) {
        let Some(step) = self.keyboard.tick() else {
            self.ps2_armed = false;
            return;
        };

        if let Some(result) = self.peripheral.set_ps2_lines(ctx, step.clk, step.data) {
            if trace_enabled() {
                match result {
                    Ok(byte) => eprintln!("[ps2-bus {}] frame {byte:#04X}", ctx.now),
                    Err(e) => eprintln!("[ps2-bus {}] frame dropped: {e}", ctx.now),
                }
            }
            self.last_frame = Some(result);
        }

        if self.keyboard.is_busy() {
            let delay = if step.end_of_frame {
                self.config.ps2_frame_gap
            } else {
                self.config.ps2_clock_period.half()
            };
            let edge = self.keyboard.next_edge();
            self.scheduler.schedule_in(delay, edge, Event::Ps2HalfPeriod);
        } else {
            self.ps2_armed = false;
        }
    }

    fn apply_host(&mut self) {
        self.peripheral.set_host_lines(self.host.lines());
        self.peripheral.set_uio_in(self.host.data_out());
    }

    fn arm_keyboard(&mut self) {
        if !self.ps2_armed {
            self.ps2_armed = true;
            let edge = self.keyboard.next_edge();
            self.scheduler
                .schedule_in(self.config.ps2_clock_period.half(), edge, Event::Ps2HalfPeriod);
        }
    }

    // --- Bus helpers ---

    /// Run one bus cycle to completion.
    pub fn bus_cycle(&mut self, request: BusRequest) -> Result<BusCycle, MachineError> {
        self.host.start(request, self.now())?;
        self.apply_host();

        let before = self.bus_cycles;
        let result = self.run_while_pending(self.config.operation_limit, |m| m.bus_cycles > before);
        if let Err(e) = result {
            self.host.abort();
            self.apply_host();
            return Err(e);
        }
        self.last_cycle.ok_or(MachineError::Timeout {
            limit: self.config.operation_limit,
        })
    }

    /// Handshaked write.
    pub fn write(&mut self, byte: u8) -> Result<BusCycle, MachineError> {
        self.bus_cycle(BusRequest::write(byte))
    }

    /// Handshaked read. Clears the interrupt.
    pub fn read(&mut self) -> Result<u8, MachineError> {
        self.bus_cycle(BusRequest::read()).map(|c| c.data)
    }

    /// Read with the strobes asserted for a single clock.
    pub fn pulse_read(&mut self) -> Result<u8, MachineError> {
        self.bus_cycle(BusRequest::pulse_read()).map(|c| c.data)
    }

    // --- PS/2 helpers ---

    /// Queue a frame for the keyboard. Returns immediately.
    pub fn send_byte(&mut self, byte: u8) {
        self.send_frame(byte, FrameFault::None);
    }

    pub fn send_frame(&mut self, byte: u8, fault: FrameFault) {
        self.keyboard.send_with_fault(byte, fault);
        self.arm_keyboard();
    }

    /// Run until every queued frame is on the wire and the lines are idle.
    /// Returns the decoder's verdict on the last frame it finished during
    /// this flush, or `None` if none finished.
    pub fn flush_keyboard(&mut self) -> Result<Option<Result<u8, FrameError>>, MachineError> {
        self.last_frame = None;
        let frames = self.keyboard.pending() as u64 + 1;
        let limit = self.config.frame_time() * frames + self.config.operation_limit;
        self.run_while_pending(limit, |m| !m.keyboard.is_busy())?;
        Ok(self.last_frame)
    }

    /// Run until the interrupt line is high. Returns the time it was seen.
    pub fn wait_for_interrupt(&mut self, limit: SimTime) -> Result<SimTime, MachineError> {
        self.run_while_pending(limit, |m| m.peripheral.interrupt())?;
        Ok(self.now())
    }

    // --- Accessors ---

    /// Time of the last processed event.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[must_use]
    pub fn peripheral(&self) -> &Ps2BusPeripheral {
        &self.peripheral
    }

    /// Direct pin access, for tests that step the peripheral by hand.
    pub fn peripheral_mut(&mut self) -> &mut Ps2BusPeripheral {
        &mut self.peripheral
    }

    #[must_use]
    pub fn host(&self) -> &BusMaster {
        &self.host
    }

    #[must_use]
    pub fn keyboard(&self) -> &Ps2Keyboard {
        &self.keyboard
    }

    #[must_use]
    pub fn host_edges(&self) -> u64 {
        self.host_edges
    }

    #[must_use]
    pub fn last_cycle(&self) -> Option<BusCycle> {
        self.last_cycle
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<Result<u8, FrameError>> {
        self.last_frame
    }

    /// Every concrete query path, machine first.
    #[must_use]
    pub fn all_query_paths(&self) -> Vec<&'static str> {
        MACHINE_PATHS
            .iter()
            .chain(self.peripheral.query_paths())
            .copied()
            .collect()
    }
}

const MACHINE_PATHS: &[&str] = &[
    "machine.now_ns",
    "machine.host_edges",
    "machine.bus_cycles",
    "host.busy",
    "host.phase",
    "keyboard.busy",
    "keyboard.pending",
    "keyboard.frames_sent",
];

impl Observable for Ps2BusMachine {
    fn query(&self, path: &str) -> Option<Value> {
        let value: Value = match path {
            "machine.now_ns" => self.now().as_nanos().into(),
            "machine.host_edges" => self.host_edges.into(),
            "machine.bus_cycles" => self.bus_cycles.into(),
            "host.busy" => self.host.is_busy().into(),
            "host.phase" => self.host.phase_name().into(),
            "keyboard.busy" => self.keyboard.is_busy().into(),
            "keyboard.pending" => (self.keyboard.pending() as u64).into(),
            "keyboard.frames_sent" => self.keyboard.frames_sent().into(),
            _ => return self.peripheral.query(path),
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "machine.now_ns",
            "machine.host_edges",
            "machine.bus_cycles",
            "host.busy",
            "host.phase",
            "keyboard.busy",
            "keyboard.pending",
            "keyboard.frames_sent",
            "bus.<peripheral_paths>",
            "ps2.<peripheral_paths>",
            "regs.<peripheral_paths>",
            "pins.<peripheral_paths>",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peripheral_ps2_bus::{BusState, DecoderState};

    fn machine() -> Ps2BusMachine {
        let mut m = Ps2BusMachine::new(MachineConfig::default()).expect("valid config");
        m.reset();
        m
    }

    #[test]
    fn idle_machine_keeps_dtack_high() {
        let mut m = machine();
        m.run_for(SimTime::from_millis(1));
        assert!(m.peripheral().dtack());
        assert!(!m.peripheral().interrupt());
        assert_eq!(m.peripheral().bus().state(), BusState::S0);
        assert!(m.host_edges() >= 100);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = MachineConfig {
            host_clock_period: SimTime::ZERO,
            ..MachineConfig::default()
        };
        assert!(matches!(
            Ps2BusMachine::new(config),
            Err(MachineError::Config(ConfigError::ZeroHostClock))
        ));
    }

    #[test]
    fn write_then_read() {
        let mut m = machine();
        let cycle = m.write(0x55).expect("write");
        assert_eq!(cycle.latency, 2);
        assert_eq!(m.read().expect("read"), 0x55);
        assert!(m.peripheral().dtack());
    }

    #[test]
    fn frame_raises_interrupt() {
        let mut m = machine();
        m.send_byte(0x1C);
        assert_eq!(m.flush_keyboard().expect("flush"), Some(Ok(0x1C)));
        assert!(m.peripheral().interrupt());
        assert_eq!(m.peripheral().decoder().state(), DecoderState::Idle);
        assert_eq!(m.keyboard().frames_sent(), 1);
    }

    #[test]
    fn wait_for_interrupt_times_out() {
        let mut m = machine();
        assert_eq!(
            m.wait_for_interrupt(SimTime::from_micros(200)),
            Err(MachineError::Timeout {
                limit: SimTime::from_micros(200)
            })
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut m = machine();
        m.send_byte(0x33);
        m.flush_keyboard().expect("flush");
        m.send_byte(0x44);
        m.run_for(SimTime::from_micros(300));
        m.reset();
        assert!(!m.peripheral().interrupt());
        assert_eq!(m.peripheral().registers().data(), 0);
        assert!(!m.keyboard().is_busy());
        assert_eq!(m.peripheral().decoder().state(), DecoderState::Idle);

        // The stale keyboard event drains without re-arming twice.
        m.send_byte(0x55);
        assert_eq!(m.flush_keyboard().expect("flush"), Some(Ok(0x55)));
    }

    #[test]
    fn machine_paths_answer() {
        let m = machine();
        for path in m.all_query_paths() {
            assert!(m.query(path).is_some(), "no value for {path}");
        }
        assert_eq!(m.query("host.phase"), Some(Value::from("idle")));
        assert_eq!(m.query("regs.data"), Some(Value::U8(0)));
    }
}
