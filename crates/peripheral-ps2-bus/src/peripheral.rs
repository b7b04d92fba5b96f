//! Top level: ports, reset, and the two state machines around the shared
//! register file.

use sim_core::{Edge, Observable, SimContext, Value};

use crate::bus::{BusController, Transfer};
use crate::config::PeripheralConfig;
use crate::decoder::{FrameError, Ps2Decoder};
use crate::pins::{HostLines, UI_HOST_MASK, UI_PS2_CLK, UI_PS2_DATA, UI_PS2_MASK, status_byte};
use crate::registers::RegisterFile;

/// PS/2 receiver with a handshaked 8-bit bus interface.
pub struct Ps2BusPeripheral {
    config: PeripheralConfig,
    bus: BusController,
    decoder: Ps2Decoder,
    registers: RegisterFile,

    ui_in: u8,
    uio_in: u8,
    rst_n: bool,
    /// Last sampled PS2_CLK level, for fall detection.
    ps2_clk_sample: bool,
}

impl Ps2BusPeripheral {
    #[must_use]
    pub fn new(config: PeripheralConfig) -> Self {
        Self {
            config,
            bus: BusController::new(
                config.polarity,
                config.read_wait_states,
                config.write_wait_states,
                config.host_writable,
            ),
            decoder: Ps2Decoder::new(config.frame_timeout),
            registers: RegisterFile::new(),
            ui_in: 0,
            uio_in: 0,
            rst_n: true,
            ps2_clk_sample: false,
        }
    }

    // --- Inputs ---

    /// Drive the whole `ui_in` port. A PS2_CLK fall in the new value is
    /// decoded immediately, at `ctx.now`.
    pub fn set_ui_in(&mut self, ctx: &SimContext, value: u8) -> Option<Result<u8, FrameError>> {
        self.ui_in = value;
        let clk = value & UI_PS2_CLK != 0;
        let previous = std::mem::replace(&mut self.ps2_clk_sample, clk);
        if !self.rst_n || Edge::between(previous, clk) != Some(Edge::Falling) {
            return None;
        }
        let data = value & UI_PS2_DATA != 0;
        let ctx = SimContext::falling(ctx.now);
        self.decoder.step(&ctx, data, &mut self.registers)
    }

    /// Drive only the PS/2 bits of `ui_in`.
    pub fn set_ps2_lines(
        &mut self,
        ctx: &SimContext,
        clk: bool,
        data: bool,
    ) -> Option<Result<u8, FrameError>> {
        let bits = (if clk { UI_PS2_CLK } else { 0 }) | (if data { UI_PS2_DATA } else { 0 });
        self.set_ui_in(ctx, (self.ui_in & !UI_PS2_MASK) | bits)
    }

    /// Drive only the host bits of `ui_in`. Host lines never clock the
    /// decoder.
    pub fn set_host_lines(&mut self, lines: HostLines) {
        self.ui_in = (self.ui_in & !UI_HOST_MASK) | lines.to_ui_bits();
    }

    /// Drive the host side of the data bus.
    pub fn set_uio_in(&mut self, value: u8) {
        self.uio_in = value;
    }

    /// Drive the active-low reset input. It is sampled on the next rising
    /// host clock edge.
    pub fn set_rst_n(&mut self, level: bool) {
        self.rst_n = level;
    }

    /// Rising edge of the host clock.
    pub fn clock_rising(&mut self, ctx: &SimContext) -> Option<Transfer> {
        if !self.rst_n {
            self.reset();
            return None;
        }
        let ctx = SimContext::rising(ctx.now);
        self.bus
            .step(&ctx, self.host_lines(), self.uio_in, &mut self.registers)
    }

    /// Load the data register directly, without a bus cycle or interrupt.
    pub fn preload(&mut self, byte: u8) {
        self.registers.write(byte);
    }

    /// Return every state machine and the register file to power-on state.
    /// Input ports keep whatever the environment drives.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.decoder.reset();
        self.registers.reset();
        self.ps2_clk_sample = self.ui_in & UI_PS2_CLK != 0;
    }

    // --- Outputs ---

    /// DTACK pin level (`true` = high = idle or complete).
    #[must_use]
    pub fn dtack(&self) -> bool {
        self.bus.dtack(self.host_lines())
    }

    /// Interrupt pin level.
    #[must_use]
    pub fn interrupt(&self) -> bool {
        self.registers.interrupt()
    }

    /// Status port: bit 0 DTACK, bit 1 interrupt.
    #[must_use]
    pub fn uo_out(&self) -> u8 {
        status_byte(self.dtack(), self.interrupt())
    }

    /// Data bus as driven by the peripheral.
    #[must_use]
    pub fn uio_out(&self) -> u8 {
        self.bus.data_out()
    }

    /// Data bus output enable.
    #[must_use]
    pub fn uio_oe(&self) -> u8 {
        self.bus.output_enable()
    }

    #[must_use]
    pub fn ui_in(&self) -> u8 {
        self.ui_in
    }

    #[must_use]
    pub fn uio_in(&self) -> u8 {
        self.uio_in
    }

    #[must_use]
    pub fn rst_n(&self) -> bool {
        self.rst_n
    }

    #[must_use]
    pub fn host_lines(&self) -> HostLines {
        HostLines::from_ui_in(self.ui_in)
    }

    // --- Components ---

    #[must_use]
    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &BusController {
        &self.bus
    }

    #[must_use]
    pub fn decoder(&self) -> &Ps2Decoder {
        &self.decoder
    }

    #[must_use]
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }
}

impl Default for Ps2BusPeripheral {
    fn default() -> Self {
        Self::new(PeripheralConfig::default())
    }
}

const QUERY_PATHS: &[&str] = &[
    "bus.state",
    "bus.direction",
    "bus.dtack",
    "bus.ack",
    "bus.oe",
    "bus.data_out",
    "bus.data_rdy",
    "bus.cycles",
    "bus.wait_clocks",
    "ps2.state",
    "ps2.state_code",
    "ps2.bit_count",
    "ps2.shift",
    "ps2.frames",
    "ps2.parity_errors",
    "ps2.stop_errors",
    "ps2.timeouts",
    "ps2.last_error",
    "regs.data",
    "regs.data_ready",
    "regs.interrupt",
    "regs.overruns",
    "pins.ui_in",
    "pins.uo_out",
    "pins.uio_in",
    "pins.uio_out",
    "pins.uio_oe",
    "pins.rst_n",
];

impl Observable for Ps2BusPeripheral {
    fn query(&self, path: &str) -> Option<Value> {
        let stats = self.decoder.stats();
        let value: Value = match path {
            "bus.state" => self.bus.state().name().into(),
            "bus.direction" => match self.bus.direction() {
                crate::bus::Direction::Read => "read".into(),
                crate::bus::Direction::Write => "write".into(),
            },
            "bus.dtack" => self.dtack().into(),
            "bus.ack" => self.bus.acknowledged().into(),
            "bus.oe" => self.uio_oe().into(),
            "bus.data_out" => self.uio_out().into(),
            "bus.data_rdy" => self.bus.write_strobe().into(),
            "bus.cycles" => self.bus.cycles().into(),
            "bus.wait_clocks" => self.bus.wait_clocks().into(),
            "ps2.state" => self.decoder.state().name().into(),
            "ps2.state_code" => self.decoder.state().code().into(),
            "ps2.bit_count" => self.decoder.bit_count().into(),
            "ps2.shift" => self.decoder.shift().into(),
            "ps2.frames" => stats.frames.into(),
            "ps2.parity_errors" => stats.parity_errors.into(),
            "ps2.stop_errors" => stats.stop_errors.into(),
            "ps2.timeouts" => stats.timeouts.into(),
            "ps2.last_error" => match stats.last_error {
                Some(FrameError::Parity) => "parity".into(),
                Some(FrameError::Stop) => "stop".into(),
                Some(FrameError::Timeout) => "timeout".into(),
                None => "none".into(),
            },
            "regs.data" => self.registers.data().into(),
            "regs.data_ready" => self.registers.data_ready().into(),
            "regs.interrupt" => self.registers.interrupt().into(),
            "regs.overruns" => self.registers.overruns().into(),
            "pins.ui_in" => self.ui_in.into(),
            "pins.uo_out" => self.uo_out().into(),
            "pins.uio_in" => self.uio_in.into(),
            "pins.uio_out" => self.uio_out().into(),
            "pins.uio_oe" => self.uio_oe().into(),
            "pins.rst_n" => self.rst_n.into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
