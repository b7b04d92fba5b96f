//! Pin-level bench for the peripheral.
//!
//! Drives `ui_in`/`uio_in` directly and clocks the device by hand with a
//! 10 us host clock. Inputs are applied between edges and checked after an
//! edge, the way a cocotb bench awaits `RisingEdge`.

use peripheral_ps2_bus::pins::{
    UI_CS, UI_DS, UI_HOST_MASK, UI_PS2_CLK, UI_PS2_DATA, UI_RW, UO_DTACK, UO_INT,
};
use peripheral_ps2_bus::{BusState, DecoderState, Ps2BusPeripheral};
use sim_core::{Observable, SimContext, SimTime, Value};

const CLOCK_PERIOD: SimTime = SimTime::from_micros(10);
/// Half period of the PS/2 device clock (12.5 kHz).
const PS2_HALF: SimTime = SimTime::from_micros(40);

struct Bench {
    dut: Ps2BusPeripheral,
    now: SimTime,
    host_bits: u8,
}

impl Bench {
    /// Clock running, inputs low, reset held for one edge.
    fn setup() -> Self {
        let mut bench = Self {
            dut: Ps2BusPeripheral::default(),
            now: SimTime::ZERO,
            host_bits: 0,
        };
        bench.set_ui_in(0);
        bench.dut.set_rst_n(false);
        bench.rising_edge();
        bench.dut.set_rst_n(true);
        bench.rising_edge();
        bench
    }

    fn ctx(&self) -> SimContext {
        SimContext::rising(self.now)
    }

    fn rising_edge(&mut self) {
        self.now += CLOCK_PERIOD;
        let ctx = self.ctx();
        self.dut.clock_rising(&ctx);
    }

    /// Drive the host bits of `ui_in`, leaving the PS/2 lines where they are.
    fn set_ui_in(&mut self, value: u8) {
        self.host_bits = value & UI_HOST_MASK;
        let value = self.host_bits | (self.dut.ui_in() & !UI_HOST_MASK);
        let ctx = self.ctx();
        self.dut.set_ui_in(&ctx, value);
    }

    fn set_bit(&mut self, bit: u8) {
        let value = self.dut.ui_in() | bit;
        self.set_ui_in(value);
    }

    fn clear_bit(&mut self, bit: u8) {
        let value = self.dut.ui_in() & !bit;
        self.set_ui_in(value);
    }

    fn dtack(&self) -> u8 {
        self.dut.uo_out() & UO_DTACK
    }

    /// Device-side transmit, bit-banged on `ui_in` bits 0/1 while the host
    /// clock keeps running underneath.
    fn ps2_send(&mut self, bits: &[bool]) {
        for &bit in bits {
            self.ps2_phase(true, bit);
            self.ps2_phase(false, bit);
        }
        self.ps2_phase(true, true);
    }

    fn ps2_phase(&mut self, clk: bool, data: bool) {
        let value = self.host_bits
            | if clk { UI_PS2_CLK } else { 0 }
            | if data { UI_PS2_DATA } else { 0 };
        let ctx = self.ctx();
        self.dut.set_ui_in(&ctx, value);
        let edges = PS2_HALF.as_nanos() / CLOCK_PERIOD.as_nanos();
        for _ in 0..edges {
            self.rising_edge();
        }
    }
}

fn ps2_frame(byte: u8) -> Vec<bool> {
    let mut bits = vec![false];
    bits.extend((0..8).map(|i| byte & (1 << i) != 0));
    bits.push(byte.count_ones() % 2 == 0);
    bits.push(true);
    bits
}

fn query_u8(dut: &Ps2BusPeripheral, path: &str) -> u8 {
    match dut.query(path) {
        Some(Value::U8(v)) => v,
        other => panic!("{path}: {other:?}"),
    }
}

#[test]
fn write_test() {
    let mut bench = Bench::setup();
    assert_eq!(bench.dtack(), 1, "DTACK should be high");

    bench.clear_bit(UI_RW);
    bench.set_bit(UI_CS);
    bench.set_bit(UI_DS);
    bench.dut.set_uio_in(0x55);

    bench.rising_edge();
    assert_eq!(bench.dut.ui_in(), 0x0C, "CS and DS should start high");
    assert_eq!(bench.dut.uio_in(), 0x55, "data bus not set up");

    bench.rising_edge();
    assert_eq!(bench.dtack(), 0, "DTACK should be low");
    assert_eq!(bench.dut.query("bus.data_rdy"), Some(Value::Bool(true)));
    assert_eq!(bench.dut.registers().data(), 0x55);

    bench.clear_bit(UI_CS);
    bench.clear_bit(UI_DS);
    assert_eq!(bench.dtack(), 1, "DTACK should follow the released strobes");
    bench.rising_edge();
    assert_eq!(bench.dtack(), 1);
}

#[test]
fn read_test() {
    let mut bench = Bench::setup();

    bench.dut.preload(0xAA);
    bench.rising_edge();

    bench.set_bit(UI_RW);
    bench.set_bit(UI_CS);
    bench.set_bit(UI_DS);
    bench.rising_edge();

    bench.clear_bit(UI_CS);
    bench.clear_bit(UI_DS);
    bench.rising_edge();

    assert_eq!(bench.dut.uio_out(), 0xAA, "read value does not match");
    assert_eq!(bench.dut.uio_oe(), 0xFF);
}

#[test]
fn output_enable_only_during_read() {
    let mut bench = Bench::setup();
    bench.dut.preload(0x3C);
    assert_eq!(bench.dut.uio_oe(), 0);

    bench.set_ui_in(UI_CS | UI_DS);
    bench.dut.set_uio_in(0x12);
    bench.rising_edge();
    bench.rising_edge();
    assert_eq!(bench.dut.uio_oe(), 0, "write must not drive the bus");

    bench.set_ui_in(0);
    bench.rising_edge();
    bench.rising_edge();
    assert_eq!(bench.dut.uio_oe(), 0);
}

#[test]
fn ps2_byte_lands_in_register() {
    let mut bench = Bench::setup();
    bench.ps2_send(&ps2_frame(0x77));

    assert_eq!(bench.dut.registers().data(), 0x77);
    assert_eq!(bench.dut.uo_out() & UO_INT, UO_INT);
    assert_eq!(bench.dut.decoder().state(), DecoderState::Idle);
    assert_eq!(query_u8(&bench.dut, "regs.data"), 0x77);
}

#[test]
fn ps2_then_bus_read() {
    let mut bench = Bench::setup();
    bench.ps2_send(&ps2_frame(0x78));
    assert_eq!(bench.dut.uo_out(), UO_DTACK | UO_INT);

    bench.set_ui_in(UI_RW | UI_CS | UI_DS);
    bench.rising_edge();
    bench.rising_edge();
    assert_eq!(bench.dtack(), 0);
    assert_eq!(bench.dut.uio_out(), 0x78);
    assert_eq!(bench.dut.uo_out() & UO_INT, 0, "read should clear interrupt");

    bench.set_ui_in(UI_RW);
    assert_eq!(bench.dtack(), 1);
    bench.rising_edge();
    assert_eq!(bench.dut.bus().state(), BusState::S7);
    bench.rising_edge();
    assert_eq!(bench.dut.bus().state(), BusState::S0);
}

#[test]
fn frame_during_bus_cycle() {
    let mut bench = Bench::setup();
    bench.dut.preload(0x01);

    // Host holds a write open while the device sends; neither disturbs the
    // other and the later commit wins.
    bench.set_ui_in(UI_CS | UI_DS);
    bench.dut.set_uio_in(0x5A);
    bench.rising_edge();
    bench.rising_edge();
    assert_eq!(bench.dut.registers().data(), 0x5A);

    bench.ps2_send(&ps2_frame(0xC3));
    assert_eq!(bench.dtack(), 0, "write cycle still held");
    assert_eq!(bench.dut.registers().data(), 0xC3);
    assert!(bench.dut.interrupt());
}
