//! PS/2 receiver with an acknowledge-handshaked 8-bit bus interface.
//!
//! Two state machines share one data register:
//!
//! - The **bus controller** answers host reads and writes with DTACK,
//!   inserting wait states by withholding the acknowledge.
//! - The **frame decoder** samples PS/2 CLK/DATA, assembles 11-bit frames,
//!   and commits each valid byte with an interrupt.
//!
//! # Ports
//!
//! | Port      | Bit | Signal                         |
//! |-----------|-----|--------------------------------|
//! | `ui_in`   | 0   | PS2_CLK                        |
//! | `ui_in`   | 1   | PS2_DATA                       |
//! | `ui_in`   | 2   | CS                             |
//! | `ui_in`   | 3   | DS                             |
//! | `ui_in`   | 4   | RW (1 = read)                  |
//! | `uo_out`  | 0   | DTACK (active low)             |
//! | `uo_out`  | 1   | INTERRUPT                      |
//! | `uio_*`   | 7-0 | data bus, `uio_oe` = 0xFF on reads |
//!
//! The bus controller steps on rising edges of the host clock. The decoder
//! steps on falling edges of PS2_CLK, which the device drives on its own
//! schedule. Both take a [`sim_core::SimContext`] for the edge being
//! evaluated.

pub mod bus;
mod config;
pub mod decoder;
mod peripheral;
pub mod pins;
pub mod registers;

pub use bus::{BusController, BusState, Direction, Transfer};
pub use config::{DEFAULT_FRAME_TIMEOUT, PeripheralConfig};
pub use decoder::{DecoderState, DecoderStats, FrameError, Ps2Decoder};
pub use peripheral::Ps2BusPeripheral;
pub use pins::{HostLines, Polarity};
pub use registers::{RegisterFile, RegisterSnapshot};
