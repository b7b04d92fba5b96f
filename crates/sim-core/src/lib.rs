//! Core types for edge-driven discrete-event hardware simulation.
//!
//! Synchronous logic is evaluated once per clock edge. Independent clock
//! domains are multiplexed through a single [`Scheduler`] ordered by
//! simulated time, and every step function receives the current
//! [`SimContext`] explicitly. There is no global clock.

mod context;
mod observable;
mod scheduler;
mod time;

pub use context::{Edge, SimContext};
pub use observable::{Observable, Value};
pub use scheduler::Scheduler;
pub use time::SimTime;
