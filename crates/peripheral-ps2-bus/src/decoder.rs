//! PS/2 device-to-host frame decoder.
//!
//! A frame is 11 bits clocked by the device: a start bit (0), eight data
//! bits LSB first, an odd parity bit, and a stop bit (1). The device changes
//! DATA while CLK is high, so the decoder samples DATA on each CLK fall.
//!
//! Malformed frames are dropped. Nothing reaches the register file and no
//! interrupt is raised; the error is only counted in [`DecoderStats`].

use std::fmt;

use sim_core::{SimContext, SimTime};

use crate::registers::RegisterFile;

/// Decoder position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for a start bit.
    Idle,
    /// Shifting in the eight data bits.
    Receiving,
    /// All data bits in; the next fall carries parity.
    ParityPending,
    /// Parity sampled; the next fall carries the stop bit.
    StopPending,
}

impl DecoderState {
    /// Numeric state code as exposed on the debug interface.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Receiving => 2,
            Self::ParityPending => 3,
            Self::StopPending => 4,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Receiving => "receiving",
            Self::ParityPending => "parity",
            Self::StopPending => "stop",
        }
    }
}

/// Why a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The nine data and parity bits held an even number of ones.
    Parity,
    /// The stop bit was 0.
    Stop,
    /// The device went quiet mid-frame for longer than the frame timeout.
    Timeout,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parity => write!(f, "PS/2 parity error (expected odd parity)"),
            Self::Stop => write!(f, "PS/2 framing error (stop bit was 0)"),
            Self::Timeout => write!(f, "PS/2 frame abandoned mid-transfer"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Receive counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    pub frames: u32,
    pub parity_errors: u32,
    pub stop_errors: u32,
    pub timeouts: u32,
    pub last_error: Option<FrameError>,
}

impl DecoderStats {
    fn record(&mut self, error: FrameError) {
        let counter = match error {
            FrameError::Parity => &mut self.parity_errors,
            FrameError::Stop => &mut self.stop_errors,
            FrameError::Timeout => &mut self.timeouts,
        };
        *counter = counter.saturating_add(1);
        self.last_error = Some(error);
    }
}

impl fmt::Display for DecoderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} parity_err={} stop_err={} timeouts={}",
            self.frames, self.parity_errors, self.stop_errors, self.timeouts
        )
    }
}

/// Frame decoder state machine.
pub struct Ps2Decoder {
    state: DecoderState,
    /// Data bits received so far, LSB first.
    shift: u8,
    /// Number of data bits in `shift` (0-8).
    bit_count: u8,
    /// XOR of the data bits received so far.
    parity: bool,
    /// Result of the parity check, valid in `StopPending`.
    parity_ok: bool,
    /// Time of the last sampled CLK fall.
    last_edge: Option<SimTime>,
    frame_timeout: Option<SimTime>,
    stats: DecoderStats,
}

impl Ps2Decoder {
    #[must_use]
    pub fn new(frame_timeout: Option<SimTime>) -> Self {
        Self {
            state: DecoderState::Idle,
            shift: 0,
            bit_count: 0,
            parity: false,
            parity_ok: false,
            last_edge: None,
            frame_timeout,
            stats: DecoderStats::default(),
        }
    }

    /// Evaluate one PS2_CLK fall with DATA at `data`.
    ///
    /// Returns `Some(Ok(byte))` when a frame was committed to `regs`, and
    /// `Some(Err(_))` when a frame was rejected or abandoned.
    pub fn step(
        &mut self,
        ctx: &SimContext,
        data: bool,
        regs: &mut RegisterFile,
    ) -> Option<Result<u8, FrameError>> {
        let abandoned = self.check_timeout(ctx.now);
        self.last_edge = Some(ctx.now);

        match self.state {
            DecoderState::Idle => {
                if !data {
                    self.begin_frame();
                }
                abandoned.map(Err)
            }
            DecoderState::Receiving => {
                if data {
                    self.shift |= 1 << self.bit_count;
                }
                self.parity ^= data;
                self.bit_count += 1;
                if self.bit_count == 8 {
                    self.state = DecoderState::ParityPending;
                }
                None
            }
            DecoderState::ParityPending => {
                // Odd parity: data bits and parity bit XOR to 1.
                self.parity_ok = self.parity ^ data;
                self.state = DecoderState::StopPending;
                None
            }
            DecoderState::StopPending => {
                self.state = DecoderState::Idle;
                let result = if !data {
                    Err(FrameError::Stop)
                } else if !self.parity_ok {
                    Err(FrameError::Parity)
                } else {
                    Ok(self.shift)
                };
                match result {
                    Ok(byte) => {
                        regs.commit(byte);
                        self.stats.frames = self.stats.frames.saturating_add(1);
                    }
                    Err(error) => self.stats.record(error),
                }
                Some(result)
            }
        }
    }

    /// Drop a partial frame if the device has been quiet too long.
    fn check_timeout(&mut self, now: SimTime) -> Option<FrameError> {
        if self.state == DecoderState::Idle {
            return None;
        }
        let (Some(timeout), Some(last)) = (self.frame_timeout, self.last_edge) else {
            return None;
        };
        if now.since(last) <= timeout {
            return None;
        }
        self.state = DecoderState::Idle;
        self.stats.record(FrameError::Timeout);
        Some(FrameError::Timeout)
    }

    fn begin_frame(&mut self) {
        self.state = DecoderState::Receiving;
        self.shift = 0;
        self.bit_count = 0;
        self.parity = false;
        self.parity_ok = false;
    }

    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Data bits received in the current frame.
    #[must_use]
    pub fn bit_count(&self) -> u8 {
        self.bit_count
    }

    /// Partially assembled byte.
    #[must_use]
    pub fn shift(&self) -> u8 {
        self.shift
    }

    #[must_use]
    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.frame_timeout);
    }
}
