//! The shared data register and its status flags.
//!
//! This is the only state the bus controller and the decoder share. Both
//! reach it through `&mut` borrows handed out by the peripheral inside a
//! single edge evaluation, so a commit and a read can never interleave.

/// Side-effect-free view of the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterSnapshot {
    pub data: u8,
    pub data_ready: bool,
    pub interrupt: bool,
}

/// Data latch plus ready/interrupt flags.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    data: u8,
    data_ready: bool,
    interrupt: bool,
    /// Decoder commits that landed on an unread byte.
    overruns: u32,
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a byte unconditionally. Flags are left alone.
    pub fn write(&mut self, byte: u8) {
        self.data = byte;
    }

    /// Store a decoded byte and raise ready and interrupt.
    pub fn commit(&mut self, byte: u8) {
        if self.data_ready {
            self.overruns = self.overruns.saturating_add(1);
        }
        self.data = byte;
        self.data_ready = true;
        self.interrupt = true;
    }

    /// Return the stored byte and clear ready and interrupt.
    pub fn read(&mut self) -> u8 {
        self.data_ready = false;
        self.interrupt = false;
        self.data
    }

    #[must_use]
    pub fn peek(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            data: self.data,
            data_ready: self.data_ready,
            interrupt: self.interrupt,
        }
    }

    #[must_use]
    pub fn data(&self) -> u8 {
        self.data
    }

    #[must_use]
    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    #[must_use]
    pub fn interrupt(&self) -> bool {
        self.interrupt
    }

    #[must_use]
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
