//! PS/2 device model: a keyboard that only transmits.
//!
//! Each queued byte becomes an 11-bit frame. The keyboard is stepped once
//! per half period of its clock: DATA changes while CLK is high, then CLK
//! falls and the receiver samples. After the last bit both lines return
//! high.

use std::collections::VecDeque;

use sim_core::Edge;

/// Deliberate corruption applied to a frame, for soak and error tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFault {
    #[default]
    None,
    /// Parity bit inverted.
    BadParity,
    /// Stop bit sent as 0.
    BadStop,
    /// Only the first `n` bits are clocked out.
    Truncate(u8),
}

/// Parity bit that makes the nine bits odd.
#[must_use]
pub fn odd_parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 0
}

/// Start, eight data bits LSB first, odd parity, stop.
#[must_use]
pub fn encode_frame(byte: u8) -> [bool; 11] {
    let mut bits = [false; 11];
    for (i, bit) in bits[1..9].iter_mut().enumerate() {
        *bit = byte & (1 << i) != 0;
    }
    bits[9] = odd_parity(byte);
    bits[10] = true;
    bits
}

fn faulty_frame(byte: u8, fault: FrameFault) -> Vec<bool> {
    let mut bits = encode_frame(byte).to_vec();
    match fault {
        FrameFault::None => {}
        FrameFault::BadParity => bits[9] = !bits[9],
        FrameFault::BadStop => bits[10] = false,
        FrameFault::Truncate(n) => bits.truncate(usize::from(n)),
    }
    bits
}

/// Line levels for one half period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardStep {
    pub clk: bool,
    pub data: bool,
    /// Lines released after the last bit of a frame.
    pub end_of_frame: bool,
}

struct ActiveFrame {
    bits: Vec<bool>,
    index: usize,
    /// Next step pulls CLK low.
    clock_low: bool,
}

/// Transmit-only PS/2 keyboard.
pub struct Ps2Keyboard {
    queue: VecDeque<Vec<bool>>,
    current: Option<ActiveFrame>,
    clk: bool,
    data: bool,
    frames_sent: u64,
}

impl Ps2Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            clk: true,
            data: true,
            frames_sent: 0,
        }
    }

    /// Queue a well-formed frame.
    pub fn send(&mut self, byte: u8) {
        self.send_with_fault(byte, FrameFault::None);
    }

    pub fn send_with_fault(&mut self, byte: u8, fault: FrameFault) {
        self.queue.push_back(faulty_frame(byte, fault));
    }

    /// Advance one half period. Returns `None` when there is nothing to send.
    pub fn tick(&mut self) -> Option<KeyboardStep> {
        if self.current.is_none() {
            self.current = self.queue.pop_front().map(|bits| ActiveFrame {
                bits,
                index: 0,
                clock_low: false,
            });
        }
        let frame = self.current.as_mut()?;

        let step = match frame.bits.get(frame.index).copied() {
            Some(bit) if frame.clock_low => {
                frame.clock_low = false;
                frame.index += 1;
                KeyboardStep {
                    clk: false,
                    data: bit,
                    end_of_frame: false,
                }
            }
            Some(bit) => {
                frame.clock_low = true;
                KeyboardStep {
                    clk: true,
                    data: bit,
                    end_of_frame: false,
                }
            }
            None => {
                self.current = None;
                self.frames_sent += 1;
                KeyboardStep {
                    clk: true,
                    data: true,
                    end_of_frame: true,
                }
            }
        };
        self.clk = step.clk;
        self.data = step.data;
        Some(step)
    }

    /// Clock edge the next [`tick`](Self::tick) produces.
    #[must_use]
    pub fn next_edge(&self) -> Edge {
        match &self.current {
            Some(frame) if frame.clock_low && frame.index < frame.bits.len() => Edge::Falling,
            _ => Edge::Rising,
        }
    }

    /// A frame is on the wire or waiting.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    /// Frames queued behind the one on the wire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Current (CLK, DATA) levels.
    #[must_use]
    pub fn lines(&self) -> (bool, bool) {
        (self.clk, self.data)
    }

    /// Drop everything queued and release the lines.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Ps2Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the keyboard dry and return the DATA level at every CLK fall.
    fn sampled_bits(kb: &mut Ps2Keyboard) -> Vec<bool> {
        let mut bits = Vec::new();
        while let Some(step) = kb.tick() {
            if !step.clk {
                bits.push(step.data);
            }
        }
        bits
    }

    #[test]
    fn frame_encoding() {
        // 0x78 has four ones, so parity is 1.
        assert_eq!(
            encode_frame(0x78),
            [false, false, false, false, true, true, true, true, false, true, true]
        );
        assert!(!odd_parity(0x01));
        assert!(odd_parity(0x00));
    }

    #[test]
    fn data_settles_before_clock_falls() {
        let mut kb = Ps2Keyboard::new();
        kb.send(0xFF);
        let high = kb.tick().expect("setup phase");
        let low = kb.tick().expect("sample phase");
        assert!(high.clk && !low.clk);
        assert_eq!(high.data, low.data);
        assert!(!low.data, "start bit");
    }

    #[test]
    fn whole_frame_then_release() {
        let mut kb = Ps2Keyboard::new();
        kb.send(0x5A);
        assert!(kb.is_busy());
        assert_eq!(sampled_bits(&mut kb), encode_frame(0x5A).to_vec());
        assert!(!kb.is_busy());
        assert_eq!(kb.lines(), (true, true));
        assert_eq!(kb.frames_sent(), 1);
    }

    #[test]
    fn end_of_frame_marks_gap() {
        let mut kb = Ps2Keyboard::new();
        kb.send(0x01);
        kb.send(0x02);
        let steps: Vec<_> = std::iter::from_fn(|| kb.tick()).collect();
        assert_eq!(steps.len(), 2 * 23);
        assert!(steps[22].end_of_frame);
        assert!(steps[45].end_of_frame);
        assert_eq!(steps.iter().filter(|s| s.end_of_frame).count(), 2);
    }

    #[test]
    fn faults() {
        let mut kb = Ps2Keyboard::new();
        kb.send_with_fault(0x00, FrameFault::BadParity);
        assert!(!sampled_bits(&mut kb)[9]);

        kb.send_with_fault(0x00, FrameFault::BadStop);
        assert!(!sampled_bits(&mut kb)[10]);

        kb.send_with_fault(0x00, FrameFault::Truncate(4));
        assert_eq!(sampled_bits(&mut kb).len(), 4);
    }

    #[test]
    fn next_edge_tracks_phase() {
        let mut kb = Ps2Keyboard::new();
        kb.send(0x00);
        assert_eq!(kb.next_edge(), Edge::Rising);
        kb.tick();
        assert_eq!(kb.next_edge(), Edge::Falling);
        kb.tick();
        assert_eq!(kb.next_edge(), Edge::Rising);
    }

    #[test]
    fn reset_drops_queue() {
        let mut kb = Ps2Keyboard::new();
        kb.send(0x11);
        kb.send(0x22);
        kb.tick();
        kb.reset();
        assert!(!kb.is_busy());
        assert_eq!(kb.tick(), None);
        assert_eq!(kb.lines(), (true, true));
    }
}
