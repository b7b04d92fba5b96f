//! Discrete-event scheduler.
//!
//! Events are kept in a min-heap keyed by `(time, sequence)`. The sequence
//! number is assigned at insertion, so events due at the same instant come
//! out in the order they were scheduled.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::{Edge, SimContext, SimTime};

struct Pending<E> {
    at: SimTime,
    seq: u64,
    edge: Edge,
    event: E,
}

impl<E> PartialEq for Pending<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Pending<E> {}

impl<E> PartialOrd for Pending<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Pending<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Event queue ordered by simulated time.
pub struct Scheduler<E> {
    now: SimTime,
    seq: u64,
    queue: BinaryHeap<Reverse<Pending<E>>>,
}

impl<E> Scheduler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Time of the most recently popped event.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at an absolute time. Times in the past are clamped
    /// to `now`; the queue never runs backwards.
    pub fn schedule_at(&mut self, at: SimTime, edge: Edge, event: E) {
        let at = at.max(self.now);
        self.queue.push(Reverse(Pending {
            at,
            seq: self.seq,
            edge,
            event,
        }));
        self.seq += 1;
    }

    /// Schedule `event` a span of time after `now`.
    pub fn schedule_in(&mut self, delay: SimTime, edge: Edge, event: E) {
        self.schedule_at(self.now + delay, edge, event);
    }

    /// Time of the next due event, if any.
    #[must_use]
    pub fn next_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(p)| p.at)
    }

    /// Remove the next due event, advance `now` to it, and return it with
    /// the context its step function should see.
    pub fn pop(&mut self) -> Option<(SimContext, E)> {
        let Reverse(pending) = self.queue.pop()?;
        self.now = pending.at;
        Some((SimContext::new(pending.at, pending.edge), pending.event))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending event. Time is not rewound.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
