//! Controller receive-buffer accounting with flow control
//!
//! Models the bytes the controller is assumed to be holding in its serial
//! receive buffer. One pending entry is appended per command sent and popped
//! (FIFO) as each acknowledgment or error arrives, mirroring the firmware's
//! consumption order. Status-query bytes are accounted out-of-band: they
//! charge one byte each and are freed when a status report is decoded, since
//! the firmware answers them without emitting an `ok`.
//!
//! Admission control checks against a watermark below the hard capacity to
//! leave headroom for firmware-side buffering jitter.

use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct BufferState {
    used: usize,
    pending: VecDeque<usize>,
    query_bytes: usize,
}

/// Byte-accurate model of the controller's receive buffer.
///
/// The pending queue is the single shared, mutated structure between the
/// encode (producer) and decode (consumer) directions, so all state lives
/// behind one lock.
#[derive(Debug)]
pub struct InputBuffer {
    capacity: usize,
    watermark: f64,
    state: Mutex<BufferState>,
}

impl InputBuffer {
    /// Create a buffer model for a controller with the given capacity and
    /// high-watermark fraction (typically 0.90).
    pub fn new(capacity: usize, watermark_fraction: f64) -> Self {
        Self {
            capacity,
            watermark: capacity as f64 * watermark_fraction,
            state: Mutex::new(BufferState::default()),
        }
    }

    /// Hard capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admission ceiling in bytes.
    pub fn watermark(&self) -> f64 {
        self.watermark
    }

    /// Bytes currently assumed to be held by the controller.
    pub fn used(&self) -> usize {
        self.state.lock().used
    }

    /// Number of commands awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Would a payload of `len` bytes fit under the watermark right now?
    pub fn fits(&self, len: usize) -> bool {
        (self.state.lock().used + len) as f64 <= self.watermark
    }

    /// Record a sent command of `len` payload bytes.
    pub fn charge(&self, len: usize) {
        let mut state = self.state.lock();
        state.pending.push_back(len);
        state.used = (state.used + len).min(self.capacity);
    }

    /// Record one status-query byte, accounted outside the pending queue.
    pub fn charge_query(&self) {
        let mut state = self.state.lock();
        state.query_bytes += 1;
        state.used = (state.used + 1).min(self.capacity);
    }

    /// Free the oldest pending command on acknowledgment or error.
    ///
    /// Returns the number of bytes freed, or `None` when nothing was
    /// outstanding (a spontaneous `ok`, e.g. after a soft reset).
    pub fn acknowledge(&self) -> Option<usize> {
        let mut state = self.state.lock();
        let len = state.pending.pop_front()?;
        state.used = state.used.saturating_sub(len);
        Some(len)
    }

    /// Free one outstanding status-query byte when a status report arrives.
    pub fn note_status_report(&self) {
        let mut state = self.state.lock();
        if state.query_bytes > 0 {
            state.query_bytes -= 1;
            state.used = state.used.saturating_sub(1);
        }
    }

    /// Reset all accounting to zero (connect, soft reset, queue flush).
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.used = 0;
        state.pending.clear();
        state.query_bytes = 0;
    }
}
