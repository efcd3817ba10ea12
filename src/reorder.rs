//! Reorder Buffer -- receiver side (spec §4.4).
//!
//! Enforces in-order delivery of reliable frames, buffers out-of-order
//! arrivals, emits duplicate ACKs on detected gaps, and skips an expected
//! sequence after a gap timeout. Owned exclusively by the receive/timer
//! worker task -- no external synchronization (spec §5).
//!
//! Grounded on `examples/original_source/src/reliability/reorder_buffer.py`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::EndpointConfig;
use crate::constants::SEQ_SPACE;
use crate::frame::Frame;

/// Wraparound-aware ordering predicate (spec §4.5). Returns true iff the
/// unsigned difference `(seq - expected) mod SEQ_SPACE` lies in
/// `(0, SEQ_SPACE/2)` -- the "forward half" of the sequence circle.
pub fn is_ahead(seq: u16, expected: u16) -> bool {
    let diff = (seq as u32 + SEQ_SPACE - expected as u32) % SEQ_SPACE;
    diff > 0 && diff < SEQ_SPACE / 2
}

/// True iff `seq` is strictly behind `expected` (the complementary,
/// non-zero half of the circle).
pub fn is_behind(seq: u16, expected: u16) -> bool {
    seq != expected && !is_ahead(seq, expected)
}

struct Slot {
    frame: Frame,
}

pub struct ReorderBuffer {
    expected_seq: u16,
    buffer: HashMap<u16, Slot>,
    gap_start_time: Option<Instant>,
    /// Last in-order sequence ACKed; `None` means "none yet".
    last_acked: Option<u16>,
    delivered: u64,
    reordered: u64,
    skipped: u64,
    dup_ack_sent: u64,
    max_size: usize,
    gap_timeout: Duration,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::with_config(&EndpointConfig::default())
    }

    pub fn with_config(config: &EndpointConfig) -> Self {
        Self {
            expected_seq: 0,
            buffer: HashMap::new(),
            gap_start_time: None,
            last_acked: None,
            delivered: 0,
            reordered: 0,
            skipped: 0,
            dup_ack_sent: 0,
            max_size: config.reorder_buffer_size,
            gap_timeout: config.reorder_timeout,
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn reordered(&self) -> u64 {
        self.reordered
    }

    pub fn dup_ack_sent(&self) -> u64 {
        self.dup_ack_sent
    }

    /// Advance past `expected_seq` because the gap timed out, then drain any
    /// now-contiguous buffered slots. Shared by [`Self::add`] step 1 and
    /// [`Self::check_timeout`].
    fn skip_gap_and_drain(&mut self, out: &mut Vec<Frame>) {
        tracing::debug!(
            expected = self.expected_seq,
            "reorder gap exceeded timeout, skipping"
        );
        self.skipped += 1;
        self.expected_seq = self.expected_seq.wrapping_add(1);
        self.gap_start_time = None;
        self.drain_contiguous(out, false);
    }

    fn drain_contiguous(&mut self, out: &mut Vec<Frame>, count_as_reordered: bool) {
        while let Some(slot) = self.buffer.remove(&self.expected_seq) {
            out.push(slot.frame);
            self.delivered += 1;
            if count_as_reordered {
                self.reordered += 1;
            }
            self.expected_seq = self.expected_seq.wrapping_add(1);
        }
    }

    /// Add a received reliable frame, returning the frames now ready for
    /// in-order delivery (0..N). `send_dup_ack` is invoked with the last
    /// in-order sequence when a duplicate ACK should be emitted (spec
    /// §4.4 "Duplicate-ACK emission policy").
    pub fn add(&mut self, seq: u16, frame: Frame, mut send_dup_ack: impl FnMut(u16)) -> Vec<Frame> {
        let mut out = Vec::new();
        let now = Instant::now();

        // Step 1: timeout sweep.
        if let Some(gap_start) = self.gap_start_time {
            if now.duration_since(gap_start) >= self.gap_timeout {
                self.skip_gap_and_drain(&mut out);
            }
        }

        // Step 2: classify seq relative to (possibly just-advanced) expected_seq.
        if seq == self.expected_seq {
            out.push(frame);
            self.expected_seq = self.expected_seq.wrapping_add(1);
            self.gap_start_time = None;
            self.last_acked = Some(seq);
            self.delivered += 1;
            self.drain_contiguous(&mut out, true);
        } else if is_ahead(seq, self.expected_seq) {
            if self.buffer.len() < self.max_size {
                self.buffer.entry(seq).or_insert(Slot { frame });
                if self.gap_start_time.is_none() {
                    self.gap_start_time = Some(now);
                }
                if let Some(last_acked) = self.last_acked {
                    send_dup_ack(last_acked);
                    self.dup_ack_sent += 1;
                }
            } else {
                tracing::debug!(seq, "reorder buffer full, dropping out-of-order frame");
            }
        } else if is_behind(seq, self.expected_seq) {
            tracing::debug!(seq, expected = self.expected_seq, "discarding late/duplicate frame");
        }

        out
    }

    /// Periodic entry point for the worker when no datagram has arrived
    /// recently. Performs only the timeout sweep (spec §4.4 `check_timeout`).
    pub fn check_timeout(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        if let Some(gap_start) = self.gap_start_time {
            if Instant::now().duration_since(gap_start) >= self.gap_timeout {
                self.skip_gap_and_drain(&mut out);
            }
        }
        out
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}
