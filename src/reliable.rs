//! Reliable Channel -- sender side (spec §4.3).
//!
//! Tracks unacknowledged reliable frames, drives timer-based retransmission,
//! and performs duplicate-ACK-triggered fast retransmit. Grounded on
//! `examples/original_source/src/reliability/reliable_channel.py`, restated
//! with the teacher's (`strandstream`) locking discipline: a single
//! `parking_lot::Mutex` over the tracking maps, released before any socket
//! I/O happens.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::EndpointConfig;
use crate::constants::SEQ_SPACE;
use crate::metrics::Metrics;

/// A reliable frame awaiting acknowledgement.
struct PendingEntry {
    bytes: Bytes,
    dest: SocketAddr,
    send_time: Instant,
    retry_count: u32,
}

/// Outcome of [`ReliableChannel::on_duplicate_ack`] and the retransmission
/// scan, telling the caller what (if anything) to put back on the wire.
pub struct Retransmission {
    pub bytes: Bytes,
    pub dest: SocketAddr,
}

#[derive(Default)]
struct Inner {
    pending: HashMap<u16, PendingEntry>,
    dup_ack_count: HashMap<u16, u32>,
}

/// Sender-side tracking state for the reliable channel.
pub struct ReliableChannel {
    inner: Mutex<Inner>,
    max_retransmits: u32,
    dup_ack_threshold: u32,
}

impl ReliableChannel {
    pub fn new() -> Self {
        Self::with_config(&EndpointConfig::default())
    }

    pub fn with_config(config: &EndpointConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_retransmits: config.max_retransmits,
            dup_ack_threshold: config.dup_ack_threshold,
        }
    }

    /// Register a newly sent reliable frame for ACK tracking (spec
    /// `track(frame_bytes, seq, dest)`). Replaces any prior entry for the
    /// same `seq`, since a wrapped-around counter value must never
    /// accumulate stale tracking state.
    pub fn track(&self, bytes: Bytes, seq: u16, dest: SocketAddr) {
        let mut inner = self.inner.lock();
        inner.pending.insert(
            seq,
            PendingEntry {
                bytes,
                dest,
                send_time: Instant::now(),
                retry_count: 0,
            },
        );
    }

    /// Apply an inbound ACK. Returns the RTT if this ACK newly acknowledged
    /// a pending frame (spec `acknowledge(ack_seq)`).
    pub fn acknowledge(&self, ack_seq: u16) -> Option<std::time::Duration> {
        let mut inner = self.inner.lock();
        let entry = inner.pending.remove(&ack_seq)?;
        inner.dup_ack_count.remove(&ack_seq);
        Some(entry.send_time.elapsed())
    }

    /// True iff `seq` currently has an in-flight pending entry (used by the
    /// caller to decide whether an ACK is fresh or a duplicate of
    /// `last_acked_seq`, spec §4.3).
    pub fn is_pending(&self, seq: u16) -> bool {
        self.inner.lock().pending.contains_key(&seq)
    }

    /// Handle a duplicate ACK for `ack_seq` (spec `on_duplicate_ack`).
    /// Returns the frame to retransmit immediately once
    /// [`crate::constants::DUP_ACK_THRESHOLD`] duplicates have been seen for
    /// the same `ack_seq`, or `None` if no fast retransmit is warranted.
    pub fn on_duplicate_ack(&self, ack_seq: u16, metrics: &Metrics) -> Option<Retransmission> {
        let mut inner = self.inner.lock();
        let count = inner.dup_ack_count.entry(ack_seq).or_insert(0);
        *count += 1;
        if *count < self.dup_ack_threshold {
            return None;
        }

        let missing = ((ack_seq as u32 + 1) % SEQ_SPACE) as u16;
        let result = match inner.pending.get_mut(&missing) {
            Some(entry) if entry.retry_count < self.max_retransmits => {
                entry.retry_count += 1;
                entry.send_time = Instant::now();
                let retransmission = Retransmission {
                    bytes: entry.bytes.clone(),
                    dest: entry.dest,
                };
                Metrics::incr(&metrics.fast_retransmits);
                Metrics::incr(&metrics.packets_retransmitted);
                Metrics::incr(&metrics.total_retry_attempts);
                Some(retransmission)
            }
            _ => None,
        };

        if result.is_some() {
            inner.dup_ack_count.insert(ack_seq, 0);
        }
        result
    }

    /// Scan for entries whose retransmit timer has elapsed. Returns frames
    /// to resend (socket I/O happens after this call, lock-free) and removes
    /// entries that have exhausted their retry budget, marking them failed.
    pub fn scan_for_retransmit(&self, timeout: std::time::Duration, metrics: &Metrics) -> Vec<Retransmission> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let mut to_resend = Vec::new();
        let mut to_fail = Vec::new();

        for (&seq, entry) in inner.pending.iter_mut() {
            if now.duration_since(entry.send_time) < timeout {
                continue;
            }
            if entry.retry_count < self.max_retransmits {
                entry.retry_count += 1;
                entry.send_time = now;
                to_resend.push(Retransmission {
                    bytes: entry.bytes.clone(),
                    dest: entry.dest,
                });
                Metrics::incr(&metrics.packets_retransmitted);
                Metrics::incr(&metrics.total_retry_attempts);
            } else {
                to_fail.push(seq);
            }
        }

        for seq in to_fail {
            inner.pending.remove(&seq);
            inner.dup_ack_count.remove(&seq);
            Metrics::incr(&metrics.packets_failed);
            tracing::warn!(seq, "reliable frame failed after exhausting retry budget");
        }

        to_resend
    }

    /// Number of reliable frames currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl Default for ReliableChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DUP_ACK_THRESHOLD, MAX_RETRANSMITS};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn track_then_acknowledge_removes_entry() {
        let channel = ReliableChannel::new();
        channel.track(Bytes::from_static(b"frame"), 1, addr());
        assert_eq!(channel.in_flight(), 1);
        let rtt = channel.acknowledge(1);
        assert!(rtt.is_some());
        assert_eq!(channel.in_flight(), 0);
    }

    #[test]
    fn acknowledge_unknown_seq_returns_none() {
        let channel = ReliableChannel::new();
        assert!(channel.acknowledge(5).is_none());
    }

    #[test]
    fn reused_seq_replaces_prior_entry() {
        let channel = ReliableChannel::new();
        channel.track(Bytes::from_static(b"first"), 1, addr());
        channel.track(Bytes::from_static(b"second"), 1, addr());
        assert_eq!(channel.in_flight(), 1);
    }

    #[test]
    fn duplicate_ack_below_threshold_does_nothing() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        channel.track(Bytes::from_static(b"frame"), 6, addr());
        assert!(channel.on_duplicate_ack(5, &metrics).is_none());
        assert!(channel.on_duplicate_ack(5, &metrics).is_none());
    }

    #[test]
    fn duplicate_ack_at_threshold_triggers_fast_retransmit() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        channel.track(Bytes::from_static(b"frame"), 6, addr());
        channel.on_duplicate_ack(5, &metrics);
        channel.on_duplicate_ack(5, &metrics);
        let retransmit = channel.on_duplicate_ack(5, &metrics);
        assert!(retransmit.is_some());
        assert_eq!(metrics.fast_retransmits.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn duplicate_ack_for_already_acked_missing_seq_is_noop() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        // seq 6 never tracked (already acked earlier).
        for _ in 0..DUP_ACK_THRESHOLD {
            assert!(channel.on_duplicate_ack(5, &metrics).is_none());
        }
    }

    #[test]
    fn retransmit_timeout_bumps_retry_and_resends() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        channel.track(Bytes::from_static(b"frame"), 1, addr());
        std::thread::sleep(Duration::from_millis(5));
        let resend = channel.scan_for_retransmit(Duration::from_millis(1), &metrics);
        assert_eq!(resend.len(), 1);
        assert_eq!(channel.in_flight(), 1);
    }

    #[test]
    fn retry_exhaustion_marks_failed_and_drops() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        channel.track(Bytes::from_static(b"frame"), 1, addr());
        // Drive retry_count to MAX_RETRANSMITS via repeated timeouts.
        for _ in 0..MAX_RETRANSMITS {
            std::thread::sleep(Duration::from_millis(2));
            channel.scan_for_retransmit(Duration::from_millis(1), &metrics);
        }
        assert_eq!(channel.in_flight(), 1);
        std::thread::sleep(Duration::from_millis(2));
        let resend = channel.scan_for_retransmit(Duration::from_millis(1), &metrics);
        assert!(resend.is_empty());
        assert_eq!(channel.in_flight(), 0);
        assert_eq!(metrics.packets_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn not_yet_timed_out_entries_are_left_alone() {
        let channel = ReliableChannel::new();
        let metrics = Metrics::default();
        channel.track(Bytes::from_static(b"frame"), 1, addr());
        let resend = channel.scan_for_retransmit(Duration::from_secs(10), &metrics);
        assert!(resend.is_empty());
        assert_eq!(channel.in_flight(), 1);
    }
}
