//! Endpoint-wide metrics (spec §6 "Metrics snapshot fields").
//!
//! Counters live on atomics so [`Endpoint::metrics`](crate::Endpoint::metrics)
//! never blocks on the mutexes guarding the reliable channel or reorder
//! buffer, per the spec's "must be safe to call concurrently" requirement.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Metrics {
    pub reliable_sent: AtomicU64,
    pub unreliable_sent: AtomicU64,
    pub reliable_received: AtomicU64,
    pub unreliable_received: AtomicU64,
    pub acks_sent: AtomicU64,
    pub acks_received: AtomicU64,
    pub packets_acked: AtomicU64,
    pub packets_retransmitted: AtomicU64,
    pub packets_failed: AtomicU64,
    pub total_retry_attempts: AtomicU64,
    pub fast_retransmits: AtomicU64,
    pub packets_reordered: AtomicU64,
    /// Current size of the reorder buffer's out-of-order slot map, as last
    /// reported by the receive worker. Matches the original's `len(buffer)`
    /// gauge rather than a historical peak.
    pub packets_buffered: AtomicU64,
    pub total_latency_ms: AtomicU64,
    pub latency_samples: AtomicU64,
}

impl Metrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Overwrite a counter with an authoritative cumulative value owned by
    /// another component (e.g. the reorder buffer's own `reordered` tally),
    /// rather than accumulating deltas twice.
    pub(crate) fn set(counter: &AtomicU64, value: u64) {
        counter.store(value, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, latency_ms: u64) {
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_buffered(&self, current: usize) {
        self.packets_buffered.store(current as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        let reliable_sent = load(&self.reliable_sent);
        let unreliable_sent = load(&self.unreliable_sent);
        let reliable_received = load(&self.reliable_received);
        let unreliable_received = load(&self.unreliable_received);
        let latency_samples = load(&self.latency_samples);
        let total_latency_ms = load(&self.total_latency_ms);

        let avg_latency_ms = if latency_samples > 0 {
            total_latency_ms as f64 / latency_samples as f64
        } else {
            0.0
        };

        let total_sent = reliable_sent + unreliable_sent;
        let total_received = reliable_received + unreliable_received;
        let delivery_ratio_percent = if total_sent > 0 {
            (total_received as f64 / total_sent as f64) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            reliable_sent,
            unreliable_sent,
            reliable_received,
            unreliable_received,
            acks_sent: load(&self.acks_sent),
            acks_received: load(&self.acks_received),
            packets_acked: load(&self.packets_acked),
            packets_retransmitted: load(&self.packets_retransmitted),
            packets_failed: load(&self.packets_failed),
            total_retry_attempts: load(&self.total_retry_attempts),
            fast_retransmits: load(&self.fast_retransmits),
            packets_reordered: load(&self.packets_reordered),
            packets_buffered: load(&self.packets_buffered),
            avg_latency_ms,
            delivery_ratio_percent,
        }
    }
}

/// A point-in-time copy of an endpoint's metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub reliable_sent: u64,
    pub unreliable_sent: u64,
    pub reliable_received: u64,
    pub unreliable_received: u64,
    pub acks_sent: u64,
    pub acks_received: u64,
    pub packets_acked: u64,
    pub packets_retransmitted: u64,
    pub packets_failed: u64,
    pub total_retry_attempts: u64,
    pub fast_retransmits: u64,
    pub packets_reordered: u64,
    pub packets_buffered: u64,
    pub avg_latency_ms: f64,
    pub delivery_ratio_percent: f64,
}
