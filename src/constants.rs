//! Authoritative protocol constants (spec §3).
//!
//! These are the defaults used when an [`crate::EndpointConfig`] does not
//! override them.

use std::time::Duration;

/// Size of the fixed frame header in bytes: channel(1) + seq(2) + timestamp(4).
pub const HEADER_SIZE: usize = 7;

pub const CHANNEL_RELIABLE: u8 = 0;
pub const CHANNEL_UNRELIABLE: u8 = 1;

/// Sender-side timer-driven retransmission timeout. Not adaptive -- the
/// spec is explicit that there is no RTT estimator (§5, §9).
pub const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(150);

/// Additional retransmissions permitted beyond the first send (13 total attempts).
pub const MAX_RETRANSMITS: u32 = 12;

/// Maximum number of out-of-order reliable frames buffered by the receiver.
pub const REORDER_BUFFER_SIZE: usize = 500;

/// How long the receiver waits for a missing `expected_seq` before skipping it.
pub const REORDER_TIMEOUT: Duration = Duration::from_millis(2000);

/// Number of duplicate ACKs that trigger a fast retransmit.
pub const DUP_ACK_THRESHOLD: u32 = 3;

/// Per-channel sequence number space (mod 2^16).
pub const SEQ_SPACE: u32 = 65_536;

/// Retransmission scanner cadence.
pub const RETRANSMIT_SCAN_INTERVAL: Duration = Duration::from_millis(50);

/// Socket receive timeout used by the receive/timer worker.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Latency readings above this are treated as clock-drift anomalies and
/// clamped to zero rather than reported.
pub const LATENCY_ANOMALY_CLAMP: Duration = Duration::from_millis(10_000);

/// How long `close()` waits for each background task to observe the
/// shutdown signal before giving up.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
