//! Optional overrides for the constants of spec §3.
//!
//! Mirrors the teacher's pattern of a `::new()` zero-config constructor
//! alongside a `::with_*` constructor that overrides defaults (see
//! `strandstream::flow_control::FlowController::with_windows`).

use std::time::Duration;

use crate::constants::{
    DUP_ACK_THRESHOLD, MAX_RETRANSMITS, REORDER_BUFFER_SIZE, REORDER_TIMEOUT,
    RETRANSMIT_TIMEOUT,
};

/// Overrides for the protocol's tunable constants. Defaults to the
/// authoritative values from spec §3 when constructed via [`Default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointConfig {
    pub retransmit_timeout: Duration,
    pub max_retransmits: u32,
    pub reorder_buffer_size: usize,
    pub reorder_timeout: Duration,
    pub dup_ack_threshold: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: RETRANSMIT_TIMEOUT,
            max_retransmits: MAX_RETRANSMITS,
            reorder_buffer_size: REORDER_BUFFER_SIZE,
            reorder_timeout: REORDER_TIMEOUT,
            dup_ack_threshold: DUP_ACK_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = EndpointConfig::default();
        assert_eq!(cfg.retransmit_timeout, RETRANSMIT_TIMEOUT);
        assert_eq!(cfg.max_retransmits, MAX_RETRANSMITS);
    }
}
