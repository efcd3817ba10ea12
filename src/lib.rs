//! Dual-channel reliable/unreliable UDP transport for latency-sensitive
//! interactive applications.
//!
//! An [`Endpoint`] addresses a single remote peer over UDP and exposes two
//! logical channels multiplexed over one socket: a reliable, ordered
//! channel driven by ACKs and timer/duplicate-ACK retransmission, and an
//! unreliable, unordered channel delivered as datagrams arrive. See
//! `SPEC_FULL.md` for the full wire format and state machine.

mod config;
mod constants;
mod endpoint;
mod error;
mod frame;
mod metrics;
mod reliable;
mod reorder;
mod worker;

pub use config::EndpointConfig;
pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use frame::{Channel, Frame};
pub use metrics::MetricsSnapshot;
