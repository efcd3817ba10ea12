use thiserror::Error;

/// All errors that cross the application-facing API boundary.
///
/// Per-datagram failures (short reads, malformed ACKs, retry exhaustion,
/// buffer-full, gap timeouts) never reach here -- they are handled
/// internally and surfaced only through `tracing` events and
/// [`crate::metrics::MetricsSnapshot`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("endpoint is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
