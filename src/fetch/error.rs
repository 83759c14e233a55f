//! Error types for the fetch client.

use std::time::Duration;

use thiserror::Error;

/// Transient I/O failures. None of these are fatal to a poller; the loop
/// logs them and tries again on the next tick.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS or body transfer failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
