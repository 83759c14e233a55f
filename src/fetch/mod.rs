//! Fetch client: a single GET with a bounded timeout.
//!
//! The [`FetchClient`] trait is the seam both pollers are written against.
//! [`HttpFetchClient`] is the production implementation; tests substitute a
//! scripted client.

mod error;
mod http;

pub use error::NetworkError;
pub use http::{HttpFetchClient, USER_AGENT};

use std::future::Future;
use std::time::Duration;

/// Performs one network request and returns the raw body.
///
/// Implementations must be callable from any worker thread concurrently and
/// must not hold mutable state shared between calls.
pub trait FetchClient: Send + Sync {
    fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, NetworkError>> + Send;
}
