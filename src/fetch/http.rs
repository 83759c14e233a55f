use std::time::Duration;

use super::{FetchClient, NetworkError};

pub const USER_AGENT: &str = concat!("isswatch/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 10;

/// reqwest-backed client with rustls certificate verification.
///
/// Each poller drives its own runtime, so idle connections are not pooled:
/// a pooled connection is bound to the runtime that opened it and would be
/// dead once that poller stops.
#[derive(Clone)]
pub struct HttpFetchClient {
    http: reqwest::Client,
}

impl HttpFetchClient {
    pub fn new() -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;

        Ok(Self { http })
    }
}

impl FetchClient for HttpFetchClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, NetworkError> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        log::debug!("GET {url} -> {} bytes", body.len());
        Ok(body)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout(timeout)
    } else {
        NetworkError::Http(err.to_string())
    }
}
