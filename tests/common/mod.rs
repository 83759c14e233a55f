#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use isswatch_lib::fetch::{FetchClient, NetworkError};

type Responder = Box<dyn Fn(&str, usize) -> Result<String, NetworkError> + Send + Sync>;

/// In-memory fetch client. The responder gets the URL and the zero-based
/// call number.
pub struct ScriptedClient {
    responder: Responder,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, NetworkError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `body`.
    pub fn fixed(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_, _| Ok(body.clone()))
    }

    /// Every response is held back for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchClient for ScriptedClient {
    fn get(
        &self,
        url: &str,
        _timeout: Duration,
    ) -> impl Future<Output = Result<String, NetworkError>> + Send {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(url, call);
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            response
        }
    }
}

pub fn position_body(latitude: f64, timestamp: i64) -> String {
    format!(
        r#"{{"name":"iss","id":25544,"latitude":{latitude},"longitude":{},"altitude":420.5,"velocity":27600.0,"timestamp":{timestamp}}}"#,
        -latitude
    )
}

pub fn release_body(tag: &str) -> String {
    format!(
        r#"{{"tag_name":"{tag}","html_url":"https://example.com/releases/{tag}","body":"notes","assets":[{{"browser_download_url":"https://example.com/{tag}.tar.gz"}}]}}"#
    )
}

/// Polls `condition` every few milliseconds until it holds or `timeout`
/// passes. Returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
