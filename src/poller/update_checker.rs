use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::feeds::release::CURRENT_VERSION;
use crate::feeds::{parse_release, ReleaseInfo, UpdateStatus};
use crate::fetch::{FetchClient, NetworkError};

use super::mailbox::Mailbox;
use super::state::{PollerState, StateCell};
use super::worker::Worker;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub url: String,
    pub timeout: Duration,
    pub current_version: String,
}

impl ReleaseConfig {
    /// Config for the latest-release endpoint of a GitHub repository.
    pub fn github(owner: &str, repo: &str, timeout: Duration) -> Self {
        Self {
            url: format!("https://api.github.com/repos/{owner}/{repo}/releases/latest"),
            timeout,
            current_version: CURRENT_VERSION.to_string(),
        }
    }
}

/// One-shot poller for the release feed.
///
/// Each [`check`](Self::check) runs the fetch-parse-compare body once on a
/// worker thread, posts exactly one [`ReleaseInfo`] to the mailbox, and then
/// drops back to `Idle` by itself. A cancelled check posts nothing.
pub struct UpdateChecker<C: FetchClient + 'static> {
    client: Arc<C>,
    config: ReleaseConfig,
    mailbox: Mailbox<ReleaseInfo>,
    state: StateCell,
    worker: Option<Worker>,
}

impl<C: FetchClient + 'static> UpdateChecker<C> {
    pub fn new(client: Arc<C>, config: ReleaseConfig) -> Self {
        Self {
            client,
            config,
            mailbox: Mailbox::new(),
            state: StateCell::default(),
            worker: None,
        }
    }

    /// Starts a check in the background. A no-op while one is in flight.
    pub fn check(&mut self) -> Result<()> {
        if self.state.get() == PollerState::Running {
            log_info!("update check already in progress, skipping");
            return Ok(());
        }

        self.reap();

        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let mailbox = self.mailbox.clone();

        let worker = Worker::spawn("update-checker", self.state.clone(), move |cancel_token| {
            async move {
                if let Some(info) = run_check(client.as_ref(), &config, Some(&cancel_token)).await {
                    mailbox.post(info);
                }
            }
        })?;
        self.worker = Some(worker);

        log_info!("update check started ({})", self.config.url);
        Ok(())
    }

    /// Cancels an in-flight check and waits for its worker to exit.
    /// Cancelling a completed check only joins the finished thread.
    pub fn cancel(&mut self) {
        if self
            .state
            .transition(PollerState::Running, PollerState::CancelRequested)
        {
            log_info!("update check cancellation requested");
            if let Some(mut worker) = self.worker.take() {
                worker.shutdown();
            }
            self.state.set(PollerState::Idle);
        } else {
            self.reap();
        }
    }

    pub fn is_checking(&self) -> bool {
        self.state.get() == PollerState::Running
    }

    pub fn state(&self) -> PollerState {
        self.state.get()
    }

    /// Takes the result of the last completed check, if it has not been read.
    pub fn take_result(&self) -> Option<ReleaseInfo> {
        self.mailbox.take()
    }

    pub fn mailbox(&self) -> &Mailbox<ReleaseInfo> {
        &self.mailbox
    }

    /// Runs the check body on the caller's runtime and returns the result
    /// directly, bypassing the mailbox.
    pub async fn check_now(&self) -> ReleaseInfo {
        match run_check(self.client.as_ref(), &self.config, None).await {
            Some(info) => info,
            None => ReleaseInfo::inconclusive(&self.config.current_version),
        }
    }

    fn reap(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            if !worker.is_finished() {
                log_warn!("reaping update checker worker that is still running");
            }
            worker.shutdown();
        }
    }
}

impl<C: FetchClient + 'static> Drop for UpdateChecker<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Returns `None` only when cancelled. Network and parse failures produce an
/// inconclusive result rather than an error.
async fn run_check<C: FetchClient>(
    client: &C,
    config: &ReleaseConfig,
    cancel_token: Option<&CancellationToken>,
) -> Option<ReleaseInfo> {
    let request = async {
        match tokio::time::timeout(config.timeout, client.get(&config.url, config.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(config.timeout)),
        }
    };

    let fetched = match cancel_token {
        Some(token) => tokio::select! {
            result = request => result,
            _ = token.cancelled() => {
                log_info!("update check cancelled");
                return None;
            }
        },
        None => request.await,
    };

    if cancel_token.is_some_and(CancellationToken::is_cancelled) {
        log_info!("update check cancelled, discarding response");
        return None;
    }

    let info = match fetched.map(|body| parse_release(&body)) {
        Ok(Ok(feed)) => ReleaseInfo::from_feed(&config.current_version, feed),
        Ok(Err(err)) => {
            log_warn!("release feed parse failed: {err}");
            ReleaseInfo::inconclusive(&config.current_version)
        }
        Err(err) => {
            log_error!("release feed request failed: {err}");
            ReleaseInfo::inconclusive(&config.current_version)
        }
    };

    match info.status {
        UpdateStatus::UpdateAvailable => log_info!(
            "update available: {} -> {}",
            info.current_version,
            info.latest_version
        ),
        UpdateStatus::UpToDate => log_info!("no update available (current: {})", info.current_version),
        UpdateStatus::Inconclusive => log_warn!("update check inconclusive"),
    }

    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_config_url() {
        let config = ReleaseConfig::github("andynicholson", "MetaImGUI", Duration::from_secs(10));

        assert_eq!(
            config.url,
            "https://api.github.com/repos/andynicholson/MetaImGUI/releases/latest"
        );
        assert_eq!(config.current_version, CURRENT_VERSION);
    }
}
