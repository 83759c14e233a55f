use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::feeds::{parse_position, Sample};
use crate::fetch::{FetchClient, NetworkError};

use super::history::BoundedHistory;
use super::mailbox::Mailbox;
use super::state::{PollerState, StateCell};
use super::worker::Worker;
use super::lock_unpoisoned;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub url: String,
    pub timeout: Duration,
    pub history_capacity: usize,
}

/// Copy of the tracker's data at one instant. Never aliases worker state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub latest: Option<Sample>,
    /// Oldest first.
    pub history: Vec<Sample>,
}

impl Snapshot {
    /// Latitude and longitude series for drawing the orbit trail.
    pub fn trail(&self) -> (Vec<f64>, Vec<f64>) {
        self.history
            .iter()
            .filter(|sample| sample.valid)
            .map(|sample| (sample.latitude, sample.longitude))
            .unzip()
    }
}

struct TrackData {
    latest: Option<Sample>,
    history: BoundedHistory<Sample>,
}

/// Periodic poller for the orbital-position feed.
///
/// The latest sample and the bounded history are only written by the
/// worker, together, under one lock. Readers get a [`Snapshot`] copy.
pub struct PositionTracker<C: FetchClient + 'static> {
    client: Arc<C>,
    config: TrackerConfig,
    data: Arc<Mutex<TrackData>>,
    mailbox: Mailbox<Sample>,
    state: StateCell,
    worker: Option<Worker>,
}

impl<C: FetchClient + 'static> PositionTracker<C> {
    pub fn new(client: Arc<C>, config: TrackerConfig) -> Self {
        let data = TrackData {
            latest: None,
            history: BoundedHistory::new(config.history_capacity),
        };

        Self {
            client,
            config,
            data: Arc::new(Mutex::new(data)),
            mailbox: Mailbox::new(),
            state: StateCell::default(),
            worker: None,
        }
    }

    /// Starts polling every `interval`. A no-op while already running.
    pub fn start(&mut self, interval: Duration) -> Result<()> {
        if self.state.get() == PollerState::Running {
            log_info!("position tracker already running, skipping start");
            return Ok(());
        }

        // A previous worker may have exited on its own; reap it first.
        if let Some(mut previous) = self.worker.take() {
            previous.shutdown();
        }

        let interval = if interval < MIN_INTERVAL {
            log_error!("position tracker interval {interval:?} is too short, using {MIN_INTERVAL:?}");
            MIN_INTERVAL
        } else {
            interval
        };

        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let data = Arc::clone(&self.data);
        let mailbox = self.mailbox.clone();

        let worker = Worker::spawn("position-tracker", self.state.clone(), move |cancel_token| {
            tracking_loop(client, config, interval, data, mailbox, cancel_token)
        })?;
        self.worker = Some(worker);

        log_info!("position tracker started (interval {interval:?})");
        Ok(())
    }

    /// Requests cancellation and blocks until the worker has exited.
    pub fn stop(&mut self) {
        if !self
            .state
            .transition(PollerState::Running, PollerState::CancelRequested)
        {
            return;
        }

        log_info!("position tracker stop requested");
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.state.set(PollerState::Idle);
        log_info!("position tracker stopped");
    }

    /// Best effort; may be stale by one scheduling step.
    pub fn is_running(&self) -> bool {
        self.state.get() == PollerState::Running
    }

    pub fn state(&self) -> PollerState {
        self.state.get()
    }

    pub fn snapshot(&self) -> Snapshot {
        let guard = lock_unpoisoned(&self.data);
        Snapshot {
            latest: guard.latest,
            history: guard.history.to_vec(),
        }
    }

    pub fn latest(&self) -> Option<Sample> {
        lock_unpoisoned(&self.data).latest
    }

    pub fn max_history(&self) -> usize {
        self.config.history_capacity
    }

    pub fn mailbox(&self) -> &Mailbox<Sample> {
        &self.mailbox
    }

    /// Takes the newest sample published since the last call, if any.
    pub fn take_update(&self) -> Option<Sample> {
        self.mailbox.take()
    }

    /// One fetch and parse on the caller's runtime. Does not touch the
    /// history or the mailbox.
    pub async fn fetch_once(&self) -> Option<Sample> {
        match fetch_with_deadline(self.client.as_ref(), &self.config).await {
            Ok(body) => match parse_position(&body) {
                Ok(sample) => Some(sample),
                Err(err) => {
                    log_warn!("position feed parse failed: {err}");
                    None
                }
            },
            Err(err) => {
                log_error!("position feed request failed: {err}");
                None
            }
        }
    }
}

impl<C: FetchClient + 'static> Drop for PositionTracker<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tracking_loop<C: FetchClient>(
    client: Arc<C>,
    config: TrackerConfig,
    interval: Duration,
    data: Arc<Mutex<TrackData>>,
    mailbox: Mailbox<Sample>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fetched = tokio::select! {
                    result = fetch_with_deadline(client.as_ref(), &config) => result,
                    _ = cancel_token.cancelled() => break,
                };

                // Stop may have been requested while the request was in flight.
                if cancel_token.is_cancelled() {
                    log_info!("position tracker stop requested, discarding fetched data");
                    break;
                }

                match fetched {
                    Ok(body) => match parse_position(&body) {
                        Ok(sample) => publish(&data, &mailbox, sample),
                        Err(err) => log_warn!("position feed parse failed, skipping tick: {err}"),
                    },
                    Err(err) => log_error!("position feed request failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("position tracking loop exited");
}

async fn fetch_with_deadline<C: FetchClient>(
    client: &C,
    config: &TrackerConfig,
) -> Result<String, NetworkError> {
    match tokio::time::timeout(config.timeout, client.get(&config.url, config.timeout)).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(config.timeout)),
    }
}

fn publish(data: &Mutex<TrackData>, mailbox: &Mailbox<Sample>, sample: Sample) {
    if !sample.valid {
        return;
    }

    {
        let mut guard = lock_unpoisoned(data);
        guard.latest = Some(sample);
        guard.history.push(sample);
    }
    mailbox.post(sample);

    log_info!(
        "position updated - lat: {:.4}, lon: {:.4}, alt: {:.1} km, vel: {:.1} km/h",
        sample.latitude,
        sample.longitude,
        sample.altitude,
        sample.velocity
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latitude: f64) -> Sample {
        Sample {
            latitude,
            longitude: -latitude,
            valid: true,
            ..Sample::default()
        }
    }

    #[test]
    fn test_publish_updates_latest_history_and_mailbox() {
        let data = Mutex::new(TrackData {
            latest: None,
            history: BoundedHistory::new(2),
        });
        let mailbox = Mailbox::new();

        for lat in [1.0, 2.0, 3.0] {
            publish(&data, &mailbox, sample(lat));
        }

        let guard = lock_unpoisoned(&data);
        assert_eq!(guard.latest, Some(sample(3.0)));
        assert_eq!(guard.history.to_vec(), vec![sample(2.0), sample(3.0)]);
        assert_eq!(mailbox.take(), Some(sample(3.0)));
    }

    #[test]
    fn test_publish_ignores_invalid_sample() {
        let data = Mutex::new(TrackData {
            latest: None,
            history: BoundedHistory::new(4),
        });
        let mailbox = Mailbox::new();

        publish(&data, &mailbox, Sample::default());

        let guard = lock_unpoisoned(&data);
        assert!(guard.latest.is_none());
        assert!(guard.history.is_empty());
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_trail_projects_coordinates() {
        let snapshot = Snapshot {
            latest: Some(sample(2.0)),
            history: vec![sample(1.0), sample(2.0)],
        };

        let (lats, lons) = snapshot.trail();
        assert_eq!(lats, vec![1.0, 2.0]);
        assert_eq!(lons, vec![-1.0, -2.0]);
    }
}
