mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{release_body, wait_until, ScriptedClient};
use isswatch_lib::feeds::UpdateStatus;
use isswatch_lib::fetch::NetworkError;
use isswatch_lib::poller::{PollerState, ReleaseConfig, UpdateChecker};

const WAIT: Duration = Duration::from_secs(5);

fn config(current_version: &str) -> ReleaseConfig {
    ReleaseConfig {
        current_version: current_version.to_string(),
        ..ReleaseConfig::github("owner", "repo", Duration::from_secs(10))
    }
}

#[test]
fn check_delivers_exactly_once_and_returns_to_idle() {
    let client = Arc::new(ScriptedClient::fixed(release_body("v1.4.0")));
    let mut checker = UpdateChecker::new(Arc::clone(&client), config("1.2.3"));

    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));

    let info = checker.take_result().unwrap();
    assert_eq!(info.status, UpdateStatus::UpdateAvailable);
    assert!(info.update_available);
    assert_eq!(info.current_version, "1.2.3");
    assert_eq!(info.latest_version, "1.4.0");
    assert_eq!(info.release_url, "https://example.com/releases/v1.4.0");
    assert_eq!(info.download_url.as_deref(), Some("https://example.com/v1.4.0.tar.gz"));

    assert_eq!(checker.take_result(), None);
    assert!(!checker.is_checking());
    assert_eq!(client.calls(), 1);
}

#[test]
fn check_while_in_flight_is_noop() {
    let client = Arc::new(
        ScriptedClient::fixed(release_body("v1.0.0")).with_delay(Duration::from_millis(200)),
    );
    let mut checker = UpdateChecker::new(Arc::clone(&client), config("1.0.0"));

    checker.check().unwrap();
    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));

    assert_eq!(client.calls(), 1);
    assert_eq!(checker.take_result().unwrap().status, UpdateStatus::UpToDate);
}

#[test]
fn check_can_run_again_after_completion() {
    let client = Arc::new(ScriptedClient::fixed(release_body("v1.0.0")));
    let mut checker = UpdateChecker::new(Arc::clone(&client), config("1.0.0"));

    for _ in 0..2 {
        checker.check().unwrap();
        assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));
        assert!(checker.take_result().is_some());
    }
    assert_eq!(client.calls(), 2);
}

#[test]
fn cancel_in_flight_posts_nothing() {
    let client = Arc::new(
        ScriptedClient::fixed(release_body("v9.0.0")).with_delay(Duration::from_secs(10)),
    );
    let mut checker = UpdateChecker::new(Arc::clone(&client), config("1.0.0"));

    checker.check().unwrap();
    assert!(wait_until(WAIT, || client.calls() == 1));

    let started = Instant::now();
    checker.cancel();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(checker.state(), PollerState::Idle);
    assert_eq!(checker.take_result(), None);
}

#[test]
fn cancel_after_completion_is_noop() {
    let client = Arc::new(ScriptedClient::fixed(release_body("v1.0.0")));
    let mut checker = UpdateChecker::new(client, config("1.0.0"));

    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));

    checker.cancel();
    checker.cancel();
    assert_eq!(checker.state(), PollerState::Idle);
    assert!(checker.take_result().is_some());
}

#[test]
fn network_failure_is_inconclusive() {
    let client = Arc::new(ScriptedClient::new(|_, _| Err(NetworkError::Status(500))));
    let mut checker = UpdateChecker::new(client, config("1.0.0"));

    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));

    let info = checker.take_result().unwrap();
    assert_eq!(info.status, UpdateStatus::Inconclusive);
    assert!(!info.update_available);
    assert!(info.latest_version.is_empty());
}

#[test]
fn timeout_is_inconclusive() {
    let client = Arc::new(
        ScriptedClient::fixed(release_body("v2.0.0")).with_delay(Duration::from_secs(10)),
    );
    let mut checker = UpdateChecker::new(
        client,
        ReleaseConfig {
            timeout: Duration::from_millis(50),
            ..config("1.0.0")
        },
    );

    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));
    assert_eq!(checker.take_result().unwrap().status, UpdateStatus::Inconclusive);
}

#[test]
fn missing_tag_is_inconclusive() {
    let client = Arc::new(ScriptedClient::fixed(
        r#"{"html_url":"https://example.com","body":"","assets":[]}"#,
    ));
    let mut checker = UpdateChecker::new(client, config("1.0.0"));

    checker.check().unwrap();
    assert!(wait_until(WAIT, || checker.state() == PollerState::Idle));

    let info = checker.take_result().unwrap();
    assert_eq!(info.status, UpdateStatus::Inconclusive);
    assert_eq!(info.download_url, None);
}

#[test]
fn drop_while_in_flight_joins_worker() {
    let client = Arc::new(
        ScriptedClient::fixed(release_body("v9.0.0")).with_delay(Duration::from_secs(10)),
    );
    let mut checker = UpdateChecker::new(Arc::clone(&client), config("1.0.0"));
    let mailbox = checker.mailbox().clone();

    checker.check().unwrap();
    assert!(wait_until(WAIT, || client.calls() == 1));

    let started = Instant::now();
    drop(checker);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!mailbox.has_pending());
}

#[tokio::test]
async fn check_now_bypasses_mailbox() {
    let client = Arc::new(ScriptedClient::fixed(release_body("v0.9.0")));
    let checker = UpdateChecker::new(client, config("1.0.0"));

    let info = checker.check_now().await;
    assert_eq!(info.status, UpdateStatus::UpToDate);
    assert_eq!(checker.take_result(), None);
    assert_eq!(checker.state(), PollerState::Idle);
}
