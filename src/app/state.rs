use chrono::{DateTime, Utc};

use crate::feeds::{ReleaseInfo, Sample, UpdateStatus};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_CHECKING: &str = "Checking for updates...";
pub const STATUS_INCONCLUSIVE: &str = "Update check inconclusive";
pub const STATUS_RECOVERED: &str = "Recovered from display context loss";
pub const STATUS_RECOVERY_FAILED: &str = "ERROR: Failed to recover from context loss";
pub const STATUS_CLOSING_ON_FAILURE: &str = "Display context could not be recovered; closing";

/// UI-owned state. Only the application loop thread reads or writes it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub status_message: String,
    pub latest_position: Option<Sample>,
    pub last_position_at: Option<DateTime<Utc>>,
    /// Latitudes and longitudes, oldest first.
    pub trail: (Vec<f64>, Vec<f64>),
    pub update_check_in_progress: bool,
    pub latest_release: Option<ReleaseInfo>,
    pub show_update_notification: bool,
    pub show_tracker: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status_message: STATUS_READY.to_string(),
            latest_position: None,
            last_position_at: None,
            trail: (Vec::new(), Vec::new()),
            update_check_in_progress: false,
            latest_release: None,
            show_update_notification: false,
            show_tracker: false,
        }
    }
}

impl AppState {
    /// Replaces the status bar text. Changes are also logged, since the
    /// status bar is not visible when nothing can be drawn.
    pub fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message == self.status_message {
            return;
        }

        if message == STATUS_RECOVERY_FAILED || message == STATUS_CLOSING_ON_FAILURE {
            log::error!("status: {message}");
        } else {
            log::info!("status: {message}");
        }
        self.status_message = message;
    }
}

/// Status bar text for a finished update check.
pub fn release_status_message(info: &ReleaseInfo) -> String {
    match info.status {
        UpdateStatus::UpdateAvailable => format!("Update available: v{}", info.latest_version),
        UpdateStatus::UpToDate => format!("Up to date (v{})", info.current_version),
        UpdateStatus::Inconclusive => STATUS_INCONCLUSIVE.to_string(),
    }
}
