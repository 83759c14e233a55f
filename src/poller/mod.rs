//! Cancellable background pollers.
//!
//! Each poller owns one dedicated worker thread running a current-thread
//! tokio runtime. Results cross back to the application loop only through a
//! [`Mailbox`]; the loop never touches worker-owned state directly.

pub mod history;
pub mod mailbox;
pub mod state;
pub mod tracker;
pub mod update_checker;
pub(crate) mod worker;

pub use history::BoundedHistory;
pub use mailbox::Mailbox;
pub use state::PollerState;
pub use tracker::{PositionTracker, Snapshot, TrackerConfig};
pub use update_checker::{ReleaseConfig, UpdateChecker};

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this module leaves its data consistent before
/// any call that could panic, so a poisoned lock is still safe to read.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
