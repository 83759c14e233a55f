use std::future::Future;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{debug, error};
use tokio_util::sync::CancellationToken;

use super::state::{PollerState, StateCell};

/// A dedicated worker thread driving one async body on its own
/// current-thread runtime.
///
/// Dropping a `Worker` cancels it and joins the thread, so no worker can
/// outlive its owner.
pub(crate) struct Worker {
    name: String,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Marks `state` as `Running` and spawns the thread. The thread sets
    /// `state` back to `Idle` when `body` returns.
    pub(crate) fn spawn<F, Fut>(name: &str, state: StateCell, body: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let thread_state = state.clone();
        let thread_name = name.to_string();

        state.set(PollerState::Running);

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _exit = ExitGuard(thread_state);
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(body(token)),
                    Err(err) => error!("{thread_name}: failed to build worker runtime: {err}"),
                }
            });

        match spawned {
            Ok(handle) => Ok(Self {
                name: name.to_string(),
                cancel_token,
                handle: Some(handle),
            }),
            Err(err) => {
                state.set(PollerState::Idle);
                Err(err).with_context(|| format!("failed to spawn {name} worker thread"))
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the body and blocks until the thread has exited.
    pub(crate) fn shutdown(&mut self) {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(join_err) = handle.join() {
                error!("{} worker panicked: {join_err:?}", self.name);
            } else {
                debug!("{} worker joined", self.name);
            }
        }
    }
}

/// Resets the state to `Idle` when the thread exits, including by panic.
struct ExitGuard(StateCell);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.set(PollerState::Idle);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_shutdown_cancels_and_joins() {
        let state = StateCell::default();
        let exited = Arc::new(AtomicBool::new(false));
        let exited_flag = Arc::clone(&exited);

        let mut worker = Worker::spawn("test-worker", state.clone(), move |token| async move {
            token.cancelled().await;
            exited_flag.store(true, Ordering::SeqCst);
        })
        .unwrap_or_else(|e| panic!("spawn failed: {e}"));

        assert_eq!(state.get(), PollerState::Running);

        worker.shutdown();

        assert!(exited.load(Ordering::SeqCst));
        assert!(worker.is_finished());
        assert_eq!(state.get(), PollerState::Idle);
    }

    #[test]
    fn test_drop_joins_thread() {
        let state = StateCell::default();
        let exited = Arc::new(AtomicBool::new(false));
        let exited_flag = Arc::clone(&exited);

        let worker = Worker::spawn("test-worker", state.clone(), move |token| async move {
            token.cancelled().await;
            exited_flag.store(true, Ordering::SeqCst);
        })
        .unwrap_or_else(|e| panic!("spawn failed: {e}"));

        drop(worker);

        assert!(exited.load(Ordering::SeqCst));
        assert_eq!(state.get(), PollerState::Idle);
    }
}
