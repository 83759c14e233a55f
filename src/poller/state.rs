use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    CancelRequested,
}

impl Default for PollerState {
    fn default() -> Self {
        PollerState::Idle
    }
}

impl PollerState {
    fn to_u8(self) -> u8 {
        match self {
            PollerState::Idle => 0,
            PollerState::Running => 1,
            PollerState::CancelRequested => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PollerState::Running,
            2 => PollerState::CancelRequested,
            _ => PollerState::Idle,
        }
    }
}

/// Shared view of a poller's state. The owner drives `Idle -> Running` and
/// `Running -> CancelRequested`; the worker thread sets `Idle` on exit.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub(crate) fn get(&self) -> PollerState {
        PollerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: PollerState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Moves to `to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: PollerState, to: PollerState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_requires_expected_state() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), PollerState::Idle);

        assert!(!cell.transition(PollerState::Running, PollerState::CancelRequested));
        assert_eq!(cell.get(), PollerState::Idle);

        cell.set(PollerState::Running);
        assert!(cell.transition(PollerState::Running, PollerState::CancelRequested));
        assert_eq!(cell.get(), PollerState::CancelRequested);
    }

    #[test]
    fn test_clones_share_state() {
        let owner = StateCell::default();
        let worker = owner.clone();

        owner.set(PollerState::Running);
        worker.set(PollerState::Idle);

        assert_eq!(owner.get(), PollerState::Idle);
    }
}
