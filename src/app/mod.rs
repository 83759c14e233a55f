//! Application loop: the single-threaded consumer of poller results and the
//! only owner of rendering and UI state.

mod state;
mod ui;

pub use state::{
    release_status_message, AppState, STATUS_CHECKING, STATUS_CLOSING_ON_FAILURE,
    STATUS_INCONCLUSIVE, STATUS_READY, STATUS_RECOVERED, STATUS_RECOVERY_FAILED,
};
pub use ui::{HeadlessUi, UiBackend};

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::feeds::ReleaseInfo;
use crate::fetch::FetchClient;
use crate::poller::{PositionTracker, UpdateChecker};
use crate::render::{ContextState, RecoveryController, RenderSurface};
use crate::settings::AppSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Subsystem name of the UI backend's recreation callback.
pub const UI_SUBSYSTEM: &str = "ui";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Context invalid and not recovered this frame. Nothing was drawn.
    Skipped,
    /// The loop should exit.
    Closing,
}

pub struct Application<C, S, U>
where
    C: FetchClient + 'static,
    S: RenderSurface,
    U: UiBackend + 'static,
{
    settings: AppSettings,
    state: Rc<RefCell<AppState>>,
    ui: Rc<RefCell<U>>,
    renderer: Option<RecoveryController<S>>,
    tracker: PositionTracker<C>,
    checker: UpdateChecker<C>,
    initialized: bool,
    shut_down: bool,
}

impl<C, S, U> Application<C, S, U>
where
    C: FetchClient + 'static,
    S: RenderSurface,
    U: UiBackend + 'static,
{
    pub fn new(client: Arc<C>, surface: S, ui: U, settings: AppSettings) -> Self {
        let tracker = PositionTracker::new(Arc::clone(&client), settings.tracker_config());
        let checker = UpdateChecker::new(client, settings.release_config());
        let renderer = RecoveryController::with_max_attempts(surface, settings.max_recovery_attempts);

        Self {
            settings,
            state: Rc::new(RefCell::new(AppState::default())),
            ui: Rc::new(RefCell::new(ui)),
            renderer: Some(renderer),
            tracker,
            checker,
            initialized: false,
            shut_down: false,
        }
    }

    /// Brings up the UI backend, registers its recreation callback and
    /// starts the pollers enabled in settings.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let renderer = self
            .renderer
            .as_mut()
            .context("Application was already shut down")?;
        if !renderer.surface().is_open() {
            anyhow::bail!("Render surface is not open");
        }

        self.ui
            .borrow_mut()
            .initialize()
            .context("Failed to initialise UI backend")?;

        let ui = Rc::clone(&self.ui);
        let state = Rc::clone(&self.state);
        renderer.on_context_loss(UI_SUBSYSTEM, move || {
            let mut ui = ui.borrow_mut();
            ui.shutdown();
            match ui.initialize() {
                Ok(()) => {
                    state.borrow_mut().set_status(STATUS_RECOVERED);
                    Ok(())
                }
                Err(err) => {
                    state.borrow_mut().set_status(STATUS_RECOVERY_FAILED);
                    Err(err)
                }
            }
        });

        self.initialized = true;

        if self.settings.track_position_on_startup {
            self.start_tracking()?;
        }
        if self.settings.check_updates_on_startup {
            self.request_update_check()?;
        }

        log_info!("application initialised");
        Ok(())
    }

    /// Runs frames until the surface asks to close or rendering fails for
    /// good, then shuts everything down. Returns an error in the second case.
    pub fn run(&mut self) -> Result<()> {
        self.initialize()?;

        let frame_interval = self.settings.frame_interval();
        loop {
            if self.run_frame() == FrameOutcome::Closing {
                break;
            }
            std::thread::sleep(frame_interval);
        }

        let render_failed = self.context_state() == Some(ContextState::Failed);
        self.shutdown();

        if render_failed {
            anyhow::bail!("Render context could not be recovered");
        }
        Ok(())
    }

    /// One loop iteration: drain mailboxes, then draw if the context allows.
    pub fn run_frame(&mut self) -> FrameOutcome {
        if !self.initialized || self.shut_down {
            log_error!("run_frame called outside the initialised lifetime");
            return FrameOutcome::Closing;
        }

        self.apply_updates();

        let Some(renderer) = self.renderer.as_mut() else {
            return FrameOutcome::Closing;
        };

        if renderer.surface().should_close() {
            log_info!("close requested");
            return FrameOutcome::Closing;
        }

        if !renderer.begin_frame() {
            return Self::skipped_or_closing(renderer, &self.state, &self.ui);
        }

        {
            let state = self.state.borrow();
            self.ui.borrow_mut().draw(&state);
        }

        if renderer.end_frame() {
            FrameOutcome::Presented
        } else {
            Self::skipped_or_closing(renderer, &self.state, &self.ui)
        }
    }

    /// Moves any pending poller results into UI state.
    pub fn apply_updates(&mut self) {
        // The mailbox only signals that something changed. Position and
        // trail come from one snapshot so they always agree.
        if self.tracker.take_update().is_some() {
            let snapshot = self.tracker.snapshot();
            let mut state = self.state.borrow_mut();
            state.latest_position = snapshot.latest;
            state.last_position_at = snapshot.latest.and_then(|sample| sample.observed_at());
            state.trail = snapshot.trail();
            log_debug!(
                "position update applied ({} points in trail)",
                state.trail.0.len()
            );
        }

        if let Some(info) = self.checker.take_result() {
            self.on_update_check_complete(info);
        }
    }

    pub fn on_update_check_complete(&mut self, info: ReleaseInfo) {
        let mut state = self.state.borrow_mut();
        state.update_check_in_progress = false;
        state.set_status(release_status_message(&info));
        state.latest_release = Some(info);
        state.show_update_notification = true;
    }

    /// Starts a background update check unless one is already in flight.
    pub fn request_update_check(&mut self) -> Result<()> {
        if self.state.borrow().update_check_in_progress || self.checker.is_checking() {
            log_info!("update check already in progress");
            return Ok(());
        }

        {
            let mut state = self.state.borrow_mut();
            state.update_check_in_progress = true;
            state.set_status(STATUS_CHECKING);
        }

        if let Err(err) = self.checker.check() {
            let mut state = self.state.borrow_mut();
            state.update_check_in_progress = false;
            state.set_status(STATUS_INCONCLUSIVE);
            return Err(err);
        }
        Ok(())
    }

    /// Starts or stops position tracking. Returns whether it is now running.
    pub fn toggle_tracking(&mut self) -> Result<bool> {
        if self.tracker.is_running() {
            self.tracker.stop();
            self.state.borrow_mut().show_tracker = false;
            Ok(false)
        } else {
            self.start_tracking()?;
            Ok(true)
        }
    }

    /// Runs the recreation chain once without an actual context loss.
    pub fn simulate_context_loss(&mut self) -> bool {
        log_warn!("simulating render context loss");
        match self.renderer.as_mut() {
            Some(renderer) => renderer.run_recreators(),
            None => {
                log_error!("cannot simulate context loss after shutdown");
                false
            }
        }
    }

    pub fn should_close(&self) -> bool {
        match &self.renderer {
            Some(renderer) => {
                renderer.state() == ContextState::Failed || renderer.surface().should_close()
            }
            None => true,
        }
    }

    /// Stops the tracker, cancels the update checker, then drops the render
    /// controller. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        log_info!("application shutting down");
        self.tracker.stop();
        self.checker.cancel();
        self.renderer = None;
        self.ui.borrow_mut().shutdown();
        log_info!("application shut down");
    }

    pub fn state(&self) -> Ref<'_, AppState> {
        self.state.borrow()
    }

    pub fn ui(&self) -> Ref<'_, U> {
        self.ui.borrow()
    }

    pub fn ui_mut(&self) -> RefMut<'_, U> {
        self.ui.borrow_mut()
    }

    pub fn tracker(&self) -> &PositionTracker<C> {
        &self.tracker
    }

    pub fn checker(&self) -> &UpdateChecker<C> {
        &self.checker
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.renderer.as_ref().map(|renderer| renderer.state())
    }

    pub fn surface(&self) -> Option<&S> {
        self.renderer.as_ref().map(|renderer| renderer.surface())
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.renderer.as_mut().map(|renderer| renderer.surface_mut())
    }

    fn start_tracking(&mut self) -> Result<()> {
        self.tracker
            .start(self.settings.position_interval())
            .context("Failed to start position tracker")?;
        self.state.borrow_mut().show_tracker = true;
        Ok(())
    }

    fn skipped_or_closing(
        renderer: &RecoveryController<S>,
        state: &RefCell<AppState>,
        ui: &RefCell<U>,
    ) -> FrameOutcome {
        if renderer.state() == ContextState::Failed {
            let mut state = state.borrow_mut();
            // Nothing can be drawn any more, so the message goes out once
            // through the UI's out-of-band channel.
            if state.status_message != STATUS_CLOSING_ON_FAILURE {
                state.set_status(STATUS_CLOSING_ON_FAILURE);
                ui.borrow_mut().notify(STATUS_CLOSING_ON_FAILURE);
            }
            FrameOutcome::Closing
        } else {
            FrameOutcome::Skipped
        }
    }
}

impl<C, S, U> Drop for Application<C, S, U>
where
    C: FetchClient + 'static,
    S: RenderSurface,
    U: UiBackend + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
