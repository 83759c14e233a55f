use anyhow::Result;

use super::surface::RenderSurface;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Failed recreation attempts tolerated before giving up.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Bound on error flags drained per attempt, in case a driver keeps
/// reporting the same flag.
const MAX_DRAINED_ERRORS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Valid,
    Recovering,
    /// Terminal. A close request has been issued.
    Failed,
}

type RecreateFn = Box<dyn FnMut() -> Result<()>>;

struct Recreator {
    subsystem: String,
    callback: RecreateFn,
}

/// Validates the render surface every frame and rebuilds dependent
/// subsystems after context loss.
///
/// Recovery is attempted at most `max_attempts` times in a row. The next
/// validation after that moves to [`ContextState::Failed`] and asks the
/// surface to close, exactly once.
pub struct RecoveryController<S: RenderSurface> {
    surface: S,
    state: ContextState,
    attempts: u32,
    max_attempts: u32,
    recreators: Vec<Recreator>,
    close_requested: bool,
    frame_open: bool,
}

impl<S: RenderSurface> RecoveryController<S> {
    pub fn new(surface: S) -> Self {
        Self::with_max_attempts(surface, MAX_RECOVERY_ATTEMPTS)
    }

    pub fn with_max_attempts(surface: S, max_attempts: u32) -> Self {
        Self {
            surface,
            state: ContextState::Valid,
            attempts: 0,
            max_attempts,
            recreators: Vec::new(),
            close_requested: false,
            frame_open: false,
        }
    }

    /// Registers the recreation callback for `subsystem`.
    ///
    /// Callbacks run in registration order. Registering the same subsystem
    /// again replaces its callback in place. A callback may be invoked after
    /// an earlier partial failure and must cope with half-torn-down state.
    pub fn on_context_loss<F>(&mut self, subsystem: impl Into<String>, callback: F)
    where
        F: FnMut() -> Result<()> + 'static,
    {
        let subsystem = subsystem.into();
        let callback: RecreateFn = Box::new(callback);

        match self.recreators.iter_mut().find(|r| r.subsystem == subsystem) {
            Some(existing) => {
                log_debug!("replacing recreation callback for {subsystem}");
                existing.callback = callback;
            }
            None => self.recreators.push(Recreator { subsystem, callback }),
        }
    }

    /// Checks the context and, if it is gone, tries to recover it now.
    ///
    /// Returns `true` when drawing may proceed this frame.
    pub fn validate(&mut self) -> bool {
        if !self.surface.is_open() {
            log_error!("validate called without an open surface");
            return false;
        }

        match self.state {
            ContextState::Failed => false,
            ContextState::Recovering => self.recreate(),
            ContextState::Valid => match self.detect_loss() {
                Some(reason) => {
                    log_warn!("render context invalid ({reason}), attempting recovery");
                    self.set_state(ContextState::Recovering);
                    self.recreate()
                }
                None => {
                    self.attempts = 0;
                    true
                }
            },
        }
    }

    /// Validates, then clears. Returns `false` if the frame must be skipped
    /// entirely: no draw calls, no present.
    pub fn begin_frame(&mut self) -> bool {
        if !self.surface.is_open() {
            log_error!("begin_frame called before the surface was initialised");
            return false;
        }
        if self.frame_open {
            log_warn!("begin_frame called twice without end_frame");
        }

        if !self.validate() {
            log_debug!("skipping frame, context not valid");
            self.frame_open = false;
            return false;
        }

        self.surface.clear();
        self.frame_open = true;
        true
    }

    /// Re-validates to catch loss during the frame, then presents.
    /// Returns `true` if the frame was presented.
    pub fn end_frame(&mut self) -> bool {
        if !self.frame_open {
            log_error!("end_frame called without a matching begin_frame");
            return false;
        }
        self.frame_open = false;

        if !self.validate() {
            log_error!("render context lost mid-frame, skipping present");
            return false;
        }

        self.surface.present();
        true
    }

    /// Runs every recreation callback once, outside the validation path.
    /// The state machine is not touched.
    pub fn run_recreators(&mut self) -> bool {
        self.invoke_recreators()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn detect_loss(&mut self) -> Option<String> {
        if !self.surface.is_context_current() {
            return Some("context is no longer current".to_string());
        }

        match self.surface.poll_error() {
            Some(err) if err.is_unrecoverable() => Some(err.to_string()),
            Some(err) => {
                log_debug!("ignoring recoverable GPU error: {err}");
                None
            }
            None => None,
        }
    }

    fn recreate(&mut self) -> bool {
        self.attempts += 1;

        if self.attempts > self.max_attempts {
            self.fail();
            return false;
        }

        log_info!(
            "recreating render context (attempt {}/{})",
            self.attempts,
            self.max_attempts
        );

        if !self.surface.make_context_current() || !self.surface.is_context_current() {
            log_error!("failed to make render context current, frame skipped");
            return false;
        }

        for _ in 0..MAX_DRAINED_ERRORS {
            match self.surface.poll_error() {
                Some(err) => log_debug!("drained pending GPU error: {err}"),
                None => break,
            }
        }

        if !self.invoke_recreators() {
            return false;
        }

        self.attempts = 0;
        self.set_state(ContextState::Valid);
        log_info!("render context recovered");
        true
    }

    fn invoke_recreators(&mut self) -> bool {
        for recreator in &mut self.recreators {
            log_info!("recreating {} after context loss", recreator.subsystem);
            if let Err(err) = (recreator.callback)() {
                log_error!("recreating {} failed: {err:#}", recreator.subsystem);
                return false;
            }
        }
        true
    }

    fn fail(&mut self) {
        self.set_state(ContextState::Failed);
        // Logged unconditionally.
        log::error!(
            "failed to recover render context after {} attempts, requesting close",
            self.max_attempts
        );

        if !self.close_requested {
            self.close_requested = true;
            self.surface.request_close();
        }
    }

    fn set_state(&mut self, next: ContextState) {
        if self.state != next {
            log_info!("render context state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
