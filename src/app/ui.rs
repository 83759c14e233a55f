use anyhow::{bail, Result};

use super::state::AppState;

/// Immediate-mode UI backend bound to the render context.
///
/// Backend resources die with the context, so after context loss the
/// application calls [`shutdown`](Self::shutdown) then
/// [`initialize`](Self::initialize). Both must tolerate a backend that was
/// only partly torn down by an earlier failed attempt.
pub trait UiBackend {
    fn initialize(&mut self) -> Result<()>;

    fn shutdown(&mut self);

    fn draw(&mut self, state: &AppState);

    /// Shows `message` without the render context, like a native message
    /// box. Used when the context is gone for good and the application is
    /// about to close.
    fn notify(&mut self, message: &str);
}

/// Backend that draws into a string buffer instead of a window.
#[derive(Debug, Default)]
pub struct HeadlessUi {
    initialized: bool,
    generation: u32,
    failing_inits: u32,
    frames_drawn: u64,
    last_frame: String,
    notices: Vec<String>,
}

impl HeadlessUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls to `initialize` fail.
    pub fn fail_next_inits(&mut self, count: u32) {
        self.failing_inits = count;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of successful initialisations so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_frame(&self) -> &str {
        &self.last_frame
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

impl UiBackend for HeadlessUi {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.failing_inits > 0 {
            self.failing_inits -= 1;
            bail!("UI backend could not create its device objects");
        }

        self.initialized = true;
        self.generation += 1;
        log::debug!("UI backend initialised (generation {})", self.generation);
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.initialized {
            log::debug!("UI backend shut down (generation {})", self.generation);
        }
        self.initialized = false;
    }

    fn draw(&mut self, state: &AppState) {
        if !self.initialized {
            log::error!("draw called on an uninitialised UI backend");
            return;
        }

        let position = match state.latest_position {
            Some(sample) if state.show_tracker => format!(
                "lat {:.4} lon {:.4} alt {:.1} km ({} points)",
                sample.latitude,
                sample.longitude,
                sample.altitude,
                state.trail.0.len()
            ),
            _ => "no position".to_string(),
        };

        let frame = format!("{} | {}", state.status_message, position);
        if frame != self.last_frame {
            log::info!("{frame}");
            self.last_frame = frame;
        }
        self.frames_drawn += 1;
    }

    fn notify(&mut self, message: &str) {
        log::error!("{message}");
        self.notices.push(message.to_string());
    }
}
