use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Pending GPU error flags, as drained one at a time from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("GPU context lost")]
    ContextLost,
    #[error("GPU out of memory")]
    OutOfMemory,
    #[error("GPU error 0x{0:X}")]
    Other(u32),
}

impl GpuError {
    /// Errors after which the context's resources can no longer be trusted.
    pub fn is_unrecoverable(self) -> bool {
        matches!(self, GpuError::ContextLost | GpuError::OutOfMemory)
    }
}

/// The native window and its GPU context, as seen by the recovery
/// controller. Implementations are owned by the application loop thread.
pub trait RenderSurface {
    /// Whether the native window exists. Frame calls on a closed surface
    /// are contract violations.
    fn is_open(&self) -> bool;

    /// Whether the surface's context is bound as current on this thread.
    fn is_context_current(&self) -> bool;

    /// Re-binds the context. Returns `false` if the binding failed.
    fn make_context_current(&mut self) -> bool;

    /// Pops the oldest pending GPU error flag.
    fn poll_error(&mut self) -> Option<GpuError>;

    fn clear(&mut self);

    fn present(&mut self);

    fn request_close(&mut self);

    fn should_close(&self) -> bool;
}

/// Surface without a native window.
///
/// Used by the headless binary and by tests. Context loss, failed
/// re-binding and driver errors can be injected.
#[derive(Debug)]
pub struct HeadlessSurface {
    open: bool,
    context_current: bool,
    rebind_failures: Option<u32>,
    pending_errors: VecDeque<GpuError>,
    close_flag: Arc<AtomicBool>,
    close_requests: u32,
    frames_cleared: u64,
    frames_presented: u64,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            open: true,
            context_current: true,
            rebind_failures: Some(0),
            pending_errors: VecDeque::new(),
            close_flag: Arc::new(AtomicBool::new(false)),
            close_requests: 0,
            frames_cleared: 0,
            frames_presented: 0,
        }
    }

    /// A surface whose native window was never created.
    pub fn closed() -> Self {
        Self {
            open: false,
            context_current: false,
            ..Self::new()
        }
    }

    /// Flag that, once set, makes [`should_close`](RenderSurface::should_close)
    /// report `true`. Safe to set from another thread.
    pub fn close_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.close_flag)
    }

    /// Unbinds the context, as after display sleep or a driver reset.
    pub fn lose_context(&mut self) {
        self.context_current = false;
    }

    pub fn push_error(&mut self, error: GpuError) {
        self.pending_errors.push_back(error);
    }

    /// The next `count` re-bind attempts fail.
    pub fn fail_rebinds(&mut self, count: u32) {
        self.rebind_failures = Some(count);
    }

    /// Every re-bind attempt fails from now on.
    pub fn fail_all_rebinds(&mut self) {
        self.rebind_failures = None;
    }

    pub fn close_requests(&self) -> u32 {
        self.close_requests
    }

    pub fn frames_cleared(&self) -> u64 {
        self.frames_cleared
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl RenderSurface for HeadlessSurface {
    fn is_open(&self) -> bool {
        self.open
    }

    fn is_context_current(&self) -> bool {
        self.open && self.context_current
    }

    fn make_context_current(&mut self) -> bool {
        if !self.open {
            return false;
        }

        match self.rebind_failures {
            None => false,
            Some(0) => {
                self.context_current = true;
                true
            }
            Some(remaining) => {
                self.rebind_failures = Some(remaining - 1);
                false
            }
        }
    }

    fn poll_error(&mut self) -> Option<GpuError> {
        self.pending_errors.pop_front()
    }

    fn clear(&mut self) {
        self.frames_cleared += 1;
    }

    fn present(&mut self) {
        self.frames_presented += 1;
    }

    fn request_close(&mut self) {
        self.close_requests += 1;
        self.close_flag.store(true, Ordering::SeqCst);
    }

    fn should_close(&self) -> bool {
        self.close_flag.load(Ordering::SeqCst)
    }
}
