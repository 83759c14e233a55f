//! Render-context validation and bounded-retry recovery.
//!
//! Everything here runs on the application loop thread. Recreation
//! callbacks are `!Send` closures, so they cannot be registered from, or
//! invoked on, any other thread.

pub mod recovery;
pub mod surface;

pub use recovery::{ContextState, RecoveryController, MAX_RECOVERY_ATTEMPTS};
pub use surface::{GpuError, HeadlessSurface, RenderSurface};
