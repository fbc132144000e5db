use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{SceneError, SceneResult};

/// Cooperative cancellation flag shared between the caller and long-running steps.
///
/// Cloning yields a handle to the same flag. Generators, probes and renders poll it between
/// blocking operations and abort with [`SceneError::Cancelled`] once it is set.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled { what }` if cancellation was requested.
    pub fn check(&self, what: &str) -> SceneResult<()> {
        if self.is_cancelled() {
            return Err(SceneError::cancelled(what));
        }
        Ok(())
    }
}
