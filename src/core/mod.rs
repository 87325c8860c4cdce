//! Core types shared across the pipeline: error taxonomy and cancellation.

pub mod error;

pub use error::{AppkeeperError, ErrorContext, user_friendly_error};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Caller-supplied cancellation signal, checked at every suspension point
/// (each HTTP call and each retry backoff sleep). Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight temp files are left for cleanup and
    /// no new rename sequence is started.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out if cancellation has been requested.
    pub fn check(&self) -> Result<(), AppkeeperError> {
        if self.is_cancelled() {
            Err(AppkeeperError::Cancelled)
        } else {
            Ok(())
        }
    }
}
