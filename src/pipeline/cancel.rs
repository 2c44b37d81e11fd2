//! Cooperative cancellation.

use crate::error::{Result, ScribeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag.
///
/// A child flag reports cancelled when either it or any ancestor is
/// cancelled; cancelling a child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelFlag>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag scoped to one sub-task of this one.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// `Err(Cancelled)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ScribeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels its flag when dropped.
///
/// Held by a request future so dropping the future (client disconnect) stops
/// every worker still running for it.
#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl CancelOnDrop {
    pub fn new(flag: CancelFlag) -> Self {
        Self(flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
