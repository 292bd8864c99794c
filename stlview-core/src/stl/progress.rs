/// Progress observation and cooperative cancellation for async codec operations
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::{StlError, StlResult};

/// A single progress observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Completion in `0..=100`
    pub percent: u8,
    pub message: String,
}

/// Receives progress observations from async load and save.
///
/// Implemented for any `Fn(&Progress)` closure that can cross threads.
pub trait ProgressObserver: Send + Sync {
    fn report(&self, progress: &Progress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn report(&self, progress: &Progress) {
        self(progress)
    }
}

/// Shared cancellation signal.
///
/// Clones observe the same flag, so one clone can be handed to the
/// operation while another is kept by whoever decides to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-operation checkpoint: cancellation checks plus monotonic progress
pub(crate) struct Checkpoint<'a> {
    observer: Option<&'a dyn ProgressObserver>,
    cancel: Option<&'a CancelFlag>,
    last_percent: u8,
}

impl<'a> Checkpoint<'a> {
    pub(crate) fn new(
        observer: Option<&'a dyn ProgressObserver>,
        cancel: Option<&'a CancelFlag>,
    ) -> Self {
        Self {
            observer,
            cancel,
            last_percent: 0,
        }
    }

    /// Fail with `Cancelled` if the signal has been raised
    pub(crate) fn check(&self) -> StlResult<()> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(StlError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Report `done` of `total` units, never going backwards
    pub(crate) fn report(&mut self, done: u64, total: u64, message: impl FnOnce() -> String) {
        let Some(observer) = self.observer else {
            return;
        };
        let percent = percent_of(done, total).max(self.last_percent);
        self.last_percent = percent;
        observer.report(&Progress {
            percent,
            message: message(),
        });
    }

    pub(crate) fn finish(&mut self, message: impl Into<String>) {
        self.last_percent = 100;
        if let Some(observer) = self.observer {
            observer.report(&Progress {
                percent: 100,
                message: message.into(),
            });
        }
    }
}

fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = done.saturating_mul(100) / total;
    // Bounded above by 100, so the narrowing cannot truncate
    percent.min(100) as u8
}
