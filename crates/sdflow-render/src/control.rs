//! Cancellation and progress reporting for in-flight renders

use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Token to cancel an in-progress render
///
/// Clones share the same flag, so one clone can be handed to the render while
/// another stays with whoever may want to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Build a new token, initialized as "not cancelled"
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this token as cancelled
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if the token is cancelled
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pixels completed so far out of the image total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Completion in `[0, 1]`
    pub fn fraction(self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.done as f32 / self.total as f32).min(1.0)
        }
    }
}

/// Callback receiving [`Progress`] updates from render workers
///
/// Called from worker threads, possibly concurrently.
pub struct ProgressSink {
    callback: Box<dyn Fn(Progress) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn report(&self, progress: Progress) {
        (self.callback)(progress);
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn clones_share_cancellation() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(Progress { done: 0, total: 0 }.fraction(), 1.0);
        assert_eq!(Progress { done: 25, total: 100 }.fraction(), 0.25);
        assert_eq!(Progress { done: 120, total: 100 }.fraction(), 1.0);
    }

    #[test]
    fn sink_forwards_reports() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sink = ProgressSink::new(move |p| {
            counter.store(p.done, Ordering::Relaxed);
        });
        sink.report(Progress { done: 7, total: 10 });
        assert_eq!(seen.load(Ordering::Relaxed), 7);
    }
}
