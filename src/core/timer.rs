//! Cancellable one-shot timers

use std::time::Duration;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay, unless cancelled first.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Handle to a scheduled task. Dropping the handle does not cancel it.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Schedules on the ambient tokio runtime; must be used from within one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        let abort = join.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}
