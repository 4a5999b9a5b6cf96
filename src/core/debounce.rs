//! Collapses bursts of input events into a single settled event

use crate::core::timer::{Scheduler, TimerHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

type SettleFn<E> = Arc<dyn Fn(E) + Send + Sync + 'static>;

/// Emits the last event of a burst once `delay` passes without a new `notify`.
///
/// Intermediate events are dropped, not queued. After `dispose` (or drop) no
/// further settle events are emitted, including one whose timer was already armed.
pub struct DebounceGate<E> {
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    on_settle: SettleFn<E>,
    pending: Mutex<Option<TimerHandle>>,
    disposed: Arc<AtomicBool>,
}

impl<E: Send + 'static> DebounceGate<E> {
    pub fn new(
        delay: Duration,
        scheduler: Arc<dyn Scheduler>,
        on_settle: impl Fn(E) + Send + Sync + 'static,
    ) -> Self {
        Self {
            delay,
            scheduler,
            on_settle: Arc::new(on_settle),
            pending: Mutex::new(None),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records `event` as the latest and restarts the quiet window.
    pub fn notify(&self, event: E) {
        if self.disposed.load(Ordering::SeqCst) {
            debug!("Ignoring notify on disposed debounce gate");
            return;
        }

        let on_settle = Arc::clone(&self.on_settle);
        let disposed = Arc::clone(&self.disposed);
        let handle = self.scheduler.schedule(
            self.delay,
            Box::new(move || {
                if !disposed.load(Ordering::SeqCst) {
                    on_settle(event);
                }
            }),
        );

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancels the pending settle, if any, without disposing the gate.
    pub fn cancel(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            handle.cancel();
        }
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<E> Drop for DebounceGate<E> {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            handle.cancel();
        }
    }
}
