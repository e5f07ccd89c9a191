//! Timer scheduling abstraction
//!
//! Sessions only ever hold a [`TimerHandle`]; the runtime that actually
//! sleeps stays behind the [`Scheduler`] trait.

use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;

/// Cancels one pending timer. Dropping the handle leaves the timer running.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn cancel(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimerHandle")
    }
}

/// Runs a task after a delay unless cancelled first
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// Scheduler backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let abort = handle.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}
