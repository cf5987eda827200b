//! Targets that run work later: schedulers (optionally delayed, cancellable)
//! and execution contexts (fire and forget queues).
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

use futures::future::AbortHandle;

use crate::{error::ScheduleError, subscription::SubscriptionLike};

#[cfg(feature = "futures-scheduler")]
mod futures_scheduler;
mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

pub use test_scheduler::TestScheduler;

/// A unit of work handed to a scheduler or an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A Scheduler is an object to order task and schedule their execution.
pub trait Scheduler {
  /// Queues `task` to run after `delay` (or as soon as possible when `None`).
  /// The returned handle cancels the task if it has not run yet.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> Result<TaskHandle, ScheduleError>;
}

/// A queue that runs posted work on its own terms, with no way to cancel it.
pub trait ExecutionContext {
  fn post(&self, task: Task) -> Result<(), ScheduleError>;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
  #[inline]
  fn schedule(&self, task: Task, delay: Option<Duration>) -> Result<TaskHandle, ScheduleError> {
    (**self).schedule(task, delay)
  }
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for &C {
  #[inline]
  fn post(&self, task: Task) -> Result<(), ScheduleError> { (**self).post(task) }
}

/// Cancellation handle of a scheduled task.
///
/// It is closed once the task ran or was cancelled.
#[derive(Clone, Debug)]
pub struct TaskHandle {
  handle: AbortHandle,
  closed: Arc<AtomicBool>,
}

impl TaskHandle {
  pub fn new(handle: AbortHandle) -> Self { Self { handle, closed: Arc::new(AtomicBool::new(false)) } }

  /// A handle for a task that can no longer be cancelled.
  pub fn finished() -> Self {
    let (handle, _) = AbortHandle::new_pair();
    let this = Self::new(handle);
    this.finish();
    this
  }

  /// Marks the task as done without aborting it.
  pub fn finish(&self) { self.closed.store(true, Ordering::Release); }
}

impl SubscriptionLike for TaskHandle {
  fn unsubscribe(&mut self) {
    if !self.closed.swap(true, Ordering::AcqRel) {
      self.handle.abort();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) || self.handle.is_aborted() }
}
