use std::{
  sync::{Arc, Weak},
  time::Duration,
};

use futures::future::abortable;
use log::warn;
use tokio::runtime::Handle;

use super::{Scheduler, Task, TaskHandle};
use crate::error::ScheduleError;

/// A tokio runtime used as scheduler.
///
/// Spawning through a `Handle` whose runtime is gone drops the task without
/// telling anyone. The scheduler parks a sentinel task on the runtime when it
/// is created; the runtime drops the sentinel when it shuts down, after which
/// `schedule` fails with [`ScheduleError::Shutdown`].
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
  alive: Weak<()>,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self {
    let sentinel = Arc::new(());
    let alive = Arc::downgrade(&sentinel);
    handle.spawn(async move {
      let _sentinel = sentinel;
      std::future::pending::<()>().await
    });
    Self { handle, alive }
  }

  /// Scheduler on the runtime the caller runs in.
  ///
  /// # Panics
  ///
  /// Outside of a tokio runtime, like [`Handle::current`].
  pub fn current() -> Self { Self::new(Handle::current()) }

  /// Whether the runtime has shut down.
  #[inline]
  pub fn is_shutdown(&self) -> bool { self.alive.strong_count() == 0 }
}

impl From<Handle> for TokioScheduler {
  #[inline]
  fn from(handle: Handle) -> Self { Self::new(handle) }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> Result<TaskHandle, ScheduleError> {
    if self.is_shutdown() {
      warn!("tokio runtime is shut down, refusing the task");
      return Err(ScheduleError::Shutdown);
    }
    let (fut, abort) = abortable(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      task();
    });
    let handle = TaskHandle::new(abort);
    let c_handle = handle.clone();
    self.handle.spawn(async move {
      if fut.await.is_ok() {
        c_handle.finish();
      }
    });
    Ok(handle)
  }
}
