use futures::{
  executor::{LocalSpawner, ThreadPool},
  future,
  task::{LocalSpawnExt, SpawnError, SpawnExt},
};

use super::{ExecutionContext, Task};
use crate::error::ScheduleError;

impl From<SpawnError> for ScheduleError {
  fn from(err: SpawnError) -> Self {
    if err.is_shutdown() {
      ScheduleError::Shutdown
    } else {
      ScheduleError::Spawn(err.to_string())
    }
  }
}

/// Posted tasks run when the owning `LocalPool` is driven.
impl ExecutionContext for LocalSpawner {
  fn post(&self, task: Task) -> Result<(), ScheduleError> {
    self.spawn_local(future::lazy(move |_| task()))?;
    Ok(())
  }
}

impl ExecutionContext for ThreadPool {
  fn post(&self, task: Task) -> Result<(), ScheduleError> {
    self.spawn(future::lazy(move |_| task()))?;
    Ok(())
  }
}
