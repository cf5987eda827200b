//! Commonly used types and traits.
pub use crate::{
  error::{DisposeError, ScheduleError},
  observable,
  observable::{Observable, ObservableExt},
  observer::{Emitter, Observer, Subscriber},
  ops::{Indexed, Indexer, PreviousValue},
  scheduler::{ExecutionContext, Scheduler, Task, TaskHandle, TestScheduler},
  subject::Subject,
  subscription::*,
  type_hint::TypeHint,
};

#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
