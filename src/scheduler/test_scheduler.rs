//! Virtual time scheduler for deterministic tests.
//!
//! Time only moves when asked to. Tasks run synchronously on the thread that
//! advances the clock, in due-time order and FIFO among tasks due at the same
//! instant.
use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use futures::future::AbortHandle;
use log::trace;

use super::{Scheduler, Task, TaskHandle};
use crate::{
  error::ScheduleError,
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::SubscriptionLike,
};

struct ScheduledTask {
  at: Duration,
  task_id: usize,
  task: Task,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool { self.at == other.at && self.task_id == other.task_id }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .at
      .cmp(&self.at)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

#[derive(Default)]
struct VirtualClock {
  now: Duration,
  next_task_id: usize,
  tasks: BinaryHeap<ScheduledTask>,
  shutdown: bool,
}

/// A scheduler driven by a virtual clock. Clones share the same clock and
/// task queue.
#[derive(Clone, Default)]
pub struct TestScheduler(MutArc<VirtualClock>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// Current virtual time, measured from the scheduler's creation.
  pub fn now(&self) -> Duration { self.0.rc_deref().now }

  /// Number of queued tasks that are neither run nor cancelled.
  pub fn pending(&self) -> usize {
    self
      .0
      .rc_deref()
      .tasks
      .iter()
      .filter(|t| !t.handle.is_closed())
      .count()
  }

  /// Moves the clock forward by `delta`, running every task that comes due.
  pub fn advance_by(&self, delta: Duration) {
    let target = self.now() + delta;
    self.advance_to(target);
  }

  /// Moves the clock to `target`, running every task due at or before it.
  /// Tasks scheduled while running are picked up if they also come due.
  pub fn advance_to(&self, target: Duration) {
    loop {
      let due = {
        let mut clock = self.0.rc_deref_mut();
        let is_due = clock.tasks.peek().map_or(false, |t| t.at <= target);
        let due = if is_due { clock.tasks.pop() } else { None };
        if let Some(t) = due.as_ref() {
          clock.now = clock.now.max(t.at);
        }
        due
      };
      let Some(ScheduledTask { task, handle, task_id, .. }) = due else { break };
      if handle.is_closed() {
        trace!("test scheduler skips cancelled task {task_id}");
        continue;
      }
      handle.finish();
      task();
    }
    let mut clock = self.0.rc_deref_mut();
    clock.now = clock.now.max(target);
  }

  /// Runs every queued task, advancing the clock as far as needed.
  pub fn flush(&self) {
    let last = self.0.rc_deref().tasks.iter().map(|t| t.at).max();
    if let Some(last) = last {
      self.advance_to(last);
      if !self.0.rc_deref().tasks.is_empty() {
        self.flush();
      }
    }
  }

  /// Stops accepting work. Queued tasks are dropped without running.
  pub fn shutdown(&self) {
    let dropped = {
      let mut clock = self.0.rc_deref_mut();
      clock.shutdown = true;
      std::mem::take(&mut clock.tasks)
    };
    trace!("test scheduler shut down, dropping {} tasks", dropped.len());
  }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> Result<TaskHandle, ScheduleError> {
    let mut clock = self.0.rc_deref_mut();
    if clock.shutdown {
      return Err(ScheduleError::Shutdown);
    }
    let (abort, _) = AbortHandle::new_pair();
    let handle = TaskHandle::new(abort);
    let task_id = clock.next_task_id;
    clock.next_task_id += 1;
    let at = clock.now + delay.unwrap_or_default();
    clock.tasks.push(ScheduledTask { at, task_id, task, handle: handle.clone() });
    Ok(handle)
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn runs_in_due_order() {
    let scheduler = TestScheduler::new();
    let log = Arc::new(Mutex::new(vec![]));
    for (name, delay) in [("b", 20), ("a", 10), ("c", 20)] {
      let c_log = log.clone();
      scheduler
        .schedule(
          Box::new(move || c_log.lock().unwrap().push(name)),
          Some(Duration::from_millis(delay)),
        )
        .unwrap();
    }

    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(*log.lock().unwrap(), vec!["a"]);
    assert_eq!(scheduler.now(), Duration::from_millis(10));

    scheduler.advance_by(Duration::from_millis(10));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(scheduler.pending(), 0);
  }

  #[test]
  fn cancelled_task_never_runs() {
    let scheduler = TestScheduler::new();
    let hit = Arc::new(Mutex::new(false));
    let c_hit = hit.clone();
    let mut handle = scheduler
      .schedule(Box::new(move || *c_hit.lock().unwrap() = true), None)
      .unwrap();
    handle.unsubscribe();

    scheduler.flush();
    assert!(!*hit.lock().unwrap());
  }

  #[test]
  fn nested_schedule_is_flushed() {
    let scheduler = TestScheduler::new();
    let hits = Arc::new(Mutex::new(0));
    let c_scheduler = scheduler.clone();
    let c_hits = hits.clone();
    scheduler
      .schedule(
        Box::new(move || {
          *c_hits.lock().unwrap() += 1;
          let c_hits = c_hits.clone();
          c_scheduler
            .schedule(
              Box::new(move || *c_hits.lock().unwrap() += 1),
              Some(Duration::from_millis(5)),
            )
            .unwrap();
        }),
        Some(Duration::from_millis(1)),
      )
      .unwrap();

    scheduler.flush();
    assert_eq!(*hits.lock().unwrap(), 2);
    assert_eq!(scheduler.now(), Duration::from_millis(6));
  }

  #[test]
  fn shutdown_rejects_work() {
    let scheduler = TestScheduler::new();
    scheduler.shutdown();
    let res = scheduler.schedule(Box::new(|| {}), None);
    assert_eq!(res.err(), Some(ScheduleError::Shutdown));
  }
}
