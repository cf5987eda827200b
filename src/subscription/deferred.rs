//! Releasing a subscription on another scheduler or execution context.
use log::{error, trace};

use crate::{
  error::{DisposeError, ScheduleError},
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{ExecutionContext, Scheduler, Task},
  subscription::{BoxSubscription, SubscriptionLike},
};

/// Where a deferred release is sent.
pub trait DeferTarget {
  fn enqueue(&self, task: Task) -> Result<(), ScheduleError>;
}

#[derive(Clone)]
pub struct OnScheduler<S>(S);

#[derive(Clone)]
pub struct OnContext<C>(C);

impl<S: Scheduler> DeferTarget for OnScheduler<S> {
  fn enqueue(&self, task: Task) -> Result<(), ScheduleError> {
    self.0.schedule(task, None).map(|_| ())
  }
}

impl<C: ExecutionContext> DeferTarget for OnContext<C> {
  #[inline]
  fn enqueue(&self, task: Task) -> Result<(), ScheduleError> { self.0.post(task) }
}

struct Deferred {
  inner: Option<BoxSubscription>,
  enqueued: bool,
}

/// A subscription whose release runs on a target rather than on the caller.
///
/// Releasing the wrapper only enqueues the release: the wrapper reports
/// closed right away while the wrapped subscription stays open until the
/// target runs the task.
pub struct DeferredSubscription<T> {
  state: MutArc<Deferred>,
  target: T,
}

/// Release deferred onto a [`Scheduler`].
pub type ScheduledSubscription<S> = DeferredSubscription<OnScheduler<S>>;

/// Release deferred onto an [`ExecutionContext`].
pub type ContextSubscription<C> = DeferredSubscription<OnContext<C>>;

impl<S: Scheduler> ScheduledSubscription<S> {
  pub fn on_scheduler<U>(subscription: U, scheduler: S) -> Self
  where
    U: SubscriptionLike + Send + 'static,
  {
    Self::new(Box::new(subscription), OnScheduler(scheduler))
  }
}

impl<C: ExecutionContext> ContextSubscription<C> {
  pub fn on_context<U>(subscription: U, context: C) -> Self
  where
    U: SubscriptionLike + Send + 'static,
  {
    Self::new(Box::new(subscription), OnContext(context))
  }
}

impl<T: DeferTarget> DeferredSubscription<T> {
  fn new(inner: BoxSubscription, target: T) -> Self {
    Self {
      state: MutArc::own(Deferred { inner: Some(inner), enqueued: false }),
      target,
    }
  }

  /// Enqueues the release of the wrapped subscription. Enqueues at most once;
  /// when the target refuses the work the wrapper stays open and the error is
  /// returned.
  pub fn try_unsubscribe(&mut self) -> Result<(), DisposeError> {
    {
      let mut state = self.state.rc_deref_mut();
      if state.enqueued {
        return Ok(());
      }
      state.enqueued = true;
    }

    let state = self.state.clone();
    let res = self.target.enqueue(Box::new(move || {
      let inner = state.rc_deref_mut().inner.take();
      if let Some(mut inner) = inner {
        trace!("running deferred release");
        inner.unsubscribe();
      }
    }));

    res.map_err(|err| {
      self.state.rc_deref_mut().enqueued = false;
      DisposeError::from(err)
    })
  }
}

impl<T: DeferTarget> SubscriptionLike for DeferredSubscription<T> {
  /// # Panics
  ///
  /// When the target refuses the work. A release that cannot be delivered is
  /// never dropped silently; use
  /// [`try_unsubscribe`](DeferredSubscription::try_unsubscribe) to handle it.
  fn unsubscribe(&mut self) {
    if let Err(err) = self.try_unsubscribe() {
      error!("deferred release lost: {err}");
      panic!("deferred release lost: {err}");
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.state.rc_deref().enqueued }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    scheduler::TestScheduler,
    subscription::{BooleanSubscription, DisposeExt},
  };
  use std::time::Duration;

  #[test]
  fn released_when_scheduler_runs() {
    let scheduler = TestScheduler::new();
    let resource = BooleanSubscription::new();
    let mut deferred = resource.clone().dispose_on(scheduler.clone());

    deferred.unsubscribe();
    assert!(deferred.is_closed());
    assert!(!resource.is_closed());

    scheduler.advance_by(Duration::from_millis(1));
    assert!(resource.is_closed());
  }

  #[test]
  fn enqueues_once() {
    let scheduler = TestScheduler::new();
    let mut deferred = BooleanSubscription::new().dispose_on(scheduler.clone());
    deferred.unsubscribe();
    deferred.unsubscribe();
    assert_eq!(scheduler.pending(), 1);
  }

  #[cfg(feature = "futures-scheduler")]
  #[test]
  fn released_when_context_drains() {
    let mut pool = futures::executor::LocalPool::new();
    let resource = BooleanSubscription::new();
    let mut deferred = resource.clone().dispose_on_context(pool.spawner());

    deferred.unsubscribe();
    assert!(!resource.is_closed());

    pool.run_until_stalled();
    assert!(resource.is_closed());
  }

  #[test]
  fn refused_release_is_reported() {
    let scheduler = TestScheduler::new();
    scheduler.shutdown();
    let resource = BooleanSubscription::new();
    let mut deferred = resource.clone().dispose_on(scheduler);

    assert_eq!(
      deferred.try_unsubscribe(),
      Err(DisposeError::SchedulingFailure(ScheduleError::Shutdown))
    );
    assert!(!deferred.is_closed());
    assert!(!resource.is_closed());
  }

  #[test]
  #[should_panic(expected = "deferred release lost")]
  fn refused_release_panics() {
    let scheduler = TestScheduler::new();
    scheduler.shutdown();
    BooleanSubscription::new().dispose_on(scheduler).unsubscribe();
  }
}
