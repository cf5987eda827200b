use std::{
  any::Any,
  fmt::{Debug, Formatter},
  panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use log::trace;
use smallvec::SmallVec;

use crate::{
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::{BoxSubscription, SubscriptionLike},
};

/// A group of subscriptions released together.
///
/// Once the group is released, anything added afterwards is released on the
/// spot. Members that are already closed are pruned whenever a new member is
/// added.
///
/// A member that panics while being released does not stop the others: every
/// member is released, then the first panic is raised again.
#[derive(Clone, Default)]
pub struct CompositeSubscription(MutArc<Inner>);

#[derive(Default)]
struct Inner {
  closed: bool,
  teardown: SmallVec<[BoxSubscription; 1]>,
}

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn add<S: SubscriptionLike + Send + 'static>(&self, subscription: S) {
    if !self.is_same(&subscription) {
      self.add_boxed(Box::new(subscription))
    }
  }

  pub(crate) fn add_boxed(&self, mut subscription: BoxSubscription) {
    let mut inner = self.0.rc_deref_mut();
    if inner.closed {
      drop(inner);
      trace!("composite subscription already closed, releasing the new member");
      subscription.unsubscribe();
    } else {
      inner.teardown.retain(|v| !v.is_closed());
      inner.teardown.push(subscription);
    }
  }

  /// Number of members currently held.
  pub fn len(&self) -> usize { self.0.rc_deref().teardown.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  #[inline]
  pub(crate) fn ptr_eq(&self, other: &Self) -> bool { self.0.ptr_eq(&other.0) }

  fn is_same(&self, other: &dyn Any) -> bool {
    other
      .downcast_ref::<Self>()
      .map_or(false, |other| self.ptr_eq(other))
  }
}

impl SubscriptionLike for CompositeSubscription {
  fn unsubscribe(&mut self) {
    let teardown = {
      let mut inner = self.0.rc_deref_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.teardown)
    };
    trace!("releasing {} composite members", teardown.len());
    let mut first_panic = None;
    for mut v in teardown {
      if let Err(payload) = catch_unwind(AssertUnwindSafe(|| v.unsubscribe())) {
        first_panic.get_or_insert(payload);
      }
    }
    if let Some(payload) = first_panic {
      resume_unwind(payload);
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().closed }
}

impl Debug for CompositeSubscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let inner = self.0.rc_deref();
    f.debug_struct("CompositeSubscription")
      .field("closed", &inner.closed)
      .field("teardown_count", &inner.teardown.len())
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    scheduler::TestScheduler,
    subscription::{BooleanSubscription, DisposeExt},
  };

  #[test]
  fn releases_every_member() {
    let a = BooleanSubscription::new();
    let b = BooleanSubscription::new();
    let mut group = CompositeSubscription::new();
    group.add(a.clone());
    group.add(b.clone());
    assert_eq!(group.len(), 2);

    group.unsubscribe();
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert!(group.is_empty());

    group.unsubscribe();
    assert!(group.is_closed());
  }

  #[test]
  fn add_after_release() {
    let mut group = CompositeSubscription::new();
    group.unsubscribe();

    let late = BooleanSubscription::new();
    group.add(late.clone());
    assert!(late.is_closed());
    assert!(group.is_empty());
  }

  #[test]
  fn prunes_closed_members() {
    let group = CompositeSubscription::new();
    let mut gone = BooleanSubscription::new();
    group.add(gone.clone());
    gone.unsubscribe();

    group.add(BooleanSubscription::new());
    assert_eq!(group.len(), 1);
  }

  #[test]
  fn ignores_itself() {
    let group = CompositeSubscription::new();
    group.add(group.clone());
    assert!(group.is_empty());
  }

  #[test]
  fn panicking_member_does_not_keep_others_alive() {
    let scheduler = TestScheduler::new();
    scheduler.shutdown();
    let before = BooleanSubscription::new();
    let after = BooleanSubscription::new();
    let mut group = CompositeSubscription::new();
    group.add(before.clone());
    group.add(BooleanSubscription::new().dispose_on(scheduler));
    group.add(after.clone());

    let released = catch_unwind(AssertUnwindSafe(|| group.unsubscribe()));
    let payload = released.unwrap_err();
    let message = payload
      .downcast_ref::<String>()
      .map(String::as_str)
      .unwrap_or_default();
    assert!(message.contains("deferred release lost"));
    assert!(before.is_closed());
    assert!(after.is_closed());
    assert!(group.is_closed());
  }
}
