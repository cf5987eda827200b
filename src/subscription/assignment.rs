//! Slot-shaped disposers: containers holding at most one subscription.
use log::{trace, warn};

use crate::{
  error::DisposeError,
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::{BoxSubscription, SubscriptionLike},
};

#[derive(Default)]
struct Slot {
  closed: bool,
  assigned: bool,
  current: Option<BoxSubscription>,
}

impl Slot {
  /// Moves the occupant out, so it can be released once the lock is gone.
  fn close(&mut self) -> Option<BoxSubscription> {
    if self.closed {
      None
    } else {
      self.closed = true;
      self.current.take()
    }
  }
}

/// A disposer that accepts exactly one subscription.
///
/// Assigning into a slot that was already released releases the assigned
/// subscription right away. Assigning a second time fails with
/// [`DisposeError::AlreadyAssigned`] and leaves the rejected subscription
/// untouched.
#[derive(Clone, Default)]
pub struct SingleAssignmentSubscription(MutArc<Slot>);

impl SingleAssignmentSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn assign<S>(&self, subscription: S) -> Result<(), DisposeError>
  where
    S: SubscriptionLike + Send + 'static,
  {
    self.assign_boxed(Box::new(subscription))
  }

  pub(crate) fn assign_boxed(&self, mut subscription: BoxSubscription) -> Result<(), DisposeError> {
    let mut slot = self.0.rc_deref_mut();
    if slot.assigned {
      warn!("single assignment subscription assigned twice");
      return Err(DisposeError::AlreadyAssigned);
    }
    slot.assigned = true;
    if slot.closed {
      drop(slot);
      trace!("single assignment subscription already closed, releasing the assignment");
      subscription.unsubscribe();
    } else {
      slot.current = Some(subscription);
    }
    Ok(())
  }

  #[inline]
  pub fn is_assigned(&self) -> bool { self.0.rc_deref().assigned }
}

impl SubscriptionLike for SingleAssignmentSubscription {
  fn unsubscribe(&mut self) {
    let current = self.0.rc_deref_mut().close();
    if let Some(mut current) = current {
      current.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().closed }
}

macro_rules! replace_slot {
  ($(#[$meta:meta])* $name: ident) => {
    $(#[$meta])*
    #[derive(Clone, Default)]
    pub struct $name(MutArc<Slot>);

    impl $name {
      pub fn new() -> Self { Self::default() }

      /// Stores `subscription` as the occupant and releases the previous one.
      /// If the slot itself was already released, `subscription` is released
      /// immediately instead.
      pub fn assign<S>(&self, subscription: S)
      where
        S: SubscriptionLike + Send + 'static,
      {
        self.assign_boxed(Box::new(subscription))
      }

      pub(crate) fn assign_boxed(&self, subscription: BoxSubscription) {
        let mut slot = self.0.rc_deref_mut();
        let mut released = if slot.closed {
          Some(subscription)
        } else {
          slot.assigned = true;
          slot.current.replace(subscription)
        };
        drop(slot);
        if let Some(released) = released.as_mut() {
          trace!(concat!(stringify!($name), " releasing replaced subscription"));
          released.unsubscribe();
        }
      }

      /// Whether a live occupant is currently held.
      #[inline]
      pub fn has_current(&self) -> bool {
        self.0.rc_deref().current.is_some()
      }
    }

    impl SubscriptionLike for $name {
      fn unsubscribe(&mut self) {
        let current = self.0.rc_deref_mut().close();
        if let Some(mut current) = current {
          current.unsubscribe();
        }
      }

      #[inline]
      fn is_closed(&self) -> bool { self.0.rc_deref().closed }
    }
  };
}

replace_slot!(
  /// A disposer whose occupant can be replaced; each replacement releases
  /// the previous occupant, and releasing the disposer releases the current
  /// one.
  MultipleAssignmentSubscription
);

replace_slot!(
  /// A disposer that releases its previous occupant whenever a new one is
  /// assigned. Shares the replace-and-release contract of
  /// [`MultipleAssignmentSubscription`].
  SerialSubscription
);
