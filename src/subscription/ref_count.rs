use log::debug;

use crate::{
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::{BoxSubscription, SubscriptionLike},
};

struct State {
  underlying: Option<BoxSubscription>,
  primary_released: bool,
  outstanding: usize,
}

impl State {
  /// Takes the underlying subscription out once nobody holds it anymore.
  fn take_if_unused(&mut self) -> Option<BoxSubscription> {
    if self.primary_released && self.outstanding == 0 {
      self.underlying.take()
    } else {
      None
    }
  }
}

/// A subscription shared between its primary holder and any number of
/// dependents.
///
/// The underlying subscription is released exactly once, when the primary
/// holder has released this wrapper and every [`RefCountToken`] issued from
/// it has been released as well.
#[derive(Clone)]
pub struct RefCountSubscription(MutArc<State>);

/// A dependent's claim on a [`RefCountSubscription`].
///
/// Releasing the token gives the claim back, and so does dropping it. Tokens
/// are not `Clone`: each one accounts for exactly one claim.
pub struct RefCountToken {
  parent: Option<MutArc<State>>,
}

impl RefCountSubscription {
  pub fn new<S: SubscriptionLike + Send + 'static>(subscription: S) -> Self {
    Self(MutArc::own(State {
      underlying: Some(Box::new(subscription)),
      primary_released: false,
      outstanding: 0,
    }))
  }

  /// Issues a new dependent claim. Once the underlying subscription has been
  /// released the returned token is already closed.
  pub fn issue_token(&self) -> RefCountToken {
    let mut state = self.0.rc_deref_mut();
    if state.underlying.is_none() {
      return RefCountToken { parent: None };
    }
    state.outstanding += 1;
    debug!("ref count token issued, {} outstanding", state.outstanding);
    RefCountToken { parent: Some(self.0.clone()) }
  }

  /// Whether the primary holder asked for the release.
  pub fn is_primary_released(&self) -> bool { self.0.rc_deref().primary_released }

  /// Number of tokens issued and not yet released.
  pub fn outstanding(&self) -> usize { self.0.rc_deref().outstanding }
}

impl SubscriptionLike for RefCountSubscription {
  fn unsubscribe(&mut self) {
    let underlying = {
      let mut state = self.0.rc_deref_mut();
      if state.primary_released {
        return;
      }
      state.primary_released = true;
      debug!("ref count primary released, {} outstanding", state.outstanding);
      state.take_if_unused()
    };
    if let Some(mut underlying) = underlying {
      underlying.unsubscribe();
    }
  }

  /// True once the underlying subscription has been released.
  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().underlying.is_none() }
}

impl SubscriptionLike for RefCountToken {
  fn unsubscribe(&mut self) {
    let Some(parent) = self.parent.take() else { return };
    let underlying = {
      let mut state = parent.rc_deref_mut();
      state.outstanding -= 1;
      debug!("ref count token released, {} outstanding", state.outstanding);
      state.take_if_unused()
    };
    if let Some(mut underlying) = underlying {
      underlying.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.parent.is_none() }
}

impl Drop for RefCountToken {
  fn drop(&mut self) { self.unsubscribe() }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc,
    },
    thread,
  };

  use super::*;
  use crate::subscription::{BooleanSubscription, ClosureSubscription};

  #[test]
  fn released_after_primary_and_all_tokens() {
    let resource = BooleanSubscription::new();
    let mut shared = RefCountSubscription::new(resource.clone());
    let mut t1 = shared.issue_token();
    let mut t2 = shared.issue_token();
    assert_eq!(shared.outstanding(), 2);

    t1.unsubscribe();
    assert!(!resource.is_closed());

    shared.unsubscribe();
    assert!(shared.is_primary_released());
    assert!(!resource.is_closed());
    assert!(!shared.is_closed());

    t2.unsubscribe();
    assert!(resource.is_closed());
    assert!(shared.is_closed());
  }

  #[test]
  fn primary_alone_releases() {
    let resource = BooleanSubscription::new();
    let mut shared = RefCountSubscription::new(resource.clone());
    shared.unsubscribe();
    assert!(resource.is_closed());
  }

  #[test]
  fn tokens_release_once() {
    let resource = BooleanSubscription::new();
    let mut shared = RefCountSubscription::new(resource.clone());
    let mut t1 = shared.issue_token();
    let _t2 = shared.issue_token();

    t1.unsubscribe();
    t1.unsubscribe();
    assert!(t1.is_closed());
    assert_eq!(shared.outstanding(), 1);

    shared.unsubscribe();
    assert!(!resource.is_closed());
  }

  #[test]
  fn token_after_release_is_closed() {
    let mut shared = RefCountSubscription::new(BooleanSubscription::new());
    shared.unsubscribe();

    let mut late = shared.issue_token();
    assert!(late.is_closed());
    late.unsubscribe();
    assert_eq!(shared.outstanding(), 0);
  }

  #[test]
  fn dropped_token_gives_its_claim_back() {
    let resource = BooleanSubscription::new();
    let mut shared = RefCountSubscription::new(resource.clone());
    let token = shared.issue_token();
    shared.unsubscribe();
    assert!(!resource.is_closed());

    drop(token);
    assert_eq!(shared.outstanding(), 0);
    assert!(resource.is_closed());
  }

  #[test]
  fn tokens_across_threads_release_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let counted = releases.clone();
    let shared = RefCountSubscription::new(ClosureSubscription::new(move || {
      counted.fetch_add(1, Ordering::SeqCst);
    }));
    // Held by the test so the count cannot reach zero while threads run.
    let anchor = shared.issue_token();

    let workers: Vec<_> = (0..8)
      .map(|_| {
        let shared = shared.clone();
        thread::spawn(move || {
          for _ in 0..100 {
            let mut token = shared.issue_token();
            let _dropped = shared.issue_token();
            token.unsubscribe();
          }
        })
      })
      .collect();
    for worker in workers {
      worker.join().unwrap();
    }
    assert_eq!(shared.outstanding(), 1);
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    let mut primary = shared.clone();
    let racing: Vec<_> = (0..4)
      .map(|i| {
        let mut primary = primary.clone();
        let token = shared.issue_token();
        thread::spawn(move || {
          if i % 2 == 0 {
            primary.unsubscribe();
          }
          drop(token);
        })
      })
      .collect();
    drop(anchor);
    for worker in racing {
      worker.join().unwrap();
    }
    primary.unsubscribe();

    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(shared.is_closed());
    assert_eq!(shared.outstanding(), 0);
  }
}
