use std::{
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use crate::rc::{MutArc, RcDeref, RcDerefMut};

mod assignment;
mod composite;
mod deferred;
mod dispose_with;
mod ref_count;

pub use assignment::*;
pub use composite::*;
pub use deferred::*;
pub use dispose_with::*;
pub use ref_count::*;

/// Subscription returns from `Observable::actual_subscribe` to allow
/// unsubscribing, and is the release capability every lifetime container in
/// this crate accepts.
///
/// `unsubscribe` is idempotent: calling it more than once has no further
/// effect. Handle types (`BooleanSubscription`, the disposer containers, ...)
/// are cheap clones over shared state, so one clone can be released while
/// another is used to observe `is_closed`.
pub trait SubscriptionLike {
  /// This allows deregistering a stream before it has finished receiving all
  /// events (i.e. before `complete` is called), or releasing the resource the
  /// subscription stands for.
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;

  /// Activates "RAII" behavior for this subscription. That means
  /// `unsubscribe()` will be called automatically as soon as the returned
  /// value goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self>
  where
    Self: Sized,
  {
    SubscriptionGuard(self)
  }
}

/// Type-erased subscription that can cross threads. Every disposer container
/// stores its members in this form.
pub type BoxSubscription = Box<dyn SubscriptionLike + Send>;

/// Type-erased subscription for single-thread operators.
pub type LocalBoxSubscription = Box<dyn SubscriptionLike>;

impl Debug for Box<dyn SubscriptionLike + Send> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BoxSubscription")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

/// The no-op subscription. It is already closed and releasing it does
/// nothing, which makes it the "already disposed" sentinel.
impl SubscriptionLike for () {
  #[inline]
  fn unsubscribe(&mut self) {}

  #[inline]
  fn is_closed(&self) -> bool { true }
}

impl<T: ?Sized> SubscriptionLike for Box<T>
where
  T: SubscriptionLike,
{
  #[inline]
  fn unsubscribe(&mut self) {
    let s = &mut **self;
    s.unsubscribe()
  }

  #[inline]
  fn is_closed(&self) -> bool {
    let s = &**self;
    s.is_closed()
  }
}

impl<T: SubscriptionLike> SubscriptionLike for Option<T> {
  #[inline]
  fn unsubscribe(&mut self) {
    if let Some(s) = self {
      s.unsubscribe()
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.as_ref().map_or(true, T::is_closed) }
}

/// A subscription that does nothing but remember whether it was released.
#[derive(Clone, Default)]
pub struct BooleanSubscription(Arc<AtomicBool>);

impl BooleanSubscription {
  #[inline]
  pub fn new() -> Self { Self::default() }
}

impl SubscriptionLike for BooleanSubscription {
  #[inline]
  fn unsubscribe(&mut self) { self.0.store(true, Ordering::Release); }

  #[inline]
  fn is_closed(&self) -> bool { self.0.load(Ordering::Acquire) }
}

impl Debug for BooleanSubscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BooleanSubscription")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

/// A subscription running a teardown closure the first time it is released.
pub struct ClosureSubscription<F>(MutArc<Option<F>>);

impl<F: FnOnce()> ClosureSubscription<F> {
  pub fn new(teardown: F) -> Self { Self(MutArc::own(Some(teardown))) }
}

impl<F> Clone for ClosureSubscription<F> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<F: FnOnce()> SubscriptionLike for ClosureSubscription<F> {
  fn unsubscribe(&mut self) {
    let teardown = self.0.rc_deref_mut().take();
    if let Some(teardown) = teardown {
      teardown();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().is_none() }
}

/// Two subscriptions released together.
#[derive(Clone, Debug, Default)]
pub struct ZipSubscription<A, B> {
  a: A,
  b: B,
}

impl<A, B> ZipSubscription<A, B> {
  pub fn new(a: A, b: B) -> Self { Self { a, b } }
}

impl<A, B> SubscriptionLike for ZipSubscription<A, B>
where
  A: SubscriptionLike,
  B: SubscriptionLike,
{
  fn unsubscribe(&mut self) {
    self.a.unsubscribe();
    self.b.unsubscribe();
  }

  #[inline]
  fn is_closed(&self) -> bool { self.a.is_closed() && self.b.is_closed() }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: SubscriptionLike>(pub(crate) T);

impl<T: SubscriptionLike> SubscriptionGuard<T> {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: T) -> SubscriptionGuard<T> { SubscriptionGuard(subscription) }
}

impl<T: SubscriptionLike> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}
