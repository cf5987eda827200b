//! Attaching a subscription to whatever container owns its lifetime.
use std::any::{type_name, Any};

use log::{trace, warn};

use crate::{
  error::DisposeError,
  scheduler::{ExecutionContext, Scheduler},
  subscription::{
    BoxSubscription, CompositeSubscription, ContextSubscription, MultipleAssignmentSubscription,
    RefCountSubscription, ScheduledSubscription, SerialSubscription, SingleAssignmentSubscription,
    SubscriptionLike,
  },
};

/// The container kinds a subscription can be attached to.
#[derive(Clone, Copy)]
pub enum Disposer<'a> {
  Single(&'a SingleAssignmentSubscription),
  Multiple(&'a MultipleAssignmentSubscription),
  Serial(&'a SerialSubscription),
  Composite(&'a CompositeSubscription),
}

impl<'a> Disposer<'a> {
  /// Recognizes `disposer` as one of the supported container kinds, trying
  /// single assignment, multiple assignment, serial and composite in that
  /// order.
  pub fn resolve(disposer: &'a dyn Any) -> Option<Self> {
    if let Some(d) = disposer.downcast_ref::<SingleAssignmentSubscription>() {
      Some(Disposer::Single(d))
    } else if let Some(d) = disposer.downcast_ref::<MultipleAssignmentSubscription>() {
      Some(Disposer::Multiple(d))
    } else if let Some(d) = disposer.downcast_ref::<SerialSubscription>() {
      Some(Disposer::Serial(d))
    } else {
      disposer
        .downcast_ref::<CompositeSubscription>()
        .map(Disposer::Composite)
    }
  }

  /// Hands `subscription` over to the container.
  pub fn attach(self, subscription: BoxSubscription) -> Result<(), DisposeError> {
    match self {
      Disposer::Single(d) => d.assign_boxed(subscription)?,
      Disposer::Multiple(d) => d.assign_boxed(subscription),
      Disposer::Serial(d) => d.assign_boxed(subscription),
      Disposer::Composite(d) => d.add_boxed(subscription),
    }
    trace!("subscription attached to {}", self.kind());
    Ok(())
  }

  fn kind(&self) -> &'static str {
    match self {
      Disposer::Single(_) => "single assignment",
      Disposer::Multiple(_) => "multiple assignment",
      Disposer::Serial(_) => "serial",
      Disposer::Composite(_) => "composite",
    }
  }
}

impl<'a> From<&'a SingleAssignmentSubscription> for Disposer<'a> {
  fn from(d: &'a SingleAssignmentSubscription) -> Self { Disposer::Single(d) }
}

impl<'a> From<&'a MultipleAssignmentSubscription> for Disposer<'a> {
  fn from(d: &'a MultipleAssignmentSubscription) -> Self { Disposer::Multiple(d) }
}

impl<'a> From<&'a SerialSubscription> for Disposer<'a> {
  fn from(d: &'a SerialSubscription) -> Self { Disposer::Serial(d) }
}

impl<'a> From<&'a CompositeSubscription> for Disposer<'a> {
  fn from(d: &'a CompositeSubscription) -> Self { Disposer::Composite(d) }
}

/// Lifetime combinators available on every thread-safe subscription.
pub trait DisposeExt: SubscriptionLike + Send + Sized + 'static {
  /// Ties the subscription to `disposer`: it is released when the container
  /// releases it.
  fn dispose_with<'a>(self, disposer: impl Into<Disposer<'a>>) -> Result<(), DisposeError> {
    disposer.into().attach(Box::new(self))
  }

  /// Like [`DisposeExt::dispose_with`], for a disposer whose kind is only
  /// known at runtime. Anything that is not a recognized container fails with
  /// [`DisposeError::UnsupportedDisposerKind`]; the subscription is then
  /// neither stored nor released.
  fn dispose_with_any<D: Any>(self, disposer: &D) -> Result<(), DisposeError> {
    attach_dynamic(Box::new(self), disposer, type_name::<D>())
  }

  /// Like [`DisposeExt::dispose_with_any`], for a disposer only held as
  /// `&dyn Any`, e.g. out of a `Box<dyn Any>` (pass `&*boxed`). The error
  /// names the kind `dyn Any` since the concrete type is unknown.
  fn dispose_with_dyn(self, disposer: &dyn Any) -> Result<(), DisposeError> {
    attach_dynamic(Box::new(self), disposer, "dyn Any")
  }

  /// Defers the release onto `scheduler`.
  fn dispose_on<S: Scheduler>(self, scheduler: S) -> ScheduledSubscription<S> {
    ScheduledSubscription::on_scheduler(self, scheduler)
  }

  /// Defers the release onto `context`.
  fn dispose_on_context<C: ExecutionContext>(self, context: C) -> ContextSubscription<C> {
    ContextSubscription::on_context(self, context)
  }

  /// Shares the subscription among dependents, see [`RefCountSubscription`].
  fn ref_counted(self) -> RefCountSubscription { RefCountSubscription::new(self) }
}

impl<T> DisposeExt for T where T: SubscriptionLike + Send + 'static {}

fn attach_dynamic(
  subscription: BoxSubscription,
  disposer: &dyn Any,
  kind: &'static str,
) -> Result<(), DisposeError> {
  match Disposer::resolve(disposer) {
    Some(d) => d.attach(subscription),
    None => {
      warn!("cannot attach a subscription to unsupported disposer {kind}");
      Err(DisposeError::UnsupportedDisposerKind { kind })
    }
  }
}
