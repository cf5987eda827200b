//! The consuming side of a stream.
use std::{collections::VecDeque, convert::Infallible};

use crate::{
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::SubscriptionLike,
};

/// An Observer is a consumer of values delivered by an Observable. One for
/// each type of notification delivered by the Observable: `next`, `error`,
/// and `complete`.
pub trait Observer<Item, Err> {
  fn next(&mut self, value: Item);

  /// Terminal, consumes the observer.
  fn error(self, err: Err);

  /// Terminal, consumes the observer.
  fn complete(self);

  /// Whether the observer accepts no more values. Sources that emit in a
  /// loop check it to stop early.
  fn is_finished(&self) -> bool;
}

/// Emission facade handed to [`create`](crate::observable::create).
///
/// Every method takes `&mut self` so the closure can work through a
/// `&mut dyn Emitter` without knowing the observer type. Calls after a
/// terminal notification are ignored.
pub trait Emitter<Item, Err> {
  fn next(&mut self, value: Item);
  fn error(&mut self, err: Err);
  fn complete(&mut self);
  fn is_finished(&self) -> bool;
}

/// Object-safe mirror of [`Observer`].
pub trait DynObserver<Item, Err> {
  fn box_next(&mut self, value: Item);
  fn box_error(self: Box<Self>, err: Err);
  fn box_complete(self: Box<Self>);
  fn box_is_finished(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  #[inline]
  fn box_next(&mut self, value: Item) { self.next(value) }
  #[inline]
  fn box_error(self: Box<Self>, err: Err) { (*self).error(err) }
  #[inline]
  fn box_complete(self: Box<Self>) { (*self).complete() }
  #[inline]
  fn box_is_finished(&self) -> bool { self.is_finished() }
}

pub type BoxObserver<'a, Item, Err> = Box<dyn DynObserver<Item, Err> + 'a>;

impl<'a, Item, Err> Observer<Item, Err> for BoxObserver<'a, Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).box_next(value) }
  #[inline]
  fn error(self, err: Err) { self.box_error(err) }
  #[inline]
  fn complete(self) { self.box_complete() }
  #[inline]
  fn is_finished(&self) -> bool { (**self).box_is_finished() }
}

/// A terminal notification, kept until it can be delivered.
pub(crate) enum Terminal<Err> {
  Error(Err),
  Complete,
}

impl<Err> Terminal<Err> {
  pub(crate) fn deliver<Item, O: Observer<Item, Err>>(self, observer: O) {
    match self {
      Terminal::Error(err) => observer.error(err),
      Terminal::Complete => observer.complete(),
    }
  }
}

/// Home of an observer shared between its source and a subscription handle.
///
/// The observer is lent out while it handles a value, so no borrow of the
/// shared cell is held while user code runs. Values that arrive meanwhile,
/// from that code or from another thread, are queued and drained by the
/// lender. A release or a terminal notification that arrives meanwhile is
/// recorded and settled when the observer is given back.
pub(crate) enum ObserverSlot<O, Item, Err> {
  Idle(O),
  Busy { queued: VecDeque<Item>, terminal: Option<Terminal<Err>> },
  Closed,
}

/// What the lender of an observer does next.
pub(crate) enum Settle<O, Item, Err> {
  /// The observer is back in its slot.
  Kept,
  /// A queued value is still to be delivered.
  Next(O, Item),
  /// The slot is closed. The observer receives the terminal notification if
  /// there is one and is dropped otherwise.
  Finish(O, Option<Terminal<Err>>),
}

impl<O, Item, Err> ObserverSlot<O, Item, Err> {
  #[inline]
  pub(crate) fn new(observer: O) -> Self { ObserverSlot::Idle(observer) }

  /// Hands out the observer together with `value`, or queues the value if
  /// the observer is lent out already.
  pub(crate) fn lend(&mut self, value: Item) -> Option<(O, Item)> {
    match self {
      ObserverSlot::Idle(_) => {
        let busy = ObserverSlot::Busy { queued: VecDeque::new(), terminal: None };
        match std::mem::replace(self, busy) {
          ObserverSlot::Idle(observer) => Some((observer, value)),
          _ => None,
        }
      }
      ObserverSlot::Busy { queued, terminal: None } => {
        queued.push_back(value);
        None
      }
      _ => None,
    }
  }

  /// Gives a lent observer back.
  pub(crate) fn restore(&mut self, observer: O) -> Settle<O, Item, Err> {
    match self {
      ObserverSlot::Busy { queued, terminal } => match queued.pop_front() {
        Some(value) => Settle::Next(observer, value),
        None => {
          let terminal = terminal.take();
          if terminal.is_none() {
            *self = ObserverSlot::Idle(observer);
            Settle::Kept
          } else {
            *self = ObserverSlot::Closed;
            Settle::Finish(observer, terminal)
          }
        }
      },
      _ => Settle::Finish(observer, None),
    }
  }

  /// Records a terminal notification. Returns the observer to deliver it to
  /// when the observer is at hand.
  pub(crate) fn terminate(&mut self, notification: Terminal<Err>) -> Option<(O, Terminal<Err>)> {
    match self {
      ObserverSlot::Idle(_) => match std::mem::replace(self, ObserverSlot::Closed) {
        ObserverSlot::Idle(observer) => Some((observer, notification)),
        _ => None,
      },
      ObserverSlot::Busy { terminal, .. } if terminal.is_none() => {
        *terminal = Some(notification);
        None
      }
      _ => None,
    }
  }

  /// Detaches the observer without notifying it. The previous content is
  /// returned so that it is dropped after the borrow is released.
  #[inline]
  pub(crate) fn close(&mut self) -> Self { std::mem::replace(self, ObserverSlot::Closed) }

  #[inline]
  pub(crate) fn is_closed(&self) -> bool { matches!(self, ObserverSlot::Closed) }

  /// Whether nothing more will be delivered. `finished` is asked when the
  /// observer is at hand.
  pub(crate) fn is_finished_by(&self, finished: impl FnOnce(&O) -> bool) -> bool {
    match self {
      ObserverSlot::Idle(observer) => finished(observer),
      ObserverSlot::Busy { terminal, .. } => terminal.is_some(),
      ObserverSlot::Closed => true,
    }
  }
}

/// An observer that can be detached from outside.
///
/// Clones share the same observer: unsubscribing any clone drops it, and a
/// terminal notification through any clone closes all of them. The observer
/// may unsubscribe or terminate its own subscriber from inside `next`.
pub struct Subscriber<O, Item, Err>(MutRc<ObserverSlot<O, Item, Err>>);

impl<O, Item, Err> Subscriber<O, Item, Err> {
  pub fn new(observer: O) -> Self { Subscriber(MutRc::own(ObserverSlot::new(observer))) }
}

impl<O, Item, Err> Clone for Subscriber<O, Item, Err> {
  #[inline]
  fn clone(&self) -> Self { Subscriber(self.0.clone()) }
}

impl<Item, Err, O> Observer<Item, Err> for Subscriber<O, Item, Err>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    let lent = self.0.rc_deref_mut().lend(value);
    let Some((mut observer, mut value)) = lent else { return };
    loop {
      observer.next(value);
      let settled = self.0.rc_deref_mut().restore(observer);
      match settled {
        Settle::Kept => return,
        Settle::Next(o, v) => (observer, value) = (o, v),
        Settle::Finish(o, terminal) => {
          if let Some(terminal) = terminal {
            terminal.deliver::<Item, _>(o);
          }
          return;
        }
      }
    }
  }

  fn error(self, err: Err) {
    let notify = self.0.rc_deref_mut().terminate(Terminal::Error(err));
    if let Some((observer, terminal)) = notify {
      terminal.deliver::<Item, _>(observer);
    }
  }

  fn complete(self) {
    let notify = self.0.rc_deref_mut().terminate(Terminal::Complete);
    if let Some((observer, terminal)) = notify {
      terminal.deliver::<Item, _>(observer);
    }
  }

  fn is_finished(&self) -> bool { self.0.rc_deref().is_finished_by(O::is_finished) }
}

impl<O, Item, Err> SubscriptionLike for Subscriber<O, Item, Err> {
  fn unsubscribe(&mut self) {
    let released = self.0.rc_deref_mut().close();
    drop(released);
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().is_closed() }
}

/// Observer made of a single `next` closure, for streams that cannot fail.
#[derive(Clone)]
pub struct ObserverItem<N>(pub(crate) N);

impl<Item, N> Observer<Item, Infallible> for ObserverItem<N>
where
  N: FnMut(Item),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.0)(value) }

  fn error(self, err: Infallible) { match err {} }

  #[inline]
  fn complete(self) {}

  #[inline]
  fn is_finished(&self) -> bool { false }
}

/// Observer made of a closure per notification.
#[derive(Clone)]
pub struct ObserverAll<N, E, C> {
  pub(crate) next: N,
  pub(crate) error: E,
  pub(crate) complete: C,
}

impl<Item, Err, N, E, C> Observer<Item, Err> for ObserverAll<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(self) { (self.complete)() }

  #[inline]
  fn is_finished(&self) -> bool { false }
}
