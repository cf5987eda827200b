use crate::{
  observable::{Observable, ObservableExt},
  observer::{Emitter, Observer},
  subscription::SubscriptionLike,
  type_hint::TypeHint,
};

/// Creates a stream from a function that drives an [`Emitter`].
///
/// `subscribe` runs on every subscription and returns the handle that
/// cancels it. Notifications after `error` or `complete` are ignored.
///
/// ```
/// use rxlife::prelude::*;
///
/// let mut sum = 0;
/// observable::create(|emitter: &mut dyn Emitter<i32, ()>| {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.complete();
/// })
/// .subscribe_all(|v| sum += v, |_| {}, || {});
/// assert_eq!(sum, 3);
/// ```
pub fn create<F, Item, Err, U>(subscribe: F) -> Create<F, Item, Err>
where
  F: FnOnce(&mut dyn Emitter<Item, Err>) -> U,
  U: SubscriptionLike,
{
  Create { subscribe, _hint: TypeHint::new() }
}

#[derive(Clone)]
pub struct Create<F, Item, Err> {
  subscribe: F,
  _hint: TypeHint<(Item, Err)>,
}

struct CreateEmitter<O>(Option<O>);

impl<O, Item, Err> Emitter<Item, Err> for CreateEmitter<O>
where
  O: Observer<Item, Err>,
{
  #[inline]
  fn next(&mut self, value: Item) {
    if let Some(observer) = &mut self.0 {
      observer.next(value);
    }
  }

  #[inline]
  fn error(&mut self, err: Err) {
    if let Some(observer) = self.0.take() {
      observer.error(err);
    }
  }

  #[inline]
  fn complete(&mut self) {
    if let Some(observer) = self.0.take() {
      observer.complete();
    }
  }

  #[inline]
  fn is_finished(&self) -> bool { self.0.as_ref().map_or(true, O::is_finished) }
}

impl<F, Item, Err, O, U> Observable<Item, Err, O> for Create<F, Item, Err>
where
  O: Observer<Item, Err>,
  F: FnOnce(&mut dyn Emitter<Item, Err>) -> U,
  U: SubscriptionLike,
{
  type Unsub = U;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let mut emitter = CreateEmitter(Some(observer));
    (self.subscribe)(&mut emitter)
  }
}

impl<F, Item, Err> ObservableExt<Item, Err> for Create<F, Item, Err> {}
