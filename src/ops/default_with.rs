use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
};

#[inline]
pub(crate) fn is_default<Item: Default + PartialEq>(value: &Item) -> bool { *value == Item::default() }

/// Substitutes values considered "default" with freshly produced ones.
#[derive(Clone)]
pub struct DefaultWithOp<S, F, P> {
  source: S,
  factory: F,
  is_default: P,
}

impl<S, F, P> DefaultWithOp<S, F, P> {
  #[inline]
  pub(crate) fn new(source: S, factory: F, is_default: P) -> Self {
    DefaultWithOp { source, factory, is_default }
  }
}

impl<Item, Err, O, S, F, P> Observable<Item, Err, O> for DefaultWithOp<S, F, P>
where
  O: Observer<Item, Err>,
  S: Observable<Item, Err, DefaultWithObserver<O, F, P>>,
  F: FnMut() -> Item,
  P: FnMut(&Item) -> bool,
{
  type Unsub = S::Unsub;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let Self { source, factory, is_default } = self;
    source.actual_subscribe(DefaultWithObserver { observer, factory, is_default })
  }
}

impl<Item, Err, S, F, P> ObservableExt<Item, Err> for DefaultWithOp<S, F, P> where
  S: ObservableExt<Item, Err>
{
}

pub struct DefaultWithObserver<O, F, P> {
  observer: O,
  factory: F,
  is_default: P,
}

impl<Item, Err, O, F, P> Observer<Item, Err> for DefaultWithObserver<O, F, P>
where
  O: Observer<Item, Err>,
  F: FnMut() -> Item,
  P: FnMut(&Item) -> bool,
{
  fn next(&mut self, value: Item) {
    let value = if (self.is_default)(&value) { (self.factory)() } else { value };
    self.observer.next(value);
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_finished(&self) -> bool { self.observer.is_finished() }
}
