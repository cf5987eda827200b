use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  type_hint::TypeHint,
};

#[derive(Clone)]
pub struct MapOp<S, M, Item> {
  source: S,
  func: M,
  _hint: TypeHint<Item>,
}

impl<S, M, Item> MapOp<S, M, Item> {
  #[inline]
  pub(crate) fn new(source: S, func: M) -> Self { MapOp { source, func, _hint: TypeHint::new() } }
}

impl<Item, B, Err, O, S, M> Observable<B, Err, O> for MapOp<S, M, Item>
where
  O: Observer<B, Err>,
  S: Observable<Item, Err, MapObserver<O, M>>,
  M: FnMut(Item) -> B,
{
  type Unsub = S::Unsub;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    self
      .source
      .actual_subscribe(MapObserver { observer, map: self.func })
  }
}

impl<Item, B, Err, S, M> ObservableExt<B, Err> for MapOp<S, M, Item>
where
  S: ObservableExt<Item, Err>,
  M: FnMut(Item) -> B,
{
}

#[derive(Clone)]
pub struct MapObserver<O, M> {
  observer: O,
  map: M,
}

impl<Item, Err, O, B, M> Observer<Item, Err> for MapObserver<O, M>
where
  O: Observer<B, Err>,
  M: FnMut(Item) -> B,
{
  #[inline]
  fn next(&mut self, value: Item) { self.observer.next((self.map)(value)) }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_finished(&self) -> bool { self.observer.is_finished() }
}
