use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
};

/// A value together with its index. The index is a 1-based position unless
/// an indexer computes something else.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Indexed<T, I = usize> {
  pub value: T,
  pub index: I,
}

/// Computes the index attached to each value.
pub trait Indexer<Item> {
  type Index;

  fn index_of(&mut self, value: &Item) -> Self::Index;
}

/// Counts values from 1.
#[derive(Clone, Debug, Default)]
pub struct SequentialIndex(usize);

impl<Item> Indexer<Item> for SequentialIndex {
  type Index = usize;

  #[inline]
  fn index_of(&mut self, _: &Item) -> usize {
    self.0 += 1;
    self.0
  }
}

/// Indexes values with a caller-supplied function.
#[derive(Clone)]
pub struct IndexBy<F>(pub(crate) F);

impl<Item, I, F> Indexer<Item> for IndexBy<F>
where
  F: FnMut(&Item) -> I,
{
  type Index = I;

  #[inline]
  fn index_of(&mut self, value: &Item) -> I { (self.0)(value) }
}

#[derive(Clone)]
pub struct WithIndexOp<S, I> {
  source: S,
  indexer: I,
}

impl<S, I> WithIndexOp<S, I> {
  #[inline]
  pub(crate) fn new(source: S, indexer: I) -> Self { WithIndexOp { source, indexer } }
}

impl<Item, Err, O, S, I> Observable<Indexed<Item, I::Index>, Err, O> for WithIndexOp<S, I>
where
  O: Observer<Indexed<Item, I::Index>, Err>,
  S: Observable<Item, Err, WithIndexObserver<O, I>>,
  I: Indexer<Item>,
{
  type Unsub = S::Unsub;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    self
      .source
      .actual_subscribe(WithIndexObserver { observer, indexer: self.indexer })
  }
}

impl<Item, Err, S, I> ObservableExt<Indexed<Item, I::Index>, Err> for WithIndexOp<S, I>
where
  S: ObservableExt<Item, Err>,
  I: Indexer<Item>,
{
}

pub struct WithIndexObserver<O, I> {
  observer: O,
  indexer: I,
}

impl<Item, Err, O, I> Observer<Item, Err> for WithIndexObserver<O, I>
where
  O: Observer<Indexed<Item, I::Index>, Err>,
  I: Indexer<Item>,
{
  fn next(&mut self, value: Item) {
    let index = self.indexer.index_of(&value);
    self.observer.next(Indexed { value, index });
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_finished(&self) -> bool { self.observer.is_finished() }
}

#[cfg(test)]
mod test {
  use crate::prelude::*;

  #[test]
  fn one_based() {
    let mut indexed = vec![];
    observable::from_iter([1, 2])
      .with_index()
      .subscribe(|v| indexed.push(v));
    assert_eq!(indexed, vec![Indexed { value: 1, index: 1 }, Indexed { value: 2, index: 2 }]);
  }

  #[test]
  fn counter_is_per_subscription() {
    let source = observable::from_iter(["x", "y"]).with_index();
    let mut first = vec![];
    let mut second = vec![];
    source.clone().subscribe(|v| first.push(v.index));
    source.subscribe(|v| second.push(v.index));
    assert_eq!(first, vec![1, 2]);
    assert_eq!(second, vec![1, 2]);
  }

  #[test]
  fn custom_indexer() {
    let mut indexed = vec![];
    observable::from_iter(["ab", "abcd"])
      .with_index_by(|v: &&str| v.len())
      .subscribe(|v| indexed.push((v.value, v.index)));
    assert_eq!(indexed, vec![("ab", 2), ("abcd", 4)]);
  }

  #[test]
  fn index_of_another_type() {
    let mut indexed = vec![];
    observable::from_iter([3, 7])
      .with_index_by(|v: &i32| format!("key-{v}"))
      .subscribe(|v| indexed.push(v));
    assert_eq!(
      indexed,
      vec![
        Indexed { value: 3, index: "key-3".to_string() },
        Indexed { value: 7, index: "key-7".to_string() },
      ]
    );
  }
}
