use std::{convert::Infallible, iter::Once};

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
};

/// Creates a stream that emits every value of an iterator, then completes.
///
/// Emission stops early once the observer reports it is finished.
pub fn from_iter<Iter>(iter: Iter) -> ObservableIter<Iter>
where
  Iter: IntoIterator,
{
  ObservableIter(iter)
}

/// Creates a stream that emits a single value, then completes.
pub fn of<Item>(v: Item) -> ObservableIter<Once<Item>> { from_iter(std::iter::once(v)) }

#[derive(Clone)]
pub struct ObservableIter<Iter>(Iter);

impl<O, Iter> Observable<Iter::Item, Infallible, O> for ObservableIter<Iter>
where
  Iter: IntoIterator,
  O: Observer<Iter::Item, Infallible>,
{
  type Unsub = ();

  fn actual_subscribe(self, mut observer: O) -> Self::Unsub {
    for v in self.0 {
      if observer.is_finished() {
        return;
      }
      observer.next(v);
    }
    observer.complete();
  }
}

impl<Iter> ObservableExt<Iter::Item, Infallible> for ObservableIter<Iter> where Iter: IntoIterator {}
