use std::convert::Infallible;

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  type_hint::TypeHint,
};

/// Creates a stream that produces no values and completes immediately.
pub fn empty<Item>() -> EmptyObservable<Item> { EmptyObservable(TypeHint::new()) }

#[derive(Clone)]
pub struct EmptyObservable<Item>(TypeHint<Item>);

impl<Item, O> Observable<Item, Infallible, O> for EmptyObservable<Item>
where
  O: Observer<Item, Infallible>,
{
  type Unsub = ();

  fn actual_subscribe(self, observer: O) -> Self::Unsub { observer.complete() }
}

impl<Item> ObservableExt<Item, Infallible> for EmptyObservable<Item> {}

/// Creates a stream that emits no values and terminates with `err`.
pub fn throw_err<Item, Err>(err: Err) -> ThrowObservable<Item, Err> {
  ThrowObservable { err, _hint: TypeHint::new() }
}

#[derive(Clone)]
pub struct ThrowObservable<Item, Err> {
  err: Err,
  _hint: TypeHint<Item>,
}

impl<Item, Err, O> Observable<Item, Err, O> for ThrowObservable<Item, Err>
where
  O: Observer<Item, Err>,
{
  type Unsub = ();

  fn actual_subscribe(self, observer: O) -> Self::Unsub { observer.error(self.err) }
}

impl<Item, Err> ObservableExt<Item, Err> for ThrowObservable<Item, Err> {}

#[cfg(test)]
mod test {
  use crate::prelude::*;

  #[test]
  fn empty_completes() {
    let mut hits = 0;
    let mut completed = false;
    observable::empty::<i32>().subscribe_all(|_| hits += 1, |_| {}, || completed = true);
    assert_eq!(hits, 0);
    assert!(completed);
  }

  #[test]
  fn throw_errors() {
    let mut error = None;
    observable::throw_err::<i32, _>("boom").subscribe_all(|_| {}, |e| error = Some(e), || {});
    assert_eq!(error, Some("boom"));
  }
}
