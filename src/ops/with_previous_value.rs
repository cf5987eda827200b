use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
};

/// A value together with the value emitted just before it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PreviousValue<T> {
  pub previous: T,
  pub current: T,
}

#[derive(Clone)]
pub struct WithPreviousValueOp<S> {
  source: S,
}

impl<S> WithPreviousValueOp<S> {
  #[inline]
  pub(crate) fn new(source: S) -> Self { WithPreviousValueOp { source } }
}

impl<Item, Err, O, S> Observable<PreviousValue<Item>, Err, O> for WithPreviousValueOp<S>
where
  O: Observer<PreviousValue<Item>, Err>,
  S: Observable<Item, Err, WithPreviousValueObserver<O, Item>>,
  Item: Clone + Default,
{
  type Unsub = S::Unsub;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    self
      .source
      .actual_subscribe(WithPreviousValueObserver { observer, previous: Item::default() })
  }
}

impl<Item, Err, S> ObservableExt<PreviousValue<Item>, Err> for WithPreviousValueOp<S> where
  S: ObservableExt<Item, Err>
{
}

pub struct WithPreviousValueObserver<O, Item> {
  observer: O,
  previous: Item,
}

impl<O, Item, Err> Observer<Item, Err> for WithPreviousValueObserver<O, Item>
where
  O: Observer<PreviousValue<Item>, Err>,
  Item: Clone,
{
  fn next(&mut self, value: Item) {
    let previous = std::mem::replace(&mut self.previous, value.clone());
    self.observer.next(PreviousValue { previous, current: value });
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
  fn pairs_with_previous() {
    let mut pairs = vec![];
    observable::from_iter([1, 2])
      .with_previous_value()
      .subscribe(|v| pairs.push(v));

    assert_eq!(
      pairs,
      vec![
        PreviousValue { previous: 0, current: 1 },
        PreviousValue { previous: 1, current: 2 },
      ]
    );
  }

  #[test]
  fn first_value_pairs_with_default() {
    let mut last = None;
    observable::of(String::from("a"))
      .with_previous_value()
      .subscribe(|v| last = Some(v));
    assert_eq!(last, Some(PreviousValue { previous: String::new(), current: "a".into() }));
  }

  #[test]
  fn each_subscription_starts_over() {
    let source = observable::from_iter([5, 6]);
    let mut first = vec![];
    let mut second = vec![];
    source.clone().with_previous_value().subscribe(|v| first.push(v.previous));
    source.with_previous_value().subscribe(|v| second.push(v.previous));
    assert_eq!(first, vec![0, 5]);
    assert_eq!(second, first);
  }
}
