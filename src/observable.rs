//! The producing side of a stream, and the operator entry point.
use std::convert::Infallible;

use crate::{
  observer::{Observer, ObserverAll, ObserverItem},
  rc::{MutArc, MutRc},
  ops::{
    default_with::{is_default, DefaultWithOp},
    flatten_latest::{FlattenLatestOp, FlattenLatestOpThreads, Select, TrySelect},
    map::MapOp,
    map_to_unit::{to_unit, MapToUnitOp},
    subscribe_safe::{
      LocalSafeState, SafeHandlers, SafeObserver, SafeState, SafeSubscription, ThreadsSafeState,
    },
    with_index::{IndexBy, SequentialIndex, WithIndexOp},
    with_previous_value::WithPreviousValueOp,
  },
  subscription::SubscriptionLike,
};

mod create;
mod from_iter;
mod start;
mod trivial;

pub use create::*;
pub use from_iter::*;
pub use start::*;
pub use trivial::*;

/// A stream that can be subscribed by an observer of type `O`.
pub trait Observable<Item, Err, O>
where
  O: Observer<Item, Err>,
{
  /// Handle returned to cancel the subscription.
  type Unsub: SubscriptionLike;

  fn actual_subscribe(self, observer: O) -> Self::Unsub;
}

/// Operators and subscribe helpers, available on every stream type.
pub trait ObservableExt<Item, Err>: Sized {
  /// Creates a new stream which calls a closure on each element and uses
  /// its return as the value.
  #[inline]
  fn map<B, F>(self, f: F) -> MapOp<Self, F, Item>
  where
    F: FnMut(Item) -> B,
  {
    MapOp::new(self, f)
  }

  /// Projects every value to an inner stream and mirrors only the latest
  /// one. Each new outer value cancels the inner stream that was still
  /// running. Inner completions are swallowed; the result completes with the
  /// outer stream.
  #[inline]
  fn flatten_latest<'a, Inner, F>(self, selector: F) -> FlattenLatestOp<'a, Self, Select<F>, Item>
  where
    F: FnMut(Item) -> Inner,
    Item: 'a,
  {
    FlattenLatestOp::new(self, Select(selector))
  }

  /// [`ObservableExt::flatten_latest`] with a selector that may fail. A
  /// failure releases the outer and the current inner subscription and
  /// terminates the result with the error.
  #[inline]
  fn try_flatten_latest<'a, Inner, F>(self, selector: F) -> FlattenLatestOp<'a, Self, TrySelect<F>, Item>
  where
    F: FnMut(Item) -> Result<Inner, Err>,
    Item: 'a,
  {
    FlattenLatestOp::new(self, TrySelect(selector))
  }

  /// Thread-safe version of [`ObservableExt::flatten_latest`].
  #[inline]
  fn flatten_latest_threads<Inner, F>(self, selector: F) -> FlattenLatestOpThreads<Self, Select<F>, Item>
  where
    F: FnMut(Item) -> Inner,
  {
    FlattenLatestOpThreads::new(self, Select(selector))
  }

  /// Thread-safe version of [`ObservableExt::try_flatten_latest`].
  #[inline]
  fn try_flatten_latest_threads<Inner, F>(
    self,
    selector: F,
  ) -> FlattenLatestOpThreads<Self, TrySelect<F>, Item>
  where
    F: FnMut(Item) -> Result<Inner, Err>,
  {
    FlattenLatestOpThreads::new(self, TrySelect(selector))
  }

  /// Pairs each value with the one before it; the first value is paired with
  /// `Item::default()`.
  #[inline]
  fn with_previous_value(self) -> WithPreviousValueOp<Self>
  where
    Item: Clone + Default,
  {
    WithPreviousValueOp::new(self)
  }

  /// Pairs each value with its 1-based position in the subscription.
  #[inline]
  fn with_index(self) -> WithIndexOp<Self, SequentialIndex> { WithIndexOp::new(self, SequentialIndex::default()) }

  /// Pairs each value with the index `indexer` computes for it. The index
  /// can be of any type.
  #[inline]
  fn with_index_by<I, F>(self, indexer: F) -> WithIndexOp<Self, IndexBy<F>>
  where
    F: FnMut(&Item) -> I,
  {
    WithIndexOp::new(self, IndexBy(indexer))
  }

  /// Emits `()` for every value.
  #[inline]
  fn map_to_unit(self) -> MapToUnitOp<Self, Item> { MapOp::new(self, to_unit::<Item> as fn(Item)) }

  /// Replaces values equal to `Item::default()` with `factory()`.
  #[inline]
  fn default_with<F>(self, factory: F) -> DefaultWithOp<Self, F, fn(&Item) -> bool>
  where
    Item: Default + PartialEq,
    F: FnMut() -> Item,
  {
    DefaultWithOp::new(self, factory, is_default::<Item> as fn(&Item) -> bool)
  }

  /// Replaces values `is_default` accepts with `factory()`.
  #[inline]
  fn default_with_by<F, P>(self, factory: F, is_default: P) -> DefaultWithOp<Self, F, P>
  where
    F: FnMut() -> Item,
    P: FnMut(&Item) -> bool,
  {
    DefaultWithOp::new(self, factory, is_default)
  }

  /// Subscribes with a `next` handler. Only streams that cannot fail accept
  /// it.
  #[inline]
  fn subscribe<N>(self, next: N) -> <Self as Observable<Item, Infallible, ObserverItem<N>>>::Unsub
  where
    Self: Observable<Item, Infallible, ObserverItem<N>>,
    N: FnMut(Item),
  {
    self.actual_subscribe(ObserverItem(next))
  }

  /// Subscribes with a handler per notification.
  #[inline]
  fn subscribe_all<N, E, C>(
    self,
    next: N,
    error: E,
    complete: C,
  ) -> <Self as Observable<Item, Err, ObserverAll<N, E, C>>>::Unsub
  where
    Self: Observable<Item, Err, ObserverAll<N, E, C>>,
    N: FnMut(Item),
    E: FnOnce(Err),
    C: FnOnce(),
  {
    self.actual_subscribe(ObserverAll { next, error, complete })
  }

  /// Subscribes with a fallible `next` handler. A failure returned by
  /// `on_next` releases the source and is routed to `on_error`, the same way
  /// a source error is. `on_complete` runs only on graceful completion.
  fn subscribe_safe<'a, N, E, C>(
    self,
    on_next: N,
    on_error: Option<E>,
    on_complete: Option<C>,
  ) -> SafeSubscription<LocalSafeState<'a, N, E, C, Item, Err>>
  where
    Self: Observable<Item, Err, SafeObserver<LocalSafeState<'a, N, E, C, Item, Err>>>,
    <Self as Observable<Item, Err, SafeObserver<LocalSafeState<'a, N, E, C, Item, Err>>>>::Unsub: 'a,
    N: FnMut(Item) -> Result<(), Err>,
    E: FnOnce(Err),
    C: FnOnce(),
  {
    let state = MutRc::own(SafeState::new(SafeHandlers::new(on_next, on_error, on_complete)));
    let source = self.actual_subscribe(SafeObserver(state.clone()));
    SafeSubscription::<LocalSafeState<'a, N, E, C, Item, Err>>::attach(state, Box::new(source))
  }

  /// Thread-safe version of [`ObservableExt::subscribe_safe`], for sources
  /// that move the observer to other threads.
  fn subscribe_safe_threads<N, E, C>(
    self,
    on_next: N,
    on_error: Option<E>,
    on_complete: Option<C>,
  ) -> SafeSubscription<ThreadsSafeState<N, E, C, Item, Err>>
  where
    Self: Observable<Item, Err, SafeObserver<ThreadsSafeState<N, E, C, Item, Err>>>,
    <Self as Observable<Item, Err, SafeObserver<ThreadsSafeState<N, E, C, Item, Err>>>>::Unsub:
      Send + 'static,
    N: FnMut(Item) -> Result<(), Err>,
    E: FnOnce(Err),
    C: FnOnce(),
  {
    let state = MutArc::own(SafeState::new(SafeHandlers::new(on_next, on_error, on_complete)));
    let source = self.actual_subscribe(SafeObserver(state.clone()));
    SafeSubscription::<ThreadsSafeState<N, E, C, Item, Err>>::attach(state, Box::new(source))
  }

  /// [`ObservableExt::subscribe_safe`] without error or completion handler.
  /// Failures still end the subscription.
  #[inline]
  fn subscribe_safe_next<'a, N>(
    self,
    on_next: N,
  ) -> SafeSubscription<LocalSafeState<'a, N, fn(Err), fn(), Item, Err>>
  where
    Self: Observable<Item, Err, SafeObserver<LocalSafeState<'a, N, fn(Err), fn(), Item, Err>>>,
    <Self as Observable<Item, Err, SafeObserver<LocalSafeState<'a, N, fn(Err), fn(), Item, Err>>>>::Unsub:
      'a,
    N: FnMut(Item) -> Result<(), Err>,
  {
    self.subscribe_safe(on_next, None, None)
  }
}
