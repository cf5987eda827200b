//! Flattens a stream of streams, mirroring only the most recent inner stream.
//!
//! - Every outer value is projected to an inner stream, which is subscribed
//!   at once. The inner stream it replaces is unsubscribed.
//! - Values from a replaced inner stream are dropped even if they arrive after
//!   the replacement: every inner observer carries the generation it was
//!   created for and only the current generation is forwarded.
//! - Inner completions are swallowed. The result completes when the outer
//!   stream completes, which also cancels the running inner stream.
//! - Errors from the outer stream, from the current inner stream or from a
//!   fallible selector terminate the result immediately. The outer and inner
//!   subscriptions are released before the error is delivered.
//! - The downstream observer is never called while the shared state is
//!   borrowed, so it may unsubscribe the result from inside `next`.
use log::{debug, trace};

use crate::{
  observable::{Observable, ObservableExt},
  observer::{Observer, ObserverSlot, Settle, Terminal},
  rc::{MutArc, MutRc, RcDeref, RcDerefMut},
  subscription::{BoxSubscription, SubscriptionLike},
  type_hint::TypeHint,
};

/// Projects an outer value to the inner stream to mirror. A failed projection
/// terminates the result with its error.
pub trait InnerSelector<OuterItem, Err> {
  type Inner;

  fn select(&mut self, value: OuterItem) -> Result<Self::Inner, Err>;
}

/// Selector that cannot fail, used by `flatten_latest`.
#[derive(Clone)]
pub struct Select<F>(pub(crate) F);

/// Selector returning `Result`, used by `try_flatten_latest`.
#[derive(Clone)]
pub struct TrySelect<F>(pub(crate) F);

impl<OuterItem, Err, Inner, F> InnerSelector<OuterItem, Err> for Select<F>
where
  F: FnMut(OuterItem) -> Inner,
{
  type Inner = Inner;

  #[inline]
  fn select(&mut self, value: OuterItem) -> Result<Inner, Err> { Ok((self.0)(value)) }
}

impl<OuterItem, Err, Inner, F> InnerSelector<OuterItem, Err> for TrySelect<F>
where
  F: FnMut(OuterItem) -> Result<Inner, Err>,
{
  type Inner = Inner;

  #[inline]
  fn select(&mut self, value: OuterItem) -> Result<Inner, Err> { (self.0)(value) }
}

pub struct FlattenLatestOp<'a, S, F, OuterItem> {
  source: S,
  selector: F,
  _hint: TypeHint<&'a OuterItem>,
}

pub struct FlattenLatestOpThreads<S, F, OuterItem> {
  source: S,
  selector: F,
  _hint: TypeHint<OuterItem>,
}

macro_rules! impl_new_method {
  ($name: ident $(,$lf:lifetime)?) => {
    impl<$($lf,)? S, F, OuterItem> $name<$($lf,)? S, F, OuterItem> {
      #[inline]
      pub(crate) fn new(source: S, selector: F) -> Self {
        Self { source, selector, _hint: TypeHint::new() }
      }
    }

    impl<$($lf,)? S, F, OuterItem> Clone for $name<$($lf,)? S, F, OuterItem>
    where
      S: Clone,
      F: Clone,
    {
      fn clone(&self) -> Self { Self::new(self.source.clone(), self.selector.clone()) }
    }
  };
}

impl_new_method!(FlattenLatestOp, 'a);
impl_new_method!(FlattenLatestOpThreads);

/// State shared by the outer observer, the inner observers and the returned
/// subscription. It owns the outer subscription too, so whichever side ends
/// the result can release everything.
pub struct FlattenState<O, B, Item, Err> {
  observer: ObserverSlot<O, Item, Err>,
  outer: Option<B>,
  inner: Option<B>,
  generation: usize,
}

impl<O, B, Item, Err> FlattenState<O, B, Item, Err> {
  fn new(observer: O) -> Self {
    FlattenState { observer: ObserverSlot::new(observer), outer: None, inner: None, generation: 0 }
  }

  /// Ends the result. Returns the observer to notify, when it is at hand, and
  /// the subscriptions to release once the borrow is gone.
  fn finish(&mut self, terminal: Terminal<Err>) -> (Option<(O, Terminal<Err>)>, [Option<B>; 2]) {
    let notify = self.observer.terminate(terminal);
    (notify, [self.outer.take(), self.inner.take()])
  }

  #[inline]
  fn is_over(&self) -> bool { self.observer.is_finished_by(|_| false) }
}

fn release<B: SubscriptionLike>(subscriptions: [Option<B>; 2]) {
  for mut subscription in subscriptions.into_iter().flatten() {
    subscription.unsubscribe();
  }
}

type LocalState<'a, O, Item, Err> = MutRc<FlattenState<O, Box<dyn SubscriptionLike + 'a>, Item, Err>>;
type ThreadsState<O, Item, Err> = MutArc<FlattenState<O, BoxSubscription, Item, Err>>;

pub struct FlattenOuterObserver<St, F> {
  state: St,
  selector: F,
}

pub struct FlattenInnerObserver<St> {
  state: St,
  generation: usize,
}

/// Releases the outer subscription and the current inner subscription.
pub struct FlattenLatestSubscription<St> {
  state: St,
}

macro_rules! impl_observable_method {
  ($rc: ident, $box_unsub: ty) => {
    type Unsub = FlattenLatestSubscription<$rc<FlattenState<O, $box_unsub, Item, Err>>>;

    fn actual_subscribe(self, observer: O) -> Self::Unsub {
      let state = $rc::own(FlattenState::new(observer));
      let outer = self
        .source
        .actual_subscribe(FlattenOuterObserver { state: state.clone(), selector: self.selector });

      let outer: $box_unsub = Box::new(outer);
      let released = {
        let mut st = state.rc_deref_mut();
        if st.is_over() {
          Some(outer)
        } else {
          st.outer = Some(outer);
          None
        }
      };
      if let Some(mut outer) = released {
        trace!("flatten latest ended while subscribing, releasing the outer subscription");
        outer.unsubscribe();
      }
      FlattenLatestSubscription { state }
    }
  };
}

impl<'a, OuterItem, Item, Err, O, S, F> Observable<Item, Err, O>
  for FlattenLatestOp<'a, S, F, OuterItem>
where
  O: Observer<Item, Err> + 'a,
  S: Observable<OuterItem, Err, FlattenOuterObserver<LocalState<'a, O, Item, Err>, F>>,
  S::Unsub: 'a,
  F: InnerSelector<OuterItem, Err>,
  F::Inner: Observable<Item, Err, FlattenInnerObserver<LocalState<'a, O, Item, Err>>>,
  <F::Inner as Observable<Item, Err, FlattenInnerObserver<LocalState<'a, O, Item, Err>>>>::Unsub: 'a,
{
  impl_observable_method!(MutRc, Box<dyn SubscriptionLike + 'a>);
}

impl<OuterItem, Item, Err, O, S, F> Observable<Item, Err, O>
  for FlattenLatestOpThreads<S, F, OuterItem>
where
  O: Observer<Item, Err> + Send + 'static,
  S: Observable<OuterItem, Err, FlattenOuterObserver<ThreadsState<O, Item, Err>, F>>,
  S::Unsub: Send + 'static,
  F: InnerSelector<OuterItem, Err>,
  F::Inner: Observable<Item, Err, FlattenInnerObserver<ThreadsState<O, Item, Err>>>,
  <F::Inner as Observable<Item, Err, FlattenInnerObserver<ThreadsState<O, Item, Err>>>>::Unsub:
    Send + 'static,
{
  impl_observable_method!(MutArc, BoxSubscription);
}

impl<'a, OuterItem, Item, Err, S, F> ObservableExt<Item, Err>
  for FlattenLatestOp<'a, S, F, OuterItem>
where
  S: ObservableExt<OuterItem, Err>,
  F: InnerSelector<OuterItem, Err>,
  F::Inner: ObservableExt<Item, Err>,
{
}

impl<OuterItem, Item, Err, S, F> ObservableExt<Item, Err>
  for FlattenLatestOpThreads<S, F, OuterItem>
where
  S: ObservableExt<OuterItem, Err>,
  F: InnerSelector<OuterItem, Err>,
  F::Inner: ObservableExt<Item, Err>,
{
}

macro_rules! impl_flatten_latest {
  ($rc: ident, $box_unsub: ty, $($lf:lifetime)? $($send:ident)?) => {
    impl<$($lf,)? OuterItem, Item, Err, O, F> Observer<OuterItem, Err>
      for FlattenOuterObserver<$rc<FlattenState<O, $box_unsub, Item, Err>>, F>
    where
      O: Observer<Item, Err> $(+ $lf)? $(+ $send + 'static)?,
      F: InnerSelector<OuterItem, Err>,
      F::Inner: Observable<Item, Err, FlattenInnerObserver<$rc<FlattenState<O, $box_unsub, Item, Err>>>>,
      <F::Inner as Observable<
        Item,
        Err,
        FlattenInnerObserver<$rc<FlattenState<O, $box_unsub, Item, Err>>>,
      >>::Unsub: $($lf)? $($send + 'static)?,
    {
      fn next(&mut self, value: OuterItem) {
        let generation = {
          let mut state = self.state.rc_deref_mut();
          if state.is_over() {
            return;
          }
          state.generation += 1;
          state.generation
        };

        let inner = match self.selector.select(value) {
          Ok(inner) => inner,
          Err(err) => {
            debug!("flatten latest selector failed");
            let (notify, subscriptions) = self.state.rc_deref_mut().finish(Terminal::Error(err));
            release(subscriptions);
            if let Some((observer, terminal)) = notify {
              terminal.deliver::<Item, _>(observer);
            }
            return;
          }
        };

        debug!("flatten latest switching to inner generation {generation}");
        let unsub = inner.actual_subscribe(FlattenInnerObserver {
          state: self.state.clone(),
          generation,
        });

        let unsub: $box_unsub = Box::new(unsub);
        let released = {
          let mut state = self.state.rc_deref_mut();
          if state.generation == generation && !state.is_over() {
            state.inner.replace(unsub)
          } else {
            Some(unsub)
          }
        };
        if let Some(mut released) = released {
          trace!("flatten latest releasing a superseded inner subscription");
          released.unsubscribe();
        }
      }

      fn error(self, err: Err) {
        let (notify, subscriptions) = self.state.rc_deref_mut().finish(Terminal::Error(err));
        release(subscriptions);
        if let Some((observer, terminal)) = notify {
          terminal.deliver::<Item, _>(observer);
        }
      }

      fn complete(self) {
        let (notify, subscriptions) = self.state.rc_deref_mut().finish(Terminal::Complete);
        release(subscriptions);
        if let Some((observer, terminal)) = notify {
          debug!("flatten latest outer stream completed");
          terminal.deliver::<Item, _>(observer);
        }
      }

      fn is_finished(&self) -> bool { self.state.rc_deref().observer.is_finished_by(O::is_finished) }
    }

    impl<$($lf,)? Item, Err, O> Observer<Item, Err>
      for FlattenInnerObserver<$rc<FlattenState<O, $box_unsub, Item, Err>>>
    where
      O: Observer<Item, Err>,
    {
      fn next(&mut self, value: Item) {
        let lent = {
          let mut state = self.state.rc_deref_mut();
          if state.generation != self.generation {
            return;
          }
          state.observer.lend(value)
        };
        let Some((mut observer, mut value)) = lent else { return };
        loop {
          observer.next(value);
          let settled = self.state.rc_deref_mut().observer.restore(observer);
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
        let (notify, subscriptions) = {
          let mut state = self.state.rc_deref_mut();
          if state.generation != self.generation {
            return;
          }
          state.finish(Terminal::Error(err))
        };
        release(subscriptions);
        if let Some((observer, terminal)) = notify {
          debug!("flatten latest inner stream failed");
          terminal.deliver::<Item, _>(observer);
        }
      }

      fn complete(self) {
        let finished = {
          let mut state = self.state.rc_deref_mut();
          if state.generation == self.generation {
            state.inner.take()
          } else {
            None
          }
        };
        if let Some(mut finished) = finished {
          finished.unsubscribe();
        }
      }

      fn is_finished(&self) -> bool {
        let state = self.state.rc_deref();
        state.generation != self.generation || state.observer.is_finished_by(O::is_finished)
      }
    }

    impl<$($lf,)? O, Item, Err> SubscriptionLike
      for FlattenLatestSubscription<$rc<FlattenState<O, $box_unsub, Item, Err>>>
    {
      fn unsubscribe(&mut self) {
        let (observer, subscriptions) = {
          let mut state = self.state.rc_deref_mut();
          (state.observer.close(), [state.outer.take(), state.inner.take()])
        };
        release(subscriptions);
        drop(observer);
      }

      #[inline]
      fn is_closed(&self) -> bool { self.state.rc_deref().observer.is_closed() }
    }
  };
}

impl_flatten_latest!(MutRc, Box<dyn SubscriptionLike + 'a>, 'a);
impl_flatten_latest!(MutArc, BoxSubscription, Send);

#[cfg(test)]
mod test {
  use std::{
    cell::RefCell,
    convert::Infallible,
    rc::Rc,
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc, Mutex,
    },
  };

  use crate::prelude::*;

  #[test]
  fn only_latest_inner_emits() {
    let result = Rc::new(RefCell::new(vec![]));
    let c_result = result.clone();

    let mut outer = Subject::<i32, Infallible>::new();
    let mut inner1 = Subject::<&'static str, Infallible>::new();
    let mut inner2 = Subject::<&'static str, Infallible>::new();
    let c_inner1 = inner1.clone();
    let c_inner2 = inner2.clone();

    let _subscription = outer
      .clone()
      .flatten_latest(move |x| if x == 1 { c_inner1.clone() } else { c_inner2.clone() })
      .subscribe(move |v| c_result.borrow_mut().push(v));

    outer.next(1);
    inner1.next("a");

    outer.next(2);
    inner1.next("b");
    inner2.next("c");

    assert_eq!(*result.borrow(), vec!["a", "c"]);
    assert_eq!(inner1.subscribed_size(), 0);
  }

  #[test]
  fn inner_completion_is_swallowed() {
    let completed = Rc::new(RefCell::new(0));
    let c_completed = completed.clone();
    let values = Rc::new(RefCell::new(vec![]));
    let c_values = values.clone();

    let outer = Subject::<i32, Infallible>::new();
    let _subscription = outer
      .clone()
      .flatten_latest(|v| observable::from_iter([v, v * 10]))
      .subscribe_all(
        move |v| c_values.borrow_mut().push(v),
        |_| {},
        move || *c_completed.borrow_mut() += 1,
      );

    let mut c_outer = outer.clone();
    c_outer.next(1);
    c_outer.next(2);
    assert_eq!(*values.borrow(), vec![1, 10, 2, 20]);
    assert_eq!(*completed.borrow(), 0);

    outer.complete();
    assert_eq!(*completed.borrow(), 1);
  }

  #[test]
  fn outer_completion_cancels_inner() {
    let mut outer = Subject::<i32, Infallible>::new();
    let mut inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();
    let hits = Rc::new(RefCell::new(0));
    let c_hits = hits.clone();

    let _subscription = outer
      .clone()
      .flatten_latest(move |_| c_inner.clone())
      .subscribe(move |_| *c_hits.borrow_mut() += 1);

    outer.next(0);
    assert_eq!(inner.subscribed_size(), 1);
    outer.clone().complete();
    assert_eq!(inner.subscribed_size(), 0);

    inner.next(1);
    assert_eq!(*hits.borrow(), 0);
  }

  #[test]
  fn inner_error_terminates() {
    let error = Rc::new(RefCell::new(None));
    let c_error = error.clone();
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();

    let mut outer = Subject::<(), &'static str>::new();
    let subscription = outer
      .clone()
      .flatten_latest(|_| observable::throw_err::<i32, _>("boom"))
      .subscribe_all(
        |_| {},
        move |e| *c_error.borrow_mut() = Some(e),
        move || *c_completed.borrow_mut() = true,
      );

    outer.next(());
    assert_eq!(*error.borrow(), Some("boom"));
    assert!(subscription.is_closed());

    outer.complete();
    assert!(!*completed.borrow());
  }

  #[test]
  fn outer_error_terminates() {
    let error = Rc::new(RefCell::new(None));
    let c_error = error.clone();

    let outer = Subject::<i32, &'static str>::new();
    let inner = Subject::<i32, &'static str>::new();
    let c_inner = inner.clone();
    let _subscription = outer
      .clone()
      .flatten_latest(move |_| c_inner.clone())
      .subscribe_all(|_| {}, move |e| *c_error.borrow_mut() = Some(e), || {});

    outer.clone().next(1);
    outer.error("outer");
    assert_eq!(*error.borrow(), Some("outer"));
    assert_eq!(inner.subscribed_size(), 0);
  }

  #[test]
  fn unsubscribe_releases_outer_and_inner() {
    let mut outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();

    let mut subscription = outer
      .clone()
      .flatten_latest(move |_| c_inner.clone())
      .subscribe(|_| {});
    outer.next(1);

    subscription.unsubscribe();
    assert!(subscription.is_closed());
    assert_eq!(outer.subscribed_size(), 0);
    assert_eq!(inner.subscribed_size(), 0);
  }

  #[test]
  fn inner_error_releases_outer() {
    let mut outer = Subject::<i32, &'static str>::new();
    let error = Rc::new(RefCell::new(None));
    let c_error = error.clone();

    let subscription = outer
      .clone()
      .flatten_latest(|_| observable::throw_err::<i32, _>("boom"))
      .subscribe_all(|_| {}, move |e| *c_error.borrow_mut() = Some(e), || {});
    assert_eq!(outer.subscribed_size(), 1);

    outer.next(1);
    assert_eq!(*error.borrow(), Some("boom"));
    assert!(subscription.is_closed());
    assert_eq!(outer.subscribed_size(), 0);
  }

  #[test]
  fn unsubscribe_from_inside_downstream_next() {
    let mut outer = Subject::<i32, Infallible>::new();
    let mut inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();
    let handle: Rc<RefCell<Option<LocalBoxSubscription>>> = Rc::new(RefCell::new(None));
    let c_handle = handle.clone();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();

    let subscription = outer
      .clone()
      .flatten_latest(move |_| c_inner.clone())
      .subscribe(move |v| {
        c_seen.borrow_mut().push(v);
        if let Some(mut own) = c_handle.borrow_mut().take() {
          own.unsubscribe();
        }
      });
    *handle.borrow_mut() = Some(Box::new(subscription));

    outer.next(0);
    inner.next(1);
    inner.next(2);

    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(outer.subscribed_size(), 0);
    assert_eq!(inner.subscribed_size(), 0);
  }

  #[test]
  fn value_raised_by_downstream_is_delivered_after_current() {
    let mut outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let feedback = inner.clone();

    let _subscription = outer
      .clone()
      .flatten_latest(move |_| c_inner.clone())
      .subscribe(move |v| {
        c_seen.borrow_mut().push(v);
        if v == 1 {
          feedback.clone().next(2);
          c_seen.borrow_mut().push(-1);
        }
      });

    outer.next(0);
    inner.clone().next(1);
    assert_eq!(*seen.borrow(), vec![1, -1, 2]);
  }

  #[test]
  fn selector_failure_terminates() {
    let error = Rc::new(RefCell::new(None));
    let c_error = error.clone();
    let mut outer = Subject::<i32, &'static str>::new();
    let inner = Subject::<i32, &'static str>::new();
    let c_inner = inner.clone();

    let subscription = outer
      .clone()
      .try_flatten_latest(move |v| if v == 2 { Err("no inner for 2") } else { Ok(c_inner.clone()) })
      .subscribe_all(|_| {}, move |e| *c_error.borrow_mut() = Some(e), || {});

    outer.next(1);
    assert_eq!(inner.subscribed_size(), 1);
    assert!(error.borrow().is_none());

    outer.next(2);
    assert_eq!(*error.borrow(), Some("no inner for 2"));
    assert!(subscription.is_closed());
    assert_eq!(inner.subscribed_size(), 0);
    assert_eq!(outer.subscribed_size(), 0);
  }

  #[test]
  fn threads_selector_failure_terminates() {
    let error = Arc::new(Mutex::new(None));
    let c_error = error.clone();
    let subscription = observable::create(|e: &mut dyn Emitter<i32, String>| {
      e.next(1);
      e.next(2);
    })
    .try_flatten_latest_threads(|v| {
      if v == 2 {
        return Err(format!("bad {v}"));
      }
      Ok(observable::create(move |e: &mut dyn Emitter<i32, String>| e.next(v)))
    })
    .subscribe_all(|_| {}, move |e| *c_error.lock().unwrap() = Some(e), || {});

    assert_eq!(error.lock().unwrap().as_deref(), Some("bad 2"));
    assert!(subscription.is_closed());
  }

  #[test]
  fn threads_only_latest_scheduled_work_runs() {
    let outer_ran = Arc::new(AtomicUsize::new(0));
    let inner_ran = Arc::new(AtomicUsize::new(0));
    let scheduler = TestScheduler::new();

    let c_outer_ran = outer_ran.clone();
    let c_inner_ran = inner_ran.clone();
    let c_scheduler = scheduler.clone();
    let _subscription = observable::create(|e: &mut dyn Emitter<i32, Infallible>| {
      e.next(0);
      e.next(1);
    })
    .flatten_latest_threads(move |_| {
      c_outer_ran.fetch_add(1, Ordering::Relaxed);
      let c_inner_ran = c_inner_ran.clone();
      observable::start(move || c_inner_ran.fetch_add(1, Ordering::Relaxed), c_scheduler.clone())
    })
    .subscribe(|_| {});

    scheduler.advance_by(std::time::Duration::from_millis(4));

    assert_eq!(outer_ran.load(Ordering::Relaxed), 2);
    assert_eq!(inner_ran.load(Ordering::Relaxed), 1);
  }

  /// Outer source fed from several threads at once.
  #[derive(Clone, Default)]
  struct Feed(Arc<Mutex<Option<Box<dyn FnMut(usize) + Send>>>>);

  impl Feed {
    fn push(&self, value: usize) {
      if let Some(next) = self.0.lock().unwrap().as_mut() {
        next(value);
      }
    }
  }

  impl<O> Observable<usize, Infallible, O> for Feed
  where
    O: Observer<usize, Infallible> + Send + 'static,
  {
    type Unsub = ();

    fn actual_subscribe(self, mut observer: O) -> Self::Unsub {
      *self.0.lock().unwrap() = Some(Box::new(move |v| observer.next(v)));
    }
  }

  impl ObservableExt<usize, Infallible> for Feed {}

  #[test]
  fn threads_concurrent_switches_keep_one_inner() {
    let feed = Feed::default();
    let alive = Arc::new(AtomicUsize::new(0));
    let delivered = Arc::new(Mutex::new(vec![]));
    let c_alive = alive.clone();
    let c_delivered = delivered.clone();

    let _subscription = feed
      .clone()
      .flatten_latest_threads(move |v: usize| {
        let c_alive = c_alive.clone();
        observable::create(move |e: &mut dyn Emitter<usize, Infallible>| {
          c_alive.fetch_add(1, Ordering::SeqCst);
          e.next(v);
          ClosureSubscription::new(move || {
            c_alive.fetch_sub(1, Ordering::SeqCst);
          })
        })
      })
      .subscribe(move |v| c_delivered.lock().unwrap().push(v));

    let workers: Vec<_> = (0..4)
      .map(|worker| {
        let feed = feed.clone();
        std::thread::spawn(move || {
          for i in 0..50 {
            feed.push(worker * 100 + i);
          }
        })
      })
      .collect();
    for worker in workers {
      worker.join().unwrap();
    }

    assert_eq!(alive.load(Ordering::SeqCst), 1);
    assert_eq!(delivered.lock().unwrap().len(), 200);
  }
}
