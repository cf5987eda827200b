//! A local multicast source: values pushed into the subject are broadcast to
//! every current subscriber.
use crate::{
  observable::{Observable, ObservableExt},
  observer::{BoxObserver, Observer, Subscriber},
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::SubscriptionLike,
};

type SubjectObserver<'a, Item, Err> = Subscriber<BoxObserver<'a, Item, Err>, Item, Err>;

enum Status<Err> {
  Open,
  Completed,
  Errored(Err),
}

struct SubjectState<'a, Item, Err> {
  observers: Vec<SubjectObserver<'a, Item, Err>>,
  status: Status<Err>,
}

/// Clones share the same subscriber list. Subscribing after the subject
/// terminated replays the terminal notification.
pub struct Subject<'a, Item, Err>(MutRc<SubjectState<'a, Item, Err>>);

impl<'a, Item, Err> Subject<'a, Item, Err> {
  pub fn new() -> Self { Self::default() }

  /// Number of live subscribers.
  pub fn subscribed_size(&self) -> usize {
    self
      .0
      .rc_deref()
      .observers
      .iter()
      .filter(|o| !o.is_closed())
      .count()
  }

  /// Removes every subscriber and stops the subject.
  fn drain(&self, status: Status<Err>) -> Vec<SubjectObserver<'a, Item, Err>> {
    let mut state = self.0.rc_deref_mut();
    if !matches!(state.status, Status::Open) {
      return vec![];
    }
    state.status = status;
    std::mem::take(&mut state.observers)
  }
}

impl<'a, Item, Err> Default for Subject<'a, Item, Err> {
  fn default() -> Self {
    Subject(MutRc::own(SubjectState { observers: vec![], status: Status::Open }))
  }
}

impl<'a, Item, Err> Clone for Subject<'a, Item, Err> {
  #[inline]
  fn clone(&self) -> Self { Subject(self.0.clone()) }
}

impl<'a, Item, Err> Observer<Item, Err> for Subject<'a, Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn next(&mut self, value: Item) {
    let observers = self.0.rc_deref().observers.clone();
    for mut o in observers {
      if !o.is_closed() {
        o.next(value.clone());
      }
    }
  }

  fn error(self, err: Err) {
    for o in self.drain(Status::Errored(err.clone())) {
      o.error(err.clone());
    }
  }

  fn complete(self) {
    for o in self.drain(Status::Completed) {
      o.complete();
    }
  }

  fn is_finished(&self) -> bool { !matches!(self.0.rc_deref().status, Status::Open) }
}

impl<'a, Item, Err, O> Observable<Item, Err, O> for Subject<'a, Item, Err>
where
  O: Observer<Item, Err> + 'a,
  Err: Clone,
{
  type Unsub = SubjectObserver<'a, Item, Err>;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let subscriber: SubjectObserver<'a, Item, Err> = Subscriber::new(Box::new(observer));
    let mut state = self.0.rc_deref_mut();
    let terminal = match &state.status {
      Status::Open => None,
      Status::Completed => Some(None),
      Status::Errored(err) => Some(Some(err.clone())),
    };
    match terminal {
      None => {
        state.observers.retain(|o| !o.is_closed());
        state.observers.push(subscriber.clone());
      }
      Some(err) => {
        drop(state);
        match err {
          Some(err) => subscriber.clone().error(err),
          None => subscriber.clone().complete(),
        }
      }
    }
    subscriber
  }
}

impl<'a, Item, Err> ObservableExt<Item, Err> for Subject<'a, Item, Err> {}
