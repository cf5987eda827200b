use std::convert::Infallible;

use log::warn;

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  scheduler::{Scheduler, TaskHandle},
};

/// Creates a stream that runs `func` on `scheduler`, emits its result and
/// completes. Unsubscribing before the scheduler gets to it cancels the
/// call.
pub fn start<F, Item, S>(func: F, scheduler: S) -> StartObservable<F, S>
where
  F: FnOnce() -> Item,
  S: Scheduler,
{
  StartObservable { func, scheduler }
}

#[derive(Clone)]
pub struct StartObservable<F, S> {
  func: F,
  scheduler: S,
}

impl<Item, O, F, S> Observable<Item, Infallible, O> for StartObservable<F, S>
where
  O: Observer<Item, Infallible> + Send + 'static,
  F: FnOnce() -> Item + Send + 'static,
  S: Scheduler,
{
  type Unsub = TaskHandle;

  fn actual_subscribe(self, mut observer: O) -> Self::Unsub {
    let func = self.func;
    let task = Box::new(move || {
      if !observer.is_finished() {
        observer.next(func());
        observer.complete();
      }
    });
    match self.scheduler.schedule(task, None) {
      Ok(handle) => handle,
      Err(err) => {
        warn!("start could not schedule its call: {err}");
        TaskHandle::finished()
      }
    }
  }
}

impl<Item, F, S> ObservableExt<Item, Infallible> for StartObservable<F, S> where F: FnOnce() -> Item {}
