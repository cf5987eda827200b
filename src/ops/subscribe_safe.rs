//! Subscribing with a fallible `next` handler.
//!
//! A failure returned from `on_next` is handled exactly like an error raised
//! by the source: the source subscription is released, the failure goes to
//! `on_error` and the subscription is over. The handlers never run while the
//! shared state is borrowed, so `on_next` may release its own subscription.
use log::{trace, warn};

use crate::{
  observer::{Observer, ObserverSlot, Settle, Terminal},
  rc::{MutArc, MutRc, RcDeref, RcDerefMut},
  subscription::{BoxSubscription, SubscriptionLike},
};

pub struct SafeHandlers<N, E, C> {
  on_next: N,
  on_error: Option<E>,
  on_complete: Option<C>,
}

impl<N, E, C> SafeHandlers<N, E, C> {
  pub(crate) fn new(on_next: N, on_error: Option<E>, on_complete: Option<C>) -> Self {
    SafeHandlers { on_next, on_error, on_complete }
  }

  fn fail<Err>(self, err: Err)
  where
    E: FnOnce(Err),
  {
    match self.on_error {
      Some(on_error) => on_error(err),
      None => warn!("safe subscription finished by an error nobody handles"),
    }
  }

  fn settle<Err>(self, terminal: Terminal<Err>)
  where
    E: FnOnce(Err),
    C: FnOnce(),
  {
    match terminal {
      Terminal::Error(err) => self.fail(err),
      Terminal::Complete => {
        if let Some(on_complete) = self.on_complete {
          on_complete();
        }
      }
    }
  }
}

/// Handlers and source subscription, shared by the observer handed to the
/// source and the returned subscription.
pub struct SafeState<H, B, Item, Err> {
  handlers: ObserverSlot<H, Item, Err>,
  source: Option<B>,
}

impl<H, B, Item, Err> SafeState<H, B, Item, Err> {
  pub(crate) fn new(handlers: H) -> Self {
    SafeState { handlers: ObserverSlot::new(handlers), source: None }
  }
}

pub type LocalSafeState<'a, N, E, C, Item, Err> =
  MutRc<SafeState<SafeHandlers<N, E, C>, Box<dyn SubscriptionLike + 'a>, Item, Err>>;

pub type ThreadsSafeState<N, E, C, Item, Err> =
  MutArc<SafeState<SafeHandlers<N, E, C>, BoxSubscription, Item, Err>>;

pub struct SafeObserver<St>(pub(crate) St);

/// Returned by `subscribe_safe`. Unsubscribing releases the source and
/// drops the handlers, so nothing runs afterwards.
pub struct SafeSubscription<St>(St);

macro_rules! impl_safe_subscribe {
  ($rc: ident, $box_unsub: ty $(,$lf:lifetime)?) => {
    impl<$($lf,)? N, E, C, Item, Err> Observer<Item, Err>
      for SafeObserver<$rc<SafeState<SafeHandlers<N, E, C>, $box_unsub, Item, Err>>>
    where
      N: FnMut(Item) -> Result<(), Err>,
      E: FnOnce(Err),
      C: FnOnce(),
    {
      fn next(&mut self, value: Item) {
        let lent = self.0.rc_deref_mut().handlers.lend(value);
        let Some((mut handlers, mut value)) = lent else { return };
        loop {
          if let Err(err) = (handlers.on_next)(value) {
            trace!("safe subscription next handler failed");
            let (rest, mut source) = {
              let mut state = self.0.rc_deref_mut();
              (state.handlers.close(), state.source.take())
            };
            source.unsubscribe();
            // Released from inside `on_next`: the failure has nowhere to go.
            if !rest.is_closed() {
              handlers.fail(err);
            }
            return;
          }
          let settled = self.0.rc_deref_mut().handlers.restore(handlers);
          match settled {
            Settle::Kept => return,
            Settle::Next(h, v) => (handlers, value) = (h, v),
            Settle::Finish(h, terminal) => {
              if let Some(terminal) = terminal {
                h.settle(terminal);
              }
              return;
            }
          }
        }
      }

      fn error(self, err: Err) {
        let (notify, mut source) = {
          let mut state = self.0.rc_deref_mut();
          (state.handlers.terminate(Terminal::Error(err)), state.source.take())
        };
        source.unsubscribe();
        if let Some((handlers, terminal)) = notify {
          handlers.settle(terminal);
        }
      }

      fn complete(self) {
        let (notify, mut source) = {
          let mut state = self.0.rc_deref_mut();
          (state.handlers.terminate(Terminal::Complete), state.source.take())
        };
        source.unsubscribe();
        if let Some((handlers, terminal)) = notify {
          handlers.settle(terminal);
        }
      }

      #[inline]
      fn is_finished(&self) -> bool { self.0.rc_deref().handlers.is_finished_by(|_| false) }
    }

    impl<$($lf,)? H, Item, Err> SafeSubscription<$rc<SafeState<H, $box_unsub, Item, Err>>> {
      /// Keeps the source subscription, or releases it right away when the
      /// subscription ended while subscribing.
      pub(crate) fn attach(state: $rc<SafeState<H, $box_unsub, Item, Err>>, source: $box_unsub) -> Self {
        let mut released = {
          let mut st = state.rc_deref_mut();
          if st.handlers.is_finished_by(|_| false) {
            Some(source)
          } else {
            st.source = Some(source);
            None
          }
        };
        released.unsubscribe();
        SafeSubscription(state)
      }
    }

    impl<$($lf,)? H, Item, Err> SubscriptionLike
      for SafeSubscription<$rc<SafeState<H, $box_unsub, Item, Err>>>
    {
      fn unsubscribe(&mut self) {
        let (handlers, mut source) = {
          let mut state = self.0.rc_deref_mut();
          (state.handlers.close(), state.source.take())
        };
        source.unsubscribe();
        drop(handlers);
      }

      #[inline]
      fn is_closed(&self) -> bool { self.0.rc_deref().handlers.is_closed() }
    }
  };
}

impl_safe_subscribe!(MutRc, Box<dyn SubscriptionLike + 'a>, 'a);
impl_safe_subscribe!(MutArc, BoxSubscription);
