//! Shared mutable cells used by subscriptions and operators.
//!
//! `MutRc` is the single-thread flavour (`Rc<RefCell<_>>`), `MutArc` the
//! thread-safe one (`Arc<Mutex<_>>`). Operators that exist in a local and a
//! `_threads` version are written once against `RcDeref`/`RcDerefMut` and
//! instantiated with either cell.
use std::{
  cell::{Ref, RefCell, RefMut},
  rc::Rc,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub trait RcDeref {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a>;
}

pub trait RcDerefMut {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a>;
}

#[derive(Default)]
pub struct MutRc<T>(Rc<RefCell<T>>);

#[derive(Default)]
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutRc<T> {
  pub fn own(t: T) -> Self { Self(Rc::new(RefCell::new(t))) }

  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }

  /// Locks the cell. A poisoned lock is recovered: the state it guards is
  /// only ever mutated through short, non-panicking critical sections.
  #[inline]
  fn lock(&self) -> MutexGuard<'_, T> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<T> RcDeref for MutRc<T> {
  type Target<'a>
    = Ref<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a> { self.0.borrow() }
}

impl<T> RcDeref for MutArc<T> {
  type Target<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a> { self.lock() }
}

impl<T> RcDerefMut for MutRc<T> {
  type Target<'a>
    = RefMut<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a> { self.0.borrow_mut() }
}

impl<T> RcDerefMut for MutArc<T> {
  type Target<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a> { self.lock() }
}

impl<T> Clone for MutRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> From<T> for MutRc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T> From<T> for MutArc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}
