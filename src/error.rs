//! Errors raised by the lifetime-composition side of the crate.
//!
//! Stream-level failures (a failing `next` callback, an inner or outer stream
//! error) never show up here: they travel through the stream's own error
//! channel, typed as the stream's `Err`.

/// Errors returned when attaching, assigning or releasing subscriptions.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum DisposeError {
  /// The disposer is not one of the recognized container kinds.
  #[error("unsupported disposer kind: {kind}")]
  UnsupportedDisposerKind {
    /// Type name of the rejected disposer.
    kind: &'static str,
  },
  /// A single-assignment subscription already holds a subscription.
  #[error("single assignment subscription already assigned")]
  AlreadyAssigned,
  /// The deferred-release target refused the work.
  #[error("deferred release could not be enqueued: {0}")]
  SchedulingFailure(#[from] ScheduleError),
}

/// Errors produced by schedulers and execution contexts.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ScheduleError {
  /// The target has been shut down and no longer accepts work.
  #[error("scheduler is shut down")]
  Shutdown,
  /// The underlying executor rejected the spawn.
  #[error("spawn failed: {0}")]
  Spawn(String),
}
