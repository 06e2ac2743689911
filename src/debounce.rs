//! Trailing-edge debouncer for search input.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Coalesces rapid calls into the last value after a quiet period.
///
/// Each `call` restarts the timer. When `delay` passes without another
/// call, the most recent value is sent on the output channel. Dropping the
/// debouncer cancels any pending emission.
pub struct Debouncer<T> {
  delay: Duration,
  tx: mpsc::UnboundedSender<T>,
  pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
  pub fn new(delay: Duration, tx: mpsc::UnboundedSender<T>) -> Self {
    Self {
      delay,
      tx,
      pending: None,
    }
  }

  /// Schedule `value`, replacing whatever was pending.
  pub fn call(&mut self, value: T) {
    self.cancel();
    let tx = self.tx.clone();
    let delay = self.delay;
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      trace!("debounce fired");
      let _ = tx.send(value);
    }));
  }

  /// Drop the pending value, if any.
  pub fn cancel(&mut self) {
    if let Some(handle) = self.pending.take() {
      handle.abort();
    }
  }

  pub fn is_pending(&self) -> bool {
    self
      .pending
      .as_ref()
      .is_some_and(|handle| !handle.is_finished())
  }
}

impl<T> Drop for Debouncer<T> {
  fn drop(&mut self) {
    if let Some(handle) = self.pending.take() {
      handle.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_coalesces_to_last_value() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = Debouncer::new(Duration::from_millis(30), tx);

    debouncer.call("l");
    debouncer.call("lo");
    debouncer.call("love");
    assert!(debouncer.is_pending());

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(rx.try_recv().unwrap(), "love");
    assert!(rx.try_recv().is_err());
    assert!(!debouncer.is_pending());
  }

  #[tokio::test]
  async fn test_nothing_before_quiet_period() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = Debouncer::new(Duration::from_millis(100), tx);

    debouncer.call(1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_cancel_drops_pending() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = Debouncer::new(Duration::from_millis(20), tx);

    debouncer.call(1);
    debouncer.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_drop_cancels() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
      let mut debouncer = Debouncer::new(Duration::from_millis(20), tx);
      debouncer.call(1);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
  }
}
