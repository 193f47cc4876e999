//! crates/bookrec_core/src/search.rs
//!
//! Debounces bursts of input so only the last value of a burst is acted on.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Quiet period a search query must survive before it is executed.
pub const SEARCH_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Emits a submitted value once `quiet` has passed without a newer submission.
///
/// Each `submit` supersedes the pending one. Dropping the debouncer cancels any
/// pending value.
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            quiet,
            pending: None,
            tx,
        };
        (debouncer, rx)
    }

    pub fn submit(&mut self, value: T) {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }

        let token = CancellationToken::new();
        self.pending = Some(token.clone());

        let tx = self.tx.clone();
        let deadline = tokio::time::sleep(self.quiet);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = deadline => {
                    let _ = tx.send(value);
                }
            }
        });
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn only_the_last_value_of_a_burst_is_emitted() {
        let (mut debouncer, mut rx) = Debouncer::new(SEARCH_QUIET_PERIOD);

        debouncer.submit("ha");
        tokio::time::advance(Duration::from_millis(100)).await;
        debouncer.submit("har");
        tokio::time::advance(Duration::from_millis(299)).await;
        debouncer.submit("harry");

        assert_eq!(rx.recv().await, Some("harry"));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn values_separated_by_the_quiet_period_are_all_emitted() {
        let (mut debouncer, mut rx) = Debouncer::new(SEARCH_QUIET_PERIOD);

        debouncer.submit(1);
        assert_eq!(rx.recv().await, Some(1));
        debouncer.submit(2);
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_cancels_pending_value() {
        let (mut debouncer, mut rx) = Debouncer::new(SEARCH_QUIET_PERIOD);
        debouncer.submit("pending");
        drop(debouncer);

        assert_eq!(rx.recv().await, None);
    }
}
