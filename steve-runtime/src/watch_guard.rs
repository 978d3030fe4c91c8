//! Cancels a watch when the caller's access no longer matches what it started with (§4.I,
//! §9 "Watch lifecycle").
//!
//! A subscription owns its upstream watch, the task pumping it to a merged channel, and a
//! cancellation tied to the request context. `WatchGuard` adds the fourth piece: a poller
//! that tears the same cancellation down early if the caller's `AccessSet` identity moves
//! out from under it, rather than waiting for the current watch to complete naturally.
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Polls `current_id` every `poll_interval` and cancels `token` the moment it returns
/// something other than `baseline_id`.
///
/// Runs until either the id changes or `token` is cancelled for some other reason (e.g.
/// the request itself ending), whichever comes first.
pub struct WatchGuard {
    token: CancellationToken,
    baseline_id: String,
    poll_interval: Duration,
}

impl WatchGuard {
    /// Function: `pub fn new`.
    pub fn new(token: CancellationToken, baseline_id: impl Into<String>, poll_interval: Duration) -> Self {
        WatchGuard {
            token,
            baseline_id: baseline_id.into(),
            poll_interval,
        }
    }

    /// Run the guard loop. `current_id` is called on every tick; its return value is
    /// compared against the baseline captured at construction.
    pub async fn run<F>(self, mut current_id: F)
    where
        F: FnMut() -> String,
    {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(self.poll_interval) => {
                    if current_id() != self.baseline_id {
                        self.token.cancel();
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{advance, pause};

    #[tokio::test(start_paused = true)]
    async fn cancels_when_the_observed_id_changes() {
        let token = CancellationToken::new();
        let guard = WatchGuard::new(token.clone(), "rev-1", Duration::from_secs(2));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_closure = Arc::clone(&calls);

        let handle = tokio::spawn(guard.run(move || {
            let n = calls_in_closure.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                "rev-1".to_owned()
            } else {
                "rev-2".to_owned()
            }
        }));

        advance(Duration::from_secs(2)).await;
        advance(Duration::from_secs(2)).await;
        handle.await.unwrap();

        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_quietly_when_the_token_is_cancelled_externally() {
        let token = CancellationToken::new();
        let guard = WatchGuard::new(token.clone(), "rev-1", Duration::from_secs(2));
        let handle = tokio::spawn(guard.run(|| "rev-1".to_owned()));

        token.cancel();
        handle.await.unwrap();
    }
}
