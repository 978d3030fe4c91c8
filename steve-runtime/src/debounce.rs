//! A latest-wins coalescing timer (§9 "Coalescing timers"), used for catalog refresh
//! (500ms) and counts emission (1Hz).
//!
//! Unlike [`crate::scheduler`]'s per-key delay queue, a [`Debouncer`] tracks exactly one
//! slot: whatever was last published before the tick fires is what the tick emits.
//! Intermediate values are overwritten, never queued, which is the point — a burst of ten
//! updates inside one window collapses to one flush.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::interval;

/// Coalesces rapid updates of `T` into periodic flushes of only the latest value.
pub struct Debouncer<T> {
    slot: Arc<Mutex<Option<T>>>,
    dirty: Arc<Notify>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + 'static,
{
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Debouncer {
            slot: Arc::new(Mutex::new(None)),
            dirty: Arc::new(Notify::new()),
        }
    }

    /// Overwrite the pending value. Does not itself trigger a flush; the periodic loop
    /// started by [`Debouncer::run`] decides when to drain it.
    pub fn publish(&self, value: T) {
        *self.slot.lock() = Some(value);
        self.dirty.notify_one();
    }

    /// Run the flush loop: every `period`, if a value has been published since the last
    /// flush, call `on_flush` with it. Returns when `on_flush` returns `false`.
    ///
    /// This does not spawn; the caller owns the task (and its cancellation) tied to its
    /// own request context, matching the watch-lifecycle pattern elsewhere in this crate.
    pub async fn run<F>(&self, period: Duration, mut on_flush: F)
    where
        F: FnMut(T) -> bool,
    {
        let mut ticker = interval(period);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let pending = self.slot.lock().take();
            if let Some(value) = pending {
                if !on_flush(value) {
                    return;
                }
            }
        }
    }
}

impl<T> Default for Debouncer<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, pause};

    #[tokio::test]
    async fn rapid_publishes_collapse_into_one_flush() {
        pause();
        let debouncer = Arc::new(Debouncer::new());
        let flushes = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(0));

        let runner = {
            let debouncer = Arc::clone(&debouncer);
            let flushes = Arc::clone(&flushes);
            let last = Arc::clone(&last);
            tokio::spawn(async move {
                debouncer
                    .run(Duration::from_millis(100), |value: i32| {
                        flushes.fetch_add(1, Ordering::SeqCst);
                        *last.lock() = value;
                        true
                    })
                    .await;
            })
        };

        for value in 1..=10 {
            debouncer.publish(value);
        }

        advance(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;

        assert_eq!(flushes.load(Ordering::SeqCst), 1);
        assert_eq!(*last.lock(), 10);

        runner.abort();
    }

    #[tokio::test]
    async fn no_publish_means_no_flush() {
        pause();
        let debouncer = Arc::new(Debouncer::<i32>::new());
        let flushes = Arc::new(AtomicUsize::new(0));

        let runner = {
            let debouncer = Arc::clone(&debouncer);
            let flushes = Arc::clone(&flushes);
            tokio::spawn(async move {
                debouncer
                    .run(Duration::from_millis(50), |_| {
                        flushes.fetch_add(1, Ordering::SeqCst);
                        true
                    })
                    .await;
            })
        };

        advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert_eq!(flushes.load(Ordering::SeqCst), 0);
        runner.abort();
    }
}
