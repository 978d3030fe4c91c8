//! A non-blocking shared bus fanning out to reliable per-subscriber queues (§9 "Broadcast
//! fan-out"), adapted from `reflector::dispatcher::Dispatcher`'s use of `async_broadcast`
//! for the schema change notifier (§4.E) and the cluster cache's add/change/remove fan-out
//! (§4.J.1).
//!
//! `async_broadcast`'s overflow mode makes the shared bus itself non-blocking: a publish
//! that would block because some receiver is behind instead drops that receiver's oldest
//! buffered value. Each subscriber then gets its own forwarding task that pulls off the
//! shared bus and pushes, with backpressure, into a private bounded queue — so a slow
//! subscriber loses shared-bus history but never loses anything once it has been queued
//! for it specifically.
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;

const SUBSCRIBER_QUEUE_DEPTH: usize = 16;

/// A broadcaster for `T: Clone + Send + 'static` values.
pub struct Broadcaster<T> {
    tx: async_broadcast::Sender<T>,
    // Keeps the shared channel open even with zero live subscribers.
    _inactive_rx: async_broadcast::InactiveReceiver<T>,
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + 'static,
{
    /// `bus_capacity` bounds the shared bus before it starts dropping the oldest buffered
    /// value for lagging subscribers; it does not bound per-subscriber queues.
    pub fn new(bus_capacity: usize) -> Self {
        let (mut tx, rx) = async_broadcast::broadcast(bus_capacity.max(1));
        tx.set_overflow(true);
        tx.set_await_active(false);
        Broadcaster {
            tx,
            _inactive_rx: rx.deactivate(),
        }
    }

    /// Publish a value. Never blocks on a slow subscriber: if the shared bus is full, the
    /// oldest unread value is dropped to make room.
    pub fn publish(&self, value: T) {
        if let Err(err) = self.tx.try_broadcast(value) {
            trace!(%err, "broadcaster dropped a value to a lagging subscriber");
        }
    }

    /// Subscribe to this broadcaster. Returns a stream that reliably delivers everything
    /// handed to it once subscribed, even if the caller is slow to poll — backpressure is
    /// applied to the forwarding task, not to [`Broadcaster::publish`].
    pub fn subscribe(&self) -> ReceiverStream<T> {
        let mut bus_rx = self.tx.new_receiver();
        let (queue_tx, queue_rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(value) = bus_rx.next().await {
                if queue_tx.send(value).await.is_err() {
                    break;
                }
            }
        });
        ReceiverStream::new(queue_rx)
    }
}
