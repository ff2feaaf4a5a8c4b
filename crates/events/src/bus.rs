//! Publish/subscribe seam used after a unit of work commits.
//!
//! The store is the source of truth; the bus only fans facts out to whoever
//! is listening (alerting, replenishment, dashboards). A consumer that misses
//! a message can always re-read the store, so delivery is best effort.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Receiving end handed out by [`EventBus::subscribe`].
///
/// Sees every message published after it was created, in publish order.
#[derive(Debug)]
pub struct Subscription<M> {
    inbox: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(inbox: Receiver<M>) -> Self {
        Self { inbox }
    }

    /// Next queued message, if any.
    pub fn try_next(&self) -> Option<M> {
        self.inbox.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message. `None` on timeout or once
    /// the bus is gone.
    pub fn next_within(&self, timeout: Duration) -> Option<M> {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<M> {
        self.inbox.try_iter().collect()
    }
}

pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        B::publish(self, message)
    }

    fn subscribe(&self) -> Subscription<M> {
        B::subscribe(self)
    }
}
