use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// A publisher panicked while holding the subscriber list.
    Poisoned,
}

/// Channel-backed broadcast bus for tests and single-process deployments.
///
/// Each subscriber owns an unbounded channel. Subscribers whose receiving end
/// was dropped are forgotten on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    outboxes: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            outboxes: Mutex::new(Vec::new()),
        }
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.outboxes.lock().map_or(0, |outboxes| outboxes.len())
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut outboxes = self.outboxes.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        outboxes.retain(|outbox| outbox.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (outbox, inbox) = mpsc::channel();
        match self.outboxes.lock() {
            Ok(mut outboxes) => outboxes.push(outbox),
            // The subscription still works; it just never hears anything.
            Err(poisoned) => poisoned.into_inner().push(outbox),
        }
        Subscription::new(inbox)
    }
}
