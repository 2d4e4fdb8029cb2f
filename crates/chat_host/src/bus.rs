use parking_lot::Mutex;
use shared::events::SessionEvent;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Fan-out of session events to any number of observers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live observer; dropped receivers are pruned.
    pub fn publish(&self, event: SessionEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
