use tokio::sync::broadcast;

/// Per-manager event channel.
///
/// Each manager owns one emitter; consumers call `subscribe` and filter by
/// the event's channel name. Emitting with no subscribers is not an error.
#[derive(Debug)]
pub struct EventEmitter<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventEmitter<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// A sender that can be moved onto a platform callback thread.
    pub fn sender(&self) -> broadcast::Sender<E> {
        self.sender.clone()
    }
}
