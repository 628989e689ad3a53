use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use pagedesk_types::events::InboxEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Fans inbox events out to every presentation subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<InboxEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish to all subscribers. Having none is fine.
    pub fn publish(&self, event: InboxEvent) {
        trace!(?event, "Publishing inbox event");
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
