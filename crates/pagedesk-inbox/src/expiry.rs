use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

use pagedesk_session::SessionStore;
use pagedesk_types::events::InboxEvent;

use crate::dispatcher::Dispatcher;

/// Ends the session when the backend rejects it. Shared by the poller and
/// the chat view so the expiry is signalled once no matter who notices.
#[derive(Clone)]
pub struct SessionExpiry {
    sessions: Arc<SessionStore>,
    dispatcher: Dispatcher,
    fired: Arc<AtomicBool>,
}

impl SessionExpiry {
    pub fn new(sessions: Arc<SessionStore>, dispatcher: Dispatcher) -> Self {
        Self {
            sessions,
            dispatcher,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clear the stored session and publish `SessionExpired`. Only the first
    /// call has an effect; returns whether this call was it.
    pub fn expire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        warn!("Session rejected by backend, signing out");
        if let Err(e) = self.sessions.clear() {
            error!("Failed to clear session: {}", e);
        }
        self.dispatcher.publish(InboxEvent::SessionExpired);
        true
    }

    pub fn has_expired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
