use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pagedesk_api::{ApiError, Backend};
use pagedesk_types::events::{InboxEvent, PollState};
use pagedesk_types::models::{IntegrationStatus, Session};

use crate::dispatcher::Dispatcher;
use crate::expiry::SessionExpiry;
use crate::store::{ApplyOutcome, SelectionChange, SharedStore};

/// Poll period when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const STATE_IDLE: u8 = 0;
const STATE_POLLING: u8 = 1;
const STATE_STOPPED: u8 = 2;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Poll state shared between the poller, its task and its handle.
#[derive(Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(STATE_IDLE)))
    }

    fn get(&self) -> PollState {
        match self.0.load(Ordering::SeqCst) {
            STATE_IDLE => PollState::Idle,
            STATE_POLLING => PollState::Polling,
            _ => PollState::Stopped,
        }
    }

    /// Atomically move `from -> to`. Fails if the current state is not `from`.
    fn transition(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Drives periodic refresh of the conversation store.
///
/// `Idle -> Polling -> Stopped`. Polling begins only for a connected
/// integration, and `Stopped` is terminal.
pub struct Poller<B: Backend> {
    backend: Arc<B>,
    session: Session,
    store: SharedStore,
    dispatcher: Dispatcher,
    expiry: SessionExpiry,
    config: PollerConfig,
    state: StateCell,
}

impl<B: Backend> Poller<B> {
    pub fn new(
        backend: Arc<B>,
        session: Session,
        store: SharedStore,
        dispatcher: Dispatcher,
        expiry: SessionExpiry,
        config: PollerConfig,
    ) -> Self {
        Self {
            backend,
            session,
            store,
            dispatcher,
            expiry,
            config,
            state: StateCell::new(),
        }
    }

    pub fn state(&self) -> PollState {
        self.state.get()
    }

    /// Begin polling if the integration is connected: one fetch right away,
    /// then one per interval. Returns `None` and stays idle otherwise, or if
    /// this poller was already started.
    pub fn start(&self, status: &IntegrationStatus) -> Option<PollHandle> {
        if !status.connected {
            debug!("Integration not connected, poller stays idle");
            return None;
        }

        if !self.state.transition(STATE_IDLE, STATE_POLLING) {
            warn!(state = ?self.state.get(), "Poller already started");
            return None;
        }

        info!(interval_ms = self.config.interval.as_millis() as u64, "Polling conversations");
        self.dispatcher.publish(InboxEvent::PollStateChanged {
            state: PollState::Polling,
        });

        let cancel = CancellationToken::new();
        let task = PollTask {
            backend: self.backend.clone(),
            session: self.session.clone(),
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            expiry: self.expiry.clone(),
            state: self.state.clone(),
            cancel: cancel.clone(),
            interval: self.config.interval,
        };

        Some(PollHandle {
            state: self.state.clone(),
            cancel,
            task: tokio::spawn(task.run()),
            dispatcher: self.dispatcher.clone(),
        })
    }
}

/// Cancellable handle to a running poll loop. Dropping it stops polling.
pub struct PollHandle {
    state: StateCell,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    dispatcher: Dispatcher,
}

impl PollHandle {
    /// Stop polling. Synchronous and idempotent: once this returns no new
    /// tick starts and an in-flight fetch is dropped. On a multi-thread
    /// runtime a snapshot whose apply already holds the store lock still
    /// lands; callers needing a quiescent store should take the lock after
    /// `stop`.
    pub fn stop(&self) {
        self.cancel.cancel();
        if self.state.transition(STATE_POLLING, STATE_STOPPED) {
            self.task.abort();
            info!("Polling stopped");
            self.dispatcher.publish(InboxEvent::PollStateChanged {
                state: PollState::Stopped,
            });
        }
    }

    pub fn state(&self) -> PollState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask<B: Backend> {
    backend: Arc<B>,
    session: Session,
    store: SharedStore,
    dispatcher: Dispatcher,
    expiry: SessionExpiry,
    state: StateCell,
    cancel: CancellationToken,
    interval: Duration,
}

impl<B: Backend> PollTask<B> {
    async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        // Ticks run back to back in this task, so a slow fetch delays the
        // next one instead of overlapping it.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_error: Option<String> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.tick(&mut last_error).await.is_break() {
                break;
            }
        }

        debug!("Poll loop exited");
    }

    async fn tick(&self, last_error: &mut Option<String>) -> ControlFlow<()> {
        let tick = self.store.lock().await.begin_tick();

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return ControlFlow::Break(()),
            result = self.backend.fetch_conversations(&self.session) => result,
        };

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(ApiError::Unauthorized) => {
                self.session_rejected();
                return ControlFlow::Break(());
            }
            Err(e) => {
                self.report_error(e, last_error);
                return ControlFlow::Continue(());
            }
        };
        *last_error = None;

        let mut events = Vec::new();
        {
            let mut store = self.store.lock().await;
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }

            match store.apply_snapshot(tick, snapshot) {
                ApplyOutcome::Discarded => {}
                ApplyOutcome::Applied {
                    list_changed,
                    selection,
                } => {
                    if list_changed {
                        events.push(InboxEvent::ConversationsUpdated {
                            count: store.conversations().len(),
                        });
                    }
                    if selection != SelectionChange::Unchanged {
                        if let Some(conversation) = store.selected().cloned() {
                            events.push(InboxEvent::SelectionUpdated { conversation });
                        }
                    }
                }
            }
        }

        for event in events {
            self.dispatcher.publish(event);
        }
        ControlFlow::Continue(())
    }

    fn session_rejected(&self) {
        self.cancel.cancel();
        if self.state.transition(STATE_POLLING, STATE_STOPPED) {
            self.dispatcher.publish(InboxEvent::PollStateChanged {
                state: PollState::Stopped,
            });
            self.expiry.expire();
        }
    }

    /// Report a failed tick unless it repeats the previous failure verbatim.
    fn report_error(&self, e: ApiError, last_error: &mut Option<String>) {
        let message = e.to_string();
        if last_error.as_deref() == Some(message.as_str()) {
            debug!("Poll failed again: {}", message);
            return;
        }

        warn!("Error fetching chats: {}", message);
        self.dispatcher.publish(InboxEvent::TransientError {
            message: message.clone(),
        });
        *last_error = Some(message);
    }
}
