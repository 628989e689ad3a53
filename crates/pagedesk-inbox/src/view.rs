use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use pagedesk_api::{ApiError, Backend};
use pagedesk_session::SessionStore;
use pagedesk_types::events::{InboxEvent, PollState};
use pagedesk_types::models::{ChatId, Conversation, Direction, IntegrationStatus, Message, Session};

use crate::dispatcher::Dispatcher;
use crate::expiry::SessionExpiry;
use crate::format::{message_meta, time_since};
use crate::poller::{PollHandle, Poller, PollerConfig};
use crate::store::{ConversationStore, SharedStore};

pub const SEND_FAILED: &str = "Failed to send message. Please try again.";
pub const NO_MESSAGES: &str = "No messages yet";
pub const NO_SELECTION_PLACEHOLDER: &str = "Select a conversation to start chatting...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter { shift: bool },
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Edited,
    /// Enter without shift: the caller should `submit()`.
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank compose text or nothing selected; no request was made.
    Ignored,
    Sent(Message),
    Failed(ApiError),
}

/// Panel and compose state local to the view, never stored in the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub compose: String,
    pub error: Option<String>,
    pub sidebar_collapsed: bool,
    pub profile_visible: bool,
    pub loading: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            compose: String::new(),
            error: None,
            sidebar_collapsed: false,
            profile_visible: true,
            loading: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub id: ChatId,
    pub name: String,
    /// Age of the last message, empty when there are none.
    pub age: String,
    pub first_incoming: String,
    pub last_incoming: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLine {
    pub direction: Direction,
    pub content: String,
    /// Set on the last incoming and the last outgoing message.
    pub meta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub id: ChatId,
    pub name: String,
    /// The conversation was missing from the latest snapshot.
    pub stale: bool,
    pub lines: Vec<ThreadLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFrame {
    pub loading: bool,
    pub connected: bool,
    pub sidebar_collapsed: bool,
    pub rows: Vec<ConversationRow>,
    pub thread: Option<ThreadView>,
    /// Counterpart shown in the detail panel, when visible.
    pub profile: Option<String>,
    pub compose: String,
    pub placeholder: String,
    pub show_send: bool,
    pub error: Option<String>,
}

/// Build the frame for the current state. Pure: same inputs, same frame.
pub fn frame(
    store: &ConversationStore,
    ui: &UiState,
    connected: bool,
    now: DateTime<Utc>,
) -> ChatFrame {
    let selected_id = store.selected_id();

    let rows = store
        .conversations()
        .iter()
        .map(|c| conversation_row(c, selected_id == Some(&c.id), now))
        .collect();

    let thread = store.selected().map(|c| ThreadView {
        id: c.id.clone(),
        name: c.counterpart_name.clone(),
        stale: store.is_selection_stale(),
        lines: thread_lines(c),
    });

    let placeholder = match store.selected() {
        Some(c) => format!("Message {}", c.counterpart_name),
        None => NO_SELECTION_PLACEHOLDER.to_string(),
    };

    let profile = store
        .selected()
        .filter(|_| ui.profile_visible)
        .map(|c| c.counterpart_name.clone());

    ChatFrame {
        loading: ui.loading,
        connected,
        sidebar_collapsed: ui.sidebar_collapsed,
        rows,
        thread,
        profile,
        compose: ui.compose.clone(),
        placeholder,
        show_send: !ui.compose.trim().is_empty(),
        error: ui.error.clone(),
    }
}

fn conversation_row(c: &Conversation, selected: bool, now: DateTime<Utc>) -> ConversationRow {
    let age = c
        .last_message()
        .map(|m| time_since(m.timestamp, now))
        .unwrap_or_default();

    let mut incoming = c.incoming();
    let first = incoming.next();
    let last = incoming.last().or(first);

    ConversationRow {
        id: c.id.clone(),
        name: c.counterpart_name.clone(),
        age,
        first_incoming: first.map_or(NO_MESSAGES, |m| m.content.as_str()).to_string(),
        last_incoming: last.map_or(NO_MESSAGES, |m| m.content.as_str()).to_string(),
        selected,
    }
}

fn thread_lines(c: &Conversation) -> Vec<ThreadLine> {
    let last_of = |direction: Direction| c.messages.iter().rposition(|m| m.direction == direction);
    let last_incoming = last_of(Direction::Incoming);
    let last_outgoing = last_of(Direction::Outgoing);

    c.messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let is_last = Some(i) == last_incoming || Some(i) == last_outgoing;
            ThreadLine {
                direction: m.direction,
                content: m.content.clone(),
                meta: is_last.then(|| message_meta(&c.counterpart_name, m.timestamp)),
            }
        })
        .collect()
}

/// Chat page controller: owns the store, the poller and the local UI state,
/// and forwards user intents to them.
pub struct ChatView<B: Backend> {
    backend: Arc<B>,
    session: Session,
    store: SharedStore,
    dispatcher: Dispatcher,
    expiry: SessionExpiry,
    config: PollerConfig,
    poller: Poller<B>,
    poll: Option<PollHandle>,
    status: Option<IntegrationStatus>,
    ui: UiState,
}

impl<B: Backend> ChatView<B> {
    pub fn new(
        backend: Arc<B>,
        sessions: Arc<SessionStore>,
        session: Session,
        config: PollerConfig,
    ) -> Self {
        let store = ConversationStore::shared();
        let dispatcher = Dispatcher::new();
        let expiry = SessionExpiry::new(sessions, dispatcher.clone());
        let poller = Poller::new(
            backend.clone(),
            session.clone(),
            store.clone(),
            dispatcher.clone(),
            expiry.clone(),
            config.clone(),
        );

        Self {
            backend,
            session,
            store,
            dispatcher,
            expiry,
            config,
            poller,
            poll: None,
            status: None,
            ui: UiState::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.dispatcher.subscribe()
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn status(&self) -> Option<&IntegrationStatus> {
        self.status.as_ref()
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    pub fn session_expired(&self) -> bool {
        self.expiry.has_expired()
    }

    /// Load the integration status and start polling if connected. Mounting
    /// again keeps a running poll loop, and stops it if the page was
    /// disconnected in the meantime.
    pub async fn mount(&mut self) -> Result<(), ApiError> {
        let result = self.backend.fetch_integration_status(&self.session).await;
        self.ui.loading = false;

        match result {
            Ok(status) => {
                self.resume_polling(&status);
                self.status = Some(status);
                Ok(())
            }
            Err(e) => {
                error!("Error fetching Facebook connection status: {}", e);
                if e.is_unauthorized() {
                    self.expiry.expire();
                }
                self.ui.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn resume_polling(&mut self, status: &IntegrationStatus) {
        if !status.connected {
            self.unmount();
            return;
        }
        if self.poll.as_ref().is_some_and(|p| p.state() == PollState::Polling) {
            debug!("Already polling");
            return;
        }
        if self.expiry.has_expired() {
            return;
        }

        // Stopped is terminal for a poller, so a remount gets a fresh one.
        if self.poller.state() == PollState::Stopped {
            self.poller = Poller::new(
                self.backend.clone(),
                self.session.clone(),
                self.store.clone(),
                self.dispatcher.clone(),
                self.expiry.clone(),
                self.config.clone(),
            );
        }
        if let Some(handle) = self.poller.start(status) {
            self.poll = Some(handle);
        }
    }

    /// Stop polling. Safe to call more than once.
    pub fn unmount(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.stop();
        }
    }

    pub async fn select(&mut self, id: &ChatId) -> bool {
        let selected = self.store.lock().await.select(id);
        if selected {
            debug!(chat_id = %id, "Conversation selected");
            self.dispatcher.publish(InboxEvent::Selected { chat_id: id.clone() });
        }
        selected
    }

    pub fn toggle_sidebar(&mut self) {
        self.ui.sidebar_collapsed = !self.ui.sidebar_collapsed;
    }

    pub fn toggle_profile(&mut self) {
        self.ui.profile_visible = !self.ui.profile_visible;
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.ui.compose = text.into();
    }

    pub fn handle_key(&mut self, key: Key) -> KeyAction {
        match key {
            Key::Enter { shift: false } => KeyAction::Submit,
            Key::Enter { shift: true } => {
                self.ui.compose.push('\n');
                KeyAction::Edited
            }
            Key::Char(c) => {
                self.ui.compose.push(c);
                KeyAction::Edited
            }
            Key::Backspace => {
                self.ui.compose.pop();
                KeyAction::Edited
            }
        }
    }

    /// Send the compose text to the selected conversation. On failure the
    /// text stays so the agent can retry.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.ui.compose.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }
        let Some(chat_id) = self.store.lock().await.selected_id().cloned() else {
            return SubmitOutcome::Ignored;
        };

        let result = self
            .backend
            .send_message(&self.session, &chat_id, &self.ui.compose)
            .await;

        match result {
            Ok(message) => {
                let selected = {
                    let mut store = self.store.lock().await;
                    store.append_outgoing(&chat_id, message.clone());
                    store.selected().cloned()
                };
                if let Some(conversation) = selected.filter(|c| c.id == chat_id) {
                    self.dispatcher
                        .publish(InboxEvent::SelectionUpdated { conversation });
                }

                info!(chat_id = %chat_id, message_id = %message.id, "Reply sent");
                self.ui.compose.clear();
                self.ui.error = None;
                SubmitOutcome::Sent(message)
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                if e.is_unauthorized() {
                    self.unmount();
                    self.expiry.expire();
                }
                self.ui.error = Some(SEND_FAILED.into());
                SubmitOutcome::Failed(e)
            }
        }
    }

    pub async fn render(&self) -> ChatFrame {
        let store = self.store.lock().await;
        let connected = self.status.as_ref().is_some_and(|s| s.connected);
        frame(&store, &self.ui, connected, Utc::now())
    }
}

impl<B: Backend> Drop for ChatView<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}
