#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use pagedesk_api::{ApiError, Backend};
use pagedesk_session::SessionStore;
use pagedesk_types::models::{
    ChatId, Conversation, Direction, IntegrationStatus, Message, MessageId, PageId, PageInfo,
    Session,
};

/// In-process backend. Each conversations fetch pops the next scripted
/// result; the last one repeats forever.
#[derive(Default)]
pub struct FakeBackend {
    pub status: Mutex<Option<Result<IntegrationStatus, ApiError>>>,
    pub snapshots: Mutex<VecDeque<Result<Vec<Conversation>, ApiError>>>,
    pub send_error: Mutex<Option<ApiError>>,
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub status_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    next_message_id: AtomicUsize,
}

impl FakeBackend {
    pub fn connected() -> Arc<Self> {
        let backend = Self::default();
        *backend.status.lock().unwrap() = Some(Ok(connected_status()));
        Arc::new(backend)
    }

    pub fn disconnected() -> Arc<Self> {
        let backend = Self::default();
        *backend.status.lock().unwrap() = Some(Ok(IntegrationStatus::disconnected()));
        Arc::new(backend)
    }

    pub fn script(&self, result: Result<Vec<Conversation>, ApiError>) {
        self.snapshots.lock().unwrap().push_back(result);
    }

    pub fn fail_sends_with(&self, error: ApiError) {
        *self.send_error.lock().unwrap() = Some(error);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }
}

impl Backend for FakeBackend {
    async fn fetch_integration_status(
        &self,
        _session: &Session,
    ) -> Result<IntegrationStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(IntegrationStatus::disconnected()))
    }

    async fn fetch_conversations(&self, _session: &Session) -> Result<Vec<Conversation>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        if snapshots.len() > 1 {
            return snapshots.pop_front().unwrap();
        }
        snapshots.front().cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_message(
        &self,
        _session: &Session,
        chat_id: &ChatId,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.send_error.lock().unwrap().clone() {
            return Err(e);
        }
        let content = pagedesk_api::backend::validate_content(content)?;
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.clone(), content.to_string()));

        let id = 1000 + self.next_message_id.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(Message {
            id: MessageId::from(id),
            direction: Direction::Outgoing,
            content: content.to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn disconnect_integration(
        &self,
        _session: &Session,
        _page_id: &PageId,
    ) -> Result<bool, ApiError> {
        Ok(true)
    }
}

pub fn connected_status() -> IntegrationStatus {
    IntegrationStatus {
        connected: true,
        page: Some(PageInfo {
            id: PageId::from("p-1"),
            name: "Acme Support".into(),
        }),
    }
}

pub fn session() -> Session {
    Session::new("token-abc", "bearer", Duration::days(1))
}

/// In-memory session store already holding `session()`.
pub fn sessions() -> Arc<SessionStore> {
    let store = SessionStore::open_in_memory().unwrap();
    store.save(&session()).unwrap();
    Arc::new(store)
}

pub fn message(id: i64, direction: Direction, content: &str) -> Message {
    Message {
        id: MessageId::from(id),
        direction,
        content: content.into(),
        timestamp: Utc::now() - Duration::minutes(10),
    }
}

pub fn conversation(id: i64, name: &str, messages: Vec<Message>) -> Conversation {
    Conversation {
        id: ChatId::from(id),
        counterpart_name: name.into(),
        messages,
    }
}

pub fn two_chats() -> Vec<Conversation> {
    vec![
        conversation(
            1,
            "Jane",
            vec![message(11, Direction::Incoming, "hi there")],
        ),
        conversation(2, "John", vec![message(21, Direction::Incoming, "hello")]),
    ]
}
