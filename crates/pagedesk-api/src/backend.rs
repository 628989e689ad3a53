use std::future::Future;

use chrono::Utc;
use tracing::debug;

use pagedesk_types::api::{
    ChatResponse, ConnectionResponse, MessageResponse, SendMessageRequest, SuccessResponse,
};
use pagedesk_types::models::{
    ChatId, Conversation, Direction, IntegrationStatus, Message, PageId, Session,
};

use crate::client::ApiClient;
use crate::error::ApiError;

/// The backend resources the inbox depends on.
///
/// `fetch_conversations` is an idempotent read and is called once per poll
/// tick, so implementations must tolerate high call frequency.
pub trait Backend: Send + Sync + 'static {
    fn fetch_integration_status(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<IntegrationStatus, ApiError>> + Send;

    fn fetch_conversations(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<Conversation>, ApiError>> + Send;

    /// Persist an outgoing message. The returned message carries the
    /// server-assigned id and replaces any local placeholder.
    fn send_message(
        &self,
        session: &Session,
        chat_id: &ChatId,
        content: &str,
    ) -> impl Future<Output = Result<Message, ApiError>> + Send;

    fn disconnect_integration(
        &self,
        session: &Session,
        page_id: &PageId,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;
}

/// Reject bodies that are empty after trimming. Returns the trimmed text.
pub fn validate_content(content: &str) -> Result<&str, ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("Message is empty".into()));
    }
    Ok(trimmed)
}

impl Backend for ApiClient {
    async fn fetch_integration_status(
        &self,
        session: &Session,
    ) -> Result<IntegrationStatus, ApiError> {
        let resp: ConnectionResponse = self
            .get_authed(session, "/facebook/connection", &[])
            .await?;
        Ok(resp.into())
    }

    async fn fetch_conversations(&self, session: &Session) -> Result<Vec<Conversation>, ApiError> {
        let chats: Vec<ChatResponse> = self
            .get_authed(session, "/api/messenger/chats", &[])
            .await?;
        let now = Utc::now();
        Ok(chats.into_iter().map(|c| c.into_conversation(now)).collect())
    }

    async fn send_message(
        &self,
        session: &Session,
        chat_id: &ChatId,
        content: &str,
    ) -> Result<Message, ApiError> {
        let content = validate_content(content)?;
        let body = SendMessageRequest {
            content: content.to_string(),
        };
        let path = format!("/api/messenger/chats/{}/messages", chat_id);
        let resp: MessageResponse = self.post_authed(session, &path, Some(&body)).await?;
        let message = resp.into_message(Direction::Outgoing, Utc::now());
        debug!(chat_id = %chat_id, message_id = %message.id, "Message sent");
        Ok(message)
    }

    async fn disconnect_integration(
        &self,
        session: &Session,
        page_id: &PageId,
    ) -> Result<bool, ApiError> {
        let path = format!("/facebook/disconnect/{}", page_id);
        let resp: SuccessResponse = self.post_authed::<(), _>(session, &path, None).await?;
        Ok(resp.success)
    }
}
