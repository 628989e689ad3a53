use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::models::{
    ChatId, Conversation, Direction, IntegrationStatus, Message, MessageId, PageId, PageInfo,
};

// -- Auth --

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human readable reason, preferring `message` over a string `detail`.
    pub fn reason(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(message.clone());
        }
        match &self.detail {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => Some(detail.clone()),
            _ => None,
        }
    }
}

// -- Facebook integration --

#[derive(Debug, Deserialize)]
pub struct ConnectionResponse {
    #[serde(deserialize_with = "flag")]
    pub connected: bool,
    #[serde(default)]
    pub page: Option<PageResponse>,
}

#[derive(Debug, Deserialize)]
pub struct PageResponse {
    pub id: PageId,
    #[serde(default)]
    pub name: String,
}

impl From<ConnectionResponse> for IntegrationStatus {
    fn from(resp: ConnectionResponse) -> Self {
        // A page is only meaningful while connected.
        let page = resp.page.filter(|_| resp.connected).map(|p| PageInfo {
            id: p.id,
            name: p.name,
        });
        IntegrationStatus {
            connected: resp.connected,
            page,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectRequest {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessResponse {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
}

// -- Messenger --

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub id: ChatId,
    #[serde(default)]
    pub fb_user_name: String,
    #[serde(default)]
    pub messages: Vec<MessageResponse>,
}

impl ChatResponse {
    pub fn into_conversation(self, now: DateTime<Utc>) -> Conversation {
        let messages = self
            .messages
            .into_iter()
            .map(|m| m.into_message(Direction::Incoming, now))
            .collect();
        Conversation {
            id: self.id,
            counterpart_name: self.fb_user_name,
            messages,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    #[serde(default)]
    pub message_type: Option<Direction>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MessageResponse {
    /// Missing `message_type` falls back to `direction`; a missing or
    /// unparseable `timestamp` falls back to `now`.
    pub fn into_message(self, direction: Direction, now: DateTime<Utc>) -> Message {
        let timestamp = match self.timestamp.as_deref() {
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                warn!("Corrupt timestamp '{}' on message '{}'", raw, self.id);
                now
            }),
            None => now,
        };
        Message {
            id: self.id,
            direction: self.message_type.unwrap_or(direction),
            content: self.content,
            timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Parse RFC 3339, falling back to naive timestamps which the backend
/// emits without an offset. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ndt| ndt.and_utc())
}

/// Accepts `0|1` as well as JSON booleans.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn connection_status_accepts_numeric_flag() {
        let resp: ConnectionResponse = serde_json::from_str(
            r#"{"connected": 1, "page": {"id": 104233, "name": "Acme Support"}}"#,
        )
        .unwrap();
        let status = IntegrationStatus::from(resp);
        assert!(status.connected);
        let page = status.page.unwrap();
        assert_eq!(page.id.as_str(), "104233");
        assert_eq!(page.name, "Acme Support");
    }

    #[test]
    fn disconnected_status_drops_page() {
        let resp: ConnectionResponse =
            serde_json::from_str(r#"{"connected": 0, "page": {"id": "1", "name": "x"}}"#).unwrap();
        assert_eq!(IntegrationStatus::from(resp), IntegrationStatus::disconnected());

        let resp: ConnectionResponse = serde_json::from_str(r#"{"connected": false}"#).unwrap();
        assert!(!IntegrationStatus::from(resp).connected);
    }

    #[test]
    fn chat_list_converts_to_conversations() {
        let body = r#"[
            {"id": 1, "fb_user_name": "Jane Doe", "messages": [
                {"id": 10, "message_type": "incoming", "content": "hi\nthere", "timestamp": "2024-05-01T10:00:00"},
                {"id": 11, "message_type": "outgoing", "content": "hello", "timestamp": "2024-05-01T10:01:00.250Z"}
            ]},
            {"id": "2", "fb_user_name": "John", "messages": []}
        ]"#;
        let chats: Vec<ChatResponse> = serde_json::from_str(body).unwrap();
        let now = Utc::now();
        let convs: Vec<Conversation> = chats.into_iter().map(|c| c.into_conversation(now)).collect();

        assert_eq!(convs.len(), 2);
        assert_eq!(convs[0].id, ChatId::from(1));
        assert_eq!(convs[1].id, ChatId::from("2"));
        assert_eq!(convs[0].counterpart_name, "Jane Doe");
        assert_eq!(convs[0].messages[0].direction, Direction::Incoming);
        assert_eq!(convs[0].messages[0].content, "hi\nthere");
        assert_eq!(
            convs[0].messages[0].timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(convs[0].messages[1].direction, Direction::Outgoing);
    }

    #[test]
    fn sent_message_defaults_missing_fields() {
        let resp: MessageResponse =
            serde_json::from_str(r#"{"id": 99, "content": "hello", "chat_id": 1}"#).unwrap();
        let now = Utc::now();
        let msg = resp.into_message(Direction::Outgoing, now);
        assert_eq!(msg.id, MessageId::from(99));
        assert_eq!(msg.direction, Direction::Outgoing);
        assert_eq!(msg.timestamp, now);
    }

    #[test]
    fn error_body_prefers_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "Invalid credentials", "detail": "x"}"#).unwrap();
        assert_eq!(body.reason().as_deref(), Some("Invalid credentials"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": "Email taken"}"#).unwrap();
        assert_eq!(body.reason().as_deref(), Some("Email taken"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"loc": []}]}"#).unwrap();
        assert_eq!(body.reason(), None);
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T05:04:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
