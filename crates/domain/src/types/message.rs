//! Inbox messages
//!
//! The server sends message content as a tagged union: a `content_type`
//! discriminator next to a `content` object whose shape depends on it.
//! [`MessageResponse`] keeps the raw pair so one malformed record can be
//! skipped without failing the whole page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{CacheRecord, RecordId, ServerEntity};
use crate::constants::{CATEGORY_READ, CATEGORY_UNREAD, ENTITY_MESSAGE};
use crate::errors::{Result, SdkError};

/// Decoded message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", content = "content", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Html {
        markup: String,
    },
    Video {
        url: String,
        #[serde(default)]
        autoplay: bool,
        #[serde(default)]
        muted: bool,
        #[serde(default)]
        looping: bool,
    },
    Image {
        url: String,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
}

/// Message as returned by the messages endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: RecordId,
    pub title: String,
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl MessageResponse {
    /// Decode the content union.
    ///
    /// # Errors
    /// Returns `SdkError::Decode` for an unknown `content_type` or a content
    /// object that does not match it.
    pub fn decode_content(&self) -> Result<MessageContent> {
        let tagged = serde_json::json!({
            "content_type": self.content_type,
            "content": self.content,
        });
        serde_json::from_value(tagged).map_err(|e| {
            SdkError::Decode(format!(
                "message {} has invalid '{}' content: {e}",
                self.id, self.content_type
            ))
        })
    }

    /// Convert into the cached record.
    ///
    /// # Errors
    /// Propagates [`MessageResponse::decode_content`] failures.
    pub fn into_message(self) -> Result<Message> {
        let content = self.decode_content()?;
        Ok(Message {
            id: self.id,
            title: self.title,
            content,
            read: self.read,
            created_at: self.created_at,
        })
    }
}

/// Cached message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    pub title: String,
    pub content: MessageContent,
    pub read: bool,
    pub created_at: Option<i64>,
}

impl ServerEntity for MessageResponse {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl ServerEntity for Message {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for Message {
    const ENTITY: &'static str = ENTITY_MESSAGE;

    fn id(&self) -> RecordId {
        self.id
    }

    fn category(&self) -> Option<String> {
        let category = if self.read { CATEGORY_READ } else { CATEGORY_UNREAD };
        Some(category.to_string())
    }
}
