use crate::domain::post::SharedPost;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Delivery state of a message, as seen by its receiver.
///
/// Only `Sent` and `Read` are ever produced. `Delivered` exists in the stored
/// enum for compatibility and is treated as unread wherever it shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Delivered => write!(f, "delivered"),
            Self::Read => write!(f, "read"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            _ => Err(format!("Invalid message status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Reference to a file already held by the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MediaKind,
    pub url: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub shared_post_id: Option<i64>,
    pub shared_post: Option<SharedPost>,
    pub status: MessageStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub const fn has_shared_post(&self) -> bool {
        self.shared_post.is_some() || self.shared_post_id.is_some()
    }
}

/// A message that has passed validation but has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub shared_post_id: Option<i64>,
    pub shared_post: Option<SharedPost>,
}

/// Limits applied to an outgoing message before it reaches the ledger.
#[derive(Debug, Clone, Copy)]
pub struct MessageLimits {
    pub max_body_chars: usize,
    pub max_attachments: usize,
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
}

impl MessageLimits {
    /// Checks body, attachment and share constraints.
    ///
    /// # Errors
    /// Returns a description of the first violated rule.
    pub fn check(&self, body: &str, attachments: &[Attachment], has_shared_post: bool) -> Result<(), String> {
        if body.trim().is_empty() && attachments.is_empty() && !has_shared_post {
            return Err("Message body is required when nothing is attached".to_string());
        }
        if body.chars().count() > self.max_body_chars {
            return Err(format!("Message body exceeds {} characters", self.max_body_chars));
        }
        if attachments.len() > self.max_attachments {
            return Err(format!("At most {} attachments are allowed", self.max_attachments));
        }
        for attachment in attachments {
            if !(attachment.url.starts_with("https://") || attachment.url.starts_with("http://")) {
                return Err(format!("Attachment URL must be absolute: {}", attachment.url));
            }
            let limit = match attachment.kind {
                MediaKind::Image => self.max_image_bytes,
                MediaKind::Video => self.max_video_bytes,
            };
            if attachment.size_bytes > limit {
                return Err(format!("Attachment exceeds the {limit} byte limit"));
            }
        }
        Ok(())
    }
}
