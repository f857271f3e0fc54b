use crate::domain::message::{Message, MessageStatus};
use serde::{Deserialize, Serialize};

/// Events pushed to connected clients. Each variant carries only its own fields
/// and clients dispatch on the `event` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChatEvent {
    #[serde(rename = "message.created")]
    MessageCreated { message: Message },
    #[serde(rename = "message.read")]
    MessageRead { message_id: i64, original_sender_id: i64, status: MessageStatus },
}

impl ChatEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message.created",
            Self::MessageRead { .. } => "message.read",
        }
    }

    #[must_use]
    pub const fn read_receipt(message_id: i64, original_sender_id: i64) -> Self {
        Self::MessageRead { message_id, original_sender_id, status: MessageStatus::Read }
    }
}

/// What travels over the transport for one user channel.
///
/// `origin_socket` names the connection that caused the event; that connection
/// skips it so a client never receives an echo of its own write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_socket: Option<String>,
    pub event: ChatEvent,
}

impl Delivery {
    #[must_use]
    pub fn is_echo_for(&self, socket_id: &str) -> bool {
        self.origin_socket.as_deref() == Some(socket_id)
    }
}

/// A delivery routed to a local user after crossing the transport.
#[derive(Debug, Clone)]
pub struct RealtimeNotification {
    pub user_id: i64,
    pub delivery: Delivery,
}
