use crate::domain::message::Attachment;
use crate::services::message_service::OutgoingMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub shared_post_id: Option<i64>,
}

impl From<SendMessageRequest> for OutgoingMessage {
    fn from(request: SendMessageRequest) -> Self {
        Self {
            receiver_id: request.receiver_id,
            body: request.body,
            attachments: request.attachments,
            shared_post_id: request.shared_post_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteMessageResponse {
    pub deleted: bool,
}
