use crate::adapters::database::{MessageStore, PostStore, UserDirectory};
use crate::config::MessagingConfig;
use crate::domain::message::{Attachment, Message, MessageLimits, NewMessage};
use crate::error::{AppError, Result};
use crate::services::delivery::DeliveryService;
use crate::services::read_state::{ReadStateService, SELF_CHAT_ERROR};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    deleted_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            sent_total: meter
                .u64_counter("confide_messages_sent_total")
                .with_description("Messages written to the ledger")
                .build(),
            deleted_total: meter
                .u64_counter("confide_messages_deleted_total")
                .with_description("Messages deleted by their sender")
                .build(),
        }
    }
}

/// What a client submits when sending a single message.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub receiver_id: i64,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub shared_post_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostStore>,
    delivery: DeliveryService,
    read_state: ReadStateService,
    limits: MessageLimits,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostStore>,
        delivery: DeliveryService,
        read_state: ReadStateService,
        config: &MessagingConfig,
    ) -> Self {
        let limits = MessageLimits {
            max_body_chars: config.max_body_chars,
            max_attachments: config.max_attachments,
            max_image_bytes: config.max_image_bytes,
            max_video_bytes: config.max_video_bytes,
        };
        Self { messages, users, posts, delivery, read_state, limits, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn limits(&self) -> &MessageLimits {
        &self.limits
    }

    /// Sends one message from `sender_id`.
    ///
    /// # Errors
    /// Returns `AppError::SelfAction` when sending to oneself.
    /// Returns `AppError::BadRequest` when the body or attachments break the limits.
    /// Returns `AppError::UnknownRecipient` if the receiver does not exist.
    /// Returns `AppError::NotFound` if the referenced post does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, outgoing, origin_socket),
        fields(receiver_id = outgoing.receiver_id, shared_post_id = ?outgoing.shared_post_id)
    )]
    pub async fn send(&self, sender_id: i64, outgoing: OutgoingMessage, origin_socket: Option<&str>) -> Result<Message> {
        if sender_id == outgoing.receiver_id {
            return Err(AppError::SelfAction("Cannot send a message to yourself".to_string()));
        }

        self.limits
            .check(&outgoing.body, &outgoing.attachments, outgoing.shared_post_id.is_some())
            .map_err(AppError::BadRequest)?;

        if !self.users.exists(outgoing.receiver_id).await? {
            return Err(AppError::UnknownRecipient);
        }

        let shared_post = match outgoing.shared_post_id {
            Some(post_id) => Some(self.posts.snapshot(post_id).await?.ok_or(AppError::NotFound)?),
            None => None,
        };

        let new_message = NewMessage {
            sender_id,
            receiver_id: outgoing.receiver_id,
            body: outgoing.body,
            attachments: outgoing.attachments,
            shared_post_id: outgoing.shared_post_id,
            shared_post,
        };

        self.store_and_announce(new_message, origin_socket).await
    }

    /// Writes an already validated message, then publishes it.
    pub(crate) async fn store_and_announce(&self, message: NewMessage, origin_socket: Option<&str>) -> Result<Message> {
        let kind = if message.shared_post.is_some() { "share" } else { "direct" };

        match self.messages.insert(message).await {
            Ok(message) => {
                tracing::debug!(message_id = message.id, "Message stored");
                self.metrics.sent_total.add(1, &[KeyValue::new("kind", kind), KeyValue::new("status", "success")]);

                self.delivery.message_created(&message, origin_socket);
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("kind", kind), KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Returns the whole conversation with `partner`, oldest first, and marks
    /// the partner's messages to `me` as read.
    ///
    /// The returned messages carry the statuses they had before the update.
    ///
    /// # Errors
    /// Returns `AppError::SelfAction` if `me == partner`.
    /// Returns `AppError::NotFound` if the partner does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, origin_socket))]
    pub async fn fetch_thread(&self, me: i64, partner: i64, origin_socket: Option<&str>) -> Result<Vec<Message>> {
        if me == partner {
            return Err(AppError::SelfAction(SELF_CHAT_ERROR.to_string()));
        }

        if !self.users.exists(partner).await? {
            return Err(AppError::NotFound);
        }

        let thread = self.messages.thread(me, partner).await?;
        self.read_state.transition(me, partner, origin_socket, "thread_fetch").await?;

        Ok(thread)
    }

    /// Hard-deletes a message. Only its sender may do this.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if `requester` did not send it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_message(&self, message_id: i64, requester: i64) -> Result<bool> {
        let message = self.messages.find(message_id).await?.ok_or(AppError::NotFound)?;

        if message.sender_id != requester {
            return Err(AppError::Forbidden);
        }

        // A concurrent delete may have won the race
        if !self.messages.delete_sent(message_id, requester).await? {
            return Err(AppError::NotFound);
        }

        self.metrics.deleted_total.add(1, &[]);
        Ok(true)
    }
}
