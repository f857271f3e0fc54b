use crate::adapters::database::{PostStore, UserDirectory};
use crate::config::MessagingConfig;
use crate::domain::message::{Message, NewMessage};
use crate::error::{AppError, Result};
use crate::services::message_service::MessageService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    shares_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            shares_total: meter
                .u64_counter("confide_post_shares_total")
                .with_description("Per-target post share outcomes")
                .build(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShareRequest {
    pub post_id: i64,
    pub target_ids: Vec<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareFailure {
    pub user_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareOutcome {
    pub success: bool,
    pub message: String,
    pub shared_count: usize,
    pub messages: Vec<Message>,
    pub failures: Vec<ShareFailure>,
}

impl ShareOutcome {
    fn summarize(messages: Vec<Message>, failures: Vec<ShareFailure>) -> Self {
        let shared_count = messages.len();
        let message = if shared_count > 0 {
            format!("Post shared successfully with {shared_count} user(s)!")
        } else {
            "No posts were shared.".to_string()
        };

        Self { success: true, message, shared_count, messages, failures }
    }
}

/// Fans one post out to many users as independent chat messages.
#[derive(Clone, Debug)]
pub struct ShareService {
    messages: MessageService,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostStore>,
    max_targets: usize,
    metrics: Metrics,
}

impl ShareService {
    #[must_use]
    pub fn new(
        messages: MessageService,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostStore>,
        config: &MessagingConfig,
    ) -> Self {
        Self { messages, users, posts, max_targets: config.max_share_targets, metrics: Metrics::new() }
    }

    /// Shares `post_id` with every target except the sender.
    ///
    /// A failing target never rolls back the others; it is reported in `failures`.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for an empty or oversized target list or an invalid note.
    /// Returns `AppError::NotFound` if the post does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, request, origin_socket),
        fields(post_id = request.post_id, targets = request.target_ids.len())
    )]
    pub async fn share_post(
        &self,
        sender_id: i64,
        request: ShareRequest,
        origin_socket: Option<&str>,
    ) -> Result<ShareOutcome> {
        if request.target_ids.is_empty() {
            return Err(AppError::BadRequest("At least one recipient is required".to_string()));
        }
        if request.target_ids.len() > self.max_targets {
            return Err(AppError::BadRequest(format!("At most {} recipients are allowed", self.max_targets)));
        }

        let note = request.note.unwrap_or_default();
        self.messages.limits().check(&note, &[], true).map_err(AppError::BadRequest)?;

        let snapshot = self.posts.snapshot(request.post_id).await?.ok_or(AppError::NotFound)?;

        let mut targets = request.target_ids;
        let mut seen = std::collections::HashSet::new();
        targets.retain(|id| *id != sender_id && seen.insert(*id));

        let mut delivered = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();

        for target_id in targets {
            match self.users.exists(target_id).await {
                Ok(true) => {}
                Ok(false) => {
                    self.metrics.shares_total.add(1, &[KeyValue::new("status", "unknown_user")]);
                    failures.push(ShareFailure { user_id: target_id, reason: "User not found".to_string() });
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, target_id, "Failed to resolve share target");
                    self.metrics.shares_total.add(1, &[KeyValue::new("status", "failure")]);
                    failures.push(ShareFailure { user_id: target_id, reason: e.to_string() });
                    continue;
                }
            }

            let message = NewMessage {
                sender_id,
                receiver_id: target_id,
                body: note.clone(),
                attachments: Vec::new(),
                shared_post_id: Some(snapshot.id),
                shared_post: Some(snapshot.clone()),
            };

            match self.messages.store_and_announce(message, origin_socket).await {
                Ok(message) => {
                    self.metrics.shares_total.add(1, &[KeyValue::new("status", "success")]);
                    delivered.push(message);
                }
                Err(e) => {
                    tracing::error!(error = %e, target_id, "Failed to share post with target");
                    self.metrics.shares_total.add(1, &[KeyValue::new("status", "failure")]);
                    failures.push(ShareFailure { user_id: target_id, reason: e.to_string() });
                }
            }
        }

        Ok(ShareOutcome::summarize(delivered, failures))
    }
}
