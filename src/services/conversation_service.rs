use crate::adapters::database::{MessageStore, UserDirectory};
use crate::domain::conversation::ConversationSummary;
use crate::domain::user::UserProfile;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Read side of the inbox. Nothing here is cached; every call recomputes from the ledger.
#[derive(Clone, Debug)]
pub struct ConversationService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
}

impl ConversationService {
    #[must_use]
    pub fn new(messages: Arc<dyn MessageStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { messages, users }
    }

    /// One summary per partner, most recently active first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the ledger or directory cannot be read.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list(&self, me: i64) -> Result<Vec<ConversationSummary>> {
        let partner_ids = self.messages.counterparts(me).await?;
        if partner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut profiles: HashMap<i64, UserProfile> =
            self.users.profiles(&partner_ids).await?.into_iter().map(|p| (p.id, p)).collect();

        let mut summaries = Vec::with_capacity(partner_ids.len());
        for partner_id in partner_ids {
            let Some(profile) = profiles.remove(&partner_id) else {
                tracing::debug!(partner_id, "Skipping conversation with a user that no longer exists");
                continue;
            };
            let Some(last) = self.messages.latest_between(me, partner_id).await? else {
                continue;
            };
            let unread = self.messages.count_unread_from(partner_id, me).await?;

            summaries.push(ConversationSummary::from_last_message(me, profile, &last, unread));
        }

        summaries.sort_by(|a, b| {
            b.last_message_at.cmp(&a.last_message_at).then_with(|| b.last_message_id.cmp(&a.last_message_id))
        });

        Ok(summaries)
    }

    /// Everyone `me` could start a conversation with.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the directory cannot be read.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn contacts(&self, me: i64) -> Result<Vec<UserProfile>> {
        self.users.contacts(me).await
    }
}
