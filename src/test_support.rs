//! In-memory stand-ins for the database and the realtime transport.

use crate::adapters::database::{MessageStore, PostStore, UserDirectory};
use crate::domain::message::{Message, MessageStatus, NewMessage};
use crate::domain::notification::Delivery;
use crate::domain::post::SharedPost;
use crate::domain::user::UserProfile;
use crate::error::{AppError, Result};
use crate::services::delivery::{RealtimeTransport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

pub(crate) fn epoch() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_767_225_600).expect("valid timestamp")
}

fn is_between(message: &Message, a: i64, b: i64) -> bool {
    (message.sender_id == a && message.receiver_id == b) || (message.sender_id == b && message.receiver_id == a)
}

const fn counterpart_of(message: &Message, user_id: i64) -> i64 {
    if message.sender_id == user_id { message.receiver_id } else { message.sender_id }
}

pub(crate) fn message_fixture(id: i64, sender_id: i64, receiver_id: i64) -> Message {
    Message {
        id,
        sender_id,
        receiver_id,
        body: format!("message {id}"),
        attachments: Vec::new(),
        shared_post_id: None,
        shared_post: None,
        status: MessageStatus::Sent,
        created_at: epoch() + Duration::seconds(id),
    }
}

pub(crate) fn profile(id: i64, name: &str) -> UserProfile {
    UserProfile {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        avatar: None,
    }
}

pub(crate) fn post_fixture(id: i64) -> SharedPost {
    SharedPost {
        id,
        user_name: "Carol".to_string(),
        user_avatar: Some("https://cdn.example.com/carol.png".to_string()),
        content: "Sunset at the pier".to_string(),
        images: vec!["https://cdn.example.com/pier.jpg".to_string()],
        videos: Vec::new(),
        created_at: epoch(),
        likes_count: 12,
        comments_count: 3,
    }
}

/// Message ledger kept in a vector. Each insert advances a fake clock by one second.
#[derive(Debug, Default)]
pub(crate) struct InMemoryMessages {
    rows: Mutex<Vec<Message>>,
}

impl InMemoryMessages {
    pub(crate) fn all(&self) -> Vec<Message> {
        self.rows.lock().expect("lock").clone()
    }

    /// Inserts a row with a chosen timestamp to build ordering scenarios.
    pub(crate) fn seed(&self, mut message: Message) -> Message {
        let mut rows = self.rows.lock().expect("lock");
        message.id = rows.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        rows.push(message.clone());
        message
    }
}

#[async_trait]
impl MessageStore for InMemoryMessages {
    async fn insert(&self, message: NewMessage) -> Result<Message> {
        let mut rows = self.rows.lock().expect("lock");
        let id = rows.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let stored = Message {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body,
            attachments: message.attachments,
            shared_post_id: message.shared_post_id,
            shared_post: message.shared_post,
            status: MessageStatus::Sent,
            created_at: epoch() + Duration::seconds(id),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn find(&self, message_id: i64) -> Result<Option<Message>> {
        Ok(self.rows.lock().expect("lock").iter().find(|m| m.id == message_id).cloned())
    }

    async fn thread(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
        let mut thread: Vec<Message> =
            self.rows.lock().expect("lock").iter().filter(|m| is_between(m, user_a, user_b)).cloned().collect();
        thread.sort_by_key(|m| (m.created_at, m.id));
        Ok(thread)
    }

    async fn mark_read_from(&self, sender_id: i64, receiver_id: i64) -> Result<Vec<Message>> {
        let mut rows = self.rows.lock().expect("lock");
        let mut changed = Vec::new();
        for row in rows.iter_mut() {
            if row.sender_id == sender_id && row.receiver_id == receiver_id && !row.status.is_read() {
                row.status = MessageStatus::Read;
                changed.push(row.clone());
            }
        }
        changed.sort_by_key(|m| m.id);
        Ok(changed)
    }

    async fn delete_sent(&self, message_id: i64, sender_id: i64) -> Result<bool> {
        let mut rows = self.rows.lock().expect("lock");
        let before = rows.len();
        rows.retain(|m| !(m.id == message_id && m.sender_id == sender_id));
        Ok(rows.len() < before)
    }

    async fn counterparts(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .map(|m| counterpart_of(m, user_id))
            .filter(|id| *id != user_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn latest_between(&self, user_a: i64, user_b: i64) -> Result<Option<Message>> {
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|m| is_between(m, user_a, user_b))
            .max_by_key(|m| (m.created_at, m.id))
            .cloned())
    }

    async fn count_unread_from(&self, sender_id: i64, receiver_id: i64) -> Result<i64> {
        let count = self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|m| m.sender_id == sender_id && m.receiver_id == receiver_id && !m.status.is_read())
            .count();
        Ok(i64::try_from(count).expect("fits"))
    }
}

#[derive(Debug, Default)]
pub(crate) struct InMemoryUsers {
    users: Mutex<Vec<UserProfile>>,
}

impl InMemoryUsers {
    pub(crate) fn with(users: Vec<UserProfile>) -> Self {
        Self { users: Mutex::new(users) }
    }

    pub(crate) fn remove(&self, user_id: i64) {
        self.users.lock().expect("lock").retain(|u| u.id != user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn exists(&self, user_id: i64) -> Result<bool> {
        Ok(self.users.lock().expect("lock").iter().any(|u| u.id == user_id))
    }

    async fn profiles(&self, user_ids: &[i64]) -> Result<Vec<UserProfile>> {
        Ok(self.users.lock().expect("lock").iter().filter(|u| user_ids.contains(&u.id)).cloned().collect())
    }

    async fn contacts(&self, user_id: i64) -> Result<Vec<UserProfile>> {
        let mut contacts: Vec<UserProfile> =
            self.users.lock().expect("lock").iter().filter(|u| u.id != user_id).cloned().collect();
        contacts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(contacts)
    }
}

#[derive(Debug, Default)]
pub(crate) struct InMemoryPosts {
    posts: HashMap<i64, SharedPost>,
}

impl InMemoryPosts {
    pub(crate) fn with(posts: Vec<SharedPost>) -> Self {
        Self { posts: posts.into_iter().map(|p| (p.id, p)).collect() }
    }
}

#[async_trait]
impl PostStore for InMemoryPosts {
    async fn snapshot(&self, post_id: i64) -> Result<Option<SharedPost>> {
        Ok(self.posts.get(&post_id).cloned())
    }
}

/// A directory whose every call fails, for error-path tests.
#[derive(Debug, Default)]
pub(crate) struct BrokenUsers;

#[async_trait]
impl UserDirectory for BrokenUsers {
    async fn exists(&self, _user_id: i64) -> Result<bool> {
        Err(AppError::Internal)
    }

    async fn profiles(&self, _user_ids: &[i64]) -> Result<Vec<UserProfile>> {
        Err(AppError::Internal)
    }

    async fn contacts(&self, _user_id: i64) -> Result<Vec<UserProfile>> {
        Err(AppError::Internal)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum TransportMode {
    #[default]
    Record,
    Fail,
    Stall,
}

/// Transport that keeps every publish in memory.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    mode: TransportMode,
    published: Mutex<Vec<(i64, Delivery)>>,
}

impl RecordingTransport {
    pub(crate) fn failing() -> Self {
        Self { mode: TransportMode::Fail, ..Self::default() }
    }

    pub(crate) fn stalled() -> Self {
        Self { mode: TransportMode::Stall, ..Self::default() }
    }

    pub(crate) fn published(&self) -> Vec<(i64, Delivery)> {
        self.published.lock().expect("lock").clone()
    }

    pub(crate) fn clear(&self) {
        self.published.lock().expect("lock").clear();
    }

    /// Publishing runs on background tasks; waits until `count` events landed or five seconds passed.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<(i64, Delivery)> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let published = self.published();
            if published.len() >= count || tokio::time::Instant::now() >= deadline {
                return published;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl RealtimeTransport for RecordingTransport {
    async fn publish(&self, user_id: i64, delivery: &Delivery) -> std::result::Result<(), TransportError> {
        match self.mode {
            TransportMode::Record => {
                self.published.lock().expect("lock").push((user_id, delivery.clone()));
                Ok(())
            }
            TransportMode::Fail => Err(TransportError::Other(anyhow::anyhow!("connection refused"))),
            TransportMode::Stall => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}
