//! Channel trait and the events channels deliver.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::session::SessionId;

/// A text message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    pub session: SessionId,
    pub user_name: Option<String>,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(session: SessionId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
            user_name: None,
            content: content.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// Session lifecycle events delivered by a channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    SessionStarted(SessionId),
    Message(IncomingMessage),
    SessionEnded(SessionId),
}

impl ChannelEvent {
    /// The session this event belongs to.
    pub fn session(&self) -> &SessionId {
        match self {
            Self::SessionStarted(session) | Self::SessionEnded(session) => session,
            Self::Message(msg) => &msg.session,
        }
    }
}

/// Text sent back to a session.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Stream of events from one or more channels.
pub type EventStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// A transport that delivers session events and carries replies.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name; also the channel half of its `SessionId`s.
    fn name(&self) -> &str;

    /// Start receiving. May only be called once.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Deliver a reply to a session on this channel.
    async fn send(&self, session: &SessionId, response: OutgoingResponse)
    -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}

/// Where the dialogue sends its replies.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, session: &SessionId, text: &str) -> Result<(), ChannelError>;
}
