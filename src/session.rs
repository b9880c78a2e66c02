//! Session identity shared by channels, the profile store and the dialogue.

/// Identifies one chat session: the channel it lives on plus the channel's
/// own identifier for the conversation (chat id, connection id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    pub channel: String,
    pub id: String,
}

impl SessionId {
    pub fn new(channel: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.id)
    }
}
