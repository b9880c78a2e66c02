//! Channel manager: owns every channel, merges their event streams and
//! routes replies back by session.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::channels::{Channel, EventStream, OutgoingResponse, ReplySink};
use crate::error::ChannelError;
use crate::session::SessionId;

/// Holds the active channels.
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    pub fn add(&mut self, channel: Box<dyn Channel>) {
        tracing::debug!(channel = channel.name(), "Channel registered");
        self.channels.push(channel);
    }

    /// Names of registered channels, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Health-check and start every channel, then merge their event streams.
    ///
    /// A channel that fails its health check or fails to start is logged and
    /// skipped; it is an error only if none start.
    pub async fn start_all(&self) -> Result<EventStream, ChannelError> {
        let mut streams = Vec::new();
        for channel in &self.channels {
            if let Err(e) = channel.health_check().await {
                tracing::error!(
                    channel = channel.name(),
                    error = %e,
                    "Channel unhealthy, not starting"
                );
                continue;
            }
            match channel.start().await {
                Ok(stream) => {
                    tracing::info!(channel = channel.name(), "Channel started");
                    streams.push(stream);
                }
                Err(e) => {
                    tracing::error!(channel = channel.name(), error = %e, "Channel failed to start");
                }
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".to_string(),
                reason: "no channel could be started".to_string(),
            });
        }

        Ok(stream::select_all(streams).boxed())
    }

    /// Send a reply to the channel that owns the session.
    pub async fn respond(
        &self,
        session: &SessionId,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .get(&session.channel)
            .ok_or_else(|| ChannelError::UnknownSession {
                session: session.to_string(),
            })?;
        channel.send(session, response).await
    }

    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), error = %e, "Channel shutdown failed");
            }
        }
        Ok(())
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplySink for ChannelManager {
    async fn send(&self, session: &SessionId, text: &str) -> Result<(), ChannelError> {
        self.respond(session, OutgoingResponse::text(text)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;

    use super::*;
    use crate::channels::{ChannelEvent, IncomingMessage};

    struct FakeChannel {
        name: &'static str,
        healthy: bool,
        events: Mutex<Option<Vec<ChannelEvent>>>,
        sent: Mutex<Vec<(SessionId, String)>>,
    }

    impl FakeChannel {
        fn new(name: &'static str, events: Vec<ChannelEvent>) -> Self {
            Self {
                name,
                healthy: true,
                events: Mutex::new(Some(events)),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn unhealthy(name: &'static str, events: Vec<ChannelEvent>) -> Self {
            Self {
                healthy: false,
                ..Self::new(name, events)
            }
        }
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<EventStream, ChannelError> {
            let events = self.events.lock().unwrap().take().ok_or_else(|| {
                ChannelError::StartupFailed {
                    name: self.name.to_string(),
                    reason: "already started".to_string(),
                }
            })?;
            Ok(Box::pin(stream::iter(events)))
        }

        async fn send(
            &self,
            session: &SessionId,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((session.clone(), response.content));
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            if self.healthy {
                Ok(())
            } else {
                Err(ChannelError::HealthCheckFailed {
                    name: self.name.to_string(),
                })
            }
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let a = SessionId::new("a", "1");
        let b = SessionId::new("b", "1");
        let mut manager = ChannelManager::new();
        manager.add(Box::new(FakeChannel::new(
            "a",
            vec![ChannelEvent::SessionStarted(a.clone())],
        )));
        manager.add(Box::new(FakeChannel::new(
            "b",
            vec![ChannelEvent::Message(IncomingMessage::new(b.clone(), "hi"))],
        )));

        let events: Vec<ChannelEvent> = manager.start_all().await.unwrap().collect().await;
        assert_eq!(events.len(), 2);
        let sessions: Vec<&SessionId> = events.iter().map(|e| e.session()).collect();
        assert!(sessions.contains(&&a));
        assert!(sessions.contains(&&b));
    }

    #[tokio::test]
    async fn start_all_skips_unhealthy_channels() {
        let a = SessionId::new("a", "1");
        let b = SessionId::new("b", "1");
        let mut manager = ChannelManager::new();
        manager.add(Box::new(FakeChannel::new(
            "a",
            vec![ChannelEvent::SessionStarted(a.clone())],
        )));
        manager.add(Box::new(FakeChannel::unhealthy(
            "b",
            vec![ChannelEvent::SessionStarted(b)],
        )));

        let events: Vec<ChannelEvent> = manager.start_all().await.unwrap().collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session(), &a);
    }

    #[tokio::test]
    async fn start_all_fails_when_only_unhealthy_channels() {
        let mut manager = ChannelManager::new();
        manager.add(Box::new(FakeChannel::unhealthy("b", vec![])));
        assert!(manager.start_all().await.is_err());
    }

    #[tokio::test]
    async fn start_all_fails_when_nothing_starts() {
        let manager = ChannelManager::new();
        assert!(manager.start_all().await.is_err());
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let manager = ChannelManager::new();
        let err = manager
            .send(&SessionId::new("nowhere", "1"), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownSession { .. }));
    }

    #[test]
    fn names_in_registration_order() {
        let mut manager = ChannelManager::new();
        manager.add(Box::new(FakeChannel::new("cli", vec![])));
        manager.add(Box::new(FakeChannel::new("web", vec![])));
        assert_eq!(manager.names(), vec!["cli", "web"]);
    }
}
