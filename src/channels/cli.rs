//! CLI channel: stdin/stdout REPL with a single local session.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, ChannelEvent, EventStream, IncomingMessage, OutgoingResponse};
use crate::error::ChannelError;
use crate::session::SessionId;

/// A simple CLI channel that reads from stdin and writes to stdout.
///
/// The session starts when the channel starts and ends at EOF.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }

    /// The one session this channel serves.
    pub fn session() -> SessionId {
        SessionId::new("cli", "local")
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let session = CliChannel::session();
            if tx.send(ChannelEvent::SessionStarted(session.clone())).is_err() {
                return;
            }

            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new(session.clone(), &line);
                        if tx.send(ChannelEvent::Message(msg)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }

            let _ = tx.send(ChannelEvent::SessionEnded(session));
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(
        &self,
        _session: &SessionId,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", response.content);
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_name_matches_session() {
        let ch = CliChannel::new();
        assert_eq!(ch.name(), "cli");
        assert_eq!(CliChannel::session().channel, ch.name());
    }
}
