//! Main agent loop.
//!
//! Pulls session events from every channel and hands each session's events
//! to a dedicated worker task. A session's events are handled strictly in
//! order; different sessions proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelEvent, ChannelManager};
use crate::dialogue::DialogueController;
use crate::error::Error;
use crate::session::SessionId;

/// Queue and task for one live session.
struct SessionWorker {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    handle: JoinHandle<()>,
}

/// The main agent that coordinates channels and the dialogue.
pub struct Agent {
    controller: Arc<DialogueController>,
    channels: Arc<ChannelManager>,
    workers: HashMap<SessionId, SessionWorker>,
    /// Workers that were handed a `SessionEnded` and may still be draining.
    /// A new worker for the same session waits for the old one first.
    retiring: HashMap<SessionId, JoinHandle<()>>,
}

impl Agent {
    /// Create a new agent.
    ///
    /// `channels` should be the same manager the controller replies through.
    pub fn new(controller: Arc<DialogueController>, channels: Arc<ChannelManager>) -> Self {
        Self {
            controller,
            channels,
            workers: HashMap::new(),
            retiring: HashMap::new(),
        }
    }

    /// Run the agent main loop until Ctrl+C or until every channel stream
    /// has ended.
    pub async fn run(mut self) -> Result<(), Error> {
        let mut events = self.channels.start_all().await?;

        tracing::info!(channels = ?self.channels.names(), "Tutor ready and listening");

        let interrupted = loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break true;
                }
                event = events.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break false;
                        }
                    }
                }
            };

            self.dispatch(event);
        };

        tracing::info!("Agent shutting down...");
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .drain()
            .map(|(_, worker)| worker.handle)
            .chain(self.retiring.drain().map(|(_, handle)| handle))
            .collect();

        if interrupted {
            for handle in &handles {
                handle.abort();
            }
        } else {
            // Senders are gone, so every worker exits once its queue is empty.
            for handle in handles {
                let _ = handle.await;
            }
        }

        self.channels.shutdown_all().await?;
        Ok(())
    }

    /// Queue an event on its session's worker, spawning one if needed.
    fn dispatch(&mut self, event: ChannelEvent) {
        self.retiring.retain(|_, handle| !handle.is_finished());

        let session = event.session().clone();
        let ends_session = matches!(event, ChannelEvent::SessionEnded(_));

        let mut worker = match self.workers.remove(&session) {
            Some(worker) if !worker.tx.is_closed() => worker,
            _ => self.spawn_worker(&session),
        };

        if let Err(mpsc::error::SendError(event)) = worker.tx.send(event) {
            // The worker died between the check and the send.
            tracing::warn!(session = %session, "Session worker gone; respawning");
            worker = self.spawn_worker(&session);
            let _ = worker.tx.send(event);
        }

        if ends_session {
            self.retiring.insert(session, worker.handle);
        } else {
            self.workers.insert(session, worker);
        }
    }

    fn spawn_worker(&mut self, session: &SessionId) -> SessionWorker {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.retiring.remove(session);
        let controller = Arc::clone(&self.controller);
        tracing::debug!(session = %session, "Spawning session worker");
        let handle = tokio::spawn(session_worker(controller, rx, previous));
        SessionWorker { tx, handle }
    }
}

/// Drain one session's events in order. Exits after `SessionEnded` or when
/// the queue closes.
async fn session_worker(
    controller: Arc<DialogueController>,
    mut rx: mpsc::UnboundedReceiver<ChannelEvent>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    while let Some(event) = rx.recv().await {
        match event {
            ChannelEvent::SessionStarted(session) => {
                if let Err(e) = controller.on_session_start(&session).await {
                    tracing::error!(session = %session, error = %e, "Failed to greet session");
                }
            }
            ChannelEvent::Message(msg) => {
                tracing::debug!(
                    session = %msg.session,
                    message_id = %msg.id,
                    user = msg.user_name.as_deref().unwrap_or("-"),
                    queued_ms = (chrono::Utc::now() - msg.received_at).num_milliseconds(),
                    "Handling message"
                );
                if let Err(e) = controller.on_message(&msg.session, &msg.content).await {
                    tracing::error!(session = %msg.session, error = %e, "Failed to reply");
                }
            }
            ChannelEvent::SessionEnded(session) => {
                controller.on_session_end(&session).await;
                break;
            }
        }
    }
}
