//! Rate-limited outbound message queue.
//!
//! Messages are sent one at a time by a single background task with a
//! fixed gap between consecutive sends. Failed sends are logged and
//! dropped.

use crate::telegram::MessageTransport;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Configuration for the notifier.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Messages buffered before `enqueue` waits.
    pub queue_capacity: usize,
    /// Minimum time between two sends.
    pub message_gap: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            message_gap: Duration::from_secs(3),
        }
    }
}

/// Handle to the running notifier.
pub struct NotifierHandle {
    tx: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

impl NotifierHandle {
    /// Queue a message. `None` and empty messages are skipped.
    pub async fn enqueue(&self, message: Option<String>) {
        let Some(message) = message.filter(|m| !m.is_empty()) else {
            return;
        };
        if let Err(e) = self.tx.send(message).await {
            warn!("Failed to queue message: {}", e);
        }
    }

    /// Stop accepting messages and wait until the queue is drained.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!("Notifier task failed: {}", e);
        }
    }
}

async fn run_queue<T: MessageTransport>(
    transport: T,
    mut rx: mpsc::Receiver<String>,
    gap: Duration,
) {
    info!("Message queue started");
    let mut last_sent: Option<Instant> = None;

    while let Some(message) = rx.recv().await {
        if let Some(at) = last_sent {
            tokio::time::sleep_until(at + gap).await;
        }
        if let Err(e) = transport.send_html(&message).await {
            error!("Failed to send message: {}", e);
        }
        last_sent = Some(Instant::now());
    }

    info!("Message queue stopped");
}

/// Start the notifier background task.
pub fn start_notifier<T>(transport: T, config: NotifierConfig) -> NotifierHandle
where
    T: MessageTransport + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(config.queue_capacity.max(1));
    let worker = tokio::spawn(run_queue(transport, rx, config.message_gap));
    NotifierHandle { tx, worker }
}
