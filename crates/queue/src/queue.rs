//! The Persistence Queue.
//!
//! One tokio task owns the store connection and is the only place writes are
//! issued from, which is what makes writes single-flight.  Callers talk to it
//! over an unbounded command channel:
//!
//! * `enqueue` replaces the pending snapshot (coalescing) and restarts the
//!   quiet period (debounce);
//! * when the quiet period elapses the latest snapshot is written;
//! * anything enqueued while a write was in flight is written immediately
//!   after it settles (drain);
//! * `flush` skips the quiet period and resolves once nothing is pending.
//!
//! Write progress is reported as [`SaveEvent`]s on a second channel so the
//! session can fold them back into the editor state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine::{EditorState, StoreError, WorkflowDocument, WorkflowStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::QueueError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A snapshot waiting to be written.
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub generation: u64,
    pub document: Arc<WorkflowDocument>,
}

/// Progress of one write.
#[derive(Debug)]
pub enum SaveEvent {
    Started { generation: u64 },
    Saved { generation: u64, at: DateTime<Utc> },
    Failed { generation: u64, error: StoreError },
}

enum Command {
    Enqueue(PendingSave),
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task of one workflow.
pub struct PersistenceQueue {
    commands: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl PersistenceQueue {
    /// Start the writer task for `workflow_id`.
    ///
    /// Returns the handle and the receiver of its save events.
    pub fn spawn(
        store: Arc<dyn WorkflowStore>,
        project_id: Uuid,
        workflow_id: Uuid,
        config: QueueConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SaveEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();

        let worker = Worker {
            store,
            project_id,
            workflow_id,
            config,
            commands: command_rx,
            events: event_tx,
            latest: None,
            last_written: None,
            waiters: Vec::new(),
        };
        let worker = tokio::spawn(worker.run());

        (Self { commands, worker }, events)
    }

    /// Queue the current snapshot of `state` for writing.
    ///
    /// A live workflow is never written through this path, so this is a
    /// no-op for one.
    pub fn enqueue(&self, state: &EditorState) -> Result<(), QueueError> {
        if state.is_live() {
            debug!(workflow_id = %state.document.id, "workflow is live, not queued");
            return Ok(());
        }
        let save = PendingSave {
            generation: state.generation,
            document: Arc::clone(&state.document),
        };
        self.commands
            .send(Command::Enqueue(save))
            .map_err(|_| QueueError::Closed)
    }

    /// Write whatever is pending now and wait until nothing is.
    pub async fn flush(&self) -> Result<(), QueueError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Flush(ack))
            .map_err(|_| QueueError::Closed)?;
        done.await.map_err(|_| QueueError::Closed)
    }

    /// Write whatever is pending and stop the writer task.
    pub async fn shutdown(self) -> Result<(), QueueError> {
        drop(self.commands);
        self.worker.await.map_err(|e| {
            warn!("persistence worker ended abnormally: {e}");
            QueueError::Closed
        })
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    store: Arc<dyn WorkflowStore>,
    project_id: Uuid,
    workflow_id: Uuid,
    config: QueueConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SaveEvent>,
    /// Only the newest snapshot is kept; older ones are never written.
    latest: Option<PendingSave>,
    /// Generation of the newest snapshot the store accepted.
    last_written: Option<u64>,
    waiters: Vec<oneshot::Sender<()>>,
}

impl Worker {
    async fn run(mut self) {
        info!(workflow_id = %self.workflow_id, "Persistence queue started");
        let mut closing = false;
        let mut immediate = false;

        loop {
            if self.latest.is_none() {
                self.ack_waiters();
                if closing {
                    break;
                }
                match self.commands.recv().await {
                    Some(command) => self.handle(command),
                    None => closing = true,
                }
                continue;
            }

            // Debounce: every command received restarts the quiet period.
            if !(immediate || closing || !self.waiters.is_empty()) {
                match timeout(self.config.debounce, self.commands.recv()).await {
                    Ok(Some(command)) => {
                        self.handle(command);
                        continue;
                    }
                    Ok(None) => closing = true,
                    Err(_elapsed) => {}
                }
            }

            let Some(save) = self.latest.take() else { continue };
            self.write(save).await;

            // Drain what arrived during the write; it goes out without waiting.
            immediate = false;
            while let Ok(command) = self.commands.try_recv() {
                self.handle(command);
                immediate = true;
            }
            immediate = immediate && self.latest.is_some();
        }

        info!(workflow_id = %self.workflow_id, "Persistence queue stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue(save) => {
                if let Some(dropped) = self.latest.replace(save) {
                    debug!(generation = dropped.generation, "coalesced pending snapshot");
                }
            }
            Command::Flush(ack) => self.waiters.push(ack),
        }
    }

    #[instrument(skip(self, save), fields(workflow_id = %self.workflow_id, generation = save.generation))]
    async fn write(&mut self, save: PendingSave) {
        if self.last_written.is_some_and(|g| g >= save.generation) {
            debug!("snapshot is not newer than the last write, skipped");
            return;
        }

        let generation = save.generation;
        let _ = self.events.send(SaveEvent::Started { generation });

        match self
            .store
            .save(self.project_id, self.workflow_id, &save.document)
            .await
        {
            Ok(at) => {
                self.last_written = Some(generation);
                info!("Workflow saved");
                let _ = self.events.send(SaveEvent::Saved { generation, at });
            }
            Err(error) => {
                warn!("Workflow save failed: {error}");
                let _ = self.events.send(SaveEvent::Failed { generation, error });
            }
        }
    }

    fn ack_waiters(&mut self) {
        for ack in self.waiters.drain(..) {
            let _ = ack.send(());
        }
    }
}
