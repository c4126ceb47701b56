//! `EditorSession`, one open workflow: the reducer state plus its writer.
//!
//! Host commands are applied synchronously in arrival order.  After each one that
//! produced new unsaved content the snapshot is handed to the persistence
//! queue; save progress comes back as events that `pump` folds into the
//! state as save-lifecycle actions.

use std::sync::Arc;

use engine::{reduce, Action, EditCommand, EditorState, EditorView, StoreError, Tool, WorkflowStore};
use tokio::sync::mpsc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::{PersistenceQueue, SaveEvent};

pub struct EditorSession {
    state: EditorState,
    queue: PersistenceQueue,
    events: mpsc::UnboundedReceiver<SaveEvent>,
    store: Arc<dyn WorkflowStore>,
}

impl EditorSession {
    /// Load `workflow_id` and start its writer.
    #[instrument(skip(store, config))]
    pub async fn open(
        store: Arc<dyn WorkflowStore>,
        workflow_id: Uuid,
        config: QueueConfig,
    ) -> Result<Self, QueueError> {
        let loaded = store.load(workflow_id).await?;
        let project_id = loaded.document.project_id;
        let state = EditorState::new(loaded.document, loaded.published_workflow_id);

        let (queue, events) =
            PersistenceQueue::spawn(Arc::clone(&store), project_id, workflow_id, config);
        info!(%project_id, live = state.is_live(), "Editor session opened");

        Ok(Self { state, queue, events, store })
    }

    /// Attach the project's read-only tool catalog.
    pub fn with_catalog(mut self, tools: Vec<Tool>) -> Self {
        self.state = self.state.with_catalog(tools);
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn view(&self) -> EditorView {
        self.state.view()
    }

    pub fn workflow_id(&self) -> Uuid {
        self.state.document.id
    }

    /// Apply one host command and queue the result for saving if it needs it.
    pub fn dispatch(&mut self, command: EditCommand) -> Result<EditorView, QueueError> {
        self.apply(command.into())
    }

    fn apply(&mut self, action: Action) -> Result<EditorView, QueueError> {
        let before = self.state.generation;
        self.state = reduce(self.state.clone(), action);

        if self.state.generation != before && self.state.pending_changes {
            self.queue.enqueue(&self.state)?;
        }
        Ok(self.view())
    }

    /// Fold save events received so far into the state.
    ///
    /// Returns the first failed write among them, if any.
    pub fn pump(&mut self) -> Result<(), StoreError> {
        fold_events(&mut self.state, &mut self.events)
    }

    /// Write pending edits now and report how that went.
    pub async fn settle(&mut self) -> Result<EditorView, QueueError> {
        self.queue.flush().await?;
        self.pump()?;
        Ok(self.view())
    }

    /// Save, then make this workflow the project's live one.
    ///
    /// From then on the session is read-only.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id()))]
    pub async fn publish(&mut self) -> Result<EditorView, QueueError> {
        self.settle().await?;
        let workflow_id = self.workflow_id();
        self.store.publish(self.state.document.project_id, workflow_id).await?;
        self.apply(Action::SetPublishedWorkflowId { workflow_id })
    }

    /// Write pending edits and stop the writer.
    pub async fn close(self) -> Result<EditorView, QueueError> {
        let Self { mut state, queue, mut events, .. } = self;
        queue.shutdown().await?;
        fold_events(&mut state, &mut events)?;
        info!(workflow_id = %state.document.id, "Editor session closed");
        Ok(state.view())
    }
}

fn fold_events(
    state: &mut EditorState,
    events: &mut mpsc::UnboundedReceiver<SaveEvent>,
) -> Result<(), StoreError> {
    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        let action = match event {
            SaveEvent::Started { generation } => Action::SaveStarted { generation },
            SaveEvent::Saved { generation, at } => Action::SaveSucceeded { generation, at },
            SaveEvent::Failed { generation, error } => {
                failure.get_or_insert(error);
                Action::SaveFailed { generation }
            }
        };
        *state = reduce(state.clone(), action);
    }
    failure.map_or(Ok(()), Err)
}
