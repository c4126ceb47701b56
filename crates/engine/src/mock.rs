//! `MockStore`: a test double for `WorkflowStore`.
//!
//! Records every save it receives, can be told to fail, and can hold writes
//! open so tests can observe what happens while a save is in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::WorkflowDocument;
use crate::store::{LoadedWorkflow, WorkflowStore};

/// Behaviour of `save` and `publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehaviour {
    Succeed,
    /// Reject with `StoreError::Rejected(msg)`.
    Fail(String),
}

/// One call to `save`, as seen by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCall {
    pub workflow_id: Uuid,
    pub document: WorkflowDocument,
}

/// A mock store serving one workflow.
///
/// `load` returns the last successfully saved document and the last
/// published id, so a reopened session sees what earlier ones wrote.
pub struct MockStore {
    loaded: Mutex<LoadedWorkflow>,
    behaviour: Mutex<MockBehaviour>,
    /// All saves seen by this store (in call order).
    saves: Arc<Mutex<Vec<SavedCall>>>,
    publishes: Arc<Mutex<Vec<Uuid>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStore {
    /// A store that loads `document` and accepts every write.
    pub fn serving(document: WorkflowDocument) -> Self {
        Self {
            loaded: Mutex::new(LoadedWorkflow { document, published_workflow_id: None }),
            behaviour: Mutex::new(MockBehaviour::Succeed),
            saves: Arc::new(Mutex::new(Vec::new())),
            publishes: Arc::new(Mutex::new(Vec::new())),
            gate: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Report `workflow_id` as the project's live workflow on load.
    pub fn with_published(mut self, workflow_id: Uuid) -> Self {
        self.loaded.get_mut().unwrap().published_workflow_id = Some(workflow_id);
        self
    }

    /// ID of the workflow this store serves.
    pub fn document_id(&self) -> Uuid {
        self.loaded.lock().unwrap().document.id
    }

    /// Make every subsequent write fail with `msg`.
    pub fn fail_with(&self, msg: impl Into<String>) {
        *self.behaviour.lock().unwrap() = MockBehaviour::Fail(msg.into());
    }

    pub fn succeed(&self) {
        *self.behaviour.lock().unwrap() = MockBehaviour::Succeed;
    }

    /// Block every subsequent save until `release_writes` is called.
    pub fn hold_writes(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held and future saves complete.
    pub fn release_writes(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    pub fn saves(&self) -> Vec<SavedCall> {
        self.saves.lock().unwrap().clone()
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn publishes(&self) -> Vec<Uuid> {
        self.publishes.lock().unwrap().clone()
    }

    /// Highest number of saves ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), StoreError> {
        match &*self.behaviour.lock().unwrap() {
            MockBehaviour::Succeed => Ok(()),
            MockBehaviour::Fail(msg) => Err(StoreError::Rejected(msg.clone())),
        }
    }
}

#[async_trait]
impl WorkflowStore for MockStore {
    async fn load(&self, workflow_id: Uuid) -> Result<LoadedWorkflow, StoreError> {
        let loaded = self.loaded.lock().unwrap().clone();
        if workflow_id != loaded.document.id {
            return Err(StoreError::WorkflowNotFound(workflow_id));
        }
        Ok(loaded)
    }

    async fn save(
        &self,
        _project_id: Uuid,
        workflow_id: Uuid,
        document: &WorkflowDocument,
    ) -> Result<DateTime<Utc>, StoreError> {
        self.saves.lock().unwrap().push(SavedCall { workflow_id, document: document.clone() });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // Closed means released; either way the write proceeds.
            let _ = gate.acquire().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcome()?;
        let at = Utc::now();
        let mut stored = document.clone();
        stored.last_updated_at = at;
        self.loaded.lock().unwrap().document = stored;
        Ok(at)
    }

    async fn publish(&self, _project_id: Uuid, workflow_id: Uuid) -> Result<(), StoreError> {
        self.outcome()?;
        self.publishes.lock().unwrap().push(workflow_id);
        self.loaded.lock().unwrap().published_workflow_id = Some(workflow_id);
        Ok(())
    }
}
