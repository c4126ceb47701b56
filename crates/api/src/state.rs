//! Shared handler state.

use std::collections::HashMap;
use std::sync::Arc;

use engine::WorkflowStore;
use queue::{EditorSession, QueueConfig};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// One workflow's session, locked per request so actions stay in arrival
/// order.  `None` while the session is being opened, after a failed load,
/// or once it has been closed.
pub type SessionSlot = Arc<Mutex<Option<EditorSession>>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    /// Only ever locked briefly to look up, add or drop a slot.
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
    pub queue_config: QueueConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn WorkflowStore>, queue_config: QueueConfig) -> Self {
        Self {
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            queue_config,
        }
    }

    pub async fn slot(&self, workflow_id: Uuid) -> Option<SessionSlot> {
        self.sessions.read().await.get(&workflow_id).cloned()
    }

    /// Lock the slot registered for `workflow_id`, registering an empty one
    /// if there is none.
    ///
    /// Waits for whoever holds the slot (an open in progress, a close that
    /// is still writing) and retries if that holder dropped the slot.
    pub async fn claim(
        &self,
        workflow_id: Uuid,
    ) -> (SessionSlot, OwnedMutexGuard<Option<EditorSession>>) {
        loop {
            let slot = Arc::clone(self.sessions.write().await.entry(workflow_id).or_default());
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_registered(workflow_id, &slot).await {
                return (slot, guard);
            }
        }
    }

    /// Drop the map entry for `workflow_id` if it is still `slot`.
    ///
    /// Callers hold the slot's lock.
    pub async fn release(&self, workflow_id: Uuid, slot: &SessionSlot) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&workflow_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            sessions.remove(&workflow_id);
        }
    }

    async fn is_registered(&self, workflow_id: Uuid, slot: &SessionSlot) -> bool {
        self.sessions
            .read()
            .await
            .get(&workflow_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }
}
