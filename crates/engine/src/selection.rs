//! Which single entity is open in the detail view.

use serde::{Deserialize, Serialize};

use crate::models::{EntityKind, WorkflowDocument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub kind: EntityKind,
    pub name: String,
}

/// Holds `{ kind, name } | null`.
///
/// Never points at an entity missing from the current snapshot: the reducer
/// updates it in the same transition as the delete, rename, undo or redo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionController {
    current: Option<Selection>,
}

impl SelectionController {
    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn select(&mut self, kind: EntityKind, name: impl Into<String>) {
        self.current = Some(Selection { kind, name: name.into() });
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn is_selected(&self, kind: EntityKind, name: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.kind == kind && s.name == name)
    }

    /// Drop the selection if its entity is not in `doc`.
    pub fn retain_existing(&mut self, doc: &WorkflowDocument) {
        if let Some(s) = &self.current {
            if !doc.contains(s.kind, &s.name) {
                self.current = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Agent;
    use uuid::Uuid;

    #[test]
    fn retain_existing_clears_dangling_pointer() {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "wf");
        doc.agents.push(Agent::named("kept"));

        let mut selection = SelectionController::default();
        selection.select(EntityKind::Agent, "kept");
        selection.retain_existing(&doc);
        assert!(selection.is_selected(EntityKind::Agent, "kept"));

        selection.select(EntityKind::Tool, "kept");
        selection.retain_existing(&doc);
        assert_eq!(selection.current(), None);
    }
}
