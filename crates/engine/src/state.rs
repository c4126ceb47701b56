//! Editor state held between reducer transitions, and the view handed to hosts.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::ActionLog;
use crate::models::{Tool, WorkflowDocument};
use crate::selection::{Selection, SelectionController};

// ---------------------------------------------------------------------------
// EditorState
// ---------------------------------------------------------------------------

/// Everything the reducer reads and produces.
///
/// `document` is shared, never edited in place: each transition that changes
/// it installs a new `Arc`, so snapshots handed to the persistence queue stay
/// valid.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub document: Arc<WorkflowDocument>,
    /// Identity of the live workflow. Equal to `document.id` → read-only.
    pub published_workflow_id: Option<Uuid>,
    pub selection: SelectionController,
    pub log: ActionLog,
    /// Edits not yet confirmed written by the store.
    pub pending_changes: bool,
    pub saving: bool,
    /// Bumped by every structural edit, undo, redo and restore.
    pub generation: u64,
    /// Read-only project tools merged into lookups; never persisted here.
    pub catalog: Arc<Vec<Tool>>,
}

impl EditorState {
    /// Fresh session state for a loaded document.
    pub fn new(document: WorkflowDocument, published_workflow_id: Option<Uuid>) -> Self {
        Self {
            document: Arc::new(document),
            published_workflow_id,
            selection: SelectionController::default(),
            log: ActionLog::new(),
            pending_changes: false,
            saving: false,
            generation: 0,
            catalog: Arc::new(Vec::new()),
        }
    }

    /// Attach the project-level tool catalog.
    pub fn with_catalog(mut self, tools: Vec<Tool>) -> Self {
        self.catalog = Arc::new(tools);
        self
    }

    /// A live workflow rejects structural edits and is never auto-saved.
    pub fn is_live(&self) -> bool {
        self.published_workflow_id == Some(self.document.id)
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    /// Look a tool up in the document first, then in the catalog.
    pub fn resolve_tool(&self, name: &str) -> Option<ResolvedTool<'_>> {
        if let Some(tool) = self.document.tool(name) {
            return Some(ResolvedTool { tool, origin: ToolOrigin::Workflow });
        }
        self.catalog
            .iter()
            .find(|t| t.name == name)
            .map(|tool| ResolvedTool { tool, origin: ToolOrigin::Catalog })
    }

    /// Every tool the agents can reach: document tools in order, then the
    /// catalog tools they do not shadow.
    pub fn available_tools(&self) -> Vec<ResolvedTool<'_>> {
        let mut seen = HashSet::new();
        self.document
            .tools
            .iter()
            .chain(self.catalog.iter())
            .filter(|t| seen.insert(t.name.as_str()))
            .filter_map(|t| self.resolve_tool(&t.name))
            .collect()
    }

    /// Observable outputs recomputed after every action.
    pub fn view(&self) -> EditorView {
        EditorView {
            document: Arc::clone(&self.document),
            available_tools: self
                .available_tools()
                .into_iter()
                .map(ToolEntry::from)
                .collect(),
            selection: self.selection.current().cloned(),
            saving: self.saving,
            pending_changes: self.pending_changes,
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            is_live: self.is_live(),
            generation: self.generation,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOrigin {
    /// Owned by the document; editable and persisted.
    Workflow,
    /// From the project catalog; read-only here.
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTool<'a> {
    pub tool: &'a Tool,
    pub origin: ToolOrigin,
}

/// An owned [`ResolvedTool`] as it appears in the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    #[serde(flatten)]
    pub tool: Tool,
    pub origin: ToolOrigin,
}

impl From<ResolvedTool<'_>> for ToolEntry {
    fn from(resolved: ResolvedTool<'_>) -> Self {
        Self {
            tool: resolved.tool.clone(),
            origin: resolved.origin,
        }
    }
}

// ---------------------------------------------------------------------------
// EditorView
// ---------------------------------------------------------------------------

/// What a host UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub document: Arc<WorkflowDocument>,
    /// Document tools plus the unshadowed catalog tools, tagged by origin.
    pub available_tools: Vec<ToolEntry>,
    pub selection: Option<Selection>,
    pub saving: bool,
    pub pending_changes: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub is_live: bool,
    pub generation: u64,
}
