//! The transition function: `reduce(state, action) -> state'`.
//!
//! Pure, synchronous and total.  Structural edits run inside a
//! [`Transaction`] over a copy of the current document; every op the
//! transaction applies records its inverse, and the pair becomes one
//! [`EditStep`] in the Action Log.  An edit that changes nothing (unknown
//! entity, locked agent, identical values) leaves the state untouched and
//! records no step.  Undo/redo replay steps directly and skip entity rules;
//! like edits, they are ignored while the workflow is live.
//!
//! Hosts speak [`EditCommand`]; the session bookkeeping variants of
//! [`Action`] are produced only by the session that owns the state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::delta::{apply_all, DeltaOp, EditStep};
use crate::mentions;
use crate::models::{
    Agent, AgentDraft, Entity, EntityKind, Prompt, PromptDraft, Tool, ToolDraft, WorkflowDocument,
};
use crate::naming::{default_name, unique_name};
use crate::selection::SelectionController;
use crate::state::EditorState;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Every command the editor accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    // ------ Structural (undoable, live-locked) ------
    AddAgent {
        #[serde(default)]
        agent: AgentDraft,
    },
    AddTool {
        #[serde(default)]
        tool: ToolDraft,
    },
    AddPrompt {
        #[serde(default)]
        prompt: PromptDraft,
    },
    UpdateAgent { name: String, agent: AgentDraft },
    UpdateTool { name: String, tool: ToolDraft },
    UpdatePrompt { name: String, prompt: PromptDraft },
    DeleteAgent { name: String },
    DeleteTool { name: String },
    DeletePrompt { name: String },
    ToggleAgent { name: String },
    SetStartAgent { name: String },
    ReorderAgents { from: usize, to: usize },
    /// Replace tools with matching names in place, append the rest.
    ImportTools { tools: Vec<Tool> },
    RenameWorkflow { name: String },

    // ------ History ------
    Undo,
    Redo,

    // ------ Selection (not undoable, not persisted) ------
    Select { kind: EntityKind, name: String },
    Unselect,

    // ------ Session bookkeeping ------
    /// The external publish action made `workflow_id` live.
    SetPublishedWorkflowId { workflow_id: Uuid },
    /// Replace the snapshot wholesale and forget the history.  Ignored
    /// while live.
    Restore {
        document: WorkflowDocument,
        published_workflow_id: Option<Uuid>,
    },
    SaveStarted { generation: u64 },
    SaveSucceeded { generation: u64, at: DateTime<Utc> },
    SaveFailed { generation: u64 },
}

impl Action {
    /// Structural actions edit the document and are rejected while live.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AddAgent { .. }
                | Self::AddTool { .. }
                | Self::AddPrompt { .. }
                | Self::UpdateAgent { .. }
                | Self::UpdateTool { .. }
                | Self::UpdatePrompt { .. }
                | Self::DeleteAgent { .. }
                | Self::DeleteTool { .. }
                | Self::DeletePrompt { .. }
                | Self::ToggleAgent { .. }
                | Self::SetStartAgent { .. }
                | Self::ReorderAgents { .. }
                | Self::ImportTools { .. }
                | Self::RenameWorkflow { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AddAgent { .. } => "add_agent",
            Self::AddTool { .. } => "add_tool",
            Self::AddPrompt { .. } => "add_prompt",
            Self::UpdateAgent { .. } => "update_agent",
            Self::UpdateTool { .. } => "update_tool",
            Self::UpdatePrompt { .. } => "update_prompt",
            Self::DeleteAgent { .. } => "delete_agent",
            Self::DeleteTool { .. } => "delete_tool",
            Self::DeletePrompt { .. } => "delete_prompt",
            Self::ToggleAgent { .. } => "toggle_agent",
            Self::SetStartAgent { .. } => "set_start_agent",
            Self::ReorderAgents { .. } => "reorder_agents",
            Self::ImportTools { .. } => "import_tools",
            Self::RenameWorkflow { .. } => "rename_workflow",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Select { .. } => "select",
            Self::Unselect => "unselect",
            Self::SetPublishedWorkflowId { .. } => "set_published_workflow_id",
            Self::Restore { .. } => "restore",
            Self::SaveStarted { .. } => "save_started",
            Self::SaveSucceeded { .. } => "save_succeeded",
            Self::SaveFailed { .. } => "save_failed",
        }
    }
}

// ---------------------------------------------------------------------------
// EditCommand
// ---------------------------------------------------------------------------

/// The actions a host may send over the wire: edits, history and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditCommand {
    AddAgent {
        #[serde(default)]
        agent: AgentDraft,
    },
    AddTool {
        #[serde(default)]
        tool: ToolDraft,
    },
    AddPrompt {
        #[serde(default)]
        prompt: PromptDraft,
    },
    UpdateAgent { name: String, agent: AgentDraft },
    UpdateTool { name: String, tool: ToolDraft },
    UpdatePrompt { name: String, prompt: PromptDraft },
    DeleteAgent { name: String },
    DeleteTool { name: String },
    DeletePrompt { name: String },
    ToggleAgent { name: String },
    SetStartAgent { name: String },
    ReorderAgents { from: usize, to: usize },
    ImportTools { tools: Vec<Tool> },
    RenameWorkflow { name: String },
    Undo,
    Redo,
    Select { kind: EntityKind, name: String },
    Unselect,
}

impl From<EditCommand> for Action {
    fn from(command: EditCommand) -> Self {
        match command {
            EditCommand::AddAgent { agent } => Self::AddAgent { agent },
            EditCommand::AddTool { tool } => Self::AddTool { tool },
            EditCommand::AddPrompt { prompt } => Self::AddPrompt { prompt },
            EditCommand::UpdateAgent { name, agent } => Self::UpdateAgent { name, agent },
            EditCommand::UpdateTool { name, tool } => Self::UpdateTool { name, tool },
            EditCommand::UpdatePrompt { name, prompt } => Self::UpdatePrompt { name, prompt },
            EditCommand::DeleteAgent { name } => Self::DeleteAgent { name },
            EditCommand::DeleteTool { name } => Self::DeleteTool { name },
            EditCommand::DeletePrompt { name } => Self::DeletePrompt { name },
            EditCommand::ToggleAgent { name } => Self::ToggleAgent { name },
            EditCommand::SetStartAgent { name } => Self::SetStartAgent { name },
            EditCommand::ReorderAgents { from, to } => Self::ReorderAgents { from, to },
            EditCommand::ImportTools { tools } => Self::ImportTools { tools },
            EditCommand::RenameWorkflow { name } => Self::RenameWorkflow { name },
            EditCommand::Undo => Self::Undo,
            EditCommand::Redo => Self::Redo,
            EditCommand::Select { kind, name } => Self::Select { kind, name },
            EditCommand::Unselect => Self::Unselect,
        }
    }
}

// ---------------------------------------------------------------------------
// reduce
// ---------------------------------------------------------------------------

/// Apply `action` to `state` and return the next state.
pub fn reduce(mut state: EditorState, action: Action) -> EditorState {
    let label = action.label();

    match action {
        Action::AddAgent { agent } => edit(state, label, |tx, sel| {
            let name = add::<Agent>(tx, sel, agent);
            if tx.doc.start_agent.is_empty() {
                tx.set_start_agent(name);
            }
        }),
        Action::AddTool { tool } => edit(state, label, |tx, sel| {
            add::<Tool>(tx, sel, tool);
        }),
        Action::AddPrompt { prompt } => edit(state, label, |tx, sel| {
            add::<Prompt>(tx, sel, prompt);
        }),
        Action::UpdateAgent { name, agent } => {
            edit(state, label, |tx, sel| update::<Agent>(tx, sel, name, agent))
        }
        Action::UpdateTool { name, tool } => {
            edit(state, label, |tx, sel| update::<Tool>(tx, sel, name, tool))
        }
        Action::UpdatePrompt { name, prompt } => {
            edit(state, label, |tx, sel| update::<Prompt>(tx, sel, name, prompt))
        }
        Action::DeleteAgent { name } => {
            edit(state, label, |tx, sel| delete(tx, sel, EntityKind::Agent, &name))
        }
        Action::DeleteTool { name } => {
            edit(state, label, |tx, sel| delete(tx, sel, EntityKind::Tool, &name))
        }
        Action::DeletePrompt { name } => {
            edit(state, label, |tx, sel| delete(tx, sel, EntityKind::Prompt, &name))
        }
        Action::ToggleAgent { name } => edit(state, label, |tx, _| toggle_agent(tx, &name)),
        Action::SetStartAgent { name } => edit(state, label, |tx, _| set_start_agent(tx, name)),
        Action::ReorderAgents { from, to } => {
            edit(state, label, |tx, _| reorder_agents(tx, from, to))
        }
        Action::ImportTools { tools } => edit(state, label, |tx, _| import_tools(tx, tools)),
        Action::RenameWorkflow { name } => {
            edit(state, label, |tx, _| rename_workflow(tx, name))
        }

        Action::Undo => undo(state),
        Action::Redo => redo(state),

        Action::Select { kind, name } => {
            if state.document.contains(kind, &name) {
                state.selection.select(kind, name);
            } else {
                debug!(%kind, %name, "select ignored, no such entity");
            }
            state
        }
        Action::Unselect => {
            state.selection.clear();
            state
        }

        Action::SetPublishedWorkflowId { workflow_id } => {
            state.published_workflow_id = Some(workflow_id);
            state
        }
        Action::Restore { .. } if state.is_live() => {
            debug!("workflow is live, restore ignored");
            state
        }
        Action::Restore { document, published_workflow_id } => EditorState {
            generation: state.generation + 1,
            saving: state.saving,
            catalog: state.catalog,
            ..EditorState::new(document, published_workflow_id)
        },
        Action::SaveStarted { .. } => {
            state.saving = true;
            state
        }
        Action::SaveSucceeded { generation, at } => {
            state.saving = false;
            Arc::make_mut(&mut state.document).last_updated_at = at;
            // Edits made while the write was in flight are still pending.
            if generation == state.generation {
                state.pending_changes = false;
            }
            state
        }
        Action::SaveFailed { .. } => {
            state.saving = false;
            state
        }
    }
}

/// Run a structural edit and commit it as one step.
fn edit<F>(mut state: EditorState, label: &'static str, apply: F) -> EditorState
where
    F: FnOnce(&mut Transaction, &mut SelectionController),
{
    if state.is_live() {
        debug!(action = label, "workflow is live, edit ignored");
        return state;
    }

    let mut tx = Transaction::begin(&state.document);
    let mut selection = state.selection.clone();
    apply(&mut tx, &mut selection);

    let Some((document, step)) = tx.finish() else {
        debug!(action = label, "edit changed nothing");
        return state;
    };

    state.document = Arc::new(document);
    state.log.push(step);
    state.selection = selection;
    state.pending_changes = true;
    state.generation += 1;
    debug!(action = label, generation = state.generation, "edit applied");
    state
}

fn undo(state: EditorState) -> EditorState {
    if state.is_live() {
        debug!("workflow is live, undo ignored");
        return state;
    }
    let Some(step) = state.log.undo_step() else {
        return state;
    };
    let mut document = (*state.document).clone();
    if let Err(e) = apply_all(&step.inverse, &mut document) {
        warn!("undo step does not fit the current snapshot: {e}");
        return state;
    }
    let mut state = state;
    state.log.step_back();
    after_replay(state, document)
}

fn redo(state: EditorState) -> EditorState {
    if state.is_live() {
        debug!("workflow is live, redo ignored");
        return state;
    }
    let Some(step) = state.log.redo_step() else {
        return state;
    };
    let mut document = (*state.document).clone();
    if let Err(e) = apply_all(&step.forward, &mut document) {
        warn!("redo step does not fit the current snapshot: {e}");
        return state;
    }
    let mut state = state;
    state.log.step_forward();
    after_replay(state, document)
}

fn after_replay(mut state: EditorState, document: WorkflowDocument) -> EditorState {
    state.selection.retain_existing(&document);
    state.document = Arc::new(document);
    state.pending_changes = true;
    state.generation += 1;
    state
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A working copy of the document that records forward and inverse ops.
struct Transaction {
    doc: WorkflowDocument,
    forward: Vec<DeltaOp>,
    inverse: Vec<DeltaOp>,
}

impl Transaction {
    fn begin(doc: &WorkflowDocument) -> Self {
        Self {
            doc: doc.clone(),
            forward: Vec::new(),
            inverse: Vec::new(),
        }
    }

    fn apply(&mut self, op: DeltaOp) {
        match op.apply(&mut self.doc) {
            Ok(inverse) => {
                self.forward.push(op);
                self.inverse.push(inverse);
            }
            Err(e) => debug!("op skipped: {e}"),
        }
    }

    fn push(&mut self, entity: Entity) {
        let index = self.doc.len_of(entity.kind());
        self.apply(DeltaOp::InsertAt { index, entity });
    }

    fn set_entity(&mut self, index: usize, entity: Entity) {
        if self.doc.entity_at(entity.kind(), index).as_ref() == Some(&entity) {
            return;
        }
        self.apply(DeltaOp::SetEntity { index, entity });
    }

    fn set_workflow_name(&mut self, name: String) {
        if self.doc.name != name {
            self.apply(DeltaOp::SetWorkflowName { name });
        }
    }

    fn set_start_agent(&mut self, name: String) {
        if self.doc.start_agent != name {
            self.apply(DeltaOp::SetStartAgent { name });
        }
    }

    /// Rewrite mentions of a renamed entity in this same step.
    fn rename_references(&mut self, kind: EntityKind, old: &str, new: &str) {
        for op in mentions::rewrite_ops(&self.doc, kind, old, new) {
            self.apply(op);
        }
    }

    fn finish(mut self) -> Option<(WorkflowDocument, EditStep)> {
        if self.forward.is_empty() {
            return None;
        }
        self.inverse.reverse();
        Some((
            self.doc,
            EditStep {
                forward: self.forward,
                inverse: self.inverse,
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// Per-kind editing
// ---------------------------------------------------------------------------

/// What add/update need to know about one entity kind.
trait Editable: Clone {
    const KIND: EntityKind;
    type Draft;

    fn named(name: String) -> Self;
    fn set_name(&mut self, name: String);
    fn merge(&mut self, draft: &Self::Draft);
    fn requested_name(draft: &Self::Draft) -> Option<&str>;
    fn at(doc: &WorkflowDocument, index: usize) -> &Self;
    fn into_entity(self) -> Entity;
}

impl Editable for Agent {
    const KIND: EntityKind = EntityKind::Agent;
    type Draft = AgentDraft;

    fn named(name: String) -> Self {
        Agent::named(name)
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn merge(&mut self, draft: &AgentDraft) {
        draft.merge_into(self);
    }
    fn requested_name(draft: &AgentDraft) -> Option<&str> {
        draft.name.as_deref()
    }
    fn at(doc: &WorkflowDocument, index: usize) -> &Self {
        &doc.agents[index]
    }
    fn into_entity(self) -> Entity {
        Entity::Agent(self)
    }
}

impl Editable for Tool {
    const KIND: EntityKind = EntityKind::Tool;
    type Draft = ToolDraft;

    fn named(name: String) -> Self {
        Tool::named(name)
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn merge(&mut self, draft: &ToolDraft) {
        draft.merge_into(self);
    }
    fn requested_name(draft: &ToolDraft) -> Option<&str> {
        draft.name.as_deref()
    }
    fn at(doc: &WorkflowDocument, index: usize) -> &Self {
        &doc.tools[index]
    }
    fn into_entity(self) -> Entity {
        Entity::Tool(self)
    }
}

impl Editable for Prompt {
    const KIND: EntityKind = EntityKind::Prompt;
    type Draft = PromptDraft;

    fn named(name: String) -> Self {
        Prompt::named(name)
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn merge(&mut self, draft: &PromptDraft) {
        draft.merge_into(self);
    }
    fn requested_name(draft: &PromptDraft) -> Option<&str> {
        draft.name.as_deref()
    }
    fn at(doc: &WorkflowDocument, index: usize) -> &Self {
        &doc.prompts[index]
    }
    fn into_entity(self) -> Entity {
        Entity::Prompt(self)
    }
}

/// Append a new entity under a collision-free name and select it.
fn add<E: Editable>(tx: &mut Transaction, sel: &mut SelectionController, draft: E::Draft) -> String {
    let base = E::requested_name(&draft)
        .filter(|n| !n.is_empty())
        .unwrap_or(default_name(E::KIND));
    let name = unique_name(E::KIND, base, tx.doc.names(E::KIND));

    let mut entity = E::named(name.clone());
    entity.merge(&draft);
    tx.push(entity.into_entity());
    sel.select(E::KIND, name.clone());
    name
}

/// Merge `draft` into the entity `name`; a name change also moves the start
/// agent pointer and rewrites mentions in the same step.
fn update<E: Editable>(
    tx: &mut Transaction,
    sel: &mut SelectionController,
    name: String,
    draft: E::Draft,
) {
    let kind = E::KIND;
    let Some(index) = tx.doc.index_of(kind, &name) else {
        debug!(%kind, %name, "update ignored, no such entity");
        return;
    };

    let new_name = rename_target(&tx.doc, E::KIND, &name, E::requested_name(&draft));
    let mut entity = E::at(&tx.doc, index).clone();
    entity.merge(&draft);
    if let Some(new_name) = &new_name {
        entity.set_name(new_name.clone());
    }
    tx.set_entity(index, entity.into_entity());

    if let Some(new_name) = &new_name {
        if E::KIND == EntityKind::Agent && tx.doc.start_agent == name {
            tx.set_start_agent(new_name.clone());
        }
        tx.rename_references(E::KIND, &name, new_name);
    }

    sel.select(E::KIND, new_name.unwrap_or(name));
}

/// The name an entity ends up with when `requested` is asked for.
///
/// `None` when there is no effective rename.  A collision with another
/// entity of the same kind is auto-suffixed.
fn rename_target(
    doc: &WorkflowDocument,
    kind: EntityKind,
    current: &str,
    requested: Option<&str>,
) -> Option<String> {
    let requested = requested.filter(|n| !n.is_empty() && *n != current)?;
    let others = doc.names(kind).into_iter().filter(|n| *n != current);
    Some(unique_name(kind, requested, others)).filter(|n| n != current)
}

fn delete(tx: &mut Transaction, sel: &mut SelectionController, kind: EntityKind, name: &str) {
    let Some(index) = tx.doc.index_of(kind, name) else {
        debug!(%kind, %name, "delete ignored, no such entity");
        return;
    };
    if kind == EntityKind::Agent && tx.doc.agents[index].locked {
        debug!(%name, "delete ignored, agent is locked");
        return;
    }

    tx.apply(DeltaOp::RemoveAt { kind, index });

    if kind == EntityKind::Agent && tx.doc.start_agent == name {
        let next = tx.doc.agents.first().map(|a| a.name.clone()).unwrap_or_default();
        tx.set_start_agent(next);
    }
    sel.clear();
}

fn toggle_agent(tx: &mut Transaction, name: &str) {
    let Some(index) = tx.doc.index_of(EntityKind::Agent, name) else {
        return;
    };
    let agent = &tx.doc.agents[index];
    if !agent.toggle_able {
        debug!(%name, "toggle ignored, agent is not toggleable");
        return;
    }
    let mut agent = agent.clone();
    agent.disabled = !agent.disabled;
    tx.set_entity(index, Entity::Agent(agent));
}

fn set_start_agent(tx: &mut Transaction, name: String) {
    let locked = match tx.doc.agent(&name) {
        Some(agent) => agent.locked,
        None => {
            debug!(%name, "start agent unchanged, no such agent");
            return;
        }
    };
    if locked {
        debug!(%name, "start agent unchanged, agent is locked");
        return;
    }
    tx.set_start_agent(name);
}

fn rename_workflow(tx: &mut Transaction, name: String) {
    if name.trim().is_empty() {
        debug!("workflow rename ignored, empty name");
        return;
    }
    tx.set_workflow_name(name);
}

fn reorder_agents(tx: &mut Transaction, from: usize, to: usize) {
    let len = tx.doc.agents.len();
    if from == to || from >= len || to >= len {
        return;
    }
    tx.apply(DeltaOp::Reorder { kind: EntityKind::Agent, from, to });
}

fn import_tools(tx: &mut Transaction, tools: Vec<Tool>) {
    for tool in tools {
        match tx.doc.index_of(EntityKind::Tool, &tool.name) {
            Some(index) => tx.set_entity(index, Entity::Tool(tool)),
            None => tx.push(Entity::Tool(tool)),
        }
    }
}
