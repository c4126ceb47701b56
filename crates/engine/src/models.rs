//! Core domain models for the workflow editor.
//!
//! These types are the source of truth for what a workflow document looks
//! like in memory.  They serialise to/from the JSONB `definition` column of
//! the `workflows` table using the camelCase keys of the stored format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The three kinds of addressable entity inside a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Tool,
    Prompt,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Agent, EntityKind::Tool, EntityKind::Prompt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Self::Agent),
            "tool" => Ok(Self::Tool),
            "prompt" => Ok(Self::Prompt),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// The role an agent plays in the conversation graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    #[default]
    Conversation,
    PostProcess,
    Escalation,
}

/// Who an agent hands control back to after it responds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    #[default]
    Retain,
    RelinquishToParent,
    RelinquishToStart,
}

/// Whether an agent's output is shown to the end user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputVisibility {
    #[default]
    UserFacing,
    Internal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagReturnType {
    #[default]
    Chunks,
    Content,
}

/// A conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique among agents; the addressing key.
    pub name: String,
    #[serde(rename = "type", default)]
    pub agent_type: AgentType,
    #[serde(default)]
    pub description: String,
    /// Free text; may embed mentions of other entities.
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub disabled: bool,
    /// Locked agents cannot be deleted or made the start agent.
    #[serde(default)]
    pub locked: bool,
    /// When false, `disabled` cannot be flipped.
    #[serde(default = "default_true")]
    pub toggle_able: bool,
    #[serde(default)]
    pub control_type: ControlType,
    #[serde(default)]
    pub output_visibility: OutputVisibility,
    #[serde(default = "default_max_calls")]
    pub max_calls_per_parent_agent: u32,
    #[serde(default = "default_rag_k")]
    pub rag_k: u32,
    #[serde(default)]
    pub rag_return_type: RagReturnType,
    /// Stored keys this editor does not model, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Agent {
    /// An agent with the editor's defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_type: AgentType::default(),
            description: String::new(),
            instructions: String::new(),
            model: String::new(),
            disabled: false,
            locked: false,
            toggle_able: true,
            control_type: ControlType::default(),
            output_visibility: OutputVisibility::default(),
            max_calls_per_parent_agent: default_max_calls(),
            rag_k: default_rag_k(),
            rag_return_type: RagReturnType::default(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// JSON-schema-like parameter block of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type", default = "default_object")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: default_object(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// A callable tool the agents may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: ToolParameters,
    /// Answer calls with a mocked response instead of invoking the tool.
    #[serde(default = "default_true")]
    pub mock_tool: bool,
    #[serde(default = "default_true")]
    pub auto_submit_mocked_response: bool,
    #[serde(default)]
    pub is_library: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tool {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: ToolParameters::default(),
            mock_tool: true,
            auto_submit_mocked_response: true,
            is_library: false,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    #[default]
    BasePrompt,
    StylePrompt,
}

/// A reusable block of prompt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(rename = "type", default)]
    pub prompt_type: PromptType,
    /// Free text; may embed mentions of other entities.
    #[serde(default)]
    pub prompt: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prompt {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_type: PromptType::default(),
            prompt: String::new(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Any one of the addressable entities, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Entity {
    Agent(Agent),
    Tool(Tool),
    Prompt(Prompt),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Agent(_) => EntityKind::Agent,
            Self::Tool(_) => EntityKind::Tool,
            Self::Prompt(_) => EntityKind::Prompt,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Agent(a) => &a.name,
            Self::Tool(t) => &t.name,
            Self::Prompt(p) => &p.name,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDocument
// ---------------------------------------------------------------------------

/// A complete workflow: the snapshot the editor transitions between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    /// Name of the agent conversations start with. Empty when there is none.
    #[serde(default)]
    pub start_agent: String,
    /// Stamped only when a save completes.
    pub last_updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowDocument {
    /// Convenience constructor for an empty document.
    pub fn new(project_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            agents: Vec::new(),
            tools: Vec::new(),
            prompts: Vec::new(),
            start_agent: String::new(),
            last_updated_at: Utc::now(),
            extra: Map::new(),
        }
    }

    /// Position of the entity `name` within its collection.
    pub fn index_of(&self, kind: EntityKind, name: &str) -> Option<usize> {
        match kind {
            EntityKind::Agent => self.agents.iter().position(|a| a.name == name),
            EntityKind::Tool => self.tools.iter().position(|t| t.name == name),
            EntityKind::Prompt => self.prompts.iter().position(|p| p.name == name),
        }
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.index_of(kind, name).is_some()
    }

    /// All names of one kind, in document order.
    pub fn names(&self, kind: EntityKind) -> Vec<&str> {
        match kind {
            EntityKind::Agent => self.agents.iter().map(|a| a.name.as_str()).collect(),
            EntityKind::Tool => self.tools.iter().map(|t| t.name.as_str()).collect(),
            EntityKind::Prompt => self.prompts.iter().map(|p| p.name.as_str()).collect(),
        }
    }

    pub fn len_of(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Agent => self.agents.len(),
            EntityKind::Tool => self.tools.len(),
            EntityKind::Prompt => self.prompts.len(),
        }
    }

    /// Clone of the entity at `index`, if any.
    pub fn entity_at(&self, kind: EntityKind, index: usize) -> Option<Entity> {
        match kind {
            EntityKind::Agent => self.agents.get(index).cloned().map(Entity::Agent),
            EntityKind::Tool => self.tools.get(index).cloned().map(Entity::Tool),
            EntityKind::Prompt => self.prompts.get(index).cloned().map(Entity::Prompt),
        }
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn prompt(&self, name: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Drafts (partial entities carried by add/update actions)
// ---------------------------------------------------------------------------

/// Partial agent: every `Some` field overrides the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDraft {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub agent_type: Option<AgentType>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub model: Option<String>,
    pub disabled: Option<bool>,
    pub locked: Option<bool>,
    pub toggle_able: Option<bool>,
    pub control_type: Option<ControlType>,
    pub output_visibility: Option<OutputVisibility>,
    pub max_calls_per_parent_agent: Option<u32>,
    pub rag_k: Option<u32>,
    pub rag_return_type: Option<RagReturnType>,
}

impl AgentDraft {
    /// Copy every field except `name` onto `agent`.
    pub fn merge_into(&self, agent: &mut Agent) {
        merge(&mut agent.agent_type, &self.agent_type);
        merge(&mut agent.description, &self.description);
        merge(&mut agent.instructions, &self.instructions);
        merge(&mut agent.model, &self.model);
        merge(&mut agent.disabled, &self.disabled);
        merge(&mut agent.locked, &self.locked);
        merge(&mut agent.toggle_able, &self.toggle_able);
        merge(&mut agent.control_type, &self.control_type);
        merge(&mut agent.output_visibility, &self.output_visibility);
        merge(&mut agent.max_calls_per_parent_agent, &self.max_calls_per_parent_agent);
        merge(&mut agent.rag_k, &self.rag_k);
        merge(&mut agent.rag_return_type, &self.rag_return_type);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<ToolParameters>,
    pub mock_tool: Option<bool>,
    pub auto_submit_mocked_response: Option<bool>,
    pub is_library: Option<bool>,
}

impl ToolDraft {
    pub fn merge_into(&self, tool: &mut Tool) {
        merge(&mut tool.description, &self.description);
        merge(&mut tool.parameters, &self.parameters);
        merge(&mut tool.mock_tool, &self.mock_tool);
        merge(&mut tool.auto_submit_mocked_response, &self.auto_submit_mocked_response);
        merge(&mut tool.is_library, &self.is_library);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptDraft {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub prompt_type: Option<PromptType>,
    pub prompt: Option<String>,
}

impl PromptDraft {
    pub fn merge_into(&self, prompt: &mut Prompt) {
        merge(&mut prompt.prompt_type, &self.prompt_type);
        merge(&mut prompt.prompt, &self.prompt);
    }
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn default_true() -> bool {
    true
}

fn default_max_calls() -> u32 {
    3
}

fn default_rag_k() -> u32 {
    3
}

fn default_object() -> String {
    "object".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_agent_json_fills_defaults() {
        let agent: Agent = serde_json::from_value(json!({
            "name": "Support",
            "instructions": "help",
        }))
        .expect("agent should deserialize");

        assert!(agent.toggle_able);
        assert!(!agent.locked);
        assert_eq!(agent.max_calls_per_parent_agent, 3);
        assert_eq!(agent.output_visibility, OutputVisibility::UserFacing);
    }

    #[test]
    fn document_uses_camel_case_keys() {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "wf");
        doc.start_agent = "Agent1".into();
        doc.tools.push(Tool::named("lookup"));

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["startAgent"], "Agent1");
        assert_eq!(value["tools"][0]["mockTool"], true);
        assert_eq!(value["tools"][0]["parameters"]["type"], "object");
        assert!(value.get("lastUpdatedAt").is_some());
    }

    #[test]
    fn stored_document_round_trips_unmodelled_keys() {
        let stored = json!({
            "_id": Uuid::new_v4(),
            "projectId": Uuid::new_v4(),
            "name": "Example",
            "agents": [{
                "name": "Example Agent",
                "type": "conversation",
                "description": "",
                "instructions": "hi",
                "model": "gpt-4o",
                "disabled": false,
                "locked": false,
                "toggleAble": true,
                "controlType": "retain",
                "outputVisibility": "user_facing",
                "maxCallsPerParentAgent": 3,
                "ragK": 3,
                "ragReturnType": "chunks",
                "ragDataSources": ["ds1"],
                "examples": "none"
            }],
            "tools": [{
                "name": "lookup",
                "description": "",
                "parameters": {"type": "object", "properties": {}, "required": []},
                "mockTool": true,
                "autoSubmitMockedResponse": true,
                "isLibrary": false,
                "mockInstructions": "say ok"
            }],
            "prompts": [{"name": "style", "type": "style_prompt", "prompt": "", "order": 2}],
            "startAgent": "Example Agent",
            "lastUpdatedAt": "2024-05-01T10:00:00Z",
            "createdAt": "2024-04-01T10:00:00Z",
            "mcpServers": [{"name": "local"}]
        });

        let doc: WorkflowDocument =
            serde_json::from_value(stored.clone()).expect("document should deserialize");
        assert_eq!(doc.agents[0].agent_type, AgentType::Conversation);
        assert_eq!(doc.agents[0].extra["examples"], "none");
        assert_eq!(doc.extra["createdAt"], "2024-04-01T10:00:00Z");

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written, stored);
    }

    #[test]
    fn agent_type_defaults_to_conversation() {
        let value = serde_json::to_value(Agent::named("a")).unwrap();
        assert_eq!(value["type"], "conversation");
    }

    #[test]
    fn draft_merge_leaves_unset_fields_alone() {
        let mut agent = Agent::named("a");
        agent.instructions = "keep me".into();

        let draft = AgentDraft {
            name: Some("ignored here".into()),
            disabled: Some(true),
            ..Default::default()
        };
        draft.merge_into(&mut agent);

        assert_eq!(agent.name, "a");
        assert_eq!(agent.instructions, "keep me");
        assert!(agent.disabled);
    }

    #[test]
    fn index_lookup_is_per_kind() {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "wf");
        doc.agents.push(Agent::named("shared"));
        doc.prompts.push(Prompt::named("other"));
        doc.prompts.push(Prompt::named("shared"));

        assert_eq!(doc.index_of(EntityKind::Agent, "shared"), Some(0));
        assert_eq!(doc.index_of(EntityKind::Prompt, "shared"), Some(1));
        assert_eq!(doc.index_of(EntityKind::Tool, "shared"), None);
    }
}
