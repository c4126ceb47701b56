//! Document lint. Run it before publishing or after importing a workflow.
//!
//! Rules checked:
//! 1. Names are unique within each entity kind.
//! 2. `startAgent` names an existing agent (and is set whenever agents exist).
//! 3. Every mention in agent instructions and prompt text resolves.
//!
//! Unlike the reducer, which keeps these true while editing, documents coming
//! from outside (files, old rows) may violate them, so every finding is
//! reported rather than stopping at the first.

use std::collections::HashSet;

use thiserror::Error;

use crate::mentions::extract_mentions;
use crate::models::{EntityKind, WorkflowDocument};

/// One problem found in a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two entities of the same kind share a name.
    #[error("duplicate {kind} name: '{name}'")]
    DuplicateName { kind: EntityKind, name: String },

    /// Agents exist but none is marked as the start agent.
    #[error("no start agent set")]
    MissingStartAgent,

    /// `startAgent` names an agent that does not exist.
    #[error("start agent '{0}' does not exist")]
    UnknownStartAgent(String),

    /// A mention points at an entity that does not exist.
    #[error("{owner_kind} '{owner}' mentions unknown {kind} '{name}'")]
    DanglingMention {
        owner_kind: EntityKind,
        owner: String,
        kind: EntityKind,
        name: String,
    },
}

/// Check `doc` and return every issue found, in a stable order.
pub fn validate_document(doc: &WorkflowDocument) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // -----------------------------------------------------------------------
    // 1. Unique names per kind
    // -----------------------------------------------------------------------
    for kind in EntityKind::ALL {
        let mut seen: HashSet<&str> = HashSet::new();
        for name in doc.names(kind) {
            if !seen.insert(name) {
                issues.push(ValidationIssue::DuplicateName { kind, name: name.to_owned() });
            }
        }
    }

    // -----------------------------------------------------------------------
    // 2. Start agent resolves
    // -----------------------------------------------------------------------
    if doc.start_agent.is_empty() {
        if !doc.agents.is_empty() {
            issues.push(ValidationIssue::MissingStartAgent);
        }
    } else if doc.agent(&doc.start_agent).is_none() {
        issues.push(ValidationIssue::UnknownStartAgent(doc.start_agent.clone()));
    }

    // -----------------------------------------------------------------------
    // 3. Mentions resolve
    // -----------------------------------------------------------------------
    let texts = doc
        .agents
        .iter()
        .map(|a| (EntityKind::Agent, &a.name, &a.instructions))
        .chain(doc.prompts.iter().map(|p| (EntityKind::Prompt, &p.name, &p.prompt)));

    for (owner_kind, owner, text) in texts {
        for mention in extract_mentions(text) {
            if !doc.contains(mention.kind, &mention.name) {
                issues.push(ValidationIssue::DanglingMention {
                    owner_kind,
                    owner: owner.clone(),
                    kind: mention.kind,
                    name: mention.name,
                });
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Prompt, Tool};
    use uuid::Uuid;

    fn make_doc() -> WorkflowDocument {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "test");
        let mut triage = Agent::named("Triage");
        triage.instructions = "Use [@tool:lookup](#mention) and [@prompt:tone](#mention).".into();
        doc.agents = vec![triage, Agent::named("Billing")];
        doc.tools = vec![Tool::named("lookup")];
        doc.prompts = vec![Prompt::named("tone")];
        doc.start_agent = "Triage".into();
        doc
    }

    #[test]
    fn consistent_document_has_no_issues() {
        assert!(validate_document(&make_doc()).is_empty());
    }

    #[test]
    fn empty_document_is_valid() {
        let doc = WorkflowDocument::new(Uuid::new_v4(), "empty");
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn duplicate_names_are_reported_per_kind() {
        let mut doc = make_doc();
        doc.agents.push(Agent::named("Billing"));
        // Same name as an agent, different kind: allowed.
        doc.prompts.push(Prompt::named("Billing"));

        assert_eq!(
            validate_document(&doc),
            vec![ValidationIssue::DuplicateName { kind: EntityKind::Agent, name: "Billing".into() }]
        );
    }

    #[test]
    fn start_agent_must_resolve() {
        let mut doc = make_doc();
        doc.start_agent = "Ghost".into();
        assert_eq!(validate_document(&doc), vec![ValidationIssue::UnknownStartAgent("Ghost".into())]);

        doc.start_agent.clear();
        assert_eq!(validate_document(&doc), vec![ValidationIssue::MissingStartAgent]);
    }

    #[test]
    fn dangling_mentions_are_reported() {
        let mut doc = make_doc();
        doc.prompts[0].prompt = "Escalate to [@agent:Manager](#mention).".into();

        assert!(matches!(
            validate_document(&doc).as_slice(),
            [ValidationIssue::DanglingMention { owner_kind: EntityKind::Prompt, kind: EntityKind::Agent, name, .. }]
                if name == "Manager"
        ));
    }
}
