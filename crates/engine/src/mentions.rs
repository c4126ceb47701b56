//! Mentions embedded in free-text fields, and the rename rewriter.
//!
//! A mention of entity `name` of kind `kind` is the literal token
//! `[@kind:name](#mention)`.  Mentions live in agent `instructions` and
//! prompt `prompt` text; tool descriptions are never scanned.  They are not
//! foreign keys, so renames rewrite them textually.

use crate::delta::DeltaOp;
use crate::models::{Entity, EntityKind, WorkflowDocument};

const MENTION_OPEN: &str = "[@";
const MENTION_CLOSE: &str = "](#mention)";

/// A mention parsed out of free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub kind: EntityKind,
    pub name: String,
}

/// The exact token that mentions `name`.
pub fn mention_token(kind: EntityKind, name: &str) -> String {
    format!("{MENTION_OPEN}{kind}:{name}{MENTION_CLOSE}")
}

/// Replace every mention of `old` with a mention of `new`.
///
/// Returns `None` when `text` has no such mention.
pub fn replace_mention(text: &str, kind: EntityKind, old: &str, new: &str) -> Option<String> {
    let from = mention_token(kind, old);
    if !text.contains(&from) {
        return None;
    }
    Some(text.replace(&from, &mention_token(kind, new)))
}

/// Every well-formed mention in `text`, in order of appearance.
pub fn extract_mentions(text: &str) -> Vec<Mention> {
    let mut found = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MENTION_OPEN) {
        let body = &rest[start + MENTION_OPEN.len()..];
        let Some(end) = body.find(MENTION_CLOSE) else {
            break;
        };
        let inner = &body[..end];
        if let Some((kind, name)) = inner.split_once(':') {
            if let Ok(kind) = kind.parse::<EntityKind>() {
                found.push(Mention { kind, name: name.to_string() });
            }
        }
        rest = &body[end + MENTION_CLOSE.len()..];
    }

    found
}

/// The `SetEntity` ops that rewrite mentions of `old` into mentions of `new`
/// across agent instructions and prompt text.
///
/// The reducer applies these inside the same transaction as the rename so a
/// single undo reverts both.
pub fn rewrite_ops(doc: &WorkflowDocument, kind: EntityKind, old: &str, new: &str) -> Vec<DeltaOp> {
    let mut ops = Vec::new();

    for (index, agent) in doc.agents.iter().enumerate() {
        if let Some(instructions) = replace_mention(&agent.instructions, kind, old, new) {
            let mut agent = agent.clone();
            agent.instructions = instructions;
            ops.push(DeltaOp::SetEntity { index, entity: Entity::Agent(agent) });
        }
    }

    for (index, prompt) in doc.prompts.iter().enumerate() {
        if let Some(text) = replace_mention(&prompt.prompt, kind, old, new) {
            let mut prompt = prompt.clone();
            prompt.prompt = text;
            ops.push(DeltaOp::SetEntity { index, entity: Entity::Prompt(prompt) });
        }
    }

    ops
}

/// Copy of `doc` with every mention of `old` rewritten to `new`.
pub fn rewrite_mentions(doc: &WorkflowDocument, kind: EntityKind, old: &str, new: &str) -> WorkflowDocument {
    let mut rewritten = doc.clone();
    for op in rewrite_ops(doc, kind, old, new) {
        // Indices come from `doc` itself, so every op fits.
        let _ = op.apply(&mut rewritten);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Prompt, Tool};
    use uuid::Uuid;

    fn doc() -> WorkflowDocument {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "wf");
        let mut triage = Agent::named("Triage");
        triage.instructions = format!(
            "Hand off to {} then {} again.",
            mention_token(EntityKind::Agent, "Billing"),
            mention_token(EntityKind::Agent, "Billing"),
        );
        let mut billing = Agent::named("Billing");
        billing.instructions = "Use [@tool:lookup](#mention).".into();
        doc.agents = vec![triage, billing];

        let mut style = Prompt::named("style");
        style.prompt = "Billing is [@agent:Billing](#mention); BillingX is not.".into();
        doc.prompts = vec![style];

        let mut tool = Tool::named("lookup");
        tool.description = "[@agent:Billing](#mention)".into();
        doc.tools = vec![tool];
        doc
    }

    #[test]
    fn token_has_the_mention_shape() {
        assert_eq!(mention_token(EntityKind::Prompt, "style"), "[@prompt:style](#mention)");
    }

    #[test]
    fn rewrite_replaces_every_occurrence_in_agents_and_prompts() {
        let rewritten = rewrite_mentions(&doc(), EntityKind::Agent, "Billing", "Payments");

        assert_eq!(
            rewritten.agents[0].instructions,
            "Hand off to [@agent:Payments](#mention) then [@agent:Payments](#mention) again."
        );
        assert_eq!(
            rewritten.prompts[0].prompt,
            "Billing is [@agent:Payments](#mention); BillingX is not."
        );
    }

    #[test]
    fn rewrite_leaves_tool_descriptions_and_other_kinds_alone() {
        let before = doc();
        let rewritten = rewrite_mentions(&before, EntityKind::Agent, "Billing", "Payments");
        assert_eq!(rewritten.tools, before.tools);
        assert_eq!(rewritten.agents[1], before.agents[1]);
    }

    #[test]
    fn rewrite_does_not_touch_prefix_matches() {
        let mut d = doc();
        d.prompts[0].prompt = "[@agent:BillingX](#mention)".into();
        assert!(rewrite_ops(&d, EntityKind::Agent, "Billing", "Payments")
            .iter()
            .all(|op| !matches!(op, DeltaOp::SetEntity { entity: Entity::Prompt(_), .. })));
    }

    #[test]
    fn extract_finds_well_formed_mentions_only() {
        let text = "a [@agent:One](#mention) b [@widget:x](#mention) c [@tool:two words](#mention) [@prompt:open";
        assert_eq!(
            extract_mentions(text),
            vec![
                Mention { kind: EntityKind::Agent, name: "One".into() },
                Mention { kind: EntityKind::Tool, name: "two words".into() },
            ]
        );
    }
}
