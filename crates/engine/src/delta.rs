//! Structural deltas over a [`WorkflowDocument`].
//!
//! Every edit is recorded as a list of [`DeltaOp`]s.  Applying an op returns
//! the op that reverses it, so forward and inverse lists are captured in the
//! same pass and never computed by diffing snapshots.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::error::DeltaError;
use crate::models::{Entity, EntityKind, WorkflowDocument};

/// One reversible change to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeltaOp {
    /// Rename the workflow itself.
    SetWorkflowName { name: String },
    /// Point `startAgent` at `name`.
    SetStartAgent { name: String },
    /// Overwrite the entity at `index` of its collection.
    SetEntity { index: usize, entity: Entity },
    /// Insert `entity` at `index` of its collection.
    InsertAt { index: usize, entity: Entity },
    /// Remove the entity of `kind` at `index`.
    RemoveAt { kind: EntityKind, index: usize },
    /// Move the entity of `kind` at `from` so it ends up at `to`.
    Reorder { kind: EntityKind, from: usize, to: usize },
}

impl DeltaOp {
    /// Apply this op to `doc` and return its inverse.
    ///
    /// # Errors
    /// [`DeltaError::OutOfRange`] if an index does not exist in `doc`; the
    /// document is left untouched in that case.
    pub fn apply(&self, doc: &mut WorkflowDocument) -> Result<DeltaOp, DeltaError> {
        match self {
            Self::SetWorkflowName { name } => {
                let previous = mem::replace(&mut doc.name, name.clone());
                Ok(Self::SetWorkflowName { name: previous })
            }
            Self::SetStartAgent { name } => {
                let previous = mem::replace(&mut doc.start_agent, name.clone());
                Ok(Self::SetStartAgent { name: previous })
            }
            Self::SetEntity { index, entity } => {
                let previous = match entity {
                    Entity::Agent(a) => Entity::Agent(set_at(&mut doc.agents, EntityKind::Agent, *index, a.clone())?),
                    Entity::Tool(t) => Entity::Tool(set_at(&mut doc.tools, EntityKind::Tool, *index, t.clone())?),
                    Entity::Prompt(p) => Entity::Prompt(set_at(&mut doc.prompts, EntityKind::Prompt, *index, p.clone())?),
                };
                Ok(Self::SetEntity { index: *index, entity: previous })
            }
            Self::InsertAt { index, entity } => {
                match entity {
                    Entity::Agent(a) => insert_at(&mut doc.agents, EntityKind::Agent, *index, a.clone())?,
                    Entity::Tool(t) => insert_at(&mut doc.tools, EntityKind::Tool, *index, t.clone())?,
                    Entity::Prompt(p) => insert_at(&mut doc.prompts, EntityKind::Prompt, *index, p.clone())?,
                }
                Ok(Self::RemoveAt { kind: entity.kind(), index: *index })
            }
            Self::RemoveAt { kind, index } => {
                let removed = match kind {
                    EntityKind::Agent => Entity::Agent(remove_at(&mut doc.agents, *kind, *index)?),
                    EntityKind::Tool => Entity::Tool(remove_at(&mut doc.tools, *kind, *index)?),
                    EntityKind::Prompt => Entity::Prompt(remove_at(&mut doc.prompts, *kind, *index)?),
                };
                Ok(Self::InsertAt { index: *index, entity: removed })
            }
            Self::Reorder { kind, from, to } => {
                match kind {
                    EntityKind::Agent => reorder(&mut doc.agents, *kind, *from, *to)?,
                    EntityKind::Tool => reorder(&mut doc.tools, *kind, *from, *to)?,
                    EntityKind::Prompt => reorder(&mut doc.prompts, *kind, *from, *to)?,
                }
                Ok(Self::Reorder { kind: *kind, from: *to, to: *from })
            }
        }
    }
}

/// Apply `ops` in order and return their inverses in undo order.
///
/// On error `doc` may be partially modified; callers work on a copy.
pub fn apply_all(ops: &[DeltaOp], doc: &mut WorkflowDocument) -> Result<Vec<DeltaOp>, DeltaError> {
    let mut inverse = Vec::with_capacity(ops.len());
    for op in ops {
        inverse.push(op.apply(doc)?);
    }
    inverse.reverse();
    Ok(inverse)
}

// ---------------------------------------------------------------------------
// EditStep
// ---------------------------------------------------------------------------

/// The forward/inverse pair captured for one reducer transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditStep {
    pub forward: Vec<DeltaOp>,
    pub inverse: Vec<DeltaOp>,
}

// ---------------------------------------------------------------------------
// Vec helpers
// ---------------------------------------------------------------------------

fn out_of_range(kind: EntityKind, index: usize, len: usize) -> DeltaError {
    DeltaError::OutOfRange { kind, index, len }
}

fn set_at<T>(items: &mut [T], kind: EntityKind, index: usize, value: T) -> Result<T, DeltaError> {
    let len = items.len();
    let slot = items.get_mut(index).ok_or_else(|| out_of_range(kind, index, len))?;
    Ok(mem::replace(slot, value))
}

fn insert_at<T>(items: &mut Vec<T>, kind: EntityKind, index: usize, value: T) -> Result<(), DeltaError> {
    if index > items.len() {
        return Err(out_of_range(kind, index, items.len()));
    }
    items.insert(index, value);
    Ok(())
}

fn remove_at<T>(items: &mut Vec<T>, kind: EntityKind, index: usize) -> Result<T, DeltaError> {
    if index >= items.len() {
        return Err(out_of_range(kind, index, items.len()));
    }
    Ok(items.remove(index))
}

fn reorder<T>(items: &mut Vec<T>, kind: EntityKind, from: usize, to: usize) -> Result<(), DeltaError> {
    let len = items.len();
    if from >= len {
        return Err(out_of_range(kind, from, len));
    }
    if to >= len {
        return Err(out_of_range(kind, to, len));
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Prompt, Tool};
    use uuid::Uuid;

    fn doc() -> WorkflowDocument {
        let mut doc = WorkflowDocument::new(Uuid::new_v4(), "wf");
        doc.agents = vec![Agent::named("a"), Agent::named("b"), Agent::named("c")];
        doc.tools = vec![Tool::named("t")];
        doc.start_agent = "a".into();
        doc
    }

    #[test]
    fn each_op_is_reversed_by_its_inverse() {
        let ops = vec![
            DeltaOp::SetWorkflowName { name: "renamed".into() },
            DeltaOp::SetStartAgent { name: "b".into() },
            DeltaOp::SetEntity { index: 0, entity: Entity::Tool(Tool::named("t2")) },
            DeltaOp::InsertAt { index: 0, entity: Entity::Prompt(Prompt::named("p")) },
            DeltaOp::RemoveAt { kind: EntityKind::Agent, index: 1 },
            DeltaOp::Reorder { kind: EntityKind::Agent, from: 0, to: 1 },
        ];

        for op in ops {
            let before = doc();
            let mut edited = before.clone();
            let inverse = op.apply(&mut edited).expect("op should apply");
            assert_ne!(edited, before, "{op:?} should change the document");
            inverse.apply(&mut edited).expect("inverse should apply");
            assert_eq!(edited, before, "{op:?} was not reversed");
        }
    }

    #[test]
    fn reorder_moves_item_to_target_position() {
        let mut d = doc();
        DeltaOp::Reorder { kind: EntityKind::Agent, from: 0, to: 2 }
            .apply(&mut d)
            .unwrap();
        assert_eq!(d.names(EntityKind::Agent), vec!["b", "c", "a"]);
    }

    #[test]
    fn apply_all_returns_inverses_in_undo_order() {
        let before = doc();
        let mut d = before.clone();
        let forward = vec![
            DeltaOp::InsertAt { index: 3, entity: Entity::Agent(Agent::named("d")) },
            DeltaOp::SetStartAgent { name: "d".into() },
            DeltaOp::RemoveAt { kind: EntityKind::Agent, index: 0 },
        ];

        let inverse = apply_all(&forward, &mut d).unwrap();
        assert_eq!(d.names(EntityKind::Agent), vec!["b", "c", "d"]);

        apply_all(&inverse, &mut d).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn out_of_range_leaves_document_untouched() {
        let before = doc();
        let mut d = before.clone();
        let err = DeltaOp::RemoveAt { kind: EntityKind::Prompt, index: 0 }
            .apply(&mut d)
            .unwrap_err();
        assert_eq!(err, DeltaError::OutOfRange { kind: EntityKind::Prompt, index: 0, len: 0 });
        assert_eq!(d, before);
    }

    #[test]
    fn ops_serialize_with_an_op_tag() {
        let op = DeltaOp::RemoveAt { kind: EntityKind::Tool, index: 2 };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value, serde_json::json!({ "op": "remove_at", "kind": "tool", "index": 2 }));
    }
}
