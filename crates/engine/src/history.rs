//! The Action Log: a linear, truncatable list of [`EditStep`]s plus a cursor.
//!
//! Steps below `current_index` are applied; steps at or above it can be
//! redone.  Steps are never edited in place.

use serde::{Deserialize, Serialize};

use crate::delta::{apply_all, EditStep};
use crate::error::DeltaError;
use crate::models::WorkflowDocument;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLog {
    steps: Vec<EditStep>,
    current_index: usize,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[EditStep] {
        &self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_index < self.steps.len()
    }

    /// Append `step`, discarding every redoable step first.
    pub fn push(&mut self, step: EditStep) {
        self.steps.truncate(self.current_index);
        self.steps.push(step);
        self.current_index = self.steps.len();
    }

    /// The step an undo would reverse.
    pub fn undo_step(&self) -> Option<&EditStep> {
        self.current_index.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// The step a redo would re-apply.
    pub fn redo_step(&self) -> Option<&EditStep> {
        self.steps.get(self.current_index)
    }

    /// Move the cursor back after the undo step was applied.
    pub fn step_back(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    /// Move the cursor forward after the redo step was applied.
    pub fn step_forward(&mut self) {
        self.current_index = (self.current_index + 1).min(self.steps.len());
    }

    /// Rebuild the current snapshot as `base ⊕ steps[0..current_index)`.
    pub fn reconstruct(&self, base: &WorkflowDocument) -> Result<WorkflowDocument, DeltaError> {
        let mut doc = base.clone();
        for step in &self.steps[..self.current_index] {
            apply_all(&step.forward, &mut doc)?;
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaOp;

    fn step(name: &str) -> EditStep {
        EditStep {
            forward: vec![DeltaOp::SetStartAgent { name: name.into() }],
            inverse: vec![DeltaOp::SetStartAgent { name: String::new() }],
        }
    }

    #[test]
    fn push_after_undo_truncates_redoable_steps() {
        let mut log = ActionLog::new();
        log.push(step("a"));
        log.push(step("b"));
        log.push(step("c"));
        log.step_back();
        log.step_back();
        assert_eq!(log.current_index(), 1);
        assert!(log.can_redo());

        log.push(step("d"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.current_index(), 2);
        assert!(!log.can_redo());
        assert_eq!(log.undo_step(), Some(&step("d")));
    }

    #[test]
    fn cursor_stays_within_bounds() {
        let mut log = ActionLog::new();
        assert!(log.undo_step().is_none());
        log.step_back();
        assert_eq!(log.current_index(), 0);

        log.push(step("a"));
        log.step_forward();
        assert_eq!(log.current_index(), 1);
        assert!(log.redo_step().is_none());
    }
}
