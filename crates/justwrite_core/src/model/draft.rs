//! Draft domain model.
//!
//! # Responsibility
//! - Define the single in-progress document edited by the session.
//! - Provide small helpers used by autosave and commit flows.
//!
//! # Invariants
//! - An empty `notebook_id` means "no notebook selected".
//! - A cleared draft keeps its notebook selection.

use serde::{Deserialize, Serialize};

/// Identifier of a notebook, unique within the notebook root.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NotebookId = String;

/// The single current unsaved text plus the selected notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Free text as typed by the user.
    pub text: String,
    /// Selected notebook; empty when nothing is selected.
    #[serde(rename = "notebook")]
    pub notebook_id: NotebookId,
}

impl Draft {
    pub fn new(text: impl Into<String>, notebook_id: impl Into<NotebookId>) -> Self {
        Self {
            text: text.into(),
            notebook_id: notebook_id.into(),
        }
    }

    /// Returns `true` when neither text nor selection is set.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.notebook_id.is_empty()
    }

    /// Returns a copy with the text removed and the selection preserved.
    pub fn cleared(&self) -> Self {
        Self {
            text: String::new(),
            notebook_id: self.notebook_id.clone(),
        }
    }
}
