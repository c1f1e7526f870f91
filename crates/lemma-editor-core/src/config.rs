//! Editor configuration.

use serde::{Deserialize, Serialize};

/// Tunables for an editing surface. Every field has a default, so partial
/// JSON objects are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of undo entries kept.
    pub history_depth: usize,
    /// Edits closer together than this are undone as one step. Zero disables
    /// grouping.
    pub history_group_ms: u64,
    /// CSS class of the element hosting each math widget.
    pub widget_class: String,
    /// Key that wraps the selection in a math node, and the delimiter
    /// recognized in pasted text.
    pub math_delimiter: char,
    /// Pull focus back to the surface after changes made while it was blurred,
    /// unless a math node is selected.
    pub refocus_on_change: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            history_group_ms: 500,
            widget_class: "mq-node".to_string(),
            math_delimiter: '$',
            refocus_on_change: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
