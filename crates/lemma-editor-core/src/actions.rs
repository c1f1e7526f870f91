//! Math editing commands bound in the default keymap.

use std::fmt;
use std::rc::Rc;

use crate::commands::Command;
use crate::error::DocError;
use crate::model::{Node, NodeType};
use crate::state::{EditorState, Selection, Transaction};

/// Wrap the current selection's text in a new math node and node-select it.
///
/// Always reports the key as handled. `on_done` runs after dispatch.
#[derive(Clone, Default)]
pub struct InsertMath {
    pub on_done: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for InsertMath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertMath")
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}

impl InsertMath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: impl Fn() + 'static) -> Self {
        Self {
            on_done: Some(Rc::new(callback)),
        }
    }

    fn build(state: &EditorState) -> Result<Transaction, DocError> {
        let selection = state.selection();
        let source = state.doc().text_between(selection.from(), selection.to());

        let mut tr = state.tr();
        tr.delete_selection()?;
        let at = tr.selection().from();
        tr.insert(at, Node::math(&source))?;
        let selected = Selection::node(tr.doc(), at)?;
        tr.set_selection(selected);
        Ok(tr)
    }
}

impl Command for InsertMath {
    fn run(&self, state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
        match Self::build(state) {
            Ok(tr) => {
                tracing::debug!(pos = state.selection().from(), "inserting math node");
                dispatch(tr);
            }
            Err(err) => tracing::warn!(%err, "cannot insert math node here"),
        }
        if let Some(callback) = &self.on_done {
            callback();
        }
        true
    }
}

/// Backspace right after a math node selects the node instead of deleting.
pub fn math_backspace(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    let selection = state.selection();
    if !selection.is_empty() {
        return false;
    }
    let pos = selection.from();
    match state.doc().node_before(pos) {
        Some(node) if node.node_type() == NodeType::Math => {
            select_node(state, pos - node.node_size(), dispatch)
        }
        _ => false,
    }
}

/// Delete right before a math node selects the node instead of deleting.
pub fn math_delete(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    let selection = state.selection();
    if !selection.is_empty() {
        return false;
    }
    let pos = selection.from();
    match state.doc().node_after(pos) {
        Some(node) if node.node_type() == NodeType::Math => select_node(state, pos, dispatch),
        _ => false,
    }
}

fn select_node(state: &EditorState, pos: usize, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    match Selection::node(state.doc(), pos) {
        Ok(selection) => {
            let mut tr = state.tr();
            tr.set_selection(selection);
            dispatch(tr);
            true
        }
        Err(err) => {
            tracing::warn!(%err, "math node vanished before selection");
            false
        }
    }
}
