//! Editor commands and the built-in editing commands.
//!
//! A command inspects the current state and, when it applies, hands one
//! transaction to `dispatch` and returns `true`. Returning `false` means the
//! command did not apply and nothing was dispatched.

use crate::error::DocError;
use crate::state::{EditorState, Selection, Transaction};

pub trait Command {
    fn run(&self, state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool;
}

impl<F> Command for F
where
    F: Fn(&EditorState, &mut dyn FnMut(Transaction)) -> bool,
{
    fn run(&self, state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
        self(state, dispatch)
    }
}

/// Runs commands in order until one applies.
pub struct Chain(Vec<Box<dyn Command>>);

impl Chain {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Self {
        Self(commands)
    }
}

impl Command for Chain {
    fn run(&self, state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
        self.0.iter().any(|command| command.run(state, &mut *dispatch))
    }
}

/// Dispatch a built transaction, or log why it could not be built.
fn commit(
    built: Result<Transaction, DocError>,
    dispatch: &mut dyn FnMut(Transaction),
    command: &'static str,
) -> bool {
    match built {
        Ok(tr) => {
            dispatch(tr);
            true
        }
        Err(err) => {
            tracing::debug!(%err, command, "command did not apply");
            false
        }
    }
}

fn delete_range(state: &EditorState, from: usize, to: usize) -> Result<Transaction, DocError> {
    let mut tr = state.tr();
    tr.delete(from, to)?;
    Ok(tr)
}

fn delete_selected(state: &EditorState) -> Result<Transaction, DocError> {
    let mut tr = state.tr();
    tr.delete_selection()?;
    Ok(tr)
}

/// Delete the selection, or the inline unit before a collapsed caret.
pub fn delete_backward(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    let selection = state.selection();
    if !selection.is_empty() {
        return delete_selection(state, dispatch);
    }
    let pos = selection.from();
    let Some(before) = state.doc().node_before(pos) else {
        return false;
    };
    let size = if before.is_text() { 1 } else { before.node_size() };
    commit(delete_range(state, pos - size, pos), dispatch, "delete_backward")
}

/// Delete the selection, or the inline unit after a collapsed caret.
pub fn delete_forward(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    let selection = state.selection();
    if !selection.is_empty() {
        return delete_selection(state, dispatch);
    }
    let pos = selection.from();
    let Some(after) = state.doc().node_after(pos) else {
        return false;
    };
    let size = if after.is_text() { 1 } else { after.node_size() };
    commit(delete_range(state, pos, pos + size), dispatch, "delete_forward")
}

pub fn delete_selection(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    if state.selection().is_empty() {
        return false;
    }
    commit(delete_selected(state), dispatch, "delete_selection")
}

pub fn select_all(state: &EditorState, dispatch: &mut dyn FnMut(Transaction)) -> bool {
    let mut tr = state.tr();
    tr.set_selection(Selection::text(0, state.doc().content_size()));
    dispatch(tr);
    true
}
