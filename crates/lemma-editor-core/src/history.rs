//! Undo/redo history built from inverted steps.
//!
//! Every history-tracked transaction records the inverse of its steps together
//! with the selection before it. Undo and redo produce ordinary transactions,
//! so they are broadcast to widget bridges like any other edit.
//!
//! Consecutive typing edits inside the group delay share one entry. A
//! structural edit always opens a new entry and is never extended.

use std::time::Duration;

use web_time::Instant;

use crate::state::{EditKind, EditorState, Selection, Transaction};
use crate::transform::Step;

#[derive(Debug, Clone)]
struct HistoryEntry {
    /// Inverted steps, in the order they were recorded. Applied in reverse.
    inverted: Vec<Step>,
    selection_before: Selection,
    kind: EditKind,
}

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    done: Vec<HistoryEntry>,
    undone: Vec<HistoryEntry>,
    depth: usize,
    group_delay: Duration,
    last_recorded: Option<Instant>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100, Duration::from_millis(500))
    }
}

impl History {
    pub fn new(depth: usize, group_delay: Duration) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            depth,
            group_delay,
            last_recorded: None,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Record a committed transaction. Transactions that do not change the
    /// document or opt out of history are ignored.
    pub fn record(&mut self, tr: &Transaction, selection_before: Selection) {
        if !tr.doc_changed() || !tr.add_to_history() {
            return;
        }
        self.undone.clear();

        let now = Instant::now();
        let inverted: Vec<Step> = tr.steps().iter().map(Step::invert).collect();
        let kind = tr.kind();
        let recent = self
            .last_recorded
            .is_some_and(|last| now.duration_since(last) < self.group_delay);
        self.last_recorded = Some(now);

        match self.done.last_mut() {
            Some(entry) if recent && kind == EditKind::Typing && entry.kind == EditKind::Typing => {
                entry.inverted.extend(inverted)
            }
            _ => {
                self.done.push(HistoryEntry {
                    inverted,
                    selection_before,
                    kind,
                });
                if self.done.len() > self.depth {
                    self.done.remove(0);
                }
            }
        }
    }

    /// Build the transaction that undoes the most recent entry.
    pub fn undo(&mut self, state: &EditorState) -> Option<Transaction> {
        let entry = self.done.pop()?;
        let (tr, inverse) = Self::revert(state, entry)?;
        self.undone.push(inverse);
        self.last_recorded = None;
        Some(tr)
    }

    /// Build the transaction that re-applies the most recently undone entry.
    pub fn redo(&mut self, state: &EditorState) -> Option<Transaction> {
        let entry = self.undone.pop()?;
        let (tr, inverse) = Self::revert(state, entry)?;
        self.done.push(inverse);
        self.last_recorded = None;
        Some(tr)
    }

    fn revert(state: &EditorState, entry: HistoryEntry) -> Option<(Transaction, HistoryEntry)> {
        let mut tr = state.tr();
        for step in entry.inverted.iter().rev() {
            if let Err(err) = tr.step(step.clone()) {
                tracing::warn!(%err, "history entry no longer applies");
                return None;
            }
        }
        let selection = match entry.selection_before {
            Selection::Node { pos, .. } => {
                Selection::node(tr.doc(), pos).unwrap_or(Selection::caret(pos))
            }
            sel => sel,
        };
        tr.set_selection(selection);
        tr.set_add_to_history(false);

        let inverse = HistoryEntry {
            inverted: tr.steps().iter().map(Step::invert).collect(),
            selection_before: state.selection(),
            kind: entry.kind,
        };
        Some((tr, inverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn ungrouped() -> History {
        History::new(100, Duration::ZERO)
    }

    fn commit(state: &EditorState, history: &mut History, tr: Transaction) -> EditorState {
        history.record(&tr, state.selection());
        state.apply(&tr)
    }

    fn base() -> EditorState {
        EditorState::create(Node::doc(vec![Node::paragraph(vec![Node::text("ab")])]))
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut history = ungrouped();
        let s0 = base();
        let mut tr = s0.tr();
        tr.insert(2, Node::math("x")).unwrap();
        let s1 = commit(&s0, &mut history, tr);
        assert_eq!(s1.doc().text_content(), "axb");

        let undo = history.undo(&s1).unwrap();
        let s2 = s1.apply(&undo);
        assert_eq!(s2.doc(), s0.doc());
        assert_eq!(s2.selection(), s0.selection());
        assert!(!undo.add_to_history());

        let redo = history.redo(&s2).unwrap();
        let s3 = s2.apply(&redo);
        assert_eq!(s3.doc(), s1.doc());
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = ungrouped();
        let s0 = base();
        let mut tr = s0.tr();
        tr.insert(1, Node::text("q")).unwrap();
        let s1 = commit(&s0, &mut history, tr);
        let s2 = s1.apply(&history.undo(&s1).unwrap());
        assert!(history.can_redo());

        let mut tr = s2.tr();
        tr.insert(1, Node::text("z")).unwrap();
        commit(&s2, &mut history, tr);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::new(2, Duration::ZERO);
        let mut state = base();
        for _ in 0..3 {
            let mut tr = state.tr();
            tr.insert(1, Node::text("q")).unwrap();
            state = commit(&state, &mut history, tr);
        }
        let tr = history.undo(&state).unwrap();
        state = state.apply(&tr);
        assert!(history.undo(&state).is_some());
        assert!(history.undo(&state).is_none());
    }

    #[test]
    fn test_grouping_merges_quick_edits() {
        let mut history = History::new(100, Duration::from_secs(3600));
        let mut state = base();
        for (pos, text) in [(3, "x"), (4, "y")] {
            let mut tr = state.tr();
            tr.insert(pos, Node::text(text)).unwrap();
            state = commit(&state, &mut history, tr);
        }
        assert_eq!(state.doc().text_content(), "abxy");
        let undone = state.apply(&history.undo(&state).unwrap());
        assert_eq!(undone.doc().text_content(), "ab");
        assert!(!history.can_undo());
    }

    #[test]
    fn test_structural_edit_starts_its_own_entry() {
        let mut history = History::new(100, Duration::from_secs(3600));
        let s0 = base();
        let mut tr = s0.tr();
        tr.insert(3, Node::text("x")).unwrap();
        let s1 = commit(&s0, &mut history, tr);

        let mut tr = s1.tr();
        tr.insert(4, Node::math("y")).unwrap();
        let s2 = commit(&s1, &mut history, tr);

        // typing right after a widget does not fold into the widget's entry
        let mut tr = s2.tr();
        tr.insert(1, Node::text("z")).unwrap();
        let s3 = commit(&s2, &mut history, tr);
        assert_eq!(s3.doc().text_content(), "zabxy");

        let s4 = s3.apply(&history.undo(&s3).unwrap());
        assert_eq!(s4.doc(), s2.doc());
        let s5 = s4.apply(&history.undo(&s4).unwrap());
        assert_eq!(s5.doc(), s1.doc());
        let s6 = s5.apply(&history.undo(&s5).unwrap());
        assert_eq!(s6.doc(), s0.doc());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_explicit_structural_text_is_not_grouped() {
        let mut history = History::new(100, Duration::from_secs(3600));
        let s0 = base();
        let mut tr = s0.tr();
        tr.insert(3, Node::text("x")).unwrap();
        let s1 = commit(&s0, &mut history, tr);

        let mut tr = s1.tr();
        tr.insert(4, Node::text("pasted")).unwrap();
        tr.set_kind(EditKind::Structural);
        let s2 = commit(&s1, &mut history, tr);

        let s3 = s2.apply(&history.undo(&s2).unwrap());
        assert_eq!(s3.doc(), s1.doc());
        assert!(history.can_undo());
    }

    #[test]
    fn test_selection_only_transactions_are_ignored() {
        let mut history = ungrouped();
        let state = base();
        let mut tr = state.tr();
        tr.set_selection(Selection::caret(2));
        history.record(&tr, state.selection());
        assert!(!history.can_undo());
    }
}
