//! Cursor boundary tracking for embedded widgets.
//!
//! Remembers from which side the selection last approached a widget, so that
//! when the widget is node-selected its internal caret can be placed at the
//! matching edge.

use std::cell::Cell;

use crate::state::Selection;

/// Edge of a widget the caret should enter at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorEdge {
    Start,
    End,
}

/// Edge implied by a selection relative to a widget spanning
/// `pos..pos + size`, or `None` when the selection overlaps the widget.
pub fn boundary_edge(pos: usize, size: usize, selection: &Selection) -> Option<CursorEdge> {
    let (from, to) = (selection.from(), selection.to());
    if from < pos + size && pos < to {
        return None;
    }
    Some(if pos < from {
        CursorEdge::End
    } else {
        CursorEdge::Start
    })
}

#[derive(Debug, Default)]
pub struct CursorBoundaryTracker {
    edge: Cell<Option<CursorEdge>>,
}

impl CursorBoundaryTracker {
    /// Record the edge for a committed selection. Overlapping selections leave
    /// the stored edge untouched.
    pub fn observe(&self, pos: usize, size: usize, selection: &Selection) {
        if let Some(edge) = boundary_edge(pos, size, selection) {
            if self.edge.get() != Some(edge) {
                tracing::trace!(pos, ?edge, "cursor boundary changed");
            }
            self.edge.set(Some(edge));
        }
    }

    pub fn edge(&self) -> Option<CursorEdge> {
        self.edge.get()
    }
}
