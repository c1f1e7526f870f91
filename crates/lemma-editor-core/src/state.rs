//! Editor state, selections and transactions.

use std::rc::Rc;

use crate::error::DocError;
use crate::model::Node;
use crate::registry::ChangeRegistry;
use crate::transform::{Assoc, Mapping, Step};

/// Document selection.
///
/// Text selections are a half-open range between `anchor` and `head` (in
/// either order). Node selections cover exactly one node starting at `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { pos: usize, size: usize },
}

impl Selection {
    /// Collapsed text selection.
    pub fn caret(pos: usize) -> Self {
        Self::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn text(anchor: usize, head: usize) -> Self {
        Self::Text { anchor, head }
    }

    /// Select the node starting at `pos` in `doc`.
    pub fn node(doc: &Node, pos: usize) -> Result<Self, DocError> {
        match doc.node_at(pos) {
            Some(node) if !node.is_text() => Ok(Self::Node {
                pos,
                size: node.node_size(),
            }),
            _ => Err(DocError::NoNodeAt(pos)),
        }
    }

    pub fn from(&self) -> usize {
        match *self {
            Self::Text { anchor, head } => anchor.min(head),
            Self::Node { pos, .. } => pos,
        }
    }

    pub fn to(&self) -> usize {
        match *self {
            Self::Text { anchor, head } => anchor.max(head),
            Self::Node { pos, size } => pos + size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from() == self.to()
    }

    /// Start position of a node selection.
    pub fn node_pos(&self) -> Option<usize> {
        match *self {
            Self::Node { pos, .. } => Some(pos),
            Self::Text { .. } => None,
        }
    }

    /// Map through `mapping`, re-reading node sizes from `doc`. A node
    /// selection whose node was deleted collapses to a caret.
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> Self {
        match *self {
            Self::Text { anchor, head } => Self::Text {
                anchor: mapping.map(anchor, Assoc::After).pos,
                head: mapping.map(head, Assoc::After).pos,
            },
            Self::Node { pos, .. } => {
                let mapped = mapping.map(pos, Assoc::After);
                if !mapped.deleted {
                    if let Ok(selection) = Self::node(doc, mapped.pos) {
                        return selection;
                    }
                }
                Self::caret(mapped.pos.min(doc.content_size()))
            }
        }
    }
}

/// Immutable snapshot of an editor: document, selection and the change
/// registry that lives in the state's extension slot.
#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Node,
    selection: Selection,
    registry: Rc<ChangeRegistry>,
}

impl EditorState {
    /// Create a fresh state with a caret at the start of the first textblock
    /// and a new change registry.
    pub fn create(doc: Node) -> Self {
        let selection = Selection::caret(if doc.child_count() > 0 { 1 } else { 0 });
        Self::with_selection(doc, selection)
    }

    pub fn with_selection(doc: Node, selection: Selection) -> Self {
        Self {
            doc,
            selection,
            registry: ChangeRegistry::new(),
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The change registry carried by this state and all its successors.
    pub fn registry(&self) -> &Rc<ChangeRegistry> {
        &self.registry
    }

    /// Start a transaction on this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    /// The state that results from applying `tr`.
    pub fn apply(&self, tr: &Transaction) -> EditorState {
        EditorState {
            doc: tr.doc.clone(),
            selection: tr.selection,
            registry: self.registry.clone(),
        }
    }
}

/// How undo history groups an edit.
///
/// Typing edits only touch text and may merge with a preceding typing edit.
/// Structural edits (widget insertion, paste, node deletion) always start
/// their own history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Typing,
    Structural,
}

/// A set of document steps plus the resulting selection.
#[derive(Debug, Clone)]
pub struct Transaction {
    doc: Node,
    selection: Selection,
    steps: Vec<Step>,
    mapping: Mapping,
    kind: Option<EditKind>,
    add_to_history: bool,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Self {
            doc: state.doc.clone(),
            selection: state.selection,
            steps: Vec::new(),
            mapping: Mapping::default(),
            kind: None,
            add_to_history: true,
        }
    }

    /// Document after all steps so far.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Explicit kind if one was set, otherwise `Typing` when every step
    /// only inserts or removes text.
    pub fn kind(&self) -> EditKind {
        self.kind.unwrap_or_else(|| {
            if self.steps.iter().all(Step::is_text_only) {
                EditKind::Typing
            } else {
                EditKind::Structural
            }
        })
    }

    pub fn set_kind(&mut self, kind: EditKind) -> &mut Self {
        self.kind = Some(kind);
        self
    }

    pub fn add_to_history(&self) -> bool {
        self.add_to_history
    }

    pub fn set_add_to_history(&mut self, add: bool) -> &mut Self {
        self.add_to_history = add;
        self
    }

    /// Apply a step, mapping the selection through it.
    pub fn step(&mut self, step: Step) -> Result<&mut Self, DocError> {
        let (doc, applied) = step.apply(&self.doc)?;
        let mut single = Mapping::default();
        single.push(applied.map());
        self.mapping.push(applied.map());
        self.selection = self.selection.map(&single, &doc);
        self.doc = doc;
        self.steps.push(applied);
        Ok(self)
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        content: Vec<Node>,
    ) -> Result<&mut Self, DocError> {
        self.step(Step::replace(from, to, content))
    }

    /// Replace `from..to` with a single node, or delete it when `node` is `None`.
    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        node: Option<Node>,
    ) -> Result<&mut Self, DocError> {
        self.replace(from, to, node.into_iter().collect())
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, DocError> {
        self.replace(from, to, Vec::new())
    }

    pub fn insert(&mut self, pos: usize, node: Node) -> Result<&mut Self, DocError> {
        self.replace(pos, pos, vec![node])
    }

    /// Delete the selected range. A selection covering the whole document
    /// leaves one empty paragraph with the caret inside it.
    pub fn delete_selection(&mut self) -> Result<&mut Self, DocError> {
        let (from, to) = (self.selection.from(), self.selection.to());
        if from == to {
            return Ok(self);
        }
        if from == 0 && to == self.doc.content_size() {
            self.replace(0, to, vec![Node::paragraph(Vec::new())])?;
            return Ok(self.set_selection(Selection::caret(1)));
        }
        self.delete(from, to)
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self
    }
}
