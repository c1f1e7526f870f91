//! Immutable document tree: nodes, marks, fragments and slices.
//!
//! Positions follow the usual structured-document convention. A text node
//! occupies one position per `char`, a leaf node occupies one position, and
//! every other node occupies its content size plus one position for each of
//! its opening and closing boundaries. Document positions are measured from
//! the start of the root node's content.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::DocError;

/// Node type tags known to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Doc,
    Paragraph,
    Lemma,
    Proof,
    Heading,
    HorizontalRule,
    Text,
    Image,
    HardBreak,
    /// Inline math widget. Its content is exactly its serialized text.
    Math,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Paragraph => "paragraph",
            Self::Lemma => "lemma",
            Self::Proof => "proof",
            Self::Heading => "heading",
            Self::HorizontalRule => "horizontal_rule",
            Self::Text => "text",
            Self::Image => "image",
            Self::HardBreak => "hard_break",
            Self::Math => "math",
        }
    }

    pub fn is_block(self) -> bool {
        matches!(
            self,
            Self::Paragraph | Self::Lemma | Self::Proof | Self::Heading | Self::HorizontalRule
        )
    }

    pub fn is_inline(self) -> bool {
        matches!(self, Self::Text | Self::Image | Self::HardBreak | Self::Math)
    }

    /// Leaf nodes have no content and occupy a single position.
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::HorizontalRule | Self::Image | Self::HardBreak)
    }

    pub fn is_textblock(self) -> bool {
        matches!(
            self,
            Self::Paragraph | Self::Lemma | Self::Proof | Self::Heading
        )
    }

    /// Content rule: which children this type accepts.
    pub fn allows(self, child: NodeType) -> bool {
        match self {
            Self::Doc => child.is_block(),
            Self::Paragraph | Self::Lemma | Self::Proof | Self::Heading => child.is_inline(),
            Self::Math => child == Self::Text,
            _ => false,
        }
    }
}

/// Per-type attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attrs {
    #[default]
    None,
    Heading {
        level: u8,
    },
    Image {
        src: SmolStr,
        alt: Option<SmolStr>,
        title: Option<SmolStr>,
    },
}

/// Inline formatting marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Link {
        href: SmolStr,
        title: Option<SmolStr>,
    },
    Em,
    Strong,
}

impl Mark {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Link { .. } => "link",
            Self::Em => "em",
            Self::Strong => "strong",
        }
    }
}

/// Ordered, immutable list of child nodes.
///
/// Adjacent text nodes with identical marks are merged and empty text nodes
/// dropped on construction, so equal documents compare equal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment(Arc<Vec<Node>>);

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(text) = node.text_str() {
                if text.is_empty() {
                    continue;
                }
                if let Some(last) = out.last_mut() {
                    if let Some(prev) = last.text_str() {
                        if last.marks == node.marks {
                            let merged = format!("{prev}{text}");
                            *last = Node::text_with_marks(merged, node.marks.clone());
                            continue;
                        }
                    }
                }
            }
            out.push(node);
        }
        Self(Arc::new(out))
    }

    /// Sum of the children's sizes.
    pub fn size(&self) -> usize {
        self.0.iter().map(Node::node_size).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.0.as_ref().clone()
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A piece of document content with open boundaries, as produced by
/// copy or paste.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {
    pub content: Fragment,
    /// Depth of open nodes at the start of the slice.
    pub open_start: usize,
    /// Depth of open nodes at the end of the slice.
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    /// Build a slice from plain text: one paragraph open at both ends, with
    /// line breaks turned into hard breaks.
    pub fn from_text(text: &str) -> Self {
        let mut inline = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                inline.push(Node::hard_break());
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                inline.push(Node::text(line));
            }
        }
        Self::new(Fragment::from_vec(vec![Node::paragraph(inline)]), 1, 1)
    }
}

/// An immutable document tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    node_type: NodeType,
    attrs: Attrs,
    content: Fragment,
    text: Option<SmolStr>,
    marks: Vec<Mark>,
}

/// Result of [`Node::replace`].
#[derive(Debug, Clone, PartialEq)]
pub struct Replaced {
    /// The rebuilt tree.
    pub node: Node,
    /// Nodes that were cut out of the replaced range.
    pub removed: Vec<Node>,
}

impl Node {
    /// Build a non-text node.
    pub fn new(node_type: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        Self {
            node_type,
            attrs,
            content: Fragment::from_vec(content),
            text: None,
            marks: Vec::new(),
        }
    }

    pub fn text(text: impl Into<SmolStr>) -> Self {
        Self::text_with_marks(text, Vec::new())
    }

    pub fn text_with_marks(text: impl Into<SmolStr>, marks: Vec<Mark>) -> Self {
        Self {
            node_type: NodeType::Text,
            attrs: Attrs::None,
            content: Fragment::empty(),
            text: Some(text.into()),
            marks,
        }
    }

    pub fn doc(blocks: Vec<Node>) -> Self {
        Self::new(NodeType::Doc, Attrs::None, blocks)
    }

    pub fn paragraph(inline: Vec<Node>) -> Self {
        Self::new(NodeType::Paragraph, Attrs::None, inline)
    }

    pub fn lemma(inline: Vec<Node>) -> Self {
        Self::new(NodeType::Lemma, Attrs::None, inline)
    }

    pub fn proof(inline: Vec<Node>) -> Self {
        Self::new(NodeType::Proof, Attrs::None, inline)
    }

    pub fn heading(level: u8, inline: Vec<Node>) -> Self {
        Self::new(NodeType::Heading, Attrs::Heading { level }, inline)
    }

    pub fn horizontal_rule() -> Self {
        Self::new(NodeType::HorizontalRule, Attrs::None, Vec::new())
    }

    pub fn hard_break() -> Self {
        Self::new(NodeType::HardBreak, Attrs::None, Vec::new())
    }

    pub fn image(src: impl Into<SmolStr>) -> Self {
        Self::new(
            NodeType::Image,
            Attrs::Image {
                src: src.into(),
                alt: None,
                title: None,
            },
            Vec::new(),
        )
    }

    /// Math widget node holding `source` as its only text child.
    /// An empty source yields a node with no children.
    pub fn math(source: &str) -> Self {
        Self::math_from(if source.is_empty() {
            None
        } else {
            Some(Node::text(source))
        })
    }

    /// Math widget node around an existing text node (marks included).
    pub fn math_from(content: Option<Node>) -> Self {
        Self::new(NodeType::Math, Attrs::None, content.into_iter().collect())
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_slice()
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    /// Text of a text node, `None` for every other node.
    pub fn text_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type.is_leaf()
    }

    pub fn is_inline(&self) -> bool {
        self.node_type.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.node_type.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.node_type.is_textblock()
    }

    /// Whether positions exist inside this node.
    fn has_content(&self) -> bool {
        !self.is_text() && !self.is_leaf()
    }

    /// Number of positions this node occupies in its parent.
    pub fn node_size(&self) -> usize {
        match &self.text {
            Some(text) => text.chars().count(),
            None if self.is_leaf() => 1,
            None => self.content.size() + 2,
        }
    }

    pub fn content_size(&self) -> usize {
        self.content.size()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.to_string(),
            None => self.content.iter().map(Node::text_content).collect(),
        }
    }

    /// Cut a text node to the char range `from..to`. Non-text nodes are
    /// returned unchanged.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.text {
            Some(text) => {
                let cut: String = text.chars().skip(from).take(to.saturating_sub(from)).collect();
                Node::text_with_marks(cut, self.marks.clone())
            }
            None => self.clone(),
        }
    }

    /// Same type, attributes and marks around new content.
    pub fn copy(&self, content: Vec<Node>) -> Node {
        if self.is_text() {
            return self.clone();
        }
        Node {
            node_type: self.node_type,
            attrs: self.attrs.clone(),
            content: Fragment::from_vec(content),
            text: None,
            marks: self.marks.clone(),
        }
    }

    /// Find the innermost node whose content contains `pos`, returning it with
    /// the position where its content starts.
    fn parent_at(&self, start: usize, pos: usize) -> (&Node, usize) {
        let mut offset = start;
        for child in self.children() {
            let end = offset + child.node_size();
            if child.has_content() && offset < pos && pos < end {
                return child.parent_at(offset + 1, pos);
            }
            offset = end;
        }
        (self, start)
    }

    /// Node starting exactly at `pos`.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        if pos > self.content_size() {
            return None;
        }
        let (parent, start) = self.parent_at(0, pos);
        let mut offset = start;
        for child in parent.children() {
            if offset == pos {
                return Some(child);
            }
            offset += child.node_size();
            if offset > pos {
                break;
            }
        }
        None
    }

    /// Node directly before `pos` in its parent. Text nodes are cut at `pos`.
    pub fn node_before(&self, pos: usize) -> Option<Node> {
        if pos > self.content_size() {
            return None;
        }
        let (parent, start) = self.parent_at(0, pos);
        let target = pos - start;
        let mut offset = 0;
        for child in parent.children() {
            let end = offset + child.node_size();
            if end == target {
                return Some(child.clone());
            }
            if child.is_text() && offset < target && target < end {
                return Some(child.cut(0, target - offset));
            }
            if end > target {
                break;
            }
            offset = end;
        }
        None
    }

    /// Node directly after `pos` in its parent. Text nodes are cut at `pos`.
    pub fn node_after(&self, pos: usize) -> Option<Node> {
        if pos > self.content_size() {
            return None;
        }
        let (parent, start) = self.parent_at(0, pos);
        let target = pos - start;
        let mut offset = 0;
        for child in parent.children() {
            let size = child.node_size();
            if offset == target {
                return Some(child.clone());
            }
            if child.is_text() && offset < target && target < offset + size {
                return Some(child.cut(target - offset, size));
            }
            offset += size;
            if offset > target {
                break;
            }
        }
        None
    }

    /// Text of all text nodes overlapping `from..to`, concatenated.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        self.collect_text(0, from, to, &mut out);
        out
    }

    fn collect_text(&self, start: usize, from: usize, to: usize, out: &mut String) {
        let mut offset = start;
        for child in self.children() {
            let size = child.node_size();
            let end = offset + size;
            if end > from && offset < to {
                if let Some(text) = child.text_str() {
                    let skip = from.saturating_sub(offset);
                    let take = (to - offset).min(size) - skip;
                    out.extend(text.chars().skip(skip).take(take));
                } else if child.has_content() {
                    child.collect_text(offset + 1, from, to, out);
                }
            }
            offset = end;
        }
    }

    /// Visit every descendant with its absolute position, pre-order.
    /// Returning `false` from `f` skips that node's children.
    pub fn descendants(&self, mut f: impl FnMut(&Node, usize) -> bool) {
        self.visit(0, &mut f);
    }

    fn visit(&self, start: usize, f: &mut dyn FnMut(&Node, usize) -> bool) {
        let mut offset = start;
        for child in self.children() {
            if f(child, offset) && child.has_content() {
                child.visit(offset + 1, f);
            }
            offset += child.node_size();
        }
    }

    /// Replace the range `from..to` with `insert`.
    ///
    /// Both ends of the range must lie in the same parent node; text nodes
    /// are split as needed. Returns the rebuilt tree and the removed nodes.
    /// A document is never left without blocks.
    pub fn replace(&self, from: usize, to: usize, insert: &[Node]) -> Result<Replaced, DocError> {
        if from > to {
            return Err(DocError::InvalidRange { from, to });
        }
        let size = self.content_size();
        if to > size {
            return Err(DocError::OutOfRange { pos: to, size });
        }
        let replaced = self.replace_inner(0, from, to, insert)?;
        if self.node_type == NodeType::Doc && replaced.node.child_count() == 0 {
            return Err(DocError::EmptyDocument);
        }
        Ok(replaced)
    }

    /// Plain-text rendering: blocks on separate lines, hard breaks as
    /// newlines, and math wrapped in `delimiter` on both sides.
    pub fn to_text(&self, delimiter: char) -> String {
        let mut out = String::new();
        self.write_text(delimiter, &mut out);
        out
    }

    fn write_text(&self, delimiter: char, out: &mut String) {
        match self.node_type {
            NodeType::Text => out.push_str(self.text_str().unwrap_or_default()),
            NodeType::Math => {
                out.push(delimiter);
                out.push_str(&self.text_content());
                out.push(delimiter);
            }
            NodeType::HardBreak => out.push('\n'),
            NodeType::Doc => {
                for (i, block) in self.children().iter().enumerate() {
                    if i > 0 {
                        out.push('\n');
                    }
                    block.write_text(delimiter, out);
                }
            }
            _ => {
                for child in self.children() {
                    child.write_text(delimiter, out);
                }
            }
        }
    }

    fn replace_inner(
        &self,
        start: usize,
        from: usize,
        to: usize,
        insert: &[Node],
    ) -> Result<Replaced, DocError> {
        let mut offset = start;
        for (index, child) in self.children().iter().enumerate() {
            let end = offset + child.node_size();
            if child.has_content() && offset < from && to < end {
                let inner = child.replace_inner(offset + 1, from, to, insert)?;
                let mut children = self.content.to_vec();
                children[index] = inner.node;
                return Ok(Replaced {
                    node: self.copy(children),
                    removed: inner.removed,
                });
            }
            offset = end;
        }

        for node in insert {
            if !self.node_type.allows(node.node_type) {
                return Err(DocError::InvalidContent {
                    parent: self.node_type.name(),
                    child: node.node_type.name(),
                });
            }
        }

        let mut before = Vec::new();
        let mut removed = Vec::new();
        let mut after = Vec::new();
        let mut offset = start;
        for child in self.children() {
            let size = child.node_size();
            let end = offset + size;
            if end <= from {
                before.push(child.clone());
            } else if offset >= to {
                after.push(child.clone());
            } else if child.is_text() {
                let a = from.saturating_sub(offset);
                let b = (to - offset).min(size);
                if a > 0 {
                    before.push(child.cut(0, a));
                }
                if b > a {
                    removed.push(child.cut(a, b));
                }
                if b < size {
                    after.push(child.cut(b, size));
                }
            } else if offset < from || end > to {
                return Err(DocError::Straddles { from, to });
            } else {
                removed.push(child.clone());
            }
            offset = end;
        }

        let mut children = before;
        children.extend(insert.iter().cloned());
        children.extend(after);
        Ok(Replaced {
            node: self.copy(children),
            removed: Fragment::from_vec(removed).to_vec(),
        })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.text {
            let mut out = format!("\"{text}\"");
            for mark in self.marks.iter().rev() {
                out = format!("{}({out})", mark.name());
            }
            return f.write_str(&out);
        }
        f.write_str(self.node_type.name())?;
        if self.is_leaf() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, child) in self.children().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}
