//! Replace steps and position mapping.

use crate::error::DocError;
use crate::model::Node;

/// Replace `from..to` with `content`. Once applied, `removed` holds the nodes
/// that were cut out, which makes the step invertible.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub from: usize,
    pub to: usize,
    pub content: Vec<Node>,
    pub removed: Vec<Node>,
}

impl Step {
    /// Whether the step only inserts and removes text.
    pub fn is_text_only(&self) -> bool {
        self.content.iter().chain(&self.removed).all(Node::is_text)
    }

    pub fn replace(from: usize, to: usize, content: Vec<Node>) -> Self {
        Self {
            from,
            to,
            content,
            removed: Vec::new(),
        }
    }

    pub fn inserted_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Apply to `doc`, recording the removed nodes on the returned step.
    pub fn apply(mut self, doc: &Node) -> Result<(Node, Step), DocError> {
        let replaced = doc.replace(self.from, self.to, &self.content)?;
        self.removed = replaced.removed;
        Ok((replaced.node, self))
    }

    /// The step that undoes this one, valid on the document this step produced.
    pub fn invert(&self) -> Step {
        Step {
            from: self.from,
            to: self.from + self.inserted_size(),
            content: self.removed.clone(),
            removed: self.content.clone(),
        }
    }

    pub fn map(&self) -> StepMap {
        StepMap {
            pos: self.from,
            old_size: self.to - self.from,
            new_size: self.inserted_size(),
        }
    }
}

/// Which side a mapped position sticks to when content is inserted at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// Result of mapping one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The content on the associated side of the position was deleted.
    pub deleted: bool,
}

/// Position mapping for a single replaced range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    pub pos: usize,
    pub old_size: usize,
    pub new_size: usize,
}

impl StepMap {
    pub fn map(&self, pos: usize, assoc: Assoc) -> MapResult {
        let end = self.pos + self.old_size;
        if pos < self.pos {
            return MapResult {
                pos,
                deleted: false,
            };
        }
        if pos > end {
            return MapResult {
                pos: pos - self.old_size + self.new_size,
                deleted: false,
            };
        }
        let mapped = match assoc {
            Assoc::Before => self.pos,
            Assoc::After => self.pos + self.new_size,
        };
        let deleted = self.old_size > 0
            && match assoc {
                Assoc::Before => pos > self.pos,
                Assoc::After => pos < end,
            };
        MapResult {
            pos: mapped,
            deleted,
        }
    }
}

/// A sequence of step maps, applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut result = MapResult {
            pos,
            deleted: false,
        };
        for map in &self.maps {
            let next = map.map(result.pos, assoc);
            result = MapResult {
                pos: next.pos,
                deleted: result.deleted || next.deleted,
            };
        }
        result
    }
}
