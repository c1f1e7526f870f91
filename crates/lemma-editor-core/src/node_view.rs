//! Custom node views and the static table choosing them per node type.

use std::rc::Rc;

use crate::bridge::WidgetBridge;
use crate::error::BridgeError;
use crate::model::{Node, NodeType};
use crate::view::EditorView;

/// Current document position of a mounted node. The surface keeps it up to
/// date across edits.
pub type PositionLookup = Rc<dyn Fn() -> usize>;

/// A node rendered by custom code instead of the default renderer.
pub trait NodeView {
    /// Refresh in place for `node`. Returning `false` makes the surface
    /// destroy this view and build a new one.
    fn update(&self, node: &Node) -> bool;

    /// The view's node became the selected node.
    fn select_node(&self);

    /// Whether native events inside the view are handled by the view itself.
    fn stop_event(&self) -> bool {
        false
    }

    /// Whether DOM mutations inside the view are the view's own business.
    fn ignore_mutation(&self) -> bool {
        false
    }

    fn destroy(&self);
}

pub type NodeViewConstructor =
    fn(&Node, &Rc<EditorView>, PositionLookup) -> Result<Rc<dyn NodeView>, BridgeError>;

/// Constructor for node types that get a custom view, `None` for the rest.
pub fn node_view_constructor(node_type: NodeType) -> Option<NodeViewConstructor> {
    match node_type {
        NodeType::Math => Some(mount_math),
        _ => None,
    }
}

fn mount_math(
    node: &Node,
    surface: &Rc<EditorView>,
    position: PositionLookup,
) -> Result<Rc<dyn NodeView>, BridgeError> {
    let registry = surface.state().registry().clone();
    let bridge = WidgetBridge::new(node, surface, position, &registry)?;
    Ok(Rc::new(bridge))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_math_has_a_view() {
        assert!(node_view_constructor(NodeType::Math).is_some());
        for other in [
            NodeType::Doc,
            NodeType::Paragraph,
            NodeType::Text,
            NodeType::Image,
            NodeType::HardBreak,
        ] {
            assert!(node_view_constructor(other).is_none(), "{}", other.name());
        }
    }
}
