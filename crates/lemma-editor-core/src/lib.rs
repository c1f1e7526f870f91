//! lemma-editor-core: platform-agnostic editing core with embedded math widgets.
//!
//! This crate provides:
//! - A ProseMirror-style document model, transactions and undo history
//! - `ChangeRegistry` - per-state broadcast of committed transactions
//! - `WidgetBridge` - keeps an embedded math widget in sync with its node
//! - `simple_diff`, `CursorBoundaryTracker`, `PasteTransformer`
//! - `EditorView` - the surface that commits transactions and reconciles
//!   node views
//!
//! Rendering is abstracted behind the traits in [`platform`]; the browser
//! implementation lives in `lemma-editor-browser`.

pub mod actions;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod history;
pub mod keymap;
pub mod keys;
pub mod model;
pub mod node_view;
pub mod paste;
pub mod platform;
pub mod registry;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;
pub mod transform;
pub mod view;

pub use actions::{InsertMath, math_backspace, math_delete};
pub use bridge::{ExitDirection, WidgetBridge};
pub use commands::{Chain, Command, delete_backward, delete_forward, select_all};
pub use config::EditorConfig;
pub use diff::{TextDiff, simple_diff};
pub use error::{BridgeError, DocError};
pub use history::History;
pub use keymap::{KeyAction, Keymap};
pub use keys::{KeyEvent, KeystrokeOutcome};
pub use model::{Attrs, Fragment, Mark, Node, NodeType, Slice};
pub use node_view::{NodeView, NodeViewConstructor, PositionLookup, node_view_constructor};
pub use paste::{PasteTransformer, SubString, split_on_pattern};
pub use platform::{
    EmbeddedWidget, FrameHandle, FrameScheduler, HostElement, Platform, PlatformError,
    RenderHost, WidgetFactory, WidgetHandlers,
};
pub use registry::{ChangeCallback, ChangeRegistry, Subscription};
pub use smol_str::SmolStr;
pub use state::{EditKind, EditorState, Selection, Transaction};
pub use tracker::{CursorBoundaryTracker, CursorEdge};
pub use transform::{Assoc, Mapping, Step, StepMap};
pub use view::EditorView;
