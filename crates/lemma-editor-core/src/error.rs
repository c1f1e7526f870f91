//! Error types for document edits and widget bridging.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors raised by the document model when an edit cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DocError {
    /// Position lies outside the document content.
    #[error("position {pos} is outside the document (content size {size})")]
    OutOfRange { pos: usize, size: usize },

    /// Replace range is inverted.
    #[error("invalid range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// Replace range starts and ends in different parent nodes.
    #[error("replace {from}..{to} straddles a node boundary")]
    Straddles { from: usize, to: usize },

    /// Inserted node is not allowed by the parent's content rule.
    #[error("{child} is not allowed inside {parent}")]
    InvalidContent {
        parent: &'static str,
        child: &'static str,
    },

    /// Node selection requested where no node starts.
    #[error("no selectable node at {0}")]
    NoNodeAt(usize),

    /// Edit would leave the document without any block.
    #[error("a document must keep at least one block")]
    EmptyDocument,
}

/// Errors raised while constructing or driving a widget bridge.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// The rendering target a widget should be mounted into does not exist.
    ///
    /// This is an integration bug, never a runtime condition to paper over.
    #[error("missing rendering target: {0}")]
    MissingTarget(String),

    /// The embedded widget library refused to instantiate.
    #[error("widget failed to initialise: {0}")]
    Widget(String),

    /// The surface the bridge belongs to has been torn down.
    #[error("editing surface is gone")]
    SurfaceGone,

    /// A document edit produced by the bridge was invalid.
    #[error(transparent)]
    Doc(#[from] DocError),

    /// Host platform failure.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
