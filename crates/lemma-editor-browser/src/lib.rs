//! Browser layer for the lemma editor.
//!
//! Implements the platform traits from `lemma-editor-core` on top of the DOM
//! and MathQuill, and exposes a small editor handle to JavaScript. It assumes
//! a `wasm32-unknown-unknown` target environment with MathQuill loaded as the
//! global `MathQuill`.
//!
//! # Architecture
//!
//! - `host`: `<span>` hosts for widgets and their focus-in listeners
//! - `frame`: `requestAnimationFrame` scheduling
//! - `mathquill`: MathQuill bindings and the widget factory
//! - `keys`: DOM keyboard events to core `KeyEvent`s
//! - `platform`: assembles a core `Platform` for the current page
//! - `editor`: `LemmaEditor`, the JavaScript-facing handle
//! - `logging`: tracing and panic hook setup
//!
//! # Re-exports
//!
//! This crate re-exports `lemma-editor-core` for convenience, so consumers
//! only need to depend on `lemma-editor-browser`.

pub use lemma_editor_core;
pub use lemma_editor_core::*;

pub mod editor;
pub mod frame;
pub mod host;
pub mod keys;
pub mod logging;
pub mod mathquill;
pub mod platform;

pub use editor::{LemmaEditor, doc_from_text};
pub use frame::BrowserFrameScheduler;
pub use host::{BrowserHost, BrowserRenderHost, query_selector};
pub use keys::key_event_from_dom;
pub use logging::init_logging;
pub use mathquill::{MathQuillFactory, MathQuillWidget};
pub use platform::{browser_platform, is_mac};

use wasm_bindgen::{JsCast, JsValue};

/// Best-effort message for a thrown JS value.
pub(crate) fn js_error_message(value: &JsValue) -> String {
    if let Some(message) = value.as_string() {
        return message;
    }
    match value.dyn_ref::<js_sys::Error>() {
        Some(error) => error.message().into(),
        None => format!("{value:?}"),
    }
}
