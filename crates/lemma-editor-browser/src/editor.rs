//! LemmaEditor - the editor handle exposed to JavaScript.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::KeyboardEvent;

use lemma_editor_core::{EditorConfig, EditorState, EditorView, Node, PasteTransformer};

use crate::host::query_selector;
use crate::keys::key_event_from_dom;
use crate::platform::browser_platform;

/// One paragraph per line, with delimited math spans turned into math nodes.
///
/// Inverse of [`Node::to_text`] for documents made of paragraphs.
pub fn doc_from_text(text: &str, transformer: &PasteTransformer) -> Node {
    let blocks = text
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let inline = if line.is_empty() {
                Vec::new()
            } else {
                transformer.transform_node(&Node::text(line))
            };
            Node::paragraph(inline)
        })
        .collect();
    Node::doc(blocks)
}

#[wasm_bindgen]
pub struct LemmaEditor {
    view: Rc<EditorView>,
}

#[wasm_bindgen]
impl LemmaEditor {
    /// Mount an editor whose widgets render into the element matching
    /// `selector`. `config` is optional JSON in the `EditorConfig` shape.
    #[wasm_bindgen(constructor)]
    pub fn new(selector: &str, text: &str, config: Option<String>) -> Result<LemmaEditor, JsError> {
        let config = match config {
            Some(json) => EditorConfig::from_json(&json)?,
            None => EditorConfig::default(),
        };
        let transformer = PasteTransformer::math(config.math_delimiter)
            .map_err(|err| JsError::new(&format!("invalid math delimiter: {err}")))?;
        let platform = browser_platform(query_selector(selector)?)?;
        let state = EditorState::create(doc_from_text(text, &transformer));

        tracing::info!(selector, "mounting lemma editor");
        Ok(Self {
            view: EditorView::new(state, config, platform),
        })
    }

    /// Route a keydown. Returns whether the editor handled it, in which case
    /// the default action has been prevented.
    #[wasm_bindgen(js_name = handleKeydown)]
    pub fn handle_keydown(&self, evt: &KeyboardEvent) -> bool {
        let handled = self.view.handle_key(&key_event_from_dom(evt));
        if handled {
            evt.prevent_default();
        }
        handled
    }

    #[wasm_bindgen(js_name = handleKeyup)]
    pub fn handle_keyup(&self, evt: &KeyboardEvent) {
        self.view.handle_key_up(&key_event_from_dom(evt));
    }

    /// Paste plain text over the selection.
    #[wasm_bindgen(js_name = pasteText)]
    pub fn paste_text(&self, text: &str) -> bool {
        self.view.paste_text(text)
    }

    pub fn undo(&self) -> bool {
        self.view.undo()
    }

    pub fn redo(&self) -> bool {
        self.view.redo()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.view.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.view.can_redo()
    }

    pub fn focus(&self) {
        self.view.focus();
    }

    pub fn blur(&self) {
        self.view.blur();
    }

    /// Plain text of the whole document.
    #[wasm_bindgen(js_name = textContent)]
    pub fn text_content(&self) -> String {
        self.view.state().doc().text_content()
    }

    /// Document as text with math wrapped in the configured delimiter.
    #[wasm_bindgen(js_name = toText)]
    pub fn to_text(&self) -> String {
        self.view
            .state()
            .doc()
            .to_text(self.view.config().math_delimiter)
    }

    /// Debug rendering of the document tree.
    #[wasm_bindgen(js_name = toString)]
    pub fn to_debug_string(&self) -> String {
        self.view.state().doc().to_string()
    }

    /// Number of mounted math widgets.
    #[wasm_bindgen(js_name = widgetCount)]
    pub fn widget_count(&self) -> usize {
        self.view.mounted_positions().len()
    }

    pub fn destroy(&self) {
        self.view.destroy();
    }
}

impl LemmaEditor {
    pub fn view(&self) -> &Rc<EditorView> {
        &self.view
    }
}
