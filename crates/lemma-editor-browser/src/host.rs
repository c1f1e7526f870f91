//! DOM hosts for embedded widgets.
//!
//! Every widget gets its own `<span>` carrying the configured class, appended
//! to the editor's container element.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use lemma_editor_core::{BridgeError, HostElement, RenderHost};

use crate::js_error_message;

/// Find the element matching `selector` in the current document.
///
/// A missing element is a [`BridgeError::MissingTarget`]: the page was not set
/// up the way the editor expects.
pub fn query_selector(selector: &str) -> Result<Element, BridgeError> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| BridgeError::MissingTarget("no document".into()))?;
    match document.query_selector(selector) {
        Ok(Some(element)) => Ok(element),
        Ok(None) => Err(BridgeError::MissingTarget(selector.to_string())),
        Err(err) => Err(BridgeError::MissingTarget(format!(
            "{selector}: {}",
            js_error_message(&err)
        ))),
    }
}

pub struct BrowserRenderHost {
    document: Document,
    container: Element,
}

impl BrowserRenderHost {
    pub fn new(container: Element) -> Result<Self, BridgeError> {
        let document = container
            .owner_document()
            .ok_or_else(|| BridgeError::MissingTarget("container has no document".into()))?;
        Ok(Self {
            document,
            container,
        })
    }

    pub fn from_selector(selector: &str) -> Result<Self, BridgeError> {
        Self::new(query_selector(selector)?)
    }

    pub fn container(&self) -> &Element {
        &self.container
    }
}

impl RenderHost for BrowserRenderHost {
    fn create_host(&self, class: &str) -> Result<Rc<dyn HostElement>, BridgeError> {
        if !self.container.is_connected() {
            return Err(BridgeError::MissingTarget(
                "editor container was removed from the page".into(),
            ));
        }
        let element = self
            .document
            .create_element("span")
            .map_err(|err| BridgeError::Widget(js_error_message(&err)))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| BridgeError::Widget("created element is not an HtmlElement".into()))?;
        element.set_class_name(class);
        self.container
            .append_child(&element)
            .map_err(|err| BridgeError::MissingTarget(js_error_message(&err)))?;
        Ok(Rc::new(BrowserHost::new(element)))
    }
}

/// A `<span>` hosting one widget.
pub struct BrowserHost {
    element: HtmlElement,
    focus_in: RefCell<Option<EventListener>>,
}

impl BrowserHost {
    pub fn new(element: HtmlElement) -> Self {
        Self {
            element,
            focus_in: RefCell::new(None),
        }
    }

    pub fn element(&self) -> &HtmlElement {
        &self.element
    }
}

impl HostElement for BrowserHost {
    fn set_focus_listener(&self, listener: Option<Box<dyn Fn()>>) {
        // Dropping the old EventListener detaches it.
        let listener = listener
            .map(|listener| EventListener::new(&self.element, "focusin", move |_| listener()));
        *self.focus_in.borrow_mut() = listener;
    }

    fn remove(&self) {
        self.focus_in.borrow_mut().take();
        self.element.remove();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
