//! MathQuill bindings and the [`WidgetFactory`] built on them.
//!
//! MathQuill reports through a `handlers` object given at construction:
//! `moveOutOf` and `deleteOutOf` with a direction (-1 left, +1 right), `edit`
//! after every content change and `enter` on Enter. Keystrokes are
//! intercepted by replacing its `substituteKeyboardEvents` hook, which lets
//! the core look at every key before MathQuill's own handling.

use std::rc::Rc;

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::KeyboardEvent;

use lemma_editor_core::{
    BridgeError, EmbeddedWidget, ExitDirection, HostElement, KeystrokeOutcome, WidgetFactory,
    WidgetHandlers,
};

use crate::host::BrowserHost;
use crate::js_error_message;
use crate::keys::key_event_from_dom;

/// MathQuill interface version this crate is written against.
const INTERFACE_VERSION: u32 = 2;

#[wasm_bindgen]
extern "C" {
    /// The object returned by `MathQuill.getInterface`.
    pub type MathQuillInterface;

    #[wasm_bindgen(catch, js_namespace = MathQuill, js_name = getInterface)]
    fn get_interface(version: u32) -> Result<MathQuillInterface, JsValue>;

    #[wasm_bindgen(catch, method, structural, js_name = MathField)]
    fn math_field(
        this: &MathQuillInterface,
        element: &web_sys::HtmlElement,
        config: &Object,
    ) -> Result<MathField, JsValue>;

    #[wasm_bindgen(js_namespace = MathQuill, js_name = saneKeyboardEvents)]
    fn sane_keyboard_events(textarea: &JsValue, handlers: &JsValue) -> JsValue;

    /// An editable MathQuill field.
    pub type MathField;

    #[wasm_bindgen(method, structural, js_name = latex)]
    fn latex(this: &MathField) -> String;

    #[wasm_bindgen(method, structural, js_name = latex)]
    fn set_latex(this: &MathField, latex: &str);

    #[wasm_bindgen(method, structural)]
    fn focus(this: &MathField);

    #[wasm_bindgen(method, structural)]
    fn reflow(this: &MathField);

    #[wasm_bindgen(method, structural, js_name = moveToLeftEnd)]
    fn move_to_left_end(this: &MathField);

    #[wasm_bindgen(method, structural, js_name = moveToRightEnd)]
    fn move_to_right_end(this: &MathField);
}

pub struct MathQuillFactory {
    interface: MathQuillInterface,
}

impl MathQuillFactory {
    /// Fails with [`BridgeError::Widget`] when MathQuill is not loaded.
    pub fn new() -> Result<Self, BridgeError> {
        let interface = get_interface(INTERFACE_VERSION)
            .map_err(|err| BridgeError::Widget(js_error_message(&err)))?;
        Ok(Self { interface })
    }
}

impl WidgetFactory for MathQuillFactory {
    fn create(
        &self,
        host: &Rc<dyn HostElement>,
        handlers: WidgetHandlers,
    ) -> Result<Rc<dyn EmbeddedWidget>, BridgeError> {
        let host = host
            .as_any()
            .downcast_ref::<BrowserHost>()
            .ok_or_else(|| BridgeError::Widget("MathQuill needs a DOM host".into()))?;

        let callbacks = Callbacks::new(handlers);
        let config = callbacks
            .config()
            .map_err(|err| BridgeError::Widget(js_error_message(&err)))?;
        let field = self
            .interface
            .math_field(host.element(), &config)
            .map_err(|err| BridgeError::Widget(js_error_message(&err)))?;
        if field.is_undefined() || field.is_null() {
            return Err(BridgeError::Widget("MathField returned nothing".into()));
        }

        tracing::trace!("MathQuill field created");
        Ok(Rc::new(MathQuillWidget {
            field,
            _callbacks: callbacks,
        }))
    }
}

/// One MathQuill field. Dropping it releases the JS callbacks.
pub struct MathQuillWidget {
    field: MathField,
    _callbacks: Callbacks,
}

impl EmbeddedWidget for MathQuillWidget {
    fn serialize(&self) -> String {
        self.field.latex()
    }

    fn set_content(&self, content: &str) {
        self.field.set_latex(content);
    }

    fn focus(&self) {
        self.field.focus();
    }

    fn reflow(&self) {
        self.field.reflow();
    }

    fn move_cursor_to_start(&self) {
        self.field.move_to_left_end();
    }

    fn move_cursor_to_end(&self) {
        self.field.move_to_right_end();
    }
}

type SubstituteFn = dyn FnMut(JsValue, JsValue) -> Result<JsValue, JsValue>;

/// JS closures handed to MathQuill, kept alive as long as the field.
struct Callbacks {
    move_out: Closure<dyn FnMut(i32)>,
    delete_out: Closure<dyn FnMut(i32)>,
    edit: Closure<dyn FnMut()>,
    enter: Closure<dyn FnMut()>,
    substitute: Closure<SubstituteFn>,
}

impl Callbacks {
    fn new(handlers: WidgetHandlers) -> Self {
        let handlers = Rc::new(handlers);

        let exit = |handlers: Rc<WidgetHandlers>| {
            Closure::<dyn FnMut(i32)>::new(move |dir: i32| match ExitDirection::from_sign(dir) {
                ExitDirection::Start => (handlers.exit_start)(),
                ExitDirection::End => (handlers.exit_end)(),
            })
        };

        let changed = handlers.clone();
        let commit = handlers.clone();
        let keys = handlers.clone();
        Self {
            move_out: exit(handlers.clone()),
            delete_out: exit(handlers),
            edit: Closure::new(move || (changed.content_changed)()),
            enter: Closure::new(move || (commit.commit)()),
            substitute: Closure::<SubstituteFn>::new(move |textarea: JsValue, base: JsValue| {
                wrap_keyboard_events(keys.clone(), &textarea, &base)
            }),
        }
    }

    fn config(&self) -> Result<Object, JsValue> {
        let handlers = Object::new();
        Reflect::set(&handlers, &"moveOutOf".into(), self.move_out.as_ref())?;
        Reflect::set(&handlers, &"deleteOutOf".into(), self.delete_out.as_ref())?;
        Reflect::set(&handlers, &"edit".into(), self.edit.as_ref())?;
        Reflect::set(&handlers, &"enter".into(), self.enter.as_ref())?;

        let config = Object::new();
        Reflect::set(&config, &"handlers".into(), &handlers)?;
        Reflect::set(
            &config,
            &"substituteKeyboardEvents".into(),
            self.substitute.as_ref(),
        )?;
        Ok(config)
    }
}

/// Put the core keystroke handler in front of MathQuill's own.
fn wrap_keyboard_events(
    handlers: Rc<WidgetHandlers>,
    textarea: &JsValue,
    base: &JsValue,
) -> Result<JsValue, JsValue> {
    let default_keystroke: Function = Reflect::get(base, &"keystroke".into())?.dyn_into()?;
    let wrapped = Object::assign(&Object::new(), base.unchecked_ref());
    let this = wrapped.clone();

    let keystroke = Closure::<dyn FnMut(JsValue, KeyboardEvent) -> Result<(), JsValue>>::new(
        move |name: JsValue, evt: KeyboardEvent| {
            match (handlers.keystroke)(&key_event_from_dom(&evt)) {
                KeystrokeOutcome::Forward => {
                    default_keystroke.call2(&this, &name, &evt)?;
                }
                KeystrokeOutcome::Handled { prevent_default } => {
                    if prevent_default {
                        evt.prevent_default();
                    }
                }
            }
            Ok(())
        },
    );
    // Lives as long as MathQuill's textarea keeps the handler object.
    Reflect::set(&wrapped, &"keystroke".into(), &keystroke.into_js_value())?;
    Ok(sane_keyboard_events(textarea, &wrapped))
}
