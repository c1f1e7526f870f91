use web_sys::KeyboardEvent;

use lemma_editor_core::KeyEvent;

/// Convert a DOM keyboard event into the core representation.
pub fn key_event_from_dom(evt: &KeyboardEvent) -> KeyEvent {
    KeyEvent {
        key: evt.key().into(),
        code: evt.key_code(),
        ctrl: evt.ctrl_key(),
        meta: evt.meta_key(),
        alt: evt.alt_key(),
        shift: evt.shift_key(),
    }
}
