//! `requestAnimationFrame` backed [`FrameScheduler`].

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

use lemma_editor_core::{FrameHandle, FrameScheduler, PlatformError};

use crate::js_error_message;

pub struct BrowserFrameScheduler {
    window: Window,
}

impl BrowserFrameScheduler {
    pub fn new() -> Result<Self, PlatformError> {
        let window = web_sys::window().ok_or("no window")?;
        Ok(Self { window })
    }
}

impl FrameScheduler for BrowserFrameScheduler {
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> Result<FrameHandle, PlatformError> {
        // The JS function owns the closure and frees it once called or collected.
        let callback = Closure::once_into_js(move || task());
        let id = self
            .window
            .request_animation_frame(callback.unchecked_ref())
            .map_err(|err| PlatformError(js_error_message(&err)))?;
        Ok(FrameHandle(i64::from(id)))
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let Ok(id) = i32::try_from(handle.0) else {
            tracing::warn!(handle = handle.0, "frame handle out of range");
            return;
        };
        if let Err(err) = self.window.cancel_animation_frame(id) {
            tracing::warn!(error = %js_error_message(&err), "cancelAnimationFrame failed");
        }
    }
}
