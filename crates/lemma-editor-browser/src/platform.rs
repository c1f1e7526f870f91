//! Assembles a core [`Platform`] for the current page.

use std::rc::Rc;

use web_sys::Element;

use lemma_editor_core::{BridgeError, Platform};

use crate::frame::BrowserFrameScheduler;
use crate::host::BrowserRenderHost;
use crate::mathquill::MathQuillFactory;

/// Whether the browser runs on macOS, where `Mod` means Cmd.
pub fn is_mac() -> bool {
    web_sys::window()
        .and_then(|window| window.navigator().platform().ok())
        .is_some_and(|platform| platform.to_lowercase().contains("mac"))
}

/// Widgets render into `container`, MathQuill must already be loaded.
pub fn browser_platform(container: Element) -> Result<Platform, BridgeError> {
    Ok(Platform {
        hosts: Rc::new(BrowserRenderHost::new(container)?),
        widgets: Rc::new(MathQuillFactory::new()?),
        frames: Rc::new(BrowserFrameScheduler::new()?),
        mac: is_mac(),
    })
}
