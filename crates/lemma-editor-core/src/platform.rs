//! Platform abstraction traits for embedded widgets.
//!
//! These traits define the interface between the synchronization logic and
//! the host that actually renders widgets (browser DOM, native UI, test
//! fakes). Everything here is single-threaded and uses interior mutability,
//! the same way DOM handles behave.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::BridgeError;
use crate::keys::{KeyEvent, KeystrokeOutcome};

/// Error type for platform operations.
#[derive(Debug, Clone)]
pub struct PlatformError(pub String);

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PlatformError {}

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        PlatformError(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        PlatformError(s)
    }
}

/// A rendered element that hosts one embedded widget.
pub trait HostElement {
    /// Install, or with `None` remove, the "gained focus" listener.
    fn set_focus_listener(&self, listener: Option<Box<dyn Fn()>>);

    /// Detach the element from wherever it was rendered.
    fn remove(&self);

    /// For platform widget factories that need the concrete element.
    fn as_any(&self) -> &dyn Any;
}

/// Creates host elements for widgets.
pub trait RenderHost {
    /// Allocate a host element carrying `class`.
    ///
    /// Must fail with [`BridgeError::MissingTarget`] when there is nowhere to
    /// render into.
    fn create_host(&self, class: &str) -> Result<Rc<dyn HostElement>, BridgeError>;
}

/// Opaque id of a scheduled frame task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i64);

/// One-shot tasks run before the next layout pass.
pub trait FrameScheduler {
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> Result<FrameHandle, PlatformError>;

    /// Cancel a task that has not run yet. Cancelling a finished task is a no-op.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// The embedded widget contract.
pub trait EmbeddedWidget {
    /// Current content in its serialized text form.
    fn serialize(&self) -> String;

    /// Replace the widget's content. Implementations may report the change
    /// back through `content_changed`.
    fn set_content(&self, content: &str);

    fn focus(&self);

    fn reflow(&self);

    fn move_cursor_to_start(&self);

    fn move_cursor_to_end(&self);
}

/// Callbacks a widget reports into. They hold non-owning references back to
/// the bridge and become no-ops once it is gone.
pub struct WidgetHandlers {
    /// The internal cursor would leave the widget through its start.
    pub exit_start: Box<dyn Fn()>,
    /// The internal cursor would leave the widget through its end.
    pub exit_end: Box<dyn Fn()>,
    pub content_changed: Box<dyn Fn()>,
    /// In-widget "accept" action.
    pub commit: Box<dyn Fn()>,
    /// Runs before the widget's own keystroke handling.
    pub keystroke: Box<dyn Fn(&KeyEvent) -> KeystrokeOutcome>,
}

impl fmt::Debug for WidgetHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHandlers").finish_non_exhaustive()
    }
}

/// Instantiates embedded widgets inside host elements.
pub trait WidgetFactory {
    fn create(
        &self,
        host: &Rc<dyn HostElement>,
        handlers: WidgetHandlers,
    ) -> Result<Rc<dyn EmbeddedWidget>, BridgeError>;
}

/// Everything a surface needs to render widgets on one platform.
#[derive(Clone)]
pub struct Platform {
    pub hosts: Rc<dyn RenderHost>,
    pub widgets: Rc<dyn WidgetFactory>,
    pub frames: Rc<dyn FrameScheduler>,
    /// Selects `Mod` = Cmd and drops the `Mod-y` redo binding.
    pub mac: bool,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").field("mac", &self.mac).finish_non_exhaustive()
    }
}
