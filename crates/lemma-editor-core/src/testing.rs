//! Recording fakes for the platform traits.
//!
//! Enabled for unit tests and, through the `testing` feature, for downstream
//! integration tests. Fakes never hold a borrow while calling back into the
//! code under test.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::BridgeError;
use crate::keys::{KeyEvent, KeystrokeOutcome};
use crate::platform::{
    EmbeddedWidget, FrameHandle, FrameScheduler, HostElement, Platform, PlatformError,
    RenderHost, WidgetFactory, WidgetHandlers,
};
use crate::tracker::CursorEdge;

pub struct FakeHost {
    class: String,
    listener: RefCell<Option<Rc<dyn Fn()>>>,
    removed: Cell<bool>,
}

impl FakeHost {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub fn has_focus_listener(&self) -> bool {
        self.listener.borrow().is_some()
    }

    /// Simulate the element gaining focus. Returns whether a listener ran.
    pub fn fire_focus_in(&self) -> bool {
        let listener = self.listener.borrow().clone();
        match listener {
            Some(listener) => {
                listener();
                true
            }
            None => false,
        }
    }
}

impl HostElement for FakeHost {
    fn set_focus_listener(&self, listener: Option<Box<dyn Fn()>>) {
        *self.listener.borrow_mut() = listener.map(Rc::from);
    }

    fn remove(&self) {
        self.removed.set(true);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct FakeRenderHost {
    missing: Cell<bool>,
    created: RefCell<Vec<Rc<FakeHost>>>,
}

impl FakeRenderHost {
    /// Make every following `create_host` fail as if the target were absent.
    pub fn set_missing(&self, missing: bool) {
        self.missing.set(missing);
    }

    pub fn created(&self) -> Vec<Rc<FakeHost>> {
        self.created.borrow().clone()
    }
}

impl RenderHost for FakeRenderHost {
    fn create_host(&self, class: &str) -> Result<Rc<dyn HostElement>, BridgeError> {
        if self.missing.get() {
            return Err(BridgeError::MissingTarget(format!("no container for .{class}")));
        }
        let host = Rc::new(FakeHost {
            class: class.to_string(),
            listener: RefCell::new(None),
            removed: Cell::new(false),
        });
        self.created.borrow_mut().push(host.clone());
        Ok(host)
    }
}

pub struct FakeWidget {
    host: Rc<dyn HostElement>,
    handlers: WidgetHandlers,
    content: RefCell<String>,
    echo_edits: bool,
    cursor: Cell<Option<CursorEdge>>,
    set_content_calls: Cell<usize>,
    focus_count: Cell<usize>,
    reflow_count: Cell<usize>,
}

impl FakeWidget {
    pub fn content(&self) -> String {
        self.content.borrow().clone()
    }

    /// Edge the internal cursor was last moved to.
    pub fn cursor(&self) -> Option<CursorEdge> {
        self.cursor.get()
    }

    pub fn set_content_calls(&self) -> usize {
        self.set_content_calls.get()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.get()
    }

    pub fn reflow_count(&self) -> usize {
        self.reflow_count.get()
    }

    /// Replace the content as the user would, then report the change.
    pub fn edit(&self, content: &str) {
        *self.content.borrow_mut() = content.to_string();
        (self.handlers.content_changed)();
    }

    pub fn press(&self, event: &KeyEvent) -> KeystrokeOutcome {
        (self.handlers.keystroke)(event)
    }

    pub fn exit_start(&self) {
        (self.handlers.exit_start)();
    }

    pub fn exit_end(&self) {
        (self.handlers.exit_end)();
    }

    pub fn commit(&self) {
        (self.handlers.commit)();
    }

    /// Fire focus-in on the widget's host element.
    pub fn fire_focus_in(&self) -> bool {
        self.host
            .as_any()
            .downcast_ref::<FakeHost>()
            .is_some_and(FakeHost::fire_focus_in)
    }
}

impl EmbeddedWidget for FakeWidget {
    fn serialize(&self) -> String {
        self.content()
    }

    fn set_content(&self, content: &str) {
        *self.content.borrow_mut() = content.to_string();
        self.set_content_calls.set(self.set_content_calls.get() + 1);
        if self.echo_edits {
            (self.handlers.content_changed)();
        }
    }

    /// Like a DOM element, focusing the widget fires focus-in on its host.
    fn focus(&self) {
        self.focus_count.set(self.focus_count.get() + 1);
        self.fire_focus_in();
    }

    fn reflow(&self) {
        self.reflow_count.set(self.reflow_count.get() + 1);
    }

    fn move_cursor_to_start(&self) {
        self.cursor.set(Some(CursorEdge::Start));
    }

    fn move_cursor_to_end(&self) {
        self.cursor.set(Some(CursorEdge::End));
    }
}

#[derive(Default)]
pub struct FakeWidgetFactory {
    fail: Cell<bool>,
    echo_edits: Cell<bool>,
    created: RefCell<Vec<Rc<FakeWidget>>>,
}

impl FakeWidgetFactory {
    pub fn set_fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    /// Widgets created from now on report `set_content` as a content change.
    pub fn set_echo_edits(&self, echo: bool) {
        self.echo_edits.set(echo);
    }

    pub fn created(&self) -> Vec<Rc<FakeWidget>> {
        self.created.borrow().clone()
    }

    pub fn last(&self) -> Option<Rc<FakeWidget>> {
        self.created.borrow().last().cloned()
    }
}

impl WidgetFactory for FakeWidgetFactory {
    fn create(
        &self,
        host: &Rc<dyn HostElement>,
        handlers: WidgetHandlers,
    ) -> Result<Rc<dyn EmbeddedWidget>, BridgeError> {
        if self.fail.get() {
            return Err(BridgeError::Widget("fake widget refused".into()));
        }
        let widget = Rc::new(FakeWidget {
            host: host.clone(),
            handlers,
            content: RefCell::new(String::new()),
            echo_edits: self.echo_edits.get(),
            cursor: Cell::new(None),
            set_content_calls: Cell::new(0),
            focus_count: Cell::new(0),
            reflow_count: Cell::new(0),
        });
        self.created.borrow_mut().push(widget.clone());
        Ok(widget)
    }
}

/// Frame queue that only runs when told to.
#[derive(Default)]
pub struct FakeFrames {
    next: Cell<i64>,
    queue: RefCell<Vec<(FrameHandle, Box<dyn FnOnce()>)>>,
    cancelled: RefCell<Vec<FrameHandle>>,
    fail: Cell<bool>,
}

impl FakeFrames {
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn cancelled(&self) -> Vec<FrameHandle> {
        self.cancelled.borrow().clone()
    }

    /// Make later frame requests fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    /// Run every queued task, as the next animation frame would.
    pub fn run_pending(&self) {
        let tasks = std::mem::take(&mut *self.queue.borrow_mut());
        for (_, task) in tasks {
            task();
        }
    }
}

impl FrameScheduler for FakeFrames {
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> Result<FrameHandle, PlatformError> {
        if self.fail.get() {
            return Err(PlatformError::from("frames unavailable"));
        }
        let handle = FrameHandle(self.next.get());
        self.next.set(handle.0 + 1);
        self.queue.borrow_mut().push((handle, task));
        Ok(handle)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != handle);
        self.cancelled.borrow_mut().push(handle);
    }
}

/// A full set of fakes plus the `Platform` wired to them.
#[derive(Default)]
pub struct Fakes {
    pub hosts: Rc<FakeRenderHost>,
    pub widgets: Rc<FakeWidgetFactory>,
    pub frames: Rc<FakeFrames>,
    pub mac: bool,
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(&self) -> Platform {
        Platform {
            hosts: self.hosts.clone(),
            widgets: self.widgets.clone(),
            frames: self.frames.clone(),
            mac: self.mac,
        }
    }
}
