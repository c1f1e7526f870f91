//! Widget bridge: keeps one embedded math widget and its document node in sync.
//!
//! Document to widget: `update` pushes new node text into the widget with the
//! `updating` guard raised, so the widget's change notification is ignored.
//! Widget to document: content changes are diffed against the cached value
//! and dispatched as a replace inside the node's content.
//!
//! The bridge owns the widget. The widget's handlers and the host's focus
//! listener only hold weak references back to the bridge, and become no-ops
//! once it is dropped.

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use crate::diff::simple_diff;
use crate::error::BridgeError;
use crate::keys::{KeyEvent, KeystrokeOutcome};
use crate::model::Node;
use crate::node_view::{NodeView, PositionLookup};
use crate::platform::{
    EmbeddedWidget, FrameHandle, FrameScheduler, HostElement, WidgetHandlers,
};
use crate::registry::{ChangeRegistry, Subscription};
use crate::state::{EditorState, Selection, Transaction};
use crate::tracker::{CursorBoundaryTracker, CursorEdge};
use crate::view::EditorView;

/// Which side of the widget the caret leaves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDirection {
    Start,
    End,
}

impl ExitDirection {
    /// Widget libraries report direction as -1 (start) or +1 (end).
    pub fn from_sign(sign: i32) -> Self {
        if sign < 0 { Self::Start } else { Self::End }
    }
}

pub struct WidgetBridge {
    inner: Rc<BridgeInner>,
}

struct BridgeInner {
    node: RefCell<Node>,
    surface: Weak<EditorView>,
    position: PositionLookup,
    /// Last content seen on either side.
    value: RefCell<String>,
    updating: Cell<bool>,
    focusing: Cell<bool>,
    tracker: CursorBoundaryTracker,
    host: Rc<dyn HostElement>,
    widget: OnceCell<Rc<dyn EmbeddedWidget>>,
    frames: Rc<dyn FrameScheduler>,
    pending_frame: Cell<Option<FrameHandle>>,
    subscription: RefCell<Option<Subscription>>,
}

impl WidgetBridge {
    /// Mount a widget for `node`.
    ///
    /// Fails with [`BridgeError::MissingTarget`] when the platform has no
    /// rendering target, and with [`BridgeError::Widget`] when the widget
    /// library refuses to instantiate.
    pub fn new(
        node: &Node,
        surface: &Rc<EditorView>,
        position: PositionLookup,
        registry: &Rc<ChangeRegistry>,
    ) -> Result<Self, BridgeError> {
        let platform = surface.platform();
        let host = platform.hosts.create_host(&surface.config().widget_class)?;
        let content = node.text_content();

        let inner = Rc::new(BridgeInner {
            node: RefCell::new(node.clone()),
            surface: Rc::downgrade(surface),
            position,
            value: RefCell::new(content.clone()),
            updating: Cell::new(false),
            focusing: Cell::new(false),
            tracker: CursorBoundaryTracker::default(),
            host,
            widget: OnceCell::new(),
            frames: platform.frames.clone(),
            pending_frame: Cell::new(None),
            subscription: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        inner.host.set_focus_listener(Some(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                report(inner.gained_focus(), "focus");
            }
        })));

        let widget = match platform.widgets.create(&inner.host, handlers(&inner)) {
            Ok(widget) => widget,
            Err(err) => {
                inner.host.set_focus_listener(None);
                inner.host.remove();
                return Err(err);
            }
        };
        let widget = inner.widget.get_or_init(|| widget);

        inner.updating.set(true);
        widget.set_content(&content);
        inner.updating.set(false);

        if let Err(err) = inner.schedule_reflow() {
            tracing::warn!(%err, "could not schedule widget reflow");
        }

        let weak = Rc::downgrade(&inner);
        let subscription = registry.add(Rc::new(move |_: &Transaction, state: &EditorState| {
            if let Some(inner) = weak.upgrade() {
                inner.observe(state);
            }
        }));
        *inner.subscription.borrow_mut() = Some(subscription);

        tracing::debug!(pos = (inner.position)(), content = %content, "widget bridge mounted");
        Ok(Self { inner })
    }

    /// Cached widget content.
    pub fn value(&self) -> String {
        self.inner.value.borrow().clone()
    }

    pub fn node(&self) -> Node {
        self.inner.node.borrow().clone()
    }

    pub fn cursor_edge(&self) -> Option<CursorEdge> {
        self.inner.tracker.edge()
    }

    pub fn widget(&self) -> Option<&Rc<dyn EmbeddedWidget>> {
        self.inner.widget.get()
    }
}

impl NodeView for WidgetBridge {
    fn update(&self, node: &Node) -> bool {
        self.inner.update(node)
    }

    fn select_node(&self) {
        self.inner.select_node();
    }

    fn stop_event(&self) -> bool {
        true
    }

    fn ignore_mutation(&self) -> bool {
        true
    }

    fn destroy(&self) {
        self.inner.destroy();
    }
}

fn handlers(inner: &Rc<BridgeInner>) -> WidgetHandlers {
    let exit = |direction: ExitDirection| -> Box<dyn Fn()> {
        let weak = Rc::downgrade(inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                report(inner.exit(direction), "exit");
            }
        })
    };
    let changed = Rc::downgrade(inner);
    let keys = Rc::downgrade(inner);
    WidgetHandlers {
        exit_start: exit(ExitDirection::Start),
        exit_end: exit(ExitDirection::End),
        content_changed: Box::new(move || {
            if let Some(inner) = changed.upgrade() {
                report(inner.content_changed(), "content change");
            }
        }),
        commit: exit(ExitDirection::End),
        keystroke: Box::new(move |event| match keys.upgrade() {
            Some(inner) => inner.keystroke(event),
            None => KeystrokeOutcome::Forward,
        }),
    }
}

fn report(result: Result<(), BridgeError>, event: &'static str) {
    if let Err(err) = result {
        tracing::warn!(%err, event, "widget event not applied");
    }
}

impl BridgeInner {
    fn surface(&self) -> Result<Rc<EditorView>, BridgeError> {
        self.surface.upgrade().ok_or(BridgeError::SurfaceGone)
    }

    fn schedule_reflow(self: &Rc<Self>) -> Result<(), BridgeError> {
        let weak = Rc::downgrade(self);
        let task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.pending_frame.set(None);
                if let Some(widget) = inner.widget.get() {
                    widget.reflow();
                }
            }
        });
        let handle = self.frames.request_frame(task)?;
        self.pending_frame.set(Some(handle));
        Ok(())
    }

    /// Runs before the view syncs node views, so the cached node may be
    /// stale. The size comes from the new document when the node is there.
    fn observe(&self, state: &EditorState) {
        let pos = (self.position)();
        let size = state
            .doc()
            .node_at(pos)
            .map_or_else(|| self.node.borrow().node_size(), Node::node_size);
        self.tracker.observe(pos, size, &state.selection());
    }

    fn gained_focus(&self) -> Result<(), BridgeError> {
        if self.focusing.get() {
            return Ok(());
        }
        let surface = self.surface()?;
        let state = surface.state();
        let selection = Selection::node(state.doc(), (self.position)())?;
        surface.blur();
        let mut tr = state.tr();
        tr.set_selection(selection);
        surface.dispatch(tr);
        Ok(())
    }

    fn exit(&self, direction: ExitDirection) -> Result<(), BridgeError> {
        let Some(widget) = self.widget.get() else {
            return Ok(());
        };
        let surface = self.surface()?;
        let state = surface.state();
        let mut tr = state.tr();
        if widget.serialize().is_empty() {
            tr.delete_selection()?;
        } else {
            let pos = (self.position)();
            let target = match direction {
                ExitDirection::Start => pos,
                ExitDirection::End => pos + self.node.borrow().node_size(),
            };
            tr.set_selection(Selection::caret(target));
        }
        tracing::trace!(?direction, "leaving widget");
        surface.dispatch(tr);
        surface.focus();
        Ok(())
    }

    /// The cached value only moves once the edit has been built.
    fn content_changed(&self) -> Result<(), BridgeError> {
        if self.updating.get() {
            return Ok(());
        }
        let Some(widget) = self.widget.get() else {
            return Ok(());
        };
        let next = widget.serialize();
        let diff = {
            let value = self.value.borrow();
            if *value == next {
                return Ok(());
            }
            simple_diff(&value, &next)
        };
        let surface = self.surface()?;
        let state = surface.state();
        let base = (self.position)() + 1;
        let mut tr = state.tr();
        let text = (!diff.text.is_empty()).then(|| Node::text(diff.text.as_str()));
        tr.replace_with(base + diff.from, base + diff.to, text)?;
        *self.value.borrow_mut() = next;
        surface.dispatch(tr);
        Ok(())
    }

    fn keystroke(&self, event: &KeyEvent) -> KeystrokeOutcome {
        if event.is_undo() || event.is_redo() {
            let Ok(surface) = self.surface() else {
                tracing::warn!("undo key after the editor view was dropped");
                return KeystrokeOutcome::Forward;
            };
            let applied = if event.is_undo() {
                surface.undo()
            } else {
                surface.redo()
            };
            return KeystrokeOutcome::Handled {
                prevent_default: applied,
            };
        }
        if event.is_backtick() {
            report(self.exit(ExitDirection::End), "exit");
            return KeystrokeOutcome::Handled {
                prevent_default: true,
            };
        }
        KeystrokeOutcome::Forward
    }

    fn update(&self, node: &Node) -> bool {
        if node.node_type() != self.node.borrow().node_type() {
            tracing::debug!(to = node.node_type().name(), "widget bridge refused update");
            return false;
        }
        *self.node.borrow_mut() = node.clone();

        let content = node.text_content();
        if *self.value.borrow() == content {
            return true;
        }
        *self.value.borrow_mut() = content.clone();
        if let Some(widget) = self.widget.get() {
            self.updating.set(true);
            widget.set_content(&content);
            self.updating.set(false);
        }
        true
    }

    fn select_node(&self) {
        let Some(widget) = self.widget.get() else {
            return;
        };
        match self.tracker.edge() {
            Some(CursorEdge::Start) => widget.move_cursor_to_start(),
            _ => widget.move_cursor_to_end(),
        }
        self.focusing.set(true);
        widget.focus();
        self.focusing.set(false);
        if let Some(surface) = self.surface.upgrade() {
            surface.blur();
        }
    }

    fn destroy(&self) {
        self.host.set_focus_listener(None);
        self.host.remove();
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        if let Some(handle) = self.pending_frame.take() {
            self.frames.cancel_frame(handle);
        }
        tracing::debug!("widget bridge destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::error::DocError;
    use crate::model::NodeType;
    use crate::testing::Fakes;

    // doc(paragraph("ab", math("x+1"), "cd")): math occupies 3..8
    fn sample() -> EditorState {
        EditorState::create(Node::doc(vec![Node::paragraph(vec![
            Node::text("ab"),
            Node::math("x+1"),
            Node::text("cd"),
        ])]))
    }

    fn config() -> EditorConfig {
        EditorConfig {
            history_group_ms: 0,
            ..EditorConfig::default()
        }
    }

    fn setup(fakes: &Fakes) -> Rc<EditorView> {
        EditorView::new(sample(), config(), fakes.platform())
    }

    fn fixed(pos: usize) -> PositionLookup {
        Rc::new(move || pos)
    }

    #[test]
    fn test_construction_pushes_content_and_schedules_reflow() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();
        assert_eq!(widget.content(), "x+1");
        assert_eq!(widget.reflow_count(), 0);
        assert_eq!(fakes.frames.pending(), 1);

        fakes.frames.run_pending();
        assert_eq!(widget.reflow_count(), 1);
        assert_eq!(fakes.hosts.created()[0].class(), "mq-node");
        assert_eq!(view.state().registry().len(), 2);
    }

    #[test]
    fn test_missing_target_fails_construction() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        fakes.hosts.set_missing(true);
        let registry = view.state().registry().clone();
        let before = registry.len();

        let result = WidgetBridge::new(&Node::math("y"), &view, fixed(3), &registry);
        assert!(matches!(result, Err(BridgeError::MissingTarget(_))));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_widget_failure_releases_host() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        fakes.widgets.set_fail(true);
        let registry = view.state().registry().clone();

        let result = WidgetBridge::new(&Node::math("y"), &view, fixed(3), &registry);
        assert!(matches!(result, Err(BridgeError::Widget(_))));
        let host = fakes.hosts.created().last().cloned().unwrap();
        assert!(!host.has_focus_listener());
        assert!(host.is_removed());
    }

    #[test]
    fn test_document_push_does_not_echo_back() {
        let fakes = Fakes::new();
        fakes.widgets.set_echo_edits(true);
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        let _sub = view.state().registry().add(Rc::new(move |tr: &Transaction, _: &EditorState| {
            if tr.doc_changed() {
                counter.set(counter.get() + 1);
            }
        }));

        // Edit the math text from the document side.
        let state = view.state();
        let mut tr = state.tr();
        tr.insert(7, Node::text("0")).unwrap();
        view.dispatch(tr);

        assert_eq!(widget.content(), "x+10");
        assert_eq!(widget.set_content_calls(), 2);
        assert_eq!(changes.get(), 1);
        assert_eq!(view.state().doc().text_content(), "abx+10cd");
    }

    #[test]
    fn test_same_value_change_is_noop() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();
        let dispatched = Rc::new(Cell::new(0));
        let counter = dispatched.clone();
        let _sub = view.state().registry().add(Rc::new(move |_: &Transaction, _: &EditorState| {
            counter.set(counter.get() + 1);
        }));

        widget.edit("x+1");
        assert_eq!(dispatched.get(), 0);
    }

    #[test]
    fn test_widget_edit_dispatches_minimal_replace() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let log = steps.clone();
        let _sub = view.state().registry().add(Rc::new(move |tr: &Transaction, _: &EditorState| {
            for step in tr.steps() {
                log.borrow_mut().push((step.from, step.to));
            }
        }));

        widget.edit("x+2");
        // "x+1" -> "x+2" replaces char 2..3, offset by the math node at 3 plus one.
        assert_eq!(*steps.borrow(), vec![(6, 7)]);
        insta::assert_snapshot!(view.state().doc().to_string(), @r#"doc(paragraph("ab", math("x+2"), "cd"))"#);

        widget.edit("");
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("ab", math(), "cd"))"#);
        assert_eq!(steps.borrow().last(), Some(&(4, 7)));
    }

    #[test]
    fn test_exit_end_and_start() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();

        view.blur();
        widget.exit_end();
        assert_eq!(view.state().selection(), Selection::caret(8));
        assert!(view.has_focus());

        view.blur();
        widget.exit_start();
        assert_eq!(view.state().selection(), Selection::caret(3));
        assert!(view.has_focus());

        widget.commit();
        assert_eq!(view.state().selection(), Selection::caret(8));
    }

    #[test]
    fn test_exit_from_empty_widget_deletes_it() {
        let fakes = Fakes::new();
        let view = EditorView::new(
            EditorState::create(Node::doc(vec![Node::paragraph(vec![
                Node::text("a"),
                Node::math(""),
            ])])),
            config(),
            fakes.platform(),
        );
        let widget = fakes.widgets.last().unwrap();
        assert!(widget.fire_focus_in());
        assert_eq!(view.state().selection(), Selection::Node { pos: 2, size: 2 });

        widget.exit_end();
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("a"))"#);
        assert!(view.mounted_positions().is_empty());
    }

    #[test]
    fn test_focus_in_selects_node_and_forced_focus_is_guarded() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();
        let transactions = Rc::new(Cell::new(0));
        let counter = transactions.clone();
        let _sub = view.state().registry().add(Rc::new(move |_: &Transaction, _: &EditorState| {
            counter.set(counter.get() + 1);
        }));

        // The fake widget fires focus-in on its host when focused, so the
        // forced focus from select_node must not dispatch a second time.
        assert!(widget.fire_focus_in());
        assert_eq!(transactions.get(), 1);
        assert_eq!(view.state().selection(), Selection::Node { pos: 3, size: 5 });
        assert_eq!(widget.focus_count(), 1);
        assert!(!view.has_focus());
    }

    #[test]
    fn test_select_node_enters_at_tracked_edge() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();

        let select = |view: &EditorView| {
            let state = view.state();
            let mut tr = state.tr();
            tr.set_selection(Selection::node(state.doc(), 3).unwrap());
            view.dispatch(tr);
        };
        let caret = |view: &EditorView, pos| {
            let mut tr = view.state().tr();
            tr.set_selection(Selection::caret(pos));
            view.dispatch(tr);
        };

        caret(&view, 1);
        select(&view);
        assert_eq!(widget.cursor(), Some(CursorEdge::Start));

        caret(&view, 9);
        select(&view);
        assert_eq!(widget.cursor(), Some(CursorEdge::End));
    }

    #[test]
    fn test_keystrokes() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let widget = fakes.widgets.last().unwrap();

        let undo = KeyEvent::new("z", 90).with_ctrl();
        assert_eq!(
            widget.press(&undo),
            KeystrokeOutcome::Handled {
                prevent_default: false
            }
        );

        widget.edit("x+12");
        assert_eq!(
            widget.press(&undo),
            KeystrokeOutcome::Handled {
                prevent_default: true
            }
        );
        assert_eq!(view.state().doc().text_content(), "abx+1cd");
        assert_eq!(widget.content(), "x+1");

        let redo = KeyEvent::new("y", 89).with_ctrl();
        assert_eq!(
            widget.press(&redo),
            KeystrokeOutcome::Handled {
                prevent_default: true
            }
        );
        assert_eq!(widget.content(), "x+12");

        assert_eq!(
            widget.press(&KeyEvent::new("`", 192)),
            KeystrokeOutcome::Handled {
                prevent_default: true
            }
        );
        assert_eq!(view.state().selection(), Selection::caret(9));

        assert_eq!(widget.press(&KeyEvent::new("x", 88)), KeystrokeOutcome::Forward);
    }

    #[test]
    fn test_update_refuses_other_types() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let bridge = WidgetBridge::new(&Node::math("q"), &view, fixed(3), &registry).unwrap();

        assert!(!bridge.update(&Node::image("a.png")));
        assert_eq!(bridge.node().node_type(), NodeType::Math);
        assert!(bridge.update(&Node::math("r")));
        assert_eq!(bridge.value(), "r");
        assert!(bridge.stop_event());
        assert!(bridge.ignore_mutation());
        bridge.destroy();
    }

    #[test]
    fn test_destroy_releases_everything() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let before = registry.len();
        let bridge = WidgetBridge::new(&Node::math("q"), &view, fixed(3), &registry).unwrap();
        assert_eq!(registry.len(), before + 1);
        let host = fakes.hosts.created().last().cloned().unwrap();
        assert!(host.has_focus_listener());

        bridge.destroy();
        assert_eq!(registry.len(), before);
        assert!(!host.has_focus_listener());
        assert!(host.is_removed());
        assert_eq!(fakes.frames.cancelled().len(), 1);

        // Stale handlers are inert once the bridge is gone.
        let widget = fakes.widgets.last().unwrap();
        drop(bridge);
        widget.edit("zzz");
        widget.exit_end();
        assert_eq!(view.state().doc().text_content(), "abx+1cd");
    }

    #[test]
    fn test_failed_reflow_request_still_mounts() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let pending = fakes.frames.pending();
        fakes.frames.set_fail(true);

        let bridge = WidgetBridge::new(&Node::math("q"), &view, fixed(3), &registry).unwrap();
        assert_eq!(fakes.frames.pending(), pending);
        assert_eq!(fakes.widgets.last().unwrap().content(), "q");
        bridge.destroy();
        assert!(fakes.frames.cancelled().is_empty());
    }

    #[test]
    fn test_edge_uses_node_size_from_new_document() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let bridge = WidgetBridge::new(&Node::math("x+1"), &view, fixed(3), &registry).unwrap();

        // the math node grows to 3..12 and the caret lands inside it
        let mut tr = view.state().tr();
        tr.insert(7, Node::text("0000")).unwrap();
        tr.set_selection(Selection::caret(10));
        view.dispatch(tr);
        assert_eq!(bridge.cursor_edge(), None);

        let mut tr = view.state().tr();
        tr.set_selection(Selection::caret(13));
        view.dispatch(tr);
        assert_eq!(bridge.cursor_edge(), Some(CursorEdge::End));
    }

    #[test]
    fn test_rejected_widget_edit_keeps_cached_value() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let bridge = WidgetBridge::new(&Node::math("q"), &view, fixed(100), &registry).unwrap();
        let widget = fakes.widgets.last().unwrap();

        widget.edit("q2");
        assert_eq!(bridge.value(), "q");
        assert!(matches!(
            bridge.inner.content_changed(),
            Err(BridgeError::Doc(DocError::OutOfRange { .. }))
        ));
        assert_eq!(view.state().doc().text_content(), "abx+1cd");
    }

    #[test]
    fn test_widget_events_after_view_is_dropped() {
        let fakes = Fakes::new();
        let view = setup(&fakes);
        let registry = view.state().registry().clone();
        let bridge = WidgetBridge::new(&Node::math("q"), &view, fixed(3), &registry).unwrap();
        let widget = fakes.widgets.last().unwrap();
        drop(view);

        widget.edit("q2");
        assert_eq!(bridge.value(), "q");
        assert!(matches!(bridge.inner.content_changed(), Err(BridgeError::SurfaceGone)));
        assert!(matches!(
            bridge.inner.exit(ExitDirection::End),
            Err(BridgeError::SurfaceGone)
        ));
        assert_eq!(
            widget.press(&KeyEvent::new("z", 90).with_ctrl()),
            KeystrokeOutcome::Forward
        );
    }

    #[test]
    fn test_exit_direction_from_sign() {
        assert_eq!(ExitDirection::from_sign(-1), ExitDirection::Start);
        assert_eq!(ExitDirection::from_sign(1), ExitDirection::End);
    }
}
