//! The editing surface.
//!
//! `EditorView` owns the current state and commits transactions: it applies
//! them, records history, broadcasts them through the state's change
//! registry, then reconciles mounted node views with the new document.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::actions::InsertMath;
use crate::config::EditorConfig;
use crate::history::History;
use crate::keymap::{KeyAction, Keymap};
use crate::keys::KeyEvent;
use crate::model::{Node, NodeType, Slice};
use crate::node_view::{NodeView, PositionLookup, node_view_constructor};
use crate::paste::PasteTransformer;
use crate::platform::Platform;
use crate::registry::Subscription;
use crate::state::{EditKind, EditorState, Selection, Transaction};
use crate::transform::Assoc;

struct MountedView {
    pos: Rc<Cell<usize>>,
    node_type: NodeType,
    deleted: bool,
    view: Rc<dyn NodeView>,
}

pub struct EditorView {
    this: Weak<EditorView>,
    state: RefCell<EditorState>,
    history: RefCell<History>,
    config: EditorConfig,
    platform: Platform,
    keymap: Keymap,
    paste_transformers: Vec<PasteTransformer>,
    mounted: RefCell<Vec<MountedView>>,
    selected: RefCell<Option<Rc<dyn NodeView>>>,
    focused: Cell<bool>,
    /// Whether Shift was down on the last key press. Shift-paste skips the
    /// paste transformers.
    shift_held: Cell<bool>,
    destroyed: Cell<bool>,
    refocus: RefCell<Option<Subscription>>,
}

impl std::fmt::Debug for EditorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorView")
            .field("selection", &self.state.borrow().selection())
            .field("mounted", &self.mounted_positions())
            .field("focused", &self.focused.get())
            .finish_non_exhaustive()
    }
}

impl EditorView {
    /// Create a surface for `state` and mount views for every widget node in it.
    pub fn new(state: EditorState, config: EditorConfig, platform: Platform) -> Rc<Self> {
        let view = Rc::new_cyclic(|this: &Weak<Self>| {
            let reset = this.clone();
            let insert = InsertMath::with_callback(move || {
                if let Some(view) = reset.upgrade() {
                    view.shift_held.set(false);
                }
            });
            let keymap = Keymap::math(config.math_delimiter, insert, platform.mac);
            let paste_transformers = match PasteTransformer::math(config.math_delimiter) {
                Ok(transformer) => vec![transformer],
                Err(err) => {
                    tracing::warn!(%err, "math paste pattern rejected");
                    Vec::new()
                }
            };
            Self {
                this: this.clone(),
                state: RefCell::new(state),
                history: RefCell::new(History::new(
                    config.history_depth,
                    Duration::from_millis(config.history_group_ms),
                )),
                keymap,
                paste_transformers,
                mounted: RefCell::new(Vec::new()),
                selected: RefCell::new(None),
                focused: Cell::new(false),
                shift_held: Cell::new(false),
                destroyed: Cell::new(false),
                refocus: RefCell::new(None),
                config,
                platform,
            }
        });

        view.sync_node_views();

        if view.config.refocus_on_change {
            let weak = Rc::downgrade(&view);
            let registry = view.state().registry().clone();
            let subscription = registry.add(Rc::new(move |_: &Transaction, state: &EditorState| {
                if let Some(view) = weak.upgrade() {
                    if !view.has_focus() && !selects_math(state) {
                        view.focus();
                    }
                }
            }));
            *view.refocus.borrow_mut() = Some(subscription);
        }
        view
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> EditorState {
        self.state.borrow().clone()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Commit `tr`.
    ///
    /// Mounted view positions are remapped before the change broadcast, so
    /// subscribers reading a position lookup see the new document.
    pub fn dispatch(&self, tr: Transaction) {
        if self.destroyed.get() {
            tracing::warn!("dispatch on a destroyed editor view");
            return;
        }
        let before = self.state();
        let next = before.apply(&tr);
        self.history.borrow_mut().record(&tr, before.selection());
        *self.state.borrow_mut() = next.clone();
        tracing::trace!(
            steps = tr.steps().len(),
            selection = ?next.selection(),
            "dispatch"
        );

        if tr.doc_changed() {
            for mounted in self.mounted.borrow_mut().iter_mut() {
                let mapped = tr.mapping().map(mounted.pos.get(), Assoc::After);
                mounted.pos.set(mapped.pos);
                mounted.deleted |= mapped.deleted;
            }
        }

        next.registry().invoke(&tr, &next);

        if tr.doc_changed() {
            self.sync_node_views();
        }
        self.sync_selected_view();
    }

    pub fn focus(&self) {
        if !self.focused.replace(true) {
            tracing::trace!("editor view focused");
        }
    }

    pub fn blur(&self) {
        self.focused.set(false);
    }

    pub fn has_focus(&self) -> bool {
        self.focused.get()
    }

    pub fn can_undo(&self) -> bool {
        self.history.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.borrow().can_redo()
    }

    /// Undo the last history entry. Returns whether anything was undone.
    pub fn undo(&self) -> bool {
        let state = self.state();
        let tr = self.history.borrow_mut().undo(&state);
        match tr {
            Some(tr) => {
                self.dispatch(tr);
                true
            }
            None => false,
        }
    }

    pub fn redo(&self) -> bool {
        let state = self.state();
        let tr = self.history.borrow_mut().redo(&state);
        match tr {
            Some(tr) => {
                self.dispatch(tr);
                true
            }
            None => false,
        }
    }

    /// Run the binding for `event`, if any. Returns whether the key was handled.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        self.shift_held.set(event.shift);
        let Some(action) = self.keymap.lookup(event) else {
            return false;
        };
        match action {
            KeyAction::Command(command) => {
                let state = self.state();
                command.run(&state, &mut |tr| self.dispatch(tr))
            }
            KeyAction::Undo => self.undo(),
            KeyAction::Redo => self.redo(),
        }
    }

    pub fn handle_key_up(&self, event: &KeyEvent) {
        if event.key == "Shift" {
            self.shift_held.set(false);
        }
    }

    /// Paste `slice` over the selection.
    ///
    /// Only inline content, or a single textblock open at both ends, is
    /// accepted. Returns whether anything was inserted.
    pub fn paste(&self, slice: Slice) -> bool {
        let slice = if self.shift_held.get() {
            slice
        } else {
            self.paste_transformers
                .iter()
                .fold(slice, |slice, transformer| transformer.transform_pasted(&slice))
        };

        let content = slice.content.as_slice();
        let nodes: Vec<Node> = match content {
            [block] if block.is_textblock() && slice.open_start > 0 && slice.open_end > 0 => {
                block.children().to_vec()
            }
            _ if content.iter().all(Node::is_inline) => content.to_vec(),
            _ => {
                tracing::warn!(nodes = content.len(), "unsupported paste shape");
                return false;
            }
        };
        if nodes.is_empty() {
            return false;
        }

        let state = self.state();
        let inserted: usize = nodes.iter().map(Node::node_size).sum();
        let mut tr = state.tr();
        let placed = tr.delete_selection().and_then(|tr| {
            let at = tr.selection().from();
            tr.replace(at, at, nodes)?;
            Ok(at)
        });
        let at = match placed {
            Ok(at) => at,
            Err(err) => {
                tracing::warn!(%err, "paste does not fit at the selection");
                return false;
            }
        };
        tr.set_selection(Selection::caret(at + inserted));
        tr.set_kind(EditKind::Structural);
        tracing::debug!(inserted, "paste");
        self.dispatch(tr);
        true
    }

    pub fn paste_text(&self, text: &str) -> bool {
        self.paste(Slice::from_text(text))
    }

    /// Whether the node view at `pos` handles native events itself.
    pub fn stop_event_at(&self, pos: usize) -> bool {
        self.node_view_at(pos).is_some_and(|view| view.stop_event())
    }

    pub fn ignore_mutation_at(&self, pos: usize) -> bool {
        self.node_view_at(pos).is_some_and(|view| view.ignore_mutation())
    }

    pub fn node_view_at(&self, pos: usize) -> Option<Rc<dyn NodeView>> {
        self.mounted
            .borrow()
            .iter()
            .find(|mounted| !mounted.deleted && mounted.pos.get() == pos)
            .map(|mounted| mounted.view.clone())
    }

    /// Positions of all mounted node views, in document order.
    pub fn mounted_positions(&self) -> Vec<usize> {
        self.mounted.borrow().iter().map(|m| m.pos.get()).collect()
    }

    /// Tear down every node view and stop reacting to changes.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if let Some(subscription) = self.refocus.borrow_mut().take() {
            subscription.unsubscribe();
        }
        self.selected.borrow_mut().take();
        let mounted = std::mem::take(&mut *self.mounted.borrow_mut());
        for mounted in mounted {
            mounted.view.destroy();
        }
        tracing::debug!("editor view destroyed");
    }

    /// Bring mounted node views in line with the current document: update
    /// survivors, destroy views whose node is gone or refused the update, and
    /// mount views for nodes that have none.
    fn sync_node_views(&self) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let state = self.state();
        let doc = state.doc();

        let previous = std::mem::take(&mut *self.mounted.borrow_mut());
        let mut kept = Vec::with_capacity(previous.len());
        for mounted in previous {
            let current = if mounted.deleted {
                None
            } else {
                doc.node_at(mounted.pos.get())
            };
            match current {
                Some(node) if node.node_type() == mounted.node_type && mounted.view.update(node) => {
                    kept.push(mounted)
                }
                _ => {
                    tracing::trace!(pos = mounted.pos.get(), "dropping node view");
                    mounted.view.destroy();
                }
            }
        }

        let occupied: HashSet<usize> = kept.iter().map(|m| m.pos.get()).collect();
        let mut missing = Vec::new();
        doc.descendants(|node, pos| {
            if node_view_constructor(node.node_type()).is_some() && !occupied.contains(&pos) {
                missing.push((node.clone(), pos));
            }
            true
        });
        for (node, pos) in missing {
            if let Some(mounted) = mount(&this, &node, pos) {
                kept.push(mounted);
            }
        }

        let mut mounted = self.mounted.borrow_mut();
        kept.append(&mut mounted);
        kept.sort_by_key(|m| m.pos.get());
        *mounted = kept;
    }

    /// Call `select_node` when a node selection lands on a view that was not
    /// already selected.
    fn sync_selected_view(&self) {
        let target = self
            .state
            .borrow()
            .selection()
            .node_pos()
            .and_then(|pos| self.node_view_at(pos));
        let Some(target) = target else {
            self.selected.borrow_mut().take();
            return;
        };
        let already = self
            .selected
            .borrow()
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &target));
        if !already {
            *self.selected.borrow_mut() = Some(target.clone());
            target.select_node();
        }
    }
}

fn mount(surface: &Rc<EditorView>, node: &Node, pos: usize) -> Option<MountedView> {
    let constructor = node_view_constructor(node.node_type())?;
    let cell = Rc::new(Cell::new(pos));
    let lookup: PositionLookup = {
        let cell = cell.clone();
        Rc::new(move || cell.get())
    };
    match constructor(node, surface, lookup) {
        Ok(view) => Some(MountedView {
            pos: cell,
            node_type: node.node_type(),
            deleted: false,
            view,
        }),
        Err(err) => {
            tracing::error!(%err, pos, node = node.node_type().name(), "node view failed to mount");
            None
        }
    }
}

fn selects_math(state: &EditorState) -> bool {
    state
        .selection()
        .node_pos()
        .and_then(|pos| state.doc().node_at(pos))
        .is_some_and(|node| node.node_type() == NodeType::Math)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fakes;

    fn config() -> EditorConfig {
        EditorConfig {
            history_group_ms: 0,
            ..EditorConfig::default()
        }
    }

    fn text_doc(text: &str) -> EditorState {
        EditorState::create(Node::doc(vec![Node::paragraph(vec![Node::text(text)])]))
    }

    #[test]
    fn test_mounts_views_for_existing_math() {
        let fakes = Fakes::new();
        let state = EditorState::create(Node::doc(vec![
            Node::paragraph(vec![Node::math("a"), Node::text("b")]),
            Node::lemma(vec![Node::text("c"), Node::math("d")]),
        ]));
        let view = EditorView::new(state, config(), fakes.platform());
        // paragraph 0..6 (math at 1), lemma 6..12 (math at 8)
        assert_eq!(view.mounted_positions(), vec![1, 8]);
        assert!(view.stop_event_at(8));
        assert!(view.ignore_mutation_at(1));
        assert!(!view.stop_event_at(2));
    }

    #[test]
    fn test_positions_follow_edits_and_deleted_views_are_destroyed() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc("ab"), config(), fakes.platform());

        let mut tr = view.state().tr();
        tr.insert(2, Node::math("x")).unwrap();
        view.dispatch(tr);
        assert_eq!(view.mounted_positions(), vec![2]);

        let mut tr = view.state().tr();
        tr.insert(1, Node::text("zz")).unwrap();
        view.dispatch(tr);
        assert_eq!(view.mounted_positions(), vec![4]);
        assert_eq!(view.state().registry().len(), 2);

        let mut tr = view.state().tr();
        tr.delete(4, 7).unwrap();
        view.dispatch(tr);
        assert!(view.mounted_positions().is_empty());
        assert_eq!(view.state().registry().len(), 1);
    }

    #[test]
    fn test_insert_math_key_selects_new_widget() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc("a b"), config(), fakes.platform());
        let mut tr = view.state().tr();
        tr.set_selection(Selection::text(3, 4));
        view.dispatch(tr);

        let dollar = KeyEvent::new("$", 52).with_shift();
        assert!(view.handle_key(&dollar));
        insta::assert_snapshot!(view.state().doc().to_string(), @r#"doc(paragraph("a ", math("b")))"#);
        assert_eq!(view.state().selection(), Selection::Node { pos: 3, size: 3 });

        let widget = fakes.widgets.last().unwrap();
        assert_eq!(widget.content(), "b");
        assert_eq!(widget.focus_count(), 1);
        assert!(!view.shift_held.get());
    }

    #[test]
    fn test_backspace_twice_removes_math() {
        let fakes = Fakes::new();
        let state = EditorState::with_selection(
            Node::doc(vec![Node::paragraph(vec![Node::text("a"), Node::math("x")])]),
            Selection::caret(5),
        );
        let view = EditorView::new(state, config(), fakes.platform());
        let backspace = KeyEvent::new("Backspace", 8);

        assert!(view.handle_key(&backspace));
        assert_eq!(view.state().selection(), Selection::Node { pos: 2, size: 3 });
        assert!(view.handle_key(&backspace));
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("a"))"#);
        assert!(view.mounted_positions().is_empty());
    }

    #[test]
    fn test_undo_redo_remount_widgets() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc("ab"), config(), fakes.platform());
        let mut tr = view.state().tr();
        tr.insert(2, Node::math("x")).unwrap();
        view.dispatch(tr);
        assert!(view.can_undo());

        assert!(view.handle_key(&KeyEvent::new("z", 90).with_ctrl()));
        assert!(view.mounted_positions().is_empty());
        assert!(view.handle_key(&KeyEvent::new("z", 90).with_ctrl().with_shift()));
        assert_eq!(view.mounted_positions(), vec![2]);
        assert!(view.undo());
        assert!(view.mounted_positions().is_empty());
        assert!(!view.can_undo());
    }

    #[test]
    fn test_paste_text_creates_math() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc(""), config(), fakes.platform());
        assert!(view.paste_text("see $x+1$ now"));
        insta::assert_snapshot!(view.state().doc().to_string(), @r#"doc(paragraph("see ", math("x+1"), " now"))"#);
        assert_eq!(view.mounted_positions(), vec![5]);
        assert_eq!(view.state().selection(), Selection::caret(14));
    }

    #[test]
    fn test_clearing_everything_keeps_the_editor_usable() {
        let fakes = Fakes::new();
        let state = EditorState::create(Node::doc(vec![
            Node::paragraph(vec![Node::text("ab"), Node::math("x")]),
            Node::lemma(vec![Node::text("c")]),
        ]));
        let view = EditorView::new(state, config(), fakes.platform());
        assert_eq!(view.mounted_positions(), vec![3]);

        assert!(view.handle_key(&KeyEvent::new("a", 65).with_ctrl()));
        assert!(view.handle_key(&KeyEvent::new("Backspace", 8)));
        assert_eq!(view.state().doc().to_string(), "doc(paragraph())");
        assert_eq!(view.state().selection(), Selection::caret(1));
        assert!(view.mounted_positions().is_empty());

        assert!(view.paste_text("hello"));
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("hello"))"#);
        assert!(view.handle_key(&KeyEvent::new("$", 52).with_shift()));
        assert_eq!(view.mounted_positions(), vec![6]);

        assert!(view.undo());
        assert!(view.undo());
        assert!(view.undo());
        assert_eq!(view.state().doc().text_content(), "abxc");
        assert_eq!(view.mounted_positions(), vec![3]);
    }

    #[test]
    fn test_paste_after_widget_is_a_separate_undo_step() {
        let fakes = Fakes::new();
        let config = EditorConfig {
            history_group_ms: 3_600_000,
            ..EditorConfig::default()
        };
        let view = EditorView::new(text_doc("ab"), config, fakes.platform());
        assert!(view.handle_key(&KeyEvent::new("$", 52).with_shift()));
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph(math(), "ab"))"#);

        let mut tr = view.state().tr();
        tr.set_selection(Selection::caret(5));
        view.dispatch(tr);
        assert!(view.paste_text("zz"));
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph(math(), "abzz"))"#);

        assert!(view.undo());
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph(math(), "ab"))"#);
        assert!(view.can_undo());
        assert!(view.undo());
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("ab"))"#);
    }

    #[test]
    fn test_shift_paste_is_plain() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc(""), config(), fakes.platform());
        view.handle_key(&KeyEvent::new("Shift", 16).with_shift());
        assert!(view.paste_text("$x$"));
        assert_eq!(view.state().doc().to_string(), r#"doc(paragraph("$x$"))"#);

        view.handle_key_up(&KeyEvent::new("Shift", 16));
        assert!(view.paste_text("$y$"));
        assert_eq!(view.mounted_positions(), vec![4]);
    }

    #[test]
    fn test_paste_rejects_multiple_blocks() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc("ab"), config(), fakes.platform());
        let slice = Slice::new(
            crate::model::Fragment::from_vec(vec![
                Node::paragraph(vec![Node::text("x")]),
                Node::paragraph(vec![Node::text("y")]),
            ]),
            1,
            1,
        );
        assert!(!view.paste(slice));
        assert_eq!(view.state().doc().text_content(), "ab");
    }

    #[test]
    fn test_refocus_after_change_unless_math_selected() {
        let fakes = Fakes::new();
        let view = EditorView::new(text_doc("ab"), config(), fakes.platform());
        assert!(!view.has_focus());

        let mut tr = view.state().tr();
        tr.set_selection(Selection::caret(2));
        view.dispatch(tr);
        assert!(view.has_focus());

        let mut tr = view.state().tr();
        tr.insert(3, Node::math("x")).unwrap();
        view.dispatch(tr);
        view.blur();
        let state = view.state();
        let mut tr = state.tr();
        tr.set_selection(Selection::node(state.doc(), 3).unwrap());
        view.dispatch(tr);
        assert!(!view.has_focus());
    }

    #[test]
    fn test_refocus_can_be_disabled() {
        let fakes = Fakes::new();
        let config = EditorConfig {
            refocus_on_change: false,
            ..config()
        };
        let view = EditorView::new(text_doc("ab"), config, fakes.platform());
        assert_eq!(view.state().registry().len(), 0);
        let mut tr = view.state().tr();
        tr.set_selection(Selection::caret(2));
        view.dispatch(tr);
        assert!(!view.has_focus());
    }

    #[test]
    fn test_missing_target_leaves_node_without_view() {
        let fakes = Fakes::new();
        fakes.hosts.set_missing(true);
        let view = EditorView::new(text_doc("ab"), config(), fakes.platform());
        let mut tr = view.state().tr();
        tr.insert(2, Node::math("x")).unwrap();
        view.dispatch(tr);
        assert!(view.mounted_positions().is_empty());
        assert_eq!(view.state().doc().text_content(), "axb");
    }

    #[test]
    fn test_destroy_tears_down_views() {
        let fakes = Fakes::new();
        let state = EditorState::create(Node::doc(vec![Node::paragraph(vec![Node::math("x")])]));
        let view = EditorView::new(state, config(), fakes.platform());
        let registry = view.state().registry().clone();
        assert_eq!(registry.len(), 2);

        view.destroy();
        assert!(registry.is_empty());
        assert!(view.mounted_positions().is_empty());

        let mut tr = view.state().tr();
        tr.insert(1, Node::text("q")).unwrap();
        view.dispatch(tr);
        assert_eq!(view.state().doc().text_content(), "x");
    }
}
