//! Change broadcast registry.
//!
//! One registry lives in each editor state's extension slot. The editing
//! surface invokes it once per committed transaction, and every live widget
//! bridge subscribes to it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::state::{EditorState, Transaction};

/// Callback run for every committed transaction with the resulting state.
pub type ChangeCallback = Rc<dyn Fn(&Transaction, &EditorState)>;

/// Handle-indexed set of change callbacks.
///
/// Handles increase monotonically and are never reused.
#[derive(Default)]
pub struct ChangeRegistry {
    next_handle: Cell<u64>,
    callbacks: RefCell<BTreeMap<u64, ChangeCallback>>,
}

impl fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRegistry")
            .field("next_handle", &self.next_handle.get())
            .field("subscribers", &self.callbacks.borrow().len())
            .finish()
    }
}

impl ChangeRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register `callback` under the next handle.
    pub fn add(self: &Rc<Self>, callback: ChangeCallback) -> Subscription {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.callbacks.borrow_mut().insert(handle, callback);
        tracing::trace!(handle, "change registry: subscribed");
        Subscription {
            registry: Rc::downgrade(self),
            handle,
        }
    }

    /// Run every present callback in ascending handle order.
    ///
    /// The handle list is taken up front. A callback removed during the run is
    /// skipped if it has not been called yet; one added during the run is
    /// first called on the next invocation.
    pub fn invoke(&self, tr: &Transaction, state: &EditorState) {
        let handles: Vec<u64> = self.callbacks.borrow().keys().copied().collect();
        tracing::trace!(subscribers = handles.len(), "change registry: invoke");
        for handle in handles {
            let callback = self.callbacks.borrow().get(&handle).cloned();
            if let Some(callback) = callback {
                callback(tr, state);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.borrow().is_empty()
    }

    fn remove(&self, handle: u64) {
        if self.callbacks.borrow_mut().remove(&handle).is_some() {
            tracing::trace!(handle, "change registry: unsubscribed");
        }
    }
}

/// Removes one callback from its registry when `unsubscribe` is called.
///
/// Dropping a subscription without calling `unsubscribe` leaves the callback
/// registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<ChangeRegistry>,
    handle: u64,
}

impl Subscription {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.handle);
        }
    }
}
