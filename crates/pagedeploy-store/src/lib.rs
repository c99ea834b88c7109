//! Observable state shared with the front-end.
//!
//! [`Writable`] is a single-threaded publish/subscribe cell: it is constructed
//! by the application and handed to its consumers, never stored globally.

pub mod layers;

pub use layers::{layers, LayerRecord, LayerStore};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(u64, Callback<T>)>>,
    next_id: Cell<u64>,
    /// Deliveries not yet made, oldest first.
    pending: RefCell<VecDeque<(u64, Callback<T>, Rc<T>)>>,
    draining: Cell<bool>,
}

impl<T> Inner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.subscribers.borrow().iter().any(|(sub, _)| *sub == id)
    }
}

/// A value that notifies subscribers whenever it is replaced.
///
/// Clones share the same underlying cell. Not `Send`: the store is meant for
/// one thread.
pub struct Writable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writable")
            .field("value", &self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

impl<T: Default + Clone + 'static> Default for Writable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> Writable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                pending: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
            }),
        }
    }

    /// Replaces the value and notifies every subscriber in subscription order.
    ///
    /// A `set` made from inside a callback is queued behind the deliveries
    /// already pending, so every subscriber sees values in the order they were set
    /// and the last value it sees is the current one.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.enqueue();
        if !self.inner.draining.replace(true) {
            self.drain();
            self.inner.draining.set(false);
        }
    }

    /// Sets the value to `f(current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Registers `callback`, calling it immediately with the current value.
    ///
    /// Delivery stops when the returned [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription<T> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let callback: Callback<T> = Rc::new(callback);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::clone(&callback)));
        trace!(id, "subscribed");

        let current = self.get();
        callback(&current);

        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn enqueue(&self) {
        let current = Rc::new(self.get());
        let subscribers = self.inner.subscribers.borrow();
        let mut pending = self.inner.pending.borrow_mut();
        for (id, callback) in subscribers.iter() {
            pending.push_back((*id, Rc::clone(callback), Rc::clone(&current)));
        }
    }

    fn drain(&self) {
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some((id, callback, value)) = next else {
                break;
            };
            // Unsubscribed by an earlier callback in this round.
            if self.inner.is_subscribed(id) {
                callback(&value);
            }
        }
    }
}

/// Handle returned by [`Writable::subscribe`].
pub struct Subscription<T> {
    id: u64,
    store: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {
        // Removal happens in Drop.
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .subscribers
                .borrow_mut()
                .retain(|(id, _)| *id != self.id);
            trace!(id = self.id, "unsubscribed");
        }
    }
}
