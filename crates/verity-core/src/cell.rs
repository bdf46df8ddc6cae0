//! Framework-agnostic reactive cells
//!
//! A [`ReadCell`] is anything that can report its current value and notify
//! watchers when it changes. Rendering layers adapt cells to their own
//! primitives; [`ValueCell`] is the minimal "stored value + change
//! notification" binding.

use crate::Subscription;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A read-only observable value
pub trait ReadCell {
    /// The observed value type
    type Value;

    /// Read the current value
    fn get(&self) -> Self::Value;

    /// Watch for changes
    ///
    /// `observer` runs with each new value until the subscription is
    /// cancelled. It is not invoked with the current value on attach.
    fn watch(&self, observer: Box<dyn Fn(&Self::Value)>) -> Subscription;
}

type Observer<T> = Rc<dyn Fn(&T)>;

struct ObserverList<T> {
    next_id: u64,
    observers: IndexMap<u64, Observer<T>>,
}

/// An ordered list of change observers
///
/// Notification iterates over a snapshot of the list, so observers may
/// attach or detach other observers while being notified.
pub struct Watchers<T> {
    list: Rc<RefCell<ObserverList<T>>>,
}

impl<T: 'static> Watchers<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            list: Rc::new(RefCell::new(ObserverList {
                next_id: 0,
                observers: IndexMap::new(),
            })),
        }
    }

    /// Attach an observer
    pub fn watch(&self, observer: Box<dyn Fn(&T)>) -> Subscription {
        let id = {
            let mut list = self.list.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.observers.insert(id, Rc::from(observer));
            id
        };

        let weak = Rc::downgrade(&self.list);
        Subscription::new(move || {
            if let Some(list) = weak.upgrade() {
                list.borrow_mut().observers.shift_remove(&id);
            }
        })
    }

    /// Notify every attached observer, in attachment order
    pub fn notify(&self, value: &T) {
        let observers: Vec<Observer<T>> = self.list.borrow().observers.values().cloned().collect();
        for observer in observers {
            observer(value);
        }
    }

    /// Number of attached observers
    pub fn len(&self) -> usize {
        self.list.borrow().observers.len()
    }

    /// Whether nobody is watching
    pub fn is_empty(&self) -> bool {
        self.list.borrow().observers.is_empty()
    }
}

impl<T: 'static> Default for Watchers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Watchers<T> {
    fn clone(&self) -> Self {
        Self {
            list: Rc::clone(&self.list),
        }
    }
}

/// A stored value with change notification
///
/// Either set directly, or bound to another cell with [`ValueCell::bind`]
/// so it mirrors that cell for as long as it lives.
pub struct ValueCell<T> {
    value: Rc<RefCell<T>>,
    watchers: Watchers<T>,
    source: Option<Subscription>,
}

impl<T: Clone + 'static> ValueCell<T> {
    /// Create a cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            watchers: Watchers::new(),
            source: None,
        }
    }

    /// Mirror `source` into a new cell
    pub fn bind<C>(source: &C) -> Self
    where
        C: ReadCell<Value = T> + ?Sized,
    {
        let mut cell = Self::new(source.get());
        let value = Rc::clone(&cell.value);
        let watchers = cell.watchers.clone();
        cell.source = Some(source.watch(Box::new(move |next: &T| {
            *value.borrow_mut() = next.clone();
            watchers.notify(next);
        })));
        cell
    }

    /// Replace the value and notify watchers
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value.clone();
        self.watchers.notify(&value);
    }
}

impl<T: Clone + 'static> ReadCell for ValueCell<T> {
    type Value = T;

    fn get(&self) -> T {
        self.value.borrow().clone()
    }

    fn watch(&self, observer: Box<dyn Fn(&T)>) -> Subscription {
        self.watchers.watch(observer)
    }
}

impl<T> Drop for ValueCell<T> {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.unsubscribe();
        }
    }
}
