#![forbid(unsafe_code)]

//! Listener registration and synchronous event dispatch.
//!
//! # Design
//!
//! Every data or UI object owns an [`Observable<E>`] and forwards
//! `add_listener` / `remove_listener` / `trigger` to it. The observable keeps
//! an insertion-ordered list of [`EventListener`]s, each pairing a
//! [`Callback`] with an [`EventFilter`] (an exact event name or
//! [`EventFilter::All`]).
//!
//! # Invariants
//!
//! 1. Dispatch order is registration order.
//! 2. No dedup: a callback registered twice fires twice.
//! 3. `trigger` works on a snapshot of the matching listeners taken before
//!    the first callback runs. Listeners added or removed during dispatch
//!    take effect on the next `trigger`.
//! 4. No borrow of the listener list is held while a callback runs, so
//!    callbacks may re-enter the observable freely.
//!
//! # Failure Modes
//!
//! - **Callback panic**: not caught. The panic unwinds out of `trigger`,
//!   remaining listeners for that call are skipped, and the listener list
//!   is left intact.
//! - **Listener leak**: callbacks are held strongly until removed or until
//!   `clear_listeners()`. A callback that captures the object it listens to
//!   forms an `Rc` cycle until one of those happens.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Which events a listener receives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// Every event.
    All,
    /// Only events whose name equals this one.
    Named(String),
}

impl EventFilter {
    /// Whether an event called `event_name` passes this filter.
    #[inline]
    #[must_use]
    pub fn matches(&self, event_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => name == event_name,
        }
    }
}

impl From<&str> for EventFilter {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for EventFilter {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<&String> for EventFilter {
    fn from(name: &String) -> Self {
        Self::Named(name.clone())
    }
}

/// A shareable listener callback, invoked as `(event_name, event)`.
///
/// Cloning shares the same closure. Two `Callback`s are the same listener
/// exactly when they are clones of one another; that identity is what
/// [`Observable::remove_listener`] matches on.
pub struct Callback<E> {
    f: Rc<dyn Fn(&str, &E)>,
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("ptr", &Rc::as_ptr(&self.f).cast::<()>())
            .finish()
    }
}

impl<E> Callback<E> {
    /// Wrap a closure as a listener callback.
    pub fn new(f: impl Fn(&str, &E) + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Whether `self` and `other` are the same registered closure.
    #[inline]
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        // Compare data pointers only; vtable pointers may differ across
        // codegen units for the same closure.
        std::ptr::eq(
            Rc::as_ptr(&self.f).cast::<()>(),
            Rc::as_ptr(&other.f).cast::<()>(),
        )
    }

    /// Invoke the callback.
    #[inline]
    pub fn call(&self, event_name: &str, event: &E) {
        (self.f)(event_name, event);
    }
}

/// A single registration: callback plus filter. Immutable once created.
pub struct EventListener<E> {
    filter: EventFilter,
    callback: Callback<E>,
}

impl<E> Clone for EventListener<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<E> fmt::Debug for EventListener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("filter", &self.filter)
            .field("callback", &self.callback)
            .finish()
    }
}

impl<E> EventListener<E> {
    /// Create a registration record.
    #[must_use]
    pub fn new(filter: EventFilter, callback: Callback<E>) -> Self {
        Self { filter, callback }
    }

    /// The event filter.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// The registered callback.
    #[must_use]
    pub fn callback(&self) -> &Callback<E> {
        &self.callback
    }

    /// Whether this listener receives `event_name`.
    #[inline]
    #[must_use]
    pub fn matches(&self, event_name: &str) -> bool {
        self.filter.matches(event_name)
    }

    /// Deliver the event if the filter matches. Returns whether it was delivered.
    pub fn distribute(&self, event_name: &str, event: &E) -> bool {
        if self.matches(event_name) {
            self.callback.call(event_name, event);
            true
        } else {
            false
        }
    }
}

/// Per-object ordered listener list with synchronous dispatch.
///
/// The list starts empty and allocates on the first registration.
pub struct Observable<E> {
    listeners: RefCell<Vec<EventListener<E>>>,
}

impl<E> Default for Observable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<E> Observable<E> {
    /// Create an observable with no listeners.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register `callback` for events passing `filter`.
    pub fn add_listener(&self, callback: &Callback<E>, filter: impl Into<EventFilter>) {
        self.listeners
            .borrow_mut()
            .push(EventListener::new(filter.into(), callback.clone()));
    }

    /// Remove registrations of `callback`.
    ///
    /// With `event_name = None` every registration of the callback goes.
    /// With `Some(name)` only registrations whose filter matches `name` go,
    /// which includes an [`EventFilter::All`] registration of the same
    /// callback. Returns the number of registrations removed.
    pub fn remove_listener(&self, callback: &Callback<E>, event_name: Option<&str>) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| {
            let same = listener.callback.same(callback);
            let name_hit = event_name.is_none_or(|name| listener.matches(name));
            !(same && name_hit)
        });
        before - listeners.len()
    }

    /// Deliver `event` to every listener whose filter matches `event_name`,
    /// in registration order. Returns the number of deliveries.
    pub fn trigger(&self, event_name: &str, event: &E) -> usize {
        let snapshot: Vec<EventListener<E>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.matches(event_name))
            .cloned()
            .collect();
        tracing::trace!(event = event_name, listeners = snapshot.len(), "dispatch");
        for listener in &snapshot {
            listener.callback.call(event_name, event);
        }
        snapshot.len()
    }

    /// Drop every registration held by this observable.
    pub fn clear_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Number of registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether any registration exists.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }
}

/// RAII guard for one registration on one target.
///
/// Dropping the guard runs its detach action, which removes exactly the
/// registration it was created for. Use [`Subscription::forget`] to keep the
/// registration alive for the target's lifetime.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a guard that calls `detach` when dropped.
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Remove the registration now.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Disarm the guard, leaving the registration in place.
    pub fn forget(mut self) {
        self.detach = None;
    }

    /// Whether dropping this guard would still remove a registration.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
