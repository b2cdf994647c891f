#![forbid(unsafe_code)]

//! Text-input focus routing.
//!
//! The [`FocusContext`] owns which [`Component`] currently receives text
//! input. It is passed explicitly to every component that may take focus;
//! clones share the same state. Focus changes are versioned so an owner can
//! tell when routing changed.
//!
//! At most one component is focused. Only components that accept text-input
//! focus can take it. Switching focus fires `component-blur-event` on the
//! previous holder, then `component-focus-event` on the new one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::component::{BLUR_EVENT, Component, ComponentDetail, FOCUS_EVENT, WeakComponent};

#[derive(Default)]
struct FocusState {
    focused: RefCell<Option<WeakComponent>>,
    version: Cell<u64>,
}

/// Shared text-input focus state.
#[derive(Clone, Default)]
pub struct FocusContext {
    state: Rc<FocusState>,
}

impl FocusContext {
    /// A context with nothing focused.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The focused component, if it is still alive.
    #[must_use]
    pub fn focused(&self) -> Option<Component> {
        self.state
            .focused
            .borrow()
            .as_ref()
            .and_then(WeakComponent::upgrade)
    }

    /// Whether `component` holds focus.
    #[must_use]
    pub fn is_focused(&self, component: &Component) -> bool {
        self.focused().is_some_and(|focused| focused.ptr_eq(component))
    }

    /// Move focus to `component`, or clear it with `None`.
    ///
    /// Returns `false` (and changes nothing) when the component does not
    /// accept text-input focus. Re-focusing the holder is a silent no-op.
    pub fn set_focus(&self, component: Option<&Component>) -> bool {
        let previous = self.focused();
        let unchanged = match (&previous, component) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return true;
        }
        if let Some(next) = component {
            if !next.accepts_text_input_focus() {
                return false;
            }
        }

        *self.state.focused.borrow_mut() = component.map(Component::downgrade);
        self.state.version.set(self.state.version.get() + 1);
        tracing::debug!(
            version = self.state.version.get(),
            focused = component.is_some(),
            "text input focus changed"
        );

        if let Some(blurred) = previous {
            blurred.trigger(BLUR_EVENT, ComponentDetail::Blur);
        }
        if let Some(focused) = component {
            focused.trigger(FOCUS_EVENT, ComponentDetail::Focus);
        }
        true
    }

    /// Clear focus if `component` holds it.
    pub fn release(&self, component: &Component) {
        if self.is_focused(component) {
            self.set_focus(None);
        }
    }

    /// Clear focus.
    pub fn clear(&self) {
        self.set_focus(None);
    }

    /// Counter bumped on every focus change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version.get()
    }
}

impl fmt::Debug for FocusContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusContext")
            .field("has_focus", &self.focused().is_some())
            .field("version", &self.version())
            .finish()
    }
}
