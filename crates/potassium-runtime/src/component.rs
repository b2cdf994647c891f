#![forbid(unsafe_code)]

//! Observable binding owners.
//!
//! A [`Component`] is the unit a renderer hangs its output on. It owns an
//! event list of its own, an optional data object, every binding and
//! listener it registered on other objects, and a handle to the shared
//! [`FocusContext`]. [`Component::cleanup`] releases all of that exactly
//! once.
//!
//! Rendering is out of scope here: text and attribute bindings deliver
//! formatted strings to caller-supplied sinks.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use potassium_core::{
    Callback, DataCollection, DataEvent, DataModel, DataObject, DataRef, EventFilter, Observable,
    Subscription, Value,
};
use serde_json::Value as Json;

use crate::binding::{BindingScope, FieldBinding, default_format};
use crate::focus::FocusContext;

/// Fired on every [`Component::handle_action`].
pub const ACTION_EVENT: &str = "component-action-event";
/// Fired when the focused component receives text input.
pub const TEXT_INPUT_EVENT: &str = "component-text-input-event";
/// Fired on a component that gains text-input focus.
pub const FOCUS_EVENT: &str = "component-focus-event";
/// Fired on a component that loses text-input focus.
pub const BLUR_EVENT: &str = "component-blur-event";

/// Action that focuses the target when its value is `true`.
pub const ACTIVATE_ACTION: &str = "/action/activate";
/// Action carrying text input for the focused component.
pub const TEXT_INPUT_ACTION: &str = "/action/text-input";

/// Payload of a [`ComponentEvent`].
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentDetail {
    /// An action was routed to the component.
    Action {
        /// Action name, e.g. `/action/activate`.
        action: String,
        /// Action value.
        value: Json,
        /// Extra parameters.
        params: Json,
    },
    /// Text input for the focused component.
    TextInput {
        /// Parameters of the text-input action.
        params: Json,
    },
    /// The component gained focus.
    Focus,
    /// The component lost focus.
    Blur,
    /// A collection view is about to rebuild its item views.
    CollectionResetting,
    /// A collection view finished rebuilding.
    CollectionReset,
}

/// Event delivered to component listeners.
#[derive(Clone, Debug)]
pub struct ComponentEvent {
    /// The component that triggered the event.
    pub target: Component,
    /// Event payload.
    pub detail: ComponentDetail,
}

struct ComponentShared {
    events: Observable<ComponentEvent>,
    data: Option<DataRef>,
    focus: FocusContext,
    accepts_text_input_focus: Cell<bool>,
    visible: Cell<bool>,
    bindings: RefCell<BindingScope>,
    cleaned_up: Cell<bool>,
}

/// Observable owner of bindings and listeners.
///
/// Cloning shares the same component.
#[derive(Clone)]
pub struct Component {
    shared: Rc<ComponentShared>,
}

/// Non-owning component handle.
#[derive(Clone)]
pub struct WeakComponent(Weak<ComponentShared>);

impl WeakComponent {
    /// The component, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|shared| Component { shared })
    }
}

fn is_truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

impl Component {
    /// A component with no data object.
    #[must_use]
    pub fn new(focus: &FocusContext) -> Self {
        Self::build(None, focus)
    }

    /// A component presenting `data`.
    #[must_use]
    pub fn with_data(data: impl Into<DataRef>, focus: &FocusContext) -> Self {
        Self::build(Some(data.into()), focus)
    }

    fn build(data: Option<DataRef>, focus: &FocusContext) -> Self {
        Self {
            shared: Rc::new(ComponentShared {
                events: Observable::new(),
                data,
                focus: focus.clone(),
                accepts_text_input_focus: Cell::new(false),
                visible: Cell::new(true),
                bindings: RefCell::new(BindingScope::new()),
                cleaned_up: Cell::new(false),
            }),
        }
    }

    /// Handle identity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Rc::downgrade(&self.shared))
    }

    /// The presented data object.
    #[must_use]
    pub fn data(&self) -> Option<&DataRef> {
        self.shared.data.as_ref()
    }

    /// The presented data object, if it is a model.
    #[must_use]
    pub fn model(&self) -> Option<&DataModel> {
        self.data().and_then(DataRef::as_model)
    }

    /// The presented data object, if it is a collection.
    #[must_use]
    pub fn collection(&self) -> Option<&DataCollection> {
        self.data().and_then(DataRef::as_collection)
    }

    /// The focus context this component routes through.
    #[must_use]
    pub fn focus_context(&self) -> &FocusContext {
        &self.shared.focus
    }

    // -- events ---------------------------------------------------------

    /// This component's own listener list.
    #[must_use]
    pub fn events(&self) -> &Observable<ComponentEvent> {
        &self.shared.events
    }

    /// Register `callback` for this component's events passing `filter`.
    pub fn add_listener(&self, callback: &Callback<ComponentEvent>, filter: impl Into<EventFilter>) {
        self.shared.events.add_listener(callback, filter);
    }

    /// Remove registrations of `callback`.
    pub fn remove_listener(
        &self,
        callback: &Callback<ComponentEvent>,
        event_name: Option<&str>,
    ) -> usize {
        self.shared.events.remove_listener(callback, event_name)
    }

    /// Register a closure; dropping the guard removes it.
    pub fn subscribe(
        &self,
        filter: impl Into<EventFilter>,
        f: impl Fn(&str, &ComponentEvent) + 'static,
    ) -> Subscription {
        let callback = Callback::new(f);
        let filter = filter.into();
        self.shared.events.add_listener(&callback, filter.clone());
        let target = self.downgrade();
        Subscription::new(move || {
            if let Some(component) = target.upgrade() {
                let name = match &filter {
                    EventFilter::All => None,
                    EventFilter::Named(name) => Some(name.as_str()),
                };
                component.remove_listener(&callback, name);
            }
        })
    }

    /// Dispatch an event with this component as target.
    pub fn trigger(&self, event_name: &str, detail: ComponentDetail) -> usize {
        let event = ComponentEvent {
            target: self.clone(),
            detail,
        };
        self.shared.events.trigger(event_name, &event)
    }

    // -- bindings -------------------------------------------------------

    /// Render `field` of `model` as text through `render`.
    pub fn bind_text(&self, model: &DataModel, field: &str, render: impl Fn(&str) + 'static) {
        self.bind_text_with(model, field, default_format, render);
    }

    /// Text binding with a custom formatter.
    pub fn bind_text_with(
        &self,
        model: &DataModel,
        field: &str,
        formatter: impl Fn(&Value) -> String + 'static,
        render: impl Fn(&str) + 'static,
    ) {
        let binding = FieldBinding::with_formatter(model, field, formatter, render);
        self.hold(binding.into_subscription());
    }

    /// Render `field` of `model` into `attribute` through `set_attribute`,
    /// called as `(attribute, value)`.
    pub fn bind_attribute(
        &self,
        model: &DataModel,
        field: &str,
        attribute: &str,
        set_attribute: impl Fn(&str, &str) + 'static,
    ) {
        self.bind_attribute_with(model, field, attribute, default_format, set_attribute);
    }

    /// Attribute binding with a custom formatter.
    pub fn bind_attribute_with(
        &self,
        model: &DataModel,
        field: &str,
        attribute: &str,
        formatter: impl Fn(&Value) -> String + 'static,
        set_attribute: impl Fn(&str, &str) + 'static,
    ) {
        let attribute = attribute.to_owned();
        let binding = FieldBinding::with_formatter(model, field, formatter, move |value| {
            set_attribute(&attribute, value);
        });
        self.hold(binding.into_subscription());
    }

    /// Listen to another data object for as long as this component lives
    /// (or until cleanup).
    pub fn listen_to<T: DataObject>(
        &self,
        target: &T,
        filter: impl Into<EventFilter>,
        f: impl Fn(&str, &DataEvent) + 'static,
    ) {
        self.hold(target.subscribe(filter, f));
    }

    /// Keep `sub` alive until cleanup.
    pub fn hold(&self, sub: Subscription) {
        if self.is_cleaned_up() {
            return;
        }
        self.shared.bindings.borrow_mut().hold(sub);
    }

    /// Number of bindings and listeners held on other objects.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.shared.bindings.borrow().binding_count()
    }

    // -- focus & actions --------------------------------------------------

    /// Whether this component may take text-input focus.
    #[must_use]
    pub fn accepts_text_input_focus(&self) -> bool {
        self.shared.accepts_text_input_focus.get()
    }

    /// Allow or refuse text-input focus. Refusing while focused clears
    /// focus.
    pub fn set_accepts_text_input_focus(&self, accepts: bool) {
        if self.shared.accepts_text_input_focus.replace(accepts) == accepts {
            return;
        }
        if !accepts {
            self.shared.focus.release(self);
        }
    }

    /// Take text-input focus. Returns `false` if not accepted.
    pub fn focus(&self) -> bool {
        self.shared.focus.set_focus(Some(self))
    }

    /// Give up text-input focus if held.
    pub fn blur(&self) {
        self.shared.focus.release(self);
    }

    /// Whether this component holds text-input focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.shared.focus.is_focused(self)
    }

    /// Route an action to this component.
    ///
    /// `/action/activate` with `true` focuses first. Every action then
    /// fires `component-action-event`; `/action/text-input` with a truthy
    /// value additionally fires `component-text-input-event` when this
    /// component holds focus.
    pub fn handle_action(&self, action: &str, value: &Json, params: &Json) {
        if action == ACTIVATE_ACTION && *value == Json::Bool(true) {
            self.focus();
        }
        self.trigger(
            ACTION_EVENT,
            ComponentDetail::Action {
                action: action.to_owned(),
                value: value.clone(),
                params: params.clone(),
            },
        );
        if action == TEXT_INPUT_ACTION && is_truthy(value) && self.is_focused() {
            self.trigger(
                TEXT_INPUT_EVENT,
                ComponentDetail::TextInput {
                    params: params.clone(),
                },
            );
        }
    }

    // -- visibility & lifecycle -------------------------------------------

    /// Whether the renderer should show this component.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.shared.visible.get()
    }

    /// Show or hide this component.
    pub fn set_visible(&self, visible: bool) {
        self.shared.visible.set(visible);
    }

    /// Whether [`cleanup`](Self::cleanup) ran.
    #[must_use]
    pub fn is_cleaned_up(&self) -> bool {
        self.shared.cleaned_up.get()
    }

    /// Release own listeners, every held binding, and focus. Idempotent.
    ///
    /// The presented data object is shared with other holders and is left
    /// alone.
    pub fn cleanup(&self) {
        if self.shared.cleaned_up.replace(true) {
            return;
        }
        self.shared.events.clear_listeners();
        let released = std::mem::take(&mut *self.shared.bindings.borrow_mut());
        tracing::debug!(bindings = released.binding_count(), "component cleanup");
        drop(released);
        self.shared.focus.release(self);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("has_data", &self.shared.data.is_some())
            .field("binding_count", &self.binding_count())
            .field("accepts_text_input_focus", &self.accepts_text_input_focus())
            .field("cleaned_up", &self.is_cleaned_up())
            .finish()
    }
}

impl fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakComponent")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}
