#![forbid(unsafe_code)]

//! Binding data-model fields to rendered output.
//!
//! A [`FieldBinding`] links one `(model, field)` pair to a render sink: it
//! renders immediately with the current value, then re-renders on every
//! `changed:<field>`. Dropping (or [`unbind`](FieldBinding::unbind)ing) it
//! removes exactly its own registration from exactly that model, so two
//! bindings sharing a sink never interfere.
//!
//! A [`Binding<T>`] is the pull side: a lazily evaluated derived value over
//! model fields, read with [`Binding::get`]. The [`bind!`] and
//! [`bind_map!`] macros provide syntactic sugar.
//!
//! # Usage
//!
//! ```
//! use potassium_core::DataModel;
//! use potassium_runtime::binding::{FieldBinding, bind_mapped};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let book = DataModel::new();
//! book.set("title", "Dune").unwrap();
//!
//! let shown = Rc::new(RefCell::new(String::new()));
//! let sink = Rc::clone(&shown);
//! let _title = FieldBinding::new(&book, "title", move |text| *sink.borrow_mut() = text.to_owned());
//! assert_eq!(*shown.borrow(), "Dune");
//!
//! let label = bind_mapped(&book, "title", |title| format!("Title: {}", title.as_str().unwrap_or("")));
//! book.set("title", "Emma").unwrap();
//! assert_eq!(*shown.borrow(), "Emma");
//! assert_eq!(label.get(), "Title: Emma");
//! ```
//!
//! # Invariants
//!
//! 1. A new `FieldBinding` renders exactly once before returning.
//! 2. `Binding::get()` always reflects the model's current state (no
//!    caching).
//! 3. Dropping a [`BindingScope`] releases every binding it holds.
//!
//! # Failure Modes
//!
//! - Formatter or sink panic: propagates out of the `set` that triggered it.

use std::fmt;
use std::rc::Rc;

use potassium_core::{
    DataModel, DataObject, EventDetail, EventFilter, Subscription, Value, changed_event,
};
use serde_json::Value as Json;

/// Turns a field value into display text.
pub type Formatter = Rc<dyn Fn(&Value) -> String>;

/// Default display text: `null` is empty, strings are themselves, anything
/// else is its JSON text.
#[must_use]
pub fn default_format(value: &Value) -> String {
    match value {
        Value::Plain(Json::Null) => String::new(),
        Value::Plain(Json::String(s)) => s.clone(),
        other => other.to_json().to_string(),
    }
}

// ---------------------------------------------------------------------------
// FieldBinding: push side
// ---------------------------------------------------------------------------

/// Live link from one model field to a render sink.
#[must_use = "dropping a FieldBinding unbinds it"]
pub struct FieldBinding {
    model: DataModel,
    field: String,
    subscription: Subscription,
}

impl FieldBinding {
    /// Bind with [`default_format`].
    pub fn new(model: &DataModel, field: impl Into<String>, render: impl Fn(&str) + 'static) -> Self {
        Self::with_formatter(model, field, default_format, render)
    }

    /// Bind with a custom formatter.
    pub fn with_formatter(
        model: &DataModel,
        field: impl Into<String>,
        formatter: impl Fn(&Value) -> String + 'static,
        render: impl Fn(&str) + 'static,
    ) -> Self {
        let field = field.into();
        let formatter: Formatter = Rc::new(formatter);

        render(&formatter(&model.get(&field)));

        let subscription = model.subscribe(changed_event(&field), move |_, event| {
            if let EventDetail::FieldChanged { value, .. } = &event.detail {
                let text = if value.is_blank() {
                    formatter(&Value::NULL)
                } else {
                    formatter(value)
                };
                render(&text);
            }
        });
        Self {
            model: model.clone(),
            field,
            subscription,
        }
    }

    /// The bound model.
    #[must_use]
    pub fn model(&self) -> &DataModel {
        &self.model
    }

    /// The bound field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Whether the binding still receives changes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop re-rendering.
    pub fn unbind(self) {
        self.subscription.unsubscribe();
    }

    /// Hand the registration over to another owner.
    pub fn into_subscription(self) -> Subscription {
        self.subscription
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.field)
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Binding<T>: lazy derived value
// ---------------------------------------------------------------------------

/// A read-only derived value over model fields.
///
/// Evaluates on each `get()` call.
pub struct Binding<T> {
    eval: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Rc::clone(&self.eval),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.get())
            .finish()
    }
}

impl<T: 'static> Binding<T> {
    /// Create a binding that evaluates `f` on each `get()` call.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self { eval: Rc::new(f) }
    }

    /// Get the current bound value.
    #[must_use]
    pub fn get(&self) -> T {
        (self.eval)()
    }

    /// Apply a further transform, returning a new `Binding`.
    pub fn then<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Binding<U> {
        Binding {
            eval: Rc::new(move || f((self.eval)())),
        }
    }
}

/// Binding to a field's current value (as returned by `get`).
pub fn bind_value(model: &DataModel, field: impl Into<String>) -> Binding<Value> {
    let model = model.clone();
    let field = field.into();
    Binding {
        eval: Rc::new(move || model.get(&field)),
    }
}

/// Binding to a field's value transformed by `map`.
pub fn bind_mapped<T: 'static>(
    model: &DataModel,
    field: impl Into<String>,
    map: impl Fn(&Value) -> T + 'static,
) -> Binding<T> {
    let model = model.clone();
    let field = field.into();
    Binding {
        eval: Rc::new(move || map(&model.get(&field))),
    }
}

/// Binding combining two fields (possibly of different models).
pub fn bind_mapped2<T: 'static>(
    (m1, f1): (&DataModel, &str),
    (m2, f2): (&DataModel, &str),
    map: impl Fn(&Value, &Value) -> T + 'static,
) -> Binding<T> {
    let (m1, f1) = (m1.clone(), f1.to_owned());
    let (m2, f2) = (m2.clone(), f2.to_owned());
    Binding {
        eval: Rc::new(move || map(&m1.get(&f1), &m2.get(&f2))),
    }
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

/// Create a [`Binding`] to a model field.
///
/// # Examples
///
/// ```
/// use potassium_core::DataModel;
/// use potassium_runtime::bind;
///
/// let count = DataModel::new();
/// count.set("n", 1).unwrap();
/// let b = bind!(count, "n");
/// assert_eq!(b.get().as_i64(), Some(1));
/// ```
#[macro_export]
macro_rules! bind {
    ($model:expr, $field:expr) => {
        $crate::binding::bind_value(&$model, $field)
    };
}

/// Create a mapped [`Binding`] from a model field.
///
/// # Examples
///
/// ```
/// use potassium_core::DataModel;
/// use potassium_runtime::bind_map;
///
/// let count = DataModel::new();
/// count.set("n", 3).unwrap();
/// let label = bind_map!(count, "n", |n| format!("Count: {}", n.as_i64().unwrap_or(0)));
/// assert_eq!(label.get(), "Count: 3");
/// ```
#[macro_export]
macro_rules! bind_map {
    ($model:expr, $field:expr, $f:expr) => {
        $crate::binding::bind_mapped(&$model, $field, $f)
    };
}

// ---------------------------------------------------------------------------
// BindingScope
// ---------------------------------------------------------------------------

/// Collects subscriptions and field bindings for one owner (e.g. a
/// component).
///
/// # Invariants
///
/// 1. After drop or `clear()`, no callback registered through this scope
///    fires.
/// 2. `clear()` leaves the scope reusable.
/// 3. Binding count is always accurate.
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Listen to `target` within this scope.
    pub fn listen<T: DataObject>(
        &mut self,
        target: &T,
        filter: impl Into<EventFilter>,
        callback: impl Fn(&str, &potassium_core::DataEvent) + 'static,
    ) -> &mut Self {
        let sub = target.subscribe(filter, callback);
        self.subscriptions.push(sub);
        self
    }

    /// Bind a field within this scope with [`default_format`].
    pub fn bind_field(
        &mut self,
        model: &DataModel,
        field: impl Into<String>,
        render: impl Fn(&str) + 'static,
    ) -> &mut Self {
        let binding = FieldBinding::new(model, field, render);
        self.subscriptions.push(binding.into_subscription());
        self
    }

    /// Bind a field within this scope with a custom formatter.
    pub fn bind_field_with(
        &mut self,
        model: &DataModel,
        field: impl Into<String>,
        formatter: impl Fn(&Value) -> String + 'static,
        render: impl Fn(&str) + 'static,
    ) -> &mut Self {
        let binding = FieldBinding::with_formatter(model, field, formatter, render);
        self.subscriptions.push(binding.into_subscription());
        self
    }

    /// Number of live registrations held.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything immediately (scope becomes empty but reusable).
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |text: &str| sink.borrow_mut().push(text.to_owned()))
    }

    #[test]
    fn default_format_rules() {
        assert_eq!(default_format(&Value::NULL), "");
        assert_eq!(default_format(&Value::from("moon")), "moon");
        assert_eq!(default_format(&Value::from(42)), "42");
        assert_eq!(default_format(&Value::from(true)), "true");
        assert_eq!(default_format(&Value::from(json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn field_binding_renders_immediately_then_on_change() {
        let model = DataModel::from_json(json!({"title": "a"})).unwrap();
        let (seen, render) = recorder();
        let _binding = FieldBinding::new(&model, "title", render);
        assert_eq!(*seen.borrow(), vec!["a"]);

        model.set("title", "b").unwrap();
        model.set("other", 1).unwrap();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn field_binding_blank_and_null_render_empty() {
        let model = DataModel::new();
        let (seen, render) = recorder();
        let _binding = FieldBinding::new(&model, "x", render);
        model.set("x", "").unwrap();
        model.set("x", 5).unwrap();
        model.set("x", Value::NULL).unwrap();
        assert_eq!(*seen.borrow(), vec!["", "", "5", ""]);
    }

    #[test]
    fn custom_formatter() {
        let model = DataModel::from_json(json!({"price": 3})).unwrap();
        let (seen, render) = recorder();
        let _binding = FieldBinding::with_formatter(
            &model,
            "price",
            |v| format!("${}", v.as_i64().unwrap_or(0)),
            render,
        );
        model.increment("price", 2).unwrap();
        assert_eq!(*seen.borrow(), vec!["$3", "$5"]);
    }

    #[test]
    fn unbinding_is_precise_across_targets() {
        let a = DataModel::new();
        let b = DataModel::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sink = Rc::new(move |_: &str| h.set(h.get() + 1));

        let s = Rc::clone(&sink);
        let on_a = FieldBinding::new(&a, "x", move |t| s(t));
        let s = Rc::clone(&sink);
        let _on_b = FieldBinding::new(&b, "x", move |t| s(t));
        assert_eq!(hits.get(), 2);

        on_a.unbind();
        a.set("x", 1).unwrap();
        assert_eq!(hits.get(), 2);
        b.set("x", 1).unwrap();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn binding_reads_current_value() {
        let model = DataModel::from_json(json!({"n": 1})).unwrap();
        let b = bind_value(&model, "n");
        assert_eq!(b.get(), 1);
        model.set("n", 2).unwrap();
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn binding_then_chain() {
        let model = DataModel::from_json(json!({"n": 5})).unwrap();
        let doubled = bind_value(&model, "n").then(|v| v.as_i64().unwrap_or(0) * 2);
        assert_eq!(doubled.get(), 10);
        model.set("n", 3).unwrap();
        assert_eq!(doubled.get(), 6);
    }

    #[test]
    fn binding_map2_across_models() {
        let w = DataModel::from_json(json!({"v": 10})).unwrap();
        let h = DataModel::from_json(json!({"v": 20})).unwrap();
        let area = bind_mapped2((&w, "v"), (&h, "v"), |a, b| {
            a.as_i64().unwrap_or(0) * b.as_i64().unwrap_or(0)
        });
        assert_eq!(area.get(), 200);
        w.set("v", 5).unwrap();
        assert_eq!(area.get(), 100);
    }

    #[test]
    fn binding_new_custom() {
        let counter = Rc::new(Cell::new(0));
        let c = Rc::clone(&counter);
        let b = Binding::new(move || {
            c.set(c.get() + 1);
            c.get()
        });
        assert_eq!(b.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn macros() {
        let model = DataModel::from_json(json!({"n": 4})).unwrap();
        assert_eq!(crate::bind!(model, "n").get(), 4);
        let label = crate::bind_map!(model, "n", |n| n.as_i64().unwrap_or(0) * 10);
        assert_eq!(label.get(), 40);
    }

    #[test]
    fn scope_drop_releases_bindings() {
        let model = DataModel::new();
        let (seen, render) = recorder();
        {
            let mut scope = BindingScope::new();
            scope.bind_field(&model, "x", render);
            model.set("x", "one").unwrap();
        }
        model.set("x", "two").unwrap();
        assert_eq!(*seen.borrow(), vec!["", "one"]);
        assert_eq!(model.events().listener_count(), 0);
    }

    #[test]
    fn scope_clear_and_reuse() {
        let model = DataModel::new();
        let mut scope = BindingScope::new();
        let first = Rc::new(Cell::new(false));
        let f = Rc::clone(&first);
        scope.listen(&model, EventFilter::All, move |_, _| f.set(true));
        assert_eq!(scope.binding_count(), 1);

        scope.clear();
        assert!(scope.is_empty());

        let second = Rc::new(Cell::new(false));
        let s = Rc::clone(&second);
        scope.listen(&model, "changed", move |_, _| s.set(true));
        model.set("a", 1).unwrap();
        assert!(!first.get());
        assert!(second.get());
    }

    #[test]
    fn scope_hold_external_subscription() {
        let model = DataModel::new();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let mut scope = BindingScope::new();
        scope.hold(model.subscribe("changed", move |_, _| s.set(s.get() + 1)));

        model.set("a", 1).unwrap();
        drop(scope);
        model.set("a", 2).unwrap();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn scope_debug_format() {
        let model = DataModel::new();
        let mut scope = BindingScope::new();
        scope.bind_field(&model, "a", |_| {}).bind_field(&model, "b", |_| {});
        let debug = format!("{scope:?}");
        assert!(debug.contains("binding_count: 2"));
    }
}
