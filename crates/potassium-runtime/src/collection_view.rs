#![forbid(unsafe_code)]

//! One item view per collection entry, kept in collection order.
//!
//! A [`CollectionView`] listens to its collection's `added`, `removed` and
//! `reset` events. `added` appends a view for the new entry (entries
//! already shown, by `equals`, are skipped); `removed` drops and cleans up
//! that entry's view; the collection's own `reset` reorders the views to
//! match the collection, creating missing ones and cleaning up the rest,
//! bracketed by `collection-view-resetting` / `collection-view-reset` on
//! the view's [`Component`]. A `reset` bubbling up from an entry model is
//! ignored.
//!
//! An optional visibility filter is applied to every view, including
//! views created later.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use potassium_core::{
    ADDED, DataCollection, DataEvent, DataModel, DataObject, EventDetail, REMOVED, RESET,
    Subscription,
};

use crate::component::{Component, ComponentDetail};
use crate::focus::FocusContext;

/// Fired before a collection view rebuilds its item views.
pub const RESETTING_EVENT: &str = "collection-view-resetting";
/// Fired after a collection view rebuilt its item views.
pub const RESET_EVENT: &str = "collection-view-reset";

/// Hooks a collection view calls on its item views.
pub trait ItemView {
    /// Show or hide the view.
    fn set_visible(&self, _visible: bool) {}

    /// Release the view; called once when its entry leaves the view.
    fn cleanup(&self) {}
}

impl ItemView for Component {
    fn set_visible(&self, visible: bool) {
        Component::set_visible(self, visible);
    }

    fn cleanup(&self) {
        Component::cleanup(self);
    }
}

type Filter = Rc<dyn Fn(&DataModel) -> bool>;

struct Entry<V> {
    model: DataModel,
    view: Rc<V>,
    visible: bool,
}

struct ViewShared<V> {
    component: Component,
    collection: DataCollection,
    factory: Box<dyn Fn(&DataModel) -> V>,
    entries: RefCell<Vec<Entry<V>>>,
    filter: RefCell<Option<Filter>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<V: ItemView> ViewShared<V> {
    fn is_visible(&self, model: &DataModel) -> bool {
        let filter = self.filter.borrow().clone();
        filter.is_none_or(|filter| filter(model))
    }

    fn contains(&self, model: &DataModel) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| entry.model.same_entity(model))
    }

    fn add(&self, model: &DataModel) {
        if self.contains(model) {
            return;
        }
        let view = (self.factory)(model);
        let visible = self.is_visible(model);
        view.set_visible(visible);
        self.entries.borrow_mut().push(Entry {
            model: model.clone(),
            view: Rc::new(view),
            visible,
        });
    }

    fn remove(&self, model: &DataModel) {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|entry| entry.model.same_entity(model))
                .map(|index| entries.remove(index))
        };
        if let Some(entry) = removed {
            entry.view.cleanup();
        }
    }

    fn rebuild(&self) {
        self.component.trigger(RESETTING_EVENT, ComponentDetail::CollectionResetting);
        let mut old = std::mem::take(&mut *self.entries.borrow_mut());
        let mut created = 0usize;
        for model in self.collection.iter() {
            if self.contains(&model) {
                continue;
            }
            // Entries added during the reset already have a view.
            match old.iter().position(|entry| entry.model.ptr_eq(&model)) {
                Some(index) => {
                    let mut entry = old.remove(index);
                    entry.visible = self.is_visible(&entry.model);
                    entry.view.set_visible(entry.visible);
                    self.entries.borrow_mut().push(entry);
                }
                None => {
                    self.add(&model);
                    created += 1;
                }
            }
        }
        for entry in &old {
            entry.view.cleanup();
        }
        tracing::debug!(dropped = old.len(), created, "collection view rebuilt");
        self.component.trigger(RESET_EVENT, ComponentDetail::CollectionReset);
    }

    /// Neither the filter nor `set_visible` runs under an `entries` borrow;
    /// both may read the view or mutate the collection.
    fn apply_filter(&self) {
        let filter = self.filter.borrow().clone();
        let snapshot: Vec<(DataModel, Rc<V>)> = self
            .entries
            .borrow()
            .iter()
            .map(|entry| (entry.model.clone(), Rc::clone(&entry.view)))
            .collect();
        for (model, view) in snapshot {
            let visible = filter.as_ref().is_none_or(|filter| filter(&model));
            let tracked = match self
                .entries
                .borrow_mut()
                .iter_mut()
                .find(|entry| Rc::ptr_eq(&entry.view, &view))
            {
                Some(entry) => {
                    entry.visible = visible;
                    true
                }
                None => false,
            };
            // Removed while filtering.
            if tracked {
                view.set_visible(visible);
            }
        }
    }
}

/// Keeps one item view of type `V` per entry of a collection.
pub struct CollectionView<V> {
    shared: Rc<ViewShared<V>>,
}

impl CollectionView<Component> {
    /// A view whose items are plain [`Component`]s presenting each entry.
    #[must_use]
    pub fn new(collection: &DataCollection, focus: &FocusContext) -> Self {
        let item_focus = focus.clone();
        Self::with_item_factory(collection, focus, move |model| {
            Component::with_data(model, &item_focus)
        })
    }
}

impl<V: ItemView + 'static> CollectionView<V> {
    /// A view building item views with `factory`.
    pub fn with_item_factory(
        collection: &DataCollection,
        focus: &FocusContext,
        factory: impl Fn(&DataModel) -> V + 'static,
    ) -> Self {
        let shared = Rc::new(ViewShared {
            component: Component::with_data(collection, focus),
            collection: collection.clone(),
            factory: Box::new(factory),
            entries: RefCell::new(Vec::new()),
            filter: RefCell::new(None),
            subscriptions: RefCell::new(Vec::new()),
        });

        let subscriptions = vec![
            listen(&shared, ADDED, |view, event| {
                if let EventDetail::Added(model) = &event.detail {
                    view.add(model);
                }
            }),
            listen(&shared, REMOVED, |view, event| {
                if let EventDetail::Removed(model) = &event.detail {
                    view.remove(model);
                }
            }),
            listen(&shared, RESET, |view, event| {
                if event.target.ptr_eq(&view.collection.data_ref()) {
                    view.rebuild();
                }
            }),
        ];
        *shared.subscriptions.borrow_mut() = subscriptions;
        shared.rebuild();
        Self { shared }
    }

    /// The view's own component (target of the reset events).
    #[must_use]
    pub fn component(&self) -> &Component {
        &self.shared.component
    }

    /// The presented collection.
    #[must_use]
    pub fn collection(&self) -> &DataCollection {
        &self.shared.collection
    }

    /// Number of item views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries.borrow().len()
    }

    /// Whether there are no item views.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entries.borrow().is_empty()
    }

    /// Entries shown, in order.
    #[must_use]
    pub fn models(&self) -> Vec<DataModel> {
        self.shared
            .entries
            .borrow()
            .iter()
            .map(|entry| entry.model.clone())
            .collect()
    }

    /// Run `f` on the item view at `index`. `f` may use this view freely.
    pub fn with_view<R>(&self, index: usize, f: impl FnOnce(&V) -> R) -> Option<R> {
        let view = self
            .shared
            .entries
            .borrow()
            .get(index)
            .map(|entry| Rc::clone(&entry.view))?;
        Some(f(&view))
    }

    /// Whether the item view at `index` passes the filter.
    #[must_use]
    pub fn is_visible(&self, index: usize) -> Option<bool> {
        self.shared
            .entries
            .borrow()
            .get(index)
            .map(|entry| entry.visible)
    }

    /// Number of item views passing the filter.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.shared
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.visible)
            .count()
    }

    /// Show only entries for which `filter` returns `true`; `None` shows
    /// everything.
    pub fn filter(&self, filter: Option<Box<dyn Fn(&DataModel) -> bool>>) {
        *self.shared.filter.borrow_mut() = filter.map(Rc::from);
        self.shared.apply_filter();
    }

    /// Stop tracking the collection and clean up every item view.
    pub fn cleanup(&self) {
        self.shared.subscriptions.borrow_mut().clear();
        let entries = std::mem::take(&mut *self.shared.entries.borrow_mut());
        for entry in &entries {
            entry.view.cleanup();
        }
        self.shared.component.cleanup();
    }
}

impl<V: Clone + ItemView + 'static> CollectionView<V> {
    /// The item view at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<V> {
        self.with_view(index, V::clone)
    }

    /// The item view presenting an entry equal to `model`.
    #[must_use]
    pub fn view_for(&self, model: &DataModel) -> Option<V> {
        self.shared
            .entries
            .borrow()
            .iter()
            .find(|entry| entry.model.same_entity(model))
            .map(|entry| V::clone(&entry.view))
    }
}

fn listen<V: ItemView + 'static>(
    shared: &Rc<ViewShared<V>>,
    event: &str,
    handler: impl Fn(&ViewShared<V>, &DataEvent) + 'static,
) -> Subscription {
    let weak: Weak<ViewShared<V>> = Rc::downgrade(shared);
    shared.collection.subscribe(event, move |_, data_event| {
        if let Some(view) = weak.upgrade() {
            handler(&view, data_event);
        }
    })
}

impl<V> fmt::Debug for CollectionView<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("len", &self.shared.entries.borrow().len())
            .field("collection", &self.shared.collection)
            .finish()
    }
}
