#![forbid(unsafe_code)]

//! View-side plumbing for the Potassium data layer.
//!
//! This crate provides:
//! - [`FieldBinding`] / [`Binding`] for keeping rendered output in step with
//!   a model field
//! - [`BindingScope`] for releasing a group of bindings at once
//! - [`Component`] with its own event channel, text-input focus handling and
//!   idempotent cleanup
//! - [`FocusContext`] routing text input to at most one component
//! - [`CollectionView`] maintaining one item view per collection entry

pub mod binding;
pub mod collection_view;
pub mod component;
pub mod focus;

pub use binding::{
    Binding, BindingScope, FieldBinding, Formatter, bind_mapped, bind_mapped2, bind_value,
    default_format,
};
pub use collection_view::{CollectionView, ItemView, RESET_EVENT, RESETTING_EVENT};
pub use component::{
    ACTION_EVENT, ACTIVATE_ACTION, BLUR_EVENT, Component, ComponentDetail, ComponentEvent,
    FOCUS_EVENT, TEXT_INPUT_ACTION, TEXT_INPUT_EVENT, WeakComponent,
};
pub use focus::FocusContext;
