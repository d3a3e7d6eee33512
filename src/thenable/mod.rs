//! Uniform sync-or-async continuations.
//!
//! Storage backends, serializers and migrations may finish immediately or
//! hand back a future. [`Thenable`] hides the difference so the hydration
//! pipeline is written once: a fully synchronous backend runs the whole
//! chain on the caller's stack, an asynchronous one defers naturally.

mod thenable;

pub use thenable::{thenablify, IntoThenable, Thenable};
