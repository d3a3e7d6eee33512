//! High-level state management with stores.
//!
//! A [`Store`] holds one current state value, replaces it on every write
//! and notifies subscribers synchronously. Selector subscriptions narrow
//! notifications to a slice of the state, and [`Middleware`] layers hook
//! into writes (persistence is one such layer).

mod listeners;
mod merge;
mod selector;
mod store;

pub use listeners::Subscription;
pub use merge::Merge;
pub use selector::SelectorOptions;
pub use store::{Middleware, Store};

pub(crate) use listeners::{register, registry, Registry};
pub(crate) use store::WeakStore;
