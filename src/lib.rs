//! # Statebox
//!
//! An observable state container with a composable persistence layer.
//!
//! Statebox is built from a few small pieces:
//!
//! ## Store
//!
//! - `Store<S>` - Holds one immutable state value and notifies listeners
//!   synchronously, in registration order, on every write
//! - `subscribe_with_selector` - Listen to a derived slice, compared with
//!   [`Shallow`] equality by default
//! - `Middleware<S>` - Hooks layered around the store's writes
//!
//! ## Persistence
//!
//! - `persist` - Wrap a store so its state is written to a [`StateStorage`]
//!   backend and loaded back (migrated and merged) on hydration
//! - `MemoryStorage`, `FileStorage` - Bundled backends
//!
//! ## Utilities
//!
//! - `Thenable<T>` - A result that is either settled now or still a
//!   future, so one pipeline serves sync and async backends alike
//! - `shallow` - One-level structural equality

pub mod error;
pub mod persist;
pub mod shallow;
pub mod store;
pub mod thenable;

// Re-export main types for convenience
pub use error::{PersistError, Result};
pub use persist::{
    persist, shallow_overlay, FileStorage, MemoryStorage, PersistApi, PersistOptions,
    PersistedEnvelope, PersistedStore, StateStorage,
};
pub use shallow::{shallow, Shallow};
pub use store::{Merge, Middleware, SelectorOptions, Store, Subscription};
pub use thenable::{thenablify, IntoThenable, Thenable};
