//! Persistence middleware.
//!
//! [`persist`] layers a store with a write-through to a [`StateStorage`]
//! backend and a hydration pipeline that loads the stored record back,
//! migrating and merging it into the live state.
//!
//! Records are stored as a JSON [`PersistedEnvelope`]:
//!
//! ```json
//! {"state":{"count":0},"version":0}
//! ```
//!
//! Storage, serialization and migration may each be synchronous or
//! asynchronous. With a fully synchronous setup, hydration has completed by
//! the time [`persist`] returns. Otherwise pending work is handed to the
//! configured spawner, or parked until [`PersistApi::flush`] drives it.
//!
//! When the storage provider fails the store keeps working in memory and
//! every write logs a warning.

mod api;
mod envelope;
mod hydration;
mod middleware;
mod options;
mod storage;

pub use api::{persist, PersistApi, PersistedStore};
pub use envelope::PersistedEnvelope;
pub use options::{
    shallow_overlay, Deserializer, Merger, Migrator, Partializer, PersistOptions, PostHydrate,
    RehydrateHook, Serializer, Spawner, StorageProvider,
};
pub use storage::{FileStorage, MemoryStorage, StateStorage};
