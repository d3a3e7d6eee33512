use super::hydration;
use super::middleware::PersistInner;
use super::options::PersistOptions;
use crate::error::{PersistError, Result};
use crate::store::{register, Store, Subscription};
use crate::thenable::Thenable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Wrap a store with persistence.
///
/// Every public write is followed by a write of the (partialized) state to
/// storage, and unless `skip_hydration` is set one hydration pass starts
/// right away. With a synchronous backend that pass has settled by the
/// time this returns.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use statebox::{persist, MemoryStorage, PersistOptions, Store};
/// use std::sync::Arc;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Counter { count: i64 }
///
/// let storage = Arc::new(MemoryStorage::new());
/// storage.set("counter", r#"{"state":{"count":5},"version":0}"#);
///
/// let store = persist(
///     Store::new(Counter { count: 0 }),
///     PersistOptions::new("counter").storage(storage.clone()),
/// );
/// assert!(store.persist().has_hydrated());
/// assert_eq!(store.get_state().count, 5);
///
/// store.update(|c| c.count += 1);
/// assert_eq!(
///     storage.get("counter").as_deref(),
///     Some(r#"{"state":{"count":6},"version":0}"#)
/// );
/// ```
pub fn persist<S>(store: Store<S>, options: PersistOptions<S>) -> PersistedStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let skip_hydration = options.skip_hydration;
    let inner = Arc::new(PersistInner::new(options));
    store.layer(inner.clone());

    let api = PersistApi {
        store: store.clone(),
        inner,
    };
    if !skip_hydration {
        let task = hydration::rehydrate(&api.inner, &api.store);
        api.inner.detach(task, "initial hydration");
    }

    PersistedStore { store, persist: api }
}

/// A store with the persist middleware attached.
///
/// Derefs to the underlying [`Store`]; persistence controls live under
/// [`PersistedStore::persist`].
pub struct PersistedStore<S> {
    store: Store<S>,
    persist: PersistApi<S>,
}

impl<S> PersistedStore<S> {
    /// The persistence controls.
    pub fn persist(&self) -> &PersistApi<S> {
        &self.persist
    }

    /// The underlying store.
    pub fn store(&self) -> &Store<S> {
        &self.store
    }
}

impl<S> Deref for PersistedStore<S> {
    type Target = Store<S>;

    fn deref(&self) -> &Store<S> {
        &self.store
    }
}

impl<S> Clone for PersistedStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            persist: self.persist.clone(),
        }
    }
}

/// Controls for a persisted store.
pub struct PersistApi<S> {
    store: Store<S>,
    inner: Arc<PersistInner<S>>,
}

impl<S> PersistApi<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Update options in place.
    ///
    /// Options not touched by `f` keep their values. If `f` installs a new
    /// storage provider it is resolved immediately.
    pub fn set_options<F>(&self, f: F)
    where
        F: FnOnce(&mut PersistOptions<S>),
    {
        let mut options = self.inner.options();
        let provider = Arc::clone(&options.get_storage);
        f(&mut options);
        let provider_changed = !Arc::ptr_eq(&provider, &options.get_storage);

        *self.inner.options.write() = options;
        if provider_changed {
            self.inner.refresh_storage();
        }
    }

    /// A copy of the current options.
    pub fn get_options(&self) -> PersistOptions<S> {
        self.inner.options()
    }

    /// Storage key in use.
    pub fn name(&self) -> String {
        self.inner.name()
    }

    /// Returns true while a storage handle is available.
    pub fn is_persisting(&self) -> bool {
        self.inner.storage().is_some()
    }

    /// Remove the persisted record.
    pub fn clear_storage(&self) -> Thenable<()> {
        match self.inner.storage() {
            Some(storage) => storage.remove_item(&self.inner.name()),
            None => Thenable::resolved(()),
        }
    }

    /// Run the hydration pipeline again.
    ///
    /// Failures are routed to the post-hydration callback; the returned
    /// thenable always fulfills once the pass has settled.
    ///
    /// Without storage this is a no-op: `has_hydrated` keeps its value, no
    /// hydration listener runs and `on_rehydrate_storage` is not called.
    ///
    /// An asynchronous pass starts reading only after earlier detached
    /// writes have settled, and writes made meanwhile wait for it.
    pub fn rehydrate(&self) -> Thenable<()> {
        match hydration::rehydrate(&self.inner, &self.store).try_ready() {
            Ok(result) => Thenable::from_result(result),
            Err(pending) => Thenable::from_future(self.inner.chain(pending)),
        }
    }

    /// Whether the latest hydration pass completed successfully.
    pub fn has_hydrated(&self) -> bool {
        self.inner.has_hydrated.load(Ordering::SeqCst)
    }

    /// Listen for hydration starting. Receives the pre-hydration state.
    pub fn on_hydrate<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        register(&self.inner.hydrate_listeners, Arc::new(listener))
    }

    /// Listen for hydration finishing. Receives the merged state.
    pub fn on_finish_hydration<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        register(&self.inner.finish_listeners, Arc::new(listener))
    }

    /// Persist the current state now.
    ///
    /// A failure that happens synchronously is returned immediately; otherwise
    /// the returned thenable settles when the write does.
    pub fn write(&self) -> Result<Thenable<()>> {
        let storage = self.inner.storage().ok_or_else(|| {
            PersistError::StorageUnavailable(format!("no storage for '{}'", self.inner.name()))
        })?;
        self.inner.write_state(&self.store, storage).rethrow()
    }

    /// Number of detached tasks waiting for [`PersistApi::flush`].
    pub fn pending_writes(&self) -> usize {
        self.inner.pending_tasks()
    }

    /// Drive every parked task to completion, in the order they were parked.
    ///
    /// Tasks parked while flushing are driven too. Resolves with the first
    /// error encountered, after all tasks have run.
    pub fn flush(&self) -> Thenable<()> {
        if self.inner.pending_tasks() == 0 {
            return Thenable::resolved(());
        }

        let inner = Arc::clone(&self.inner);
        Thenable::from_future(async move {
            let mut first_error = None;
            loop {
                let batch = inner.drain_outbox();
                if batch.is_empty() {
                    break;
                }
                for task in batch {
                    if let Err(err) = task.await {
                        tracing::error!(name = %inner.name(), error = %err, "flushed task failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

impl<S> Clone for PersistApi<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}
