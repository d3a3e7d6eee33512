use super::envelope::PersistedEnvelope;
use super::storage::{MemoryStorage, StateStorage};
use crate::error::{PersistError, Result};
use crate::thenable::Thenable;
use futures::task::Spawn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Factory resolving the storage handle.
pub type StorageProvider = Arc<dyn Fn() -> Result<Arc<dyn StateStorage>> + Send + Sync>;
/// Envelope to stored text.
pub type Serializer = Arc<dyn Fn(&PersistedEnvelope) -> Thenable<String> + Send + Sync>;
/// Stored text to envelope.
pub type Deserializer = Arc<dyn Fn(&str) -> Thenable<PersistedEnvelope> + Send + Sync>;
/// Selects the persisted subset of the state.
pub type Partializer<S> = Arc<dyn Fn(&S) -> Result<Value> + Send + Sync>;
/// Upgrades a persisted state from the stored version.
pub type Migrator = Arc<dyn Fn(Value, u32) -> Thenable<Value> + Send + Sync>;
/// Reconciles persisted state with the live state.
pub type Merger<S> = Arc<dyn Fn(Option<Value>, &S) -> Result<S> + Send + Sync>;
/// Runs once a hydration pass settles: `(state, None)` or `(None, error)`.
pub type PostHydrate<S> = Box<dyn FnOnce(Option<&S>, Option<&PersistError>) + Send>;
/// Runs when a hydration pass starts, optionally returning a [`PostHydrate`].
pub type RehydrateHook<S> = Arc<dyn Fn(&S) -> Option<PostHydrate<S>> + Send + Sync>;
/// Executor for detached storage writes.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

/// Configuration for the persist middleware.
///
/// Only the storage `name` is required:
///
/// ```
/// use statebox::{MemoryStorage, PersistOptions};
/// use std::sync::Arc;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Settings { theme: String }
///
/// let options = PersistOptions::<Settings>::new("settings")
///     .storage(Arc::new(MemoryStorage::new()))
///     .version(1);
/// assert_eq!(options.name(), "settings");
/// ```
pub struct PersistOptions<S> {
    pub(crate) name: String,
    pub(crate) get_storage: StorageProvider,
    pub(crate) serialize: Serializer,
    pub(crate) deserialize: Deserializer,
    pub(crate) partialize: Partializer<S>,
    pub(crate) version: u32,
    pub(crate) migrate: Option<Migrator>,
    pub(crate) merge: Merger<S>,
    pub(crate) on_rehydrate_storage: Option<RehydrateHook<S>>,
    pub(crate) skip_hydration: bool,
    pub(crate) spawner: Option<Spawner>,
}

impl<S> PersistOptions<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Options with every default applied.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            get_storage: Arc::new(|| Ok(MemoryStorage::global() as Arc<dyn StateStorage>)),
            serialize: Arc::new(|envelope: &PersistedEnvelope| Thenable::from_result(to_json(envelope))),
            deserialize: Arc::new(|raw: &str| Thenable::from_result(from_json(raw))),
            partialize: Arc::new(|state: &S| {
                serde_json::to_value(state).map_err(|e| PersistError::Serialization(e.to_string()))
            }),
            version: 0,
            migrate: None,
            merge: Arc::new(shallow_overlay::<S>),
            on_rehydrate_storage: None,
            skip_hydration: false,
            spawner: None,
        }
    }

    /// Persist the subset of state produced by `f`.
    pub fn partialize<P, F>(mut self, f: F) -> Self
    where
        P: Serialize,
        F: Fn(&S) -> P + Send + Sync + 'static,
    {
        self.partialize = Arc::new(move |state: &S| {
            serde_json::to_value(f(state)).map_err(|e| PersistError::Serialization(e.to_string()))
        });
        self
    }

    /// Custom merge. Receives the persisted (possibly migrated) state, or
    /// `None` when nothing usable was loaded, and the current state.
    pub fn merge<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Value>, &S) -> Result<S> + Send + Sync + 'static,
    {
        self.merge = Arc::new(f);
        self
    }

    /// Hook run when hydration starts; may return a post-hydration hook.
    pub fn on_rehydrate_storage<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> Option<PostHydrate<S>> + Send + Sync + 'static,
    {
        self.on_rehydrate_storage = Some(Arc::new(f));
        self
    }
}

impl<S> PersistOptions<S> {
    /// Storage key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target schema version.
    pub fn target_version(&self) -> u32 {
        self.version
    }

    /// Whether construction skips the initial hydration pass.
    pub fn skips_hydration(&self) -> bool {
        self.skip_hydration
    }

    /// Use a fixed storage handle.
    pub fn storage<St>(mut self, storage: Arc<St>) -> Self
    where
        St: StateStorage + 'static,
    {
        let storage: Arc<dyn StateStorage> = storage;
        self.get_storage = Arc::new(move || Ok(Arc::clone(&storage)));
        self
    }

    /// Resolve storage through a factory. An error leaves the store in
    /// unpersisted mode.
    pub fn get_storage<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn StateStorage>> + Send + Sync + 'static,
    {
        self.get_storage = Arc::new(f);
        self
    }

    /// Custom envelope encoder.
    pub fn serialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&PersistedEnvelope) -> Thenable<String> + Send + Sync + 'static,
    {
        self.serialize = Arc::new(f);
        self
    }

    /// Custom envelope decoder.
    pub fn deserialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Thenable<PersistedEnvelope> + Send + Sync + 'static,
    {
        self.deserialize = Arc::new(f);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Synchronous migration from `(persisted_state, stored_version)`.
    pub fn migrate<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, u32) -> Result<Value> + Send + Sync + 'static,
    {
        self.migrate = Some(Arc::new(move |state: Value, version: u32| {
            Thenable::from_result(f(state, version))
        }));
        self
    }

    /// Migration that may complete asynchronously.
    pub fn migrate_async<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, u32) -> Thenable<Value> + Send + Sync + 'static,
    {
        self.migrate = Some(Arc::new(f));
        self
    }

    pub fn skip_hydration(mut self, skip: bool) -> Self {
        self.skip_hydration = skip;
        self
    }

    /// Executor for detached writes. Without one, pending writes wait in an
    /// outbox until `PersistApi::flush` drives them.
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }
}

impl<S> Clone for PersistOptions<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            get_storage: Arc::clone(&self.get_storage),
            serialize: Arc::clone(&self.serialize),
            deserialize: Arc::clone(&self.deserialize),
            partialize: Arc::clone(&self.partialize),
            version: self.version,
            migrate: self.migrate.clone(),
            merge: Arc::clone(&self.merge),
            on_rehydrate_storage: self.on_rehydrate_storage.clone(),
            skip_hydration: self.skip_hydration,
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> fmt::Debug for PersistOptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("migrate", &self.migrate.is_some())
            .field("on_rehydrate_storage", &self.on_rehydrate_storage.is_some())
            .field("skip_hydration", &self.skip_hydration)
            .field("spawner", &self.spawner.is_some())
            .finish_non_exhaustive()
    }
}

fn to_json(envelope: &PersistedEnvelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(|e| PersistError::Serialization(e.to_string()))
}

fn from_json(raw: &str) -> Result<PersistedEnvelope> {
    serde_json::from_str(raw).map_err(|e| PersistError::Deserialization(e.to_string()))
}

/// Default merge: persisted top-level fields overwrite the current ones.
///
/// Both sides go through their JSON form. When the current state is not a
/// JSON object, a persisted value replaces it outright. A persisted value
/// that is not an object (or nothing at all) leaves the state unchanged.
pub fn shallow_overlay<S>(persisted: Option<Value>, current: &S) -> Result<S>
where
    S: Serialize + DeserializeOwned,
{
    let mut merged =
        serde_json::to_value(current).map_err(|e| PersistError::Merge(e.to_string()))?;

    match persisted {
        None | Some(Value::Null) => {}
        Some(Value::Object(persisted)) if merged.is_object() => {
            if let Value::Object(fields) = &mut merged {
                fields.extend(persisted);
            }
        }
        Some(_) if merged.is_object() => {}
        Some(persisted) => merged = persisted,
    }

    serde_json::from_value(merged).map_err(|e| PersistError::Merge(e.to_string()))
}
