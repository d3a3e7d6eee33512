use super::envelope::PersistedEnvelope;
use super::options::PersistOptions;
use super::storage::StateStorage;
use crate::error::{PersistError, Result};
use crate::store::{registry, Middleware, Registry, Store};
use crate::thenable::Thenable;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::task::SpawnExt;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::IntoFuture;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Callback for hydration start/finish events.
pub(crate) type HydrationListener<S> = dyn Fn(&S) + Send + Sync;

type Task = BoxFuture<'static, Result<()>>;
pub(crate) type ChainLink = Shared<Task>;

/// State shared by the write hook, the hydration pipeline and `PersistApi`.
pub(crate) struct PersistInner<S> {
    pub(crate) options: RwLock<PersistOptions<S>>,
    storage: RwLock<Option<Arc<dyn StateStorage>>>,
    pub(crate) has_hydrated: AtomicBool,
    pub(crate) hydrate_listeners: Registry<HydrationListener<S>>,
    pub(crate) finish_listeners: Registry<HydrationListener<S>>,
    // Last detached task. Each new one starts after it settles.
    tail: Mutex<Option<ChainLink>>,
    outbox: Mutex<Vec<Task>>,
}

impl<S> PersistInner<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(options: PersistOptions<S>) -> Self {
        let storage = resolve_storage(&options);
        Self {
            options: RwLock::new(options),
            storage: RwLock::new(storage),
            has_hydrated: AtomicBool::new(false),
            hydrate_listeners: registry(),
            finish_listeners: registry(),
            tail: Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the current options. Hooks are called on the snapshot so
    /// no lock is held while user code runs.
    pub(crate) fn options(&self) -> PersistOptions<S> {
        self.options.read().clone()
    }

    pub(crate) fn name(&self) -> String {
        self.options.read().name.clone()
    }

    pub(crate) fn storage(&self) -> Option<Arc<dyn StateStorage>> {
        self.storage.read().clone()
    }

    /// Re-run the storage provider, e.g. after it was swapped out.
    pub(crate) fn refresh_storage(&self) {
        let storage = resolve_storage(&self.options());
        *self.storage.write() = storage;
    }

    /// Write the store's current state to storage.
    pub(crate) fn write_state(
        &self,
        store: &Store<S>,
        storage: Arc<dyn StateStorage>,
    ) -> Thenable<()> {
        write_snapshot(&self.options(), &store.get_state(), storage)
    }

    /// A write that reads the state only once it starts running.
    fn deferred_write(&self, store: &Store<S>, storage: Arc<dyn StateStorage>) -> Thenable<()> {
        let options = self.options();
        let store = store.downgrade();
        Thenable::from_future(async move {
            let Some(store) = store.upgrade() else {
                return Ok(());
            };
            let write = write_snapshot(&options, &store.get_state(), storage);
            write.await
        })
    }

    /// Returns true while a detached task has not settled.
    fn is_busy(&self) -> bool {
        self.tail
            .lock()
            .as_ref()
            .is_some_and(|link| link.peek().is_none())
    }

    /// Queue a pending task behind every previously chained one.
    ///
    /// The returned link may be driven by anyone; the task runs once.
    pub(crate) fn chain(&self, pending: Thenable<()>) -> ChainLink {
        let mut tail = self.tail.lock();
        let previous = tail.take();
        let fut = pending.into_future();
        let link = async move {
            if let Some(previous) = previous {
                // Its outcome is reported by whoever drives it.
                let _ = previous.await;
            }
            fut.await
        }
        .boxed()
        .shared();
        *tail = Some(link.clone());
        link
    }

    /// Run a task without waiting for it.
    ///
    /// A task that already failed is reported right away. A pending one is
    /// chained after the previously detached task, then goes to the
    /// configured spawner, or to the outbox drained by `flush`.
    pub(crate) fn detach(&self, task: Thenable<()>, what: &'static str) {
        let pending = match task.try_ready() {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                tracing::error!(name = %self.name(), error = %err, "{what} failed");
                return;
            }
            Err(pending) => pending,
        };

        let link = self.chain(pending);

        let spawner = self.options.read().spawner.clone();
        let Some(spawner) = spawner else {
            tracing::trace!(name = %self.name(), "{what} parked until flush");
            self.outbox.lock().push(link.boxed());
            return;
        };

        let name = self.name();
        let spawned = spawner.spawn({
            let link = link.clone();
            async move {
                if let Err(err) = link.await {
                    tracing::error!(name = %name, error = %err, "{what} failed");
                }
            }
        });
        if let Err(err) = spawned {
            tracing::error!(name = %self.name(), error = %err, "could not spawn {what}, parked until flush");
            let rejected = PersistError::Spawn(err.to_string());
            self.outbox
                .lock()
                .push(async move { link.await.and(Err(rejected)) }.boxed());
        }
    }

    /// Take every parked task.
    pub(crate) fn drain_outbox(&self) -> Vec<Task> {
        std::mem::take(&mut *self.outbox.lock())
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.outbox.lock().len()
    }
}

/// Partialize, wrap in an envelope, serialize, `set_item`.
fn write_snapshot<S>(
    options: &PersistOptions<S>,
    state: &S,
    storage: Arc<dyn StateStorage>,
) -> Thenable<()> {
    let partial = match (options.partialize)(state) {
        Ok(partial) => partial,
        Err(err) => return Thenable::rejected(err),
    };
    let envelope = PersistedEnvelope::new(partial, options.version);
    let name = options.name.clone();

    (options.serialize)(&envelope).then(move |raw| storage.set_item(&name, raw))
}

fn resolve_storage<S>(options: &PersistOptions<S>) -> Option<Arc<dyn StateStorage>> {
    match (options.get_storage)() {
        Ok(storage) => Some(storage),
        Err(err) => {
            tracing::warn!(
                name = %options.name,
                error = %err,
                "storage unavailable, state will not be persisted"
            );
            None
        }
    }
}

impl<S> Middleware<S> for PersistInner<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn after_set(&self, store: &Store<S>) {
        let Some(storage) = self.storage() else {
            tracing::warn!(
                name = %self.name(),
                "unable to update item, the given storage is currently unavailable"
            );
            return;
        };

        // Queued behind unfinished work: snapshot the state when it runs,
        // not now, so it cannot overwrite what that work wrote.
        if self.is_busy() {
            let task = self.deferred_write(store, storage);
            self.detach(task, "state write");
            return;
        }

        match self.write_state(store, storage).rethrow() {
            Ok(task) => self.detach(task, "state write"),
            Err(err) => {
                tracing::error!(name = %self.name(), error = %err, "state write failed");
            }
        }
    }
}
