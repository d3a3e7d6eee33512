//! The rehydration pipeline.
//!
//! Stages, chained through [`Thenable`] so a synchronous backend settles
//! the whole pass before `rehydrate` returns:
//!
//! 1. reset the hydrated flag, emit `on_hydrate`, run `on_rehydrate_storage`
//! 2. read the raw record
//! 3. deserialize it into an envelope
//! 4. resolve the version, migrating when it differs from the target
//! 5. merge into the live state, replace it, write the normalized record
//!    back, then flag hydration done and emit `on_finish_hydration`

use super::envelope::PersistedEnvelope;
use super::middleware::PersistInner;
use super::options::PostHydrate;
use crate::store::Store;
use crate::thenable::Thenable;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn rehydrate<S>(inner: &Arc<PersistInner<S>>, store: &Store<S>) -> Thenable<()>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let Some(storage) = inner.storage() else {
        tracing::debug!(name = %inner.name(), "no storage, skipping hydration");
        return Thenable::resolved(());
    };
    let options = inner.options();
    let name = options.name.clone();
    let target = options.version;

    inner.has_hydrated.store(false, Ordering::SeqCst);
    let current = store.get_state();
    let listeners = inner.hydrate_listeners.read().snapshot();
    for listener in listeners {
        listener(&*current);
    }
    let post_hydrate: Arc<Mutex<Option<PostHydrate<S>>>> = Arc::new(Mutex::new(
        options
            .on_rehydrate_storage
            .as_ref()
            .and_then(|hook| hook(&*current)),
    ));
    tracing::debug!(name = %name, target_version = target, "hydration started");

    let deserialize = options.deserialize.clone();
    let migrate = options.migrate.clone();
    let merge = options.merge.clone();
    let merge_store = store.clone();
    let merge_inner = Arc::clone(inner);
    let finish_inner = Arc::clone(inner);
    let on_success = Arc::clone(&post_hydrate);
    let on_failure = post_hydrate;
    let migrate_name = name.clone();
    let failure_name = name.clone();

    storage
        .get_item(&name)
        .then(move |raw| match raw {
            // An empty record counts as no record.
            Some(raw) if !raw.is_empty() => deserialize(raw.as_str()).map(Some),
            _ => Thenable::resolved(None),
        })
        .then(move |envelope: Option<PersistedEnvelope>| {
            let Some(envelope) = envelope else {
                return Thenable::resolved(None);
            };
            match envelope.version {
                Some(stored) if stored != target => match migrate {
                    Some(migrate) => {
                        tracing::debug!(
                            name = %migrate_name,
                            stored,
                            target_version = target,
                            "migrating persisted state"
                        );
                        migrate(envelope.state, stored).map(Some)
                    }
                    None => {
                        tracing::error!(
                            name = %migrate_name,
                            stored,
                            target_version = target,
                            "state loaded from storage couldn't be migrated since no migrate function was provided"
                        );
                        Thenable::resolved(None)
                    }
                },
                _ => Thenable::resolved(Some(envelope.state)),
            }
        })
        .then(move |persisted: Option<Value>| {
            let merged = match merge(persisted, &*merge_store.get_state()) {
                Ok(merged) => Arc::new(merged),
                Err(err) => return Thenable::rejected(err),
            };
            merge_store.replace_raw(Arc::clone(&merged));
            merge_inner
                .write_state(&merge_store, storage)
                .map(move |()| merged)
        })
        .map(move |merged: Arc<S>| {
            finish_inner.has_hydrated.store(true, Ordering::SeqCst);
            let listeners = finish_inner.finish_listeners.read().snapshot();
            for listener in listeners {
                listener(&*merged);
            }
            let callback = on_success.lock().take();
            if let Some(callback) = callback {
                callback(Some(&*merged), None);
            }
            tracing::debug!(name = %finish_inner.name(), "hydration finished");
        })
        .catch(move |err| {
            tracing::warn!(name = %failure_name, error = %err, "hydration failed");
            let callback = on_failure.lock().take();
            if let Some(callback) = callback {
                callback(None, Some(&err));
            }
            Thenable::resolved(())
        })
}
