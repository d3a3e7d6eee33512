use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// Ordered registry of callbacks keyed by a registration id.
///
/// Notification passes work on a snapshot, so a callback may subscribe,
/// unsubscribe or trigger a nested write without disturbing the pass that
/// invoked it.
pub(crate) struct ListenerSet<F: ?Sized> {
    next_id: usize,
    entries: Vec<(usize, Arc<F>)>,
}

impl<F: ?Sized> ListenerSet<F> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, listener: Arc<F>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: usize) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Listeners in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Shared, lockable listener registry.
pub(crate) type Registry<F> = Arc<RwLock<ListenerSet<F>>>;

pub(crate) fn registry<F: ?Sized>() -> Registry<F> {
    Arc::new(RwLock::new(ListenerSet::new()))
}

/// Register `listener` and hand back the capability that removes it.
pub(crate) fn register<F>(registry: &Registry<F>, listener: Arc<F>) -> Subscription
where
    F: ?Sized + Send + Sync + 'static,
{
    let id = registry.write().insert(listener);
    let weak: Weak<RwLock<ListenerSet<F>>> = Arc::downgrade(registry);
    Subscription::new(move || {
        if let Some(registry) = weak.upgrade() {
            registry.write().remove(id);
        }
    })
}

/// Handle returned by every `subscribe`-style call.
///
/// Calling [`Subscription::unsubscribe`] removes exactly the listener it was
/// created for; further calls are no-ops. Dropping the handle does not
/// unsubscribe.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the listener. Idempotent.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Returns true until `unsubscribe` has been called.
    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
