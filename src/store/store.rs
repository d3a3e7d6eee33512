use super::listeners::{register, registry, Registry, Subscription};
use super::merge::Merge;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with `(new_state, previous_state)`.
pub(crate) type Listener<S> = dyn Fn(&S, &S) + Send + Sync;

/// A write hook layered around a store.
///
/// Layers run in the order they were attached, after every write made
/// through the store's public setters. Writes made internally by a layer
/// (hydration, for example) bypass the hooks.
pub trait Middleware<S>: Send + Sync {
    /// Called after a public write has been applied.
    fn after_set(&self, store: &Store<S>);
}

/// An observable state container.
///
/// The store owns exactly one current state value, held behind an `Arc` and
/// never mutated in place. Every write swaps in a new value and notifies
/// listeners synchronously, in registration order, with the new and the
/// previous state.
///
/// Cloning a `Store` yields another handle to the same state.
///
/// # Example
///
/// ```
/// use statebox::Store;
///
/// let store = Store::new(0);
/// let sub = store.subscribe(|new, old| println!("{old} -> {new}"));
///
/// store.replace(1);
/// assert_eq!(*store.get_state(), 1);
///
/// sub.unsubscribe();
/// ```
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    state: RwLock<Arc<S>>,
    // Held from reading the previous state until the swap.
    write_gate: Mutex<()>,
    initial: Arc<S>,
    listeners: Registry<Listener<S>>,
    middleware: RwLock<Vec<Arc<dyn Middleware<S>>>>,
    destroyed: AtomicBool,
}

impl<S: Send + Sync + 'static> Store<S> {
    /// Create a new store with the given initial state.
    pub fn new(initial: S) -> Self {
        let initial = Arc::new(initial);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::clone(&initial)),
                write_gate: Mutex::new(()),
                initial,
                listeners: registry(),
                middleware: RwLock::new(Vec::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the current state.
    pub fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.inner.state.read())
    }

    /// The state the store was created with.
    pub fn initial_state(&self) -> Arc<S> {
        Arc::clone(&self.inner.initial)
    }

    /// Read state through a borrow instead of cloning the `Arc`.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        let state = self.get_state();
        f(&state)
    }

    /// Compute the next state from the previous one.
    ///
    /// Returning the previous `Arc` itself means "no change": the state is
    /// kept and no listener runs. Returns whether the state changed.
    ///
    /// Writers are serialized, so concurrent transitions on clones of the
    /// same store never lose an update. `f` must not write to this store.
    pub fn transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Arc<S>) -> Arc<S>,
    {
        let changed = self.commit(f, false);
        self.run_middleware();
        changed
    }

    /// Replace the whole state. Listeners always run.
    pub fn replace(&self, state: S) {
        let next = Arc::new(state);
        self.commit(move |_| next, true);
        self.run_middleware();
    }

    /// Update the state using a function over a copy of it.
    pub fn update<F>(&self, f: F)
    where
        S: Clone,
        F: FnOnce(&mut S),
    {
        self.transition(|previous| {
            let mut next = S::clone(previous);
            f(&mut next);
            Arc::new(next)
        });
    }

    /// Shallow-merge a partial state onto the current one.
    pub fn set_state(&self, partial: S::Partial)
    where
        S: Merge,
    {
        self.set_state_with(move |_| partial);
    }

    /// Shallow-merge the partial state computed from the current one.
    pub fn set_state_with<F>(&self, f: F)
    where
        S: Merge,
        F: FnOnce(&S) -> S::Partial,
    {
        self.transition(|previous| {
            let partial = f(previous);
            let mut next = S::clone(previous);
            next.merge(partial);
            Arc::new(next)
        });
    }

    /// Subscribe to state changes.
    ///
    /// The callback receives `(new_state, previous_state)` after every
    /// change until the returned subscription is cancelled.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        register(&self.inner.listeners, Arc::new(listener))
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Drop every listener. Later writes still apply but notify nobody.
    pub fn destroy(&self) {
        if !self.inner.destroyed.swap(true, Ordering::SeqCst) {
            tracing::debug!(listeners = self.listener_count(), "store destroyed");
        }
        self.inner.listeners.write().clear();
    }

    /// Returns true once `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Attach a middleware layer.
    pub fn layer(&self, middleware: Arc<dyn Middleware<S>>) {
        self.inner.middleware.write().push(middleware);
    }

    /// A handle that does not keep the store alive.
    pub(crate) fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Replace the state without running middleware hooks.
    pub(crate) fn replace_raw(&self, state: Arc<S>) {
        self.commit(move |_| state, true);
    }

    fn commit<F>(&self, f: F, replace: bool) -> bool
    where
        F: FnOnce(&Arc<S>) -> Arc<S>,
    {
        let (next, previous) = {
            let _gate = self.inner.write_gate.lock();
            let previous = self.get_state();
            let next = f(&previous);
            if !replace && Arc::ptr_eq(&next, &previous) {
                return false;
            }
            *self.inner.state.write() = Arc::clone(&next);
            (next, previous)
        };

        // Listeners run outside the gate so they may write again.
        self.notify(&next, &previous);
        true
    }

    /// Notify all listeners of a state change.
    fn notify(&self, next: &S, previous: &S) {
        // Snapshot first: the order of this pass is fixed before any
        // listener gets a chance to write again.
        let listeners = self.inner.listeners.read().snapshot();
        for listener in listeners {
            listener(next, previous);
        }
    }

    fn run_middleware(&self) {
        let layers = self.inner.middleware.read().clone();
        for layer in layers {
            layer.after_set(self);
        }
    }
}

/// Non-owning store handle, for tasks that may outlive the store.
pub(crate) struct WeakStore<S> {
    inner: Weak<StoreInner<S>>,
}

impl<S> WeakStore<S> {
    pub(crate) fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.inner.state.read())
            .field("listeners", &self.inner.listeners.read().len())
            .field("destroyed", &self.inner.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}
