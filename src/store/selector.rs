use super::listeners::Subscription;
use super::store::Store;
use crate::shallow::Shallow;
use parking_lot::Mutex;
use std::sync::Arc;

type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Options for [`Store::subscribe_with_selector_opts`].
pub struct SelectorOptions<T> {
    equality: Equality<T>,
    fire_immediately: bool,
}

impl<T: Shallow + 'static> Default for SelectorOptions<T> {
    fn default() -> Self {
        Self {
            equality: Arc::new(|a: &T, b: &T| a.shallow_eq(b)),
            fire_immediately: false,
        }
    }
}

impl<T> SelectorOptions<T> {
    /// Options using a caller-supplied equality check.
    pub fn with_equality<F>(equality: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            equality: Arc::new(equality),
            fire_immediately: false,
        }
    }

    /// Replace the equality check.
    pub fn equality<F>(mut self, equality: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.equality = Arc::new(equality);
        self
    }

    /// Invoke the listener once with the current slice on subscription.
    pub fn fire_immediately(mut self, fire: bool) -> Self {
        self.fire_immediately = fire;
        self
    }
}

impl<S: Send + Sync + 'static> Store<S> {
    /// Subscribe to a derived slice of the state.
    ///
    /// The listener runs with `(new_slice, previous_slice)` only when the
    /// slice is not shallowly equal to the last one seen.
    ///
    /// # Example
    ///
    /// ```
    /// use statebox::Store;
    ///
    /// let store = Store::new((0u32, String::from("idle")));
    /// store.subscribe_with_selector(|s| s.0, |count, _| println!("count = {count}"));
    ///
    /// store.update(|s| s.1 = "busy".into()); // slice unchanged, silent
    /// store.update(|s| s.0 += 1); // prints "count = 1"
    /// ```
    pub fn subscribe_with_selector<T, Sel, L>(&self, selector: Sel, listener: L) -> Subscription
    where
        T: Shallow + Clone + Send + 'static,
        Sel: Fn(&S) -> T + Send + Sync + 'static,
        L: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.subscribe_with_selector_opts(selector, listener, SelectorOptions::default())
    }

    /// Subscribe to a derived slice with explicit options.
    pub fn subscribe_with_selector_opts<T, Sel, L>(
        &self,
        selector: Sel,
        listener: L,
        options: SelectorOptions<T>,
    ) -> Subscription
    where
        T: Clone + Send + 'static,
        Sel: Fn(&S) -> T + Send + Sync + 'static,
        L: Fn(&T, &T) + Send + Sync + 'static,
    {
        let initial = self.read(&selector);
        if options.fire_immediately {
            listener(&initial, &initial);
        }

        let current = Mutex::new(initial);
        let equality = options.equality;
        self.subscribe(move |state, _previous| {
            let next = selector(state);
            let previous = {
                let mut slot = current.lock();
                if equality(&*slot, &next) {
                    return;
                }
                std::mem::replace(&mut *slot, next.clone())
            };
            listener(&next, &previous);
        })
    }
}
