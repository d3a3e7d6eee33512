use crate::error::{PersistError, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::{Future, IntoFuture};

/// A value that is either already settled or still being computed.
///
/// Combinators applied to a settled thenable run synchronously, in order.
/// Applied to a pending one they are chained inside the underlying future.
/// A rejection skips every `then`/`map` stage until the next `catch`.
#[must_use = "a pending thenable does nothing unless awaited or detached"]
pub struct Thenable<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Ready(Result<T>),
    Pending(BoxFuture<'static, Result<T>>),
}

impl<T: Send + 'static> Thenable<T> {
    /// A thenable fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Inner::Ready(Ok(value)),
        }
    }

    /// A thenable rejected with `err`.
    pub fn rejected(err: PersistError) -> Self {
        Self {
            inner: Inner::Ready(Err(err)),
        }
    }

    /// Wrap an already computed result.
    pub fn from_result(result: Result<T>) -> Self {
        Self {
            inner: Inner::Ready(result),
        }
    }

    /// Wrap a future. The thenable stays pending until the future is driven.
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Pending(fut.boxed()),
        }
    }

    /// Returns true if the thenable has already settled.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(_))
    }

    /// Take the settled result, or get the thenable back if it is pending.
    pub fn try_ready(self) -> std::result::Result<Result<T>, Self> {
        match self.inner {
            Inner::Ready(result) => Ok(result),
            pending => Err(Self { inner: pending }),
        }
    }

    /// Chain a continuation that produces another thenable.
    pub fn then<U, F>(self, f: F) -> Thenable<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Thenable<U> + Send + 'static,
    {
        match self.inner {
            Inner::Ready(Ok(value)) => f(value),
            Inner::Ready(Err(err)) => Thenable::rejected(err),
            Inner::Pending(fut) => Thenable::from_future(async move {
                let value = fut.await?;
                f(value).await
            }),
        }
    }

    /// Chain a fallible synchronous continuation.
    pub fn and_then<U, F>(self, f: F) -> Thenable<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        self.then(move |value| Thenable::from_result(f(value)))
    }

    /// Transform the fulfilled value.
    pub fn map<U, F>(self, f: F) -> Thenable<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Thenable::resolved(f(value)))
    }

    /// Handle a rejection. A fulfilled chain passes through untouched.
    pub fn catch<F>(self, f: F) -> Thenable<T>
    where
        F: FnOnce(PersistError) -> Thenable<T> + Send + 'static,
    {
        match self.inner {
            Inner::Ready(Err(err)) => f(err),
            Inner::Ready(Ok(value)) => Thenable::resolved(value),
            Inner::Pending(fut) => Thenable::from_future(async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(err) => f(err).await,
                }
            }),
        }
    }

    /// Observe a rejection without handling it.
    pub fn inspect_err<F>(self, f: F) -> Thenable<T>
    where
        F: FnOnce(&PersistError) + Send + 'static,
    {
        self.catch(move |err| {
            f(&err);
            Thenable::rejected(err)
        })
    }

    /// Throw-immediately mode.
    ///
    /// If the chain has already been rejected synchronously the error is
    /// returned right away instead of waiting for a consumer that may never
    /// attach. Pending and fulfilled thenables are handed back.
    pub fn rethrow(self) -> Result<Self> {
        match self.inner {
            Inner::Ready(Err(err)) => Err(err),
            other => Ok(Self { inner: other }),
        }
    }
}

impl<T: Send + 'static> IntoFuture for Thenable<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self.inner {
            Inner::Ready(result) => future::ready(result).boxed(),
            Inner::Pending(fut) => fut,
        }
    }
}

impl<T: Send + 'static> From<Result<T>> for Thenable<T> {
    fn from(result: Result<T>) -> Self {
        Thenable::from_result(result)
    }
}

impl<T> fmt::Debug for Thenable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Ready(Ok(_)) => f.write_str("Thenable::Fulfilled"),
            Inner::Ready(Err(err)) => write!(f, "Thenable::Rejected({err})"),
            Inner::Pending(_) => f.write_str("Thenable::Pending"),
        }
    }
}

/// Values an operation may return: a plain result or a thenable.
pub trait IntoThenable<T> {
    fn into_thenable(self) -> Thenable<T>;
}

impl<T: Send + 'static> IntoThenable<T> for Thenable<T> {
    fn into_thenable(self) -> Thenable<T> {
        self
    }
}

impl<T: Send + 'static> IntoThenable<T> for Result<T> {
    fn into_thenable(self) -> Thenable<T> {
        Thenable::from_result(self)
    }
}

/// Wrap a sync-or-async operation so every call yields a [`Thenable`].
///
/// The operation runs as soon as the wrapper is called. An `Err` becomes a
/// rejected thenable for the next `catch` in the chain.
///
/// # Example
///
/// ```
/// use statebox::{thenablify, PersistError};
///
/// let parse = thenablify(|raw: &str| {
///     raw.parse::<i32>()
///         .map_err(|e| PersistError::Deserialization(e.to_string()))
/// });
/// let doubled = parse("21").map(|n| n * 2);
/// assert_eq!(doubled.try_ready().ok(), Some(Ok(42)));
/// ```
pub fn thenablify<A, T, R, F>(f: F) -> impl Fn(A) -> Thenable<T>
where
    T: Send + 'static,
    R: IntoThenable<T>,
    F: Fn(A) -> R,
{
    move |args| f(args).into_thenable()
}
