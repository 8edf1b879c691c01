//! Parameters shared between nested chains.
//!
//! A chain owns its parameters. When a step body starts a chain of its own and
//! both must see the same value, wrap it in [`SharedParams`] and let each chain
//! own a clone of the handle.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// A cloneable handle to one parameter value behind an async mutex.
///
/// # Example
///
/// ```rust
/// use millrace::{Chain, SharedParams};
///
/// # tokio_test::block_on(async {
/// let shared = SharedParams::new(Vec::<&str>::new());
///
/// let outer = Chain::<_, String>::new(shared.clone())
///     .step(|p, _| Box::pin(async move {
///         p.lock().await.push("outer");
///
///         let inner = Chain::<_, String>::new(p.clone())
///             .step(|q, _| Box::pin(async move {
///                 q.lock().await.push("inner");
///                 Ok(())
///             }))
///             .await;
///         inner.result().map(|_| ()).map_err(|e| e.to_string())
///     }))
///     .await;
///
/// assert!(outer.result().is_ok());
/// assert_eq!(shared.snapshot().await, vec!["outer", "inner"]);
/// # });
/// ```
pub struct SharedParams<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedParams<T> {
    /// Wrap `value` for sharing.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Lock the value. The guard may be held across `.await`.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Run `f` against the value while holding the lock.
    pub async fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    /// Number of handles currently sharing the value.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Take the value back if this is the last handle.
    ///
    /// Returns `Err(self)` while other handles are alive.
    pub fn try_unwrap(self) -> Result<T, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<T: Clone> SharedParams<T> {
    /// Clone the current value out.
    pub async fn snapshot(&self) -> T {
        self.inner.lock().await.clone()
    }
}

impl<T> Clone for SharedParams<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for SharedParams<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedParams<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(value) => f.debug_tuple("SharedParams").field(&*value).finish(),
            Err(_) => f.write_str("SharedParams(<locked>)"),
        }
    }
}
