use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::RwLockReadGuard;
use tokio::sync::RwLockWriteGuard;

/// An `Arc<RwLock<T>>` wrapper to make data thread-safe and easy to work with.
///
/// Clones share the same underlying data.  A clone is the way to obtain a
/// mutable handle, so write access is visible at the call site.
///
/// # Examples
/// ```
/// # use nodecore_pop_miner::locks::tokio::AtomicRw;
/// struct Car {
///     year: u16,
/// };
/// # tokio_test::block_on(async {
/// let mut atomic_car = AtomicRw::from(Car{year: 2016});
/// atomic_car.lock(|c| {println!("year: {}", c.year)}).await;
/// atomic_car.lock_mut(|c| {c.year = 2023}).await;
/// # })
/// ```
///
/// A name may be given during instantiation.  Named locks log acquisitions
/// at trace level.
///
/// ```
/// # use nodecore_pop_miner::locks::tokio::AtomicRw;
/// # tokio_test::block_on(async {
/// let counter = AtomicRw::<u32>::from((0, Some("counter")));
/// assert_eq!(Some("counter"), counter.name());
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    name: Option<&'static str>,
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            name: None,
        }
    }
}

impl<T> From<T> for AtomicRw<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            name: None,
        }
    }
}

impl<T> From<(T, Option<&'static str>)> for AtomicRw<T> {
    /// Create from a value and an optional lock name.
    #[inline]
    fn from(v: (T, Option<&'static str>)) -> Self {
        Self {
            inner: Arc::new(RwLock::new(v.0)),
            name: v.1,
        }
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: self.name,
        }
    }
}

impl<T> AtomicRw<T> {
    /// Acquire read lock and return a `RwLockReadGuard`
    ///
    /// # Examples
    /// ```
    /// # use nodecore_pop_miner::locks::tokio::AtomicRw;
    /// struct Car {
    ///     year: u16,
    /// };
    /// # tokio_test::block_on(async {
    /// let atomic_car = AtomicRw::from(Car{year: 2016});
    /// let year = atomic_car.lock_guard().await.year;
    /// # })
    ///```
    pub async fn lock_guard(&self) -> RwLockReadGuard<'_, T> {
        self.trace_acquire("read");
        self.inner.read().await
    }

    /// Acquire write lock and return a `RwLockWriteGuard`
    pub async fn lock_guard_mut(&mut self) -> RwLockWriteGuard<'_, T> {
        self.trace_acquire("write");
        self.inner.write().await
    }

    /// Immutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.trace_acquire("read");
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Mutably access the data of type `T` in a closure and possibly return a result of type `R`
    ///
    /// # Examples
    /// ```
    /// # use nodecore_pop_miner::locks::tokio::AtomicRw;
    /// # tokio_test::block_on(async {
    /// let mut atomic_year = AtomicRw::from(2016u16);
    /// let year = atomic_year.lock_mut(|y| {*y = 2023; *y}).await;
    /// assert_eq!(2023, year);
    /// # })
    /// ```
    pub async fn lock_mut<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.trace_acquire("write");
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// retrieve lock name if present, or None
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name
    }

    /// true if both handles refer to the same underlying data.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn trace_acquire(&self, acquisition: &str) {
        if let Some(name) = self.name {
            tracing::trace!("acquire {} lock `{}`", acquisition, name);
        }
    }
}
