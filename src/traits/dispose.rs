//! Disposal trait for resource cleanup.

/// Cleanup run when the injector or context an instance was registered
/// with is destroyed.
///
/// Disposers run in LIFO order together with the other destroy callbacks.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Dispose, Injector, Platform, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Pool {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Pool {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let root = Injector::root(Platform::builder().build());
/// let request = root.create_child().unwrap();
/// let pool = Arc::new(Pool { closed: AtomicBool::new(false) });
/// request.register_disposer(pool.clone()).unwrap();
///
/// request.destroy();
/// assert!(pool.closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Releases the resources held by this instance.
    fn dispose(&self);
}
