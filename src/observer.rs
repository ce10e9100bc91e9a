//! Diagnostic observers for resolution and lifecycle events.
//!
//! Observers are attached once on the [`PlatformBuilder`](crate::PlatformBuilder)
//! and notified synchronously by every injector of the tree. Keep
//! implementations cheap; they run on the resolution path.

use std::sync::Arc;
use std::time::Duration;

use crate::error::IocError;
use crate::injector::InjectorScope;
use crate::token::Token;

/// Observer trait for injector events.
///
/// Only records that actually construct something are reported; cached
/// values and constants are returned without notification.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, IocError, Platform, ResolutionObserver, Token};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl ResolutionObserver for Counting {
///     fn resolving(&self, _token: &Token) {}
///     fn resolved(&self, _token: &Token, _took: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
///     fn failed(&self, _token: &Token, _error: &IocError) {}
/// }
///
/// let counter = Arc::new(Counting::default());
/// let platform = Platform::builder().observer(counter.clone()).build();
/// let root = Injector::root(platform);
/// # let _ = root;
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before a record starts constructing.
    fn resolving(&self, token: &Token);

    /// Called after a record produced its value.
    fn resolved(&self, token: &Token, took: Duration);

    /// Called when construction failed.
    fn failed(&self, token: &Token, error: &IocError);

    /// Called when a record is registered on an injector.
    fn registered(&self, _token: &Token, _scope: &InjectorScope) {}

    /// Called once when an injector is destroyed.
    fn destroyed(&self, _scope: &InjectorScope) {}
}

/// Container for registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, token: &Token) {
        for observer in &self.observers {
            observer.resolving(token);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, token: &Token, took: Duration) {
        for observer in &self.observers {
            observer.resolved(token, took);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, token: &Token, error: &IocError) {
        for observer in &self.observers {
            observer.failed(token, error);
        }
    }

    #[inline]
    pub(crate) fn registered(&self, token: &Token, scope: &InjectorScope) {
        for observer in &self.observers {
            observer.registered(token, scope);
        }
    }

    #[inline]
    pub(crate) fn destroyed(&self, scope: &InjectorScope) {
        for observer in &self.observers {
            observer.destroyed(scope);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Resolution events are emitted at `TRACE`, failures at `WARN`, and
/// registration and destruction at `DEBUG`, all under the `ferrous_ioc`
/// target.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, Platform, TracingObserver};
/// use std::sync::Arc;
///
/// let platform = Platform::builder()
///     .observer(Arc::new(TracingObserver::new()))
///     .build();
/// let root = Injector::root(platform);
/// # let _ = root;
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self {
            label: "ioc".to_string(),
        }
    }

    /// Tags every event with `label`, e.g. the application name.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for TracingObserver {
    fn resolving(&self, token: &Token) {
        tracing::trace!(target: "ferrous_ioc", label = %self.label, token = %token, "resolving");
    }

    fn resolved(&self, token: &Token, took: Duration) {
        tracing::trace!(
            target: "ferrous_ioc",
            label = %self.label,
            token = %token,
            micros = took.as_micros() as u64,
            "resolved"
        );
    }

    fn failed(&self, token: &Token, error: &IocError) {
        tracing::warn!(target: "ferrous_ioc", label = %self.label, token = %token, error = %error, "resolution failed");
    }

    fn registered(&self, token: &Token, scope: &InjectorScope) {
        tracing::debug!(target: "ferrous_ioc", label = %self.label, token = %token, scope = ?scope, "registered");
    }

    fn destroyed(&self, scope: &InjectorScope) {
        tracing::debug!(target: "ferrous_ioc", label = %self.label, scope = ?scope, "injector destroyed");
    }
}
