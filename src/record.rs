//! Factory records: the per-token registrations owned by an injector.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::descriptor::{Dep, FactoryFn, TypeDescriptor};
use crate::token::Token;

// Type-erased Arc for storage
pub type AnyArc = Arc<dyn Any + Send + Sync>;

#[cfg(feature = "ahash")]
pub(crate) type TokenMap<V> = HashMap<Token, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type TokenMap<V> = HashMap<Token, V>;

static NEXT_RECORD: AtomicU64 = AtomicU64::new(1);

/// Kind of a factory record, as reported by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize))]
pub enum RecordKind {
    /// Constant value
    Value,
    /// Constructor driven by the runtime pipeline
    Class,
    /// Factory function with a dependency list
    Factory,
    /// Indirection to another token
    Existing,
    /// Aggregated multi-provider
    Multi,
}

pub(crate) enum Producer {
    Value(AnyArc),
    Class(Arc<TypeDescriptor>),
    Factory { factory: FactoryFn, deps: Vec<Dep> },
    Existing(Token),
    Multi(RwLock<Vec<Arc<FactoryRecord>>>),
}

/// Per-token registration describing how to produce and cache a value.
pub(crate) struct FactoryRecord {
    pub(crate) id: u64,
    pub(crate) token: Token,
    pub(crate) producer: Producer,
    /// Originating class, for provider-type queries.
    pub(crate) ty: Option<Token>,
    pub(crate) is_static: bool,
    pub(crate) expires_after: Option<Duration>,
    // Swapped out wholesale on reset so in-flight readers keep their own cell.
    slot: Mutex<Arc<OnceCell<AnyArc>>>,
    cache: Mutex<Option<(AnyArc, Instant)>>,
    unregister: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FactoryRecord {
    fn new(token: Token, producer: Producer) -> Self {
        Self {
            id: NEXT_RECORD.fetch_add(1, Ordering::Relaxed),
            token,
            producer,
            ty: None,
            is_static: false,
            expires_after: None,
            slot: Mutex::new(Arc::new(OnceCell::new())),
            cache: Mutex::new(None),
            unregister: Mutex::new(None),
        }
    }

    pub(crate) fn value(token: Token, value: AnyArc) -> Self {
        Self::new(token, Producer::Value(value))
    }

    pub(crate) fn class(token: Token, descriptor: Arc<TypeDescriptor>) -> Self {
        let ty = descriptor.token().clone();
        let mut record = Self::new(token, Producer::Class(descriptor));
        record.ty = Some(ty);
        record
    }

    pub(crate) fn factory(token: Token, factory: FactoryFn, deps: Vec<Dep>) -> Self {
        Self::new(token, Producer::Factory { factory, deps })
    }

    pub(crate) fn existing(token: Token, target: Token) -> Self {
        let mut record = Self::new(token, Producer::Existing(target.clone()));
        record.ty = Some(target);
        record
    }

    pub(crate) fn multi(token: Token) -> Self {
        Self::new(token, Producer::Multi(RwLock::new(Vec::new())))
    }

    pub(crate) fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub(crate) fn with_expiry(mut self, ttl: Option<Duration>) -> Self {
        self.expires_after = ttl;
        self
    }

    pub(crate) fn with_type(mut self, ty: Option<Token>) -> Self {
        if ty.is_some() {
            self.ty = ty;
        }
        self
    }

    pub(crate) fn kind(&self) -> RecordKind {
        match self.producer {
            Producer::Value(_) => RecordKind::Value,
            Producer::Class(_) => RecordKind::Class,
            Producer::Factory { .. } => RecordKind::Factory,
            Producer::Existing(_) => RecordKind::Existing,
            Producer::Multi(_) => RecordKind::Multi,
        }
    }

    pub(crate) fn is_multi(&self) -> bool {
        matches!(self.producer, Producer::Multi(_))
    }

    /// Appends a contribution to a multi record; no-op on other kinds.
    pub(crate) fn push_item(&self, item: Arc<FactoryRecord>) {
        if let Producer::Multi(items) = &self.producer {
            items.write().push(item);
        }
    }

    pub(crate) fn items(&self) -> Vec<Arc<FactoryRecord>> {
        match &self.producer {
            Producer::Multi(items) => items.read().clone(),
            _ => Vec::new(),
        }
    }

    /// Tokens this record depends on, for diagnostics.
    pub(crate) fn dep_tokens(&self) -> Vec<Token> {
        match &self.producer {
            Producer::Factory { deps, .. } => deps.iter().filter_map(|d| d.as_token().cloned()).collect(),
            Producer::Class(desc) => desc.params().iter().filter_map(|p| p.lookup_token().cloned()).collect(),
            Producer::Existing(target) => vec![target.clone()],
            Producer::Multi(items) => items.read().iter().flat_map(|i| i.dep_tokens()).collect(),
            Producer::Value(_) => Vec::new(),
        }
    }

    /// Time-boxed caching wins over `is_static` whenever a TTL is set.
    #[inline]
    pub(crate) fn memoizes_forever(&self) -> bool {
        self.is_static && self.expires_after.is_none()
    }

    /// Shared handle on the single-flight cell for static records.
    pub(crate) fn slot(&self) -> Arc<OnceCell<AnyArc>> {
        self.slot.lock().clone()
    }

    /// Cached value within its TTL; refreshes the access time on a hit.
    pub(crate) fn cached(&self, now: Instant) -> Option<AnyArc> {
        let ttl = self.expires_after?;
        let mut cache = self.cache.lock();
        match cache.as_mut() {
            Some((value, last_access)) if now.saturating_duration_since(*last_access) < ttl => {
                *last_access = now;
                Some(value.clone())
            }
            Some(_) => {
                *cache = None;
                None
            }
            None => None,
        }
    }

    pub(crate) fn store(&self, value: AnyArc, now: Instant) {
        *self.cache.lock() = Some((value, now));
    }

    /// Whether a value is currently materialized.
    pub(crate) fn has_value(&self) -> bool {
        match &self.producer {
            Producer::Value(_) => true,
            _ => self.slot.lock().get().is_some() || self.cache.lock().is_some(),
        }
    }

    /// Drops any memoized value.
    pub(crate) fn reset(&self) {
        *self.slot.lock() = Arc::new(OnceCell::new());
        *self.cache.lock() = None;
    }

    pub(crate) fn set_unregister_hook(&self, hook: Box<dyn FnOnce() + Send>) {
        *self.unregister.lock() = Some(hook);
    }

    /// Runs the unregister hook once and drops memoized values.
    pub(crate) fn unregistered(&self) {
        let hook = self.unregister.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        for item in self.items() {
            item.unregistered();
        }
        self.reset();
    }
}

impl std::fmt::Debug for FactoryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRecord")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("kind", &self.kind())
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .field("expires_after", &self.expires_after)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn expiry_refreshes_on_hit_and_clears_when_stale() {
        let record = FactoryRecord::value(Token::name("v"), Arc::new(0u8))
            .with_expiry(Some(Duration::from_millis(100)));
        let t0 = Instant::now();
        record.store(Arc::new(1u8), t0);
        assert!(record.cached(t0 + Duration::from_millis(90)).is_some());
        // access at 90ms moved the window
        assert!(record.cached(t0 + Duration::from_millis(180)).is_some());
        assert!(record.cached(t0 + Duration::from_millis(400)).is_none());
        assert!(record.cached(t0 + Duration::from_millis(401)).is_none());
    }

    #[test]
    fn reset_swaps_the_cell() {
        let record = FactoryRecord::multi(Token::name("m")).with_static(true);
        let old = record.slot();
        assert!(old.set(Arc::new(1u8) as AnyArc).is_ok());
        record.reset();
        assert!(old.get().is_some());
        assert!(record.slot().get().is_none());
    }

    #[test]
    fn unregister_hook_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let record = FactoryRecord::value(Token::name("v"), Arc::new(()));
        let counter = runs.clone();
        record.set_unregister_hook(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        record.unregistered();
        record.unregistered();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expiry_overrides_static() {
        let record = FactoryRecord::value(Token::name("v"), Arc::new(()))
            .with_static(true)
            .with_expiry(Some(Duration::from_secs(1)));
        assert!(!record.memoizes_forever());
    }
}
