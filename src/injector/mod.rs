//! The hierarchical injector.
//!
//! An [`Injector`] is a node in a parent-linked tree of scopes. Each node owns
//! a token-to-record map and resolves tokens by walking its own map before
//! delegating to its parent. See [`resolve`](self) for the lookup algorithm
//! and the runtime pipeline for how class records are constructed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::descriptor::{Injectable, ProvidedIn, ProviderBinding, ProviderKind, TypeDescriptor};
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::internal::{DestroyHooks, HookId};
use crate::pipeline::{run_design, DesignContext};
use crate::platform::Platform;
use crate::record::{AnyArc, FactoryRecord, TokenMap};
use crate::token::{Token, INJECTOR, INVOCATION_CONTEXT, PLATFORM, ROOT_INJECTOR};

mod invoke;
mod resolve;

pub use invoke::{InvokeArgs, InvokeTarget};
pub use resolve::ResolveOptions;

static NEXT_INJECTOR: AtomicU64 = AtomicU64::new(1);

/// Scope marker of an injector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "graph-export", derive(serde::Serialize))]
pub enum InjectorScope {
    /// The single parentless injector of a tree.
    Platform,
    /// The application root, child of the platform injector.
    Root,
    /// Short-lived injector layering call- or class-scoped providers.
    Static,
    /// A scope registered by name on the platform.
    Named(String),
    /// Plain child scope.
    None,
}

/// Node in the injector tree.
///
/// `Injector` is a cheap handle; clones share the same node. A child holds
/// its parent for lookups, while the parent only keeps a weak destroy hook
/// for each child, so dropping or destroying a child never touches the
/// parent and destroying a parent cascades to every live child.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{InjectFlags, Injector, Platform, Resolver, Token};
///
/// let root = Injector::root(Platform::builder().build());
/// let child = root.create_child().unwrap();
///
/// child.set_value(Token::name("request_id"), 42u64).unwrap();
///
/// assert_eq!(*child.get_token::<u64>(&Token::name("request_id")).unwrap(), 42);
/// assert!(!root.has(&Token::name("request_id"), InjectFlags::DEFAULT).unwrap());
///
/// root.destroy();
/// assert!(child.is_destroyed());
/// ```
#[derive(Clone)]
pub struct Injector {
    pub(crate) inner: Arc<InjectorInner>,
}

pub(crate) struct InjectorInner {
    id: u64,
    scope: InjectorScope,
    parent: Option<Injector>,
    platform: Arc<Platform>,
    records: RwLock<TokenMap<Arc<FactoryRecord>>>,
    // Class tokens that went through the design pipeline here.
    types: RwLock<HashSet<Token>>,
    destroyed: AtomicBool,
    hooks: Mutex<DestroyHooks>,
    parent_hook: Mutex<Option<HookId>>,
}

impl Injector {
    /// Root injector of `platform`'s tree.
    ///
    /// The first call creates the platform-scope injector and the root
    /// beneath it; later calls return the same root while it is alive.
    pub fn root(platform: Arc<Platform>) -> Injector {
        let shared = platform.clone();
        platform.root_or_init(move || {
            let platform_injector = Injector::create(shared, InjectorScope::Platform, None);
            let root = platform_injector.spawn(InjectorScope::Root);
            tracing::debug!(root = root.id(), "injector tree created");
            (platform_injector, root)
        })
    }

    fn create(platform: Arc<Platform>, scope: InjectorScope, parent: Option<Injector>) -> Injector {
        Injector {
            inner: Arc::new(InjectorInner {
                id: NEXT_INJECTOR.fetch_add(1, Ordering::Relaxed),
                scope,
                parent,
                platform,
                records: RwLock::new(TokenMap::default()),
                types: RwLock::new(HashSet::new()),
                destroyed: AtomicBool::new(false),
                hooks: Mutex::new(DestroyHooks::default()),
                parent_hook: Mutex::new(None),
            }),
        }
    }

    // Child wired into this injector's destroy cascade.
    fn spawn(&self, scope: InjectorScope) -> Injector {
        let child = Injector::create(self.inner.platform.clone(), scope, Some(self.clone()));
        let weak = child.downgrade();
        let hook = self.inner.hooks.lock().push_child(Box::new(move || {
            if let Some(child) = Injector::upgrade(&weak) {
                child.destroy();
            }
        }));
        *child.inner.parent_hook.lock() = Some(hook);
        child
    }

    /// Creates a plain child scope.
    pub fn create_child(&self) -> IocResult<Injector> {
        self.ensure_alive()?;
        Ok(self.spawn(InjectorScope::None))
    }

    /// Creates a child scope holding `providers`.
    pub fn create_child_with(&self, providers: impl IntoIterator<Item = ProviderBinding>) -> IocResult<Injector> {
        let child = self.create_child()?;
        child.inject(providers)?;
        Ok(child)
    }

    /// Creates a child scope registered on the platform under `name`.
    ///
    /// Descriptors with `ProvidedIn::Named(name)` register here from then on.
    pub fn create_scope(&self, name: impl Into<String>) -> IocResult<Injector> {
        self.ensure_alive()?;
        let name = name.into();
        let child = self.spawn(InjectorScope::Named(name.clone()));
        self.inner.platform.set_scope(&name, &child);
        tracing::debug!(scope = %name, id = child.id(), "named scope created");
        Ok(child)
    }

    pub(crate) fn create_static_child(&self, providers: Vec<ProviderBinding>) -> IocResult<Injector> {
        self.ensure_alive()?;
        let child = self.spawn(InjectorScope::Static);
        child.inject(providers)?;
        Ok(child)
    }

    pub(crate) fn downgrade(&self) -> Weak<InjectorInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<InjectorInner>) -> Option<Injector> {
        weak.upgrade().map(|inner| Injector { inner })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn scope(&self) -> &InjectorScope {
        &self.inner.scope
    }

    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.inner.platform
    }

    /// Nearest root-scope injector, or the platform's root.
    pub fn root_injector(&self) -> Option<Injector> {
        let mut current = Some(self);
        while let Some(injector) = current {
            if injector.inner.scope == InjectorScope::Root {
                return Some(injector.clone());
            }
            current = injector.parent();
        }
        self.inner.platform.root()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub fn ptr_eq(&self, other: &Injector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of records owned by this injector; zero once destroyed.
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tokens of the records owned by this injector.
    pub fn tokens(&self) -> IocResult<Vec<Token>> {
        self.ensure_alive()?;
        Ok(self.inner.records.read().keys().cloned().collect())
    }

    pub(crate) fn ensure_alive(&self) -> IocResult<()> {
        if self.is_destroyed() {
            Err(IocError::Destroyed("Injector"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn record(&self, token: &Token) -> Option<Arc<FactoryRecord>> {
        self.inner.records.read().get(token).cloned()
    }

    pub(crate) fn records(&self) -> Vec<Arc<FactoryRecord>> {
        self.inner.records.read().values().cloned().collect()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.inner.hooks.lock().children()
    }

    // Owning injector for a `provided_in` marker.
    fn owner_for(&self, provided_in: &ProvidedIn) -> Injector {
        let platform = &self.inner.platform;
        let found = match provided_in {
            ProvidedIn::None => None,
            ProvidedIn::Root => self.root_injector(),
            ProvidedIn::Platform => platform.injector(),
            ProvidedIn::Named(name) => platform.scope(name),
        };
        found.unwrap_or_else(|| self.clone())
    }

    /// Where on-the-fly registrations from this injector land.
    ///
    /// Static scopes are transient, so they defer to their parent.
    pub(crate) fn registration_target(&self) -> Injector {
        match (&self.inner.scope, self.parent()) {
            (InjectorScope::Static, Some(parent)) => parent.registration_target(),
            _ => self.clone(),
        }
    }

    /// Registers a type descriptor and returns the injector that owns it.
    ///
    /// The owner is picked from the descriptor's `provided_in` marker; a
    /// named scope that does not exist yet falls back to `self`. Registering
    /// a type its owner already knows is a no-op.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_ioc::{Injector, Platform, ProvidedIn, Resolver, TypeDescriptor};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    ///
    /// let root = Injector::root(Platform::builder().build());
    /// let child = root.create_child().unwrap();
    ///
    /// let owner = child
    ///     .register(
    ///         TypeDescriptor::builder::<Clock>()
    ///             .construct(|_| Ok(Clock))
    ///             .provided_in(ProvidedIn::Root)
    ///             .as_static()
    ///             .build(),
    ///     )
    ///     .unwrap();
    ///
    /// assert!(owner.ptr_eq(&root));
    /// let a = child.get::<Clock>().unwrap();
    /// let b = root.get::<Clock>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn register(&self, descriptor: TypeDescriptor) -> IocResult<Injector> {
        self.register_arc(Arc::new(descriptor))
    }

    pub fn register_type<T: Injectable>(&self) -> IocResult<Injector> {
        self.register(T::descriptor())
    }

    /// Registers descriptors in order, stopping at the first failure.
    pub fn register_all(&self, descriptors: impl IntoIterator<Item = TypeDescriptor>) -> IocResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    pub(crate) fn register_arc(&self, descriptor: Arc<TypeDescriptor>) -> IocResult<Injector> {
        self.ensure_alive()?;
        let owner = self.owner_for(descriptor.provided_in());
        owner.ensure_alive()?;

        let token = descriptor.token().clone();
        if owner.inner.records.read().contains_key(&token) || !owner.inner.types.write().insert(token.clone()) {
            tracing::trace!(token = %token, "type already registered");
            return Ok(owner);
        }

        let mut ctx = DesignContext::new(&owner, &descriptor);
        if let Err(err) = run_design(owner.inner.platform.design_stages(), &mut ctx) {
            owner.inner.types.write().remove(&token);
            return Err(err);
        }
        let reflect = ctx.into_reflect();
        owner.inner.platform.store_reflect(Arc::new(reflect));
        tracing::debug!(token = %token, owner = owner.id(), scope = ?owner.scope(), "type registered");
        Ok(owner)
    }

    /// Binds top-level provider declarations on this injector.
    pub fn inject(&self, providers: impl IntoIterator<Item = ProviderBinding>) -> IocResult<()> {
        self.ensure_alive()?;
        for binding in providers {
            self.bind(&binding)?;
        }
        Ok(())
    }

    /// Turns one provider binding into a record (or a multi contribution).
    pub(crate) fn bind(&self, binding: &ProviderBinding) -> IocResult<()> {
        self.ensure_alive()?;
        let provide = binding.provide().clone();
        let record = match binding.kind() {
            ProviderKind::Value(value) => FactoryRecord::value(provide.clone(), value.clone()),
            ProviderKind::Class(descriptor) => {
                if descriptor.is_abstract() {
                    return Err(IocError::construction_msg(descriptor.token(), "type is abstract"));
                }
                self.inner.platform.reflect_or_index(descriptor);
                FactoryRecord::class(provide.clone(), descriptor.clone())
                    .with_static(binding.is_static() || descriptor.is_static())
                    .with_expiry(descriptor.expires())
            }
            ProviderKind::Factory { factory, deps } => {
                FactoryRecord::factory(provide.clone(), factory.clone(), deps.clone()).with_static(binding.is_static())
            }
            ProviderKind::Existing(target) => {
                FactoryRecord::existing(provide.clone(), target.clone()).with_static(binding.is_static())
            }
        };

        if binding.is_multi() {
            self.append_multi(provide.clone(), record);
        } else if !self.insert_record(record, binding.as_default) {
            return Ok(());
        }
        self.inner.platform.observers.registered(&provide, &self.inner.scope);
        Ok(())
    }

    /// Inserts `record`, overwriting unless `as_default` and one exists.
    pub(crate) fn insert_record(&self, record: FactoryRecord, as_default: bool) -> bool {
        let token = record.token.clone();
        let replaced = {
            let mut records = self.inner.records.write();
            if as_default && records.contains_key(&token) {
                return false;
            }
            records.insert(token.clone(), Arc::new(record))
        };
        if let Some(old) = replaced {
            tracing::trace!(token = %token, "record overwritten");
            old.unregistered();
        }
        true
    }

    fn append_multi(&self, token: Token, item: FactoryRecord) {
        let replaced = {
            let mut records = self.inner.records.write();
            let entry = records
                .entry(token.clone())
                .or_insert_with(|| Arc::new(FactoryRecord::multi(token.clone())));
            let replaced = if entry.is_multi() {
                None
            } else {
                Some(std::mem::replace(entry, Arc::new(FactoryRecord::multi(token.clone()))))
            };
            entry.push_item(Arc::new(item));
            replaced
        };
        if let Some(old) = replaced {
            tracing::warn!(token = %token, "single provider replaced by a multi provider");
            old.unregistered();
        }
    }

    /// Binds a constant value to `token` on this injector.
    pub fn set_value<T: Send + Sync + 'static>(&self, token: Token, value: T) -> IocResult<()> {
        self.set_arc(token, Arc::new(value))
    }

    pub fn set_arc(&self, token: Token, value: AnyArc) -> IocResult<()> {
        self.ensure_alive()?;
        self.insert_record(FactoryRecord::value(token, value), false);
        Ok(())
    }

    /// Removes the record for `token` from this injector and runs its unregister hook.
    ///
    /// Returns whether a record was removed.
    pub fn unregister(&self, token: &Token) -> IocResult<bool> {
        self.ensure_alive()?;
        let removed = self.inner.records.write().remove(token);
        self.inner.types.write().remove(token);
        match removed {
            Some(record) => {
                tracing::debug!(token = %token, id = self.id(), "record unregistered");
                record.unregistered();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Attaches a cleanup callback run when `token`'s record is unregistered or destroyed.
    pub fn set_unregister_hook<F>(&self, token: &Token, hook: F) -> IocResult<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_alive()?;
        match self.record(token) {
            Some(record) => {
                record.set_unregister_hook(Box::new(hook));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether `token` is resolvable under `flags` without constructing anything.
    pub fn has(&self, token: &Token, flags: InjectFlags) -> IocResult<bool> {
        self.ensure_alive()?;
        Ok(self.contains(token, flags))
    }

    fn contains(&self, token: &Token, flags: InjectFlags) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if *token == INJECTOR || *token == PLATFORM || *token == ROOT_INJECTOR {
            return true;
        }
        if *token == INVOCATION_CONTEXT {
            return false;
        }
        if self.inner.platform.has_singleton(token) {
            return true;
        }
        if flags.checks_self() && self.inner.records.read().contains_key(token) {
            return true;
        }
        match (&self.inner.parent, flags.checks_parent()) {
            (Some(parent), true) => parent.contains(token, flags.for_parent()),
            _ => false,
        }
    }

    /// Originating class of the record for `token`, searching up the tree.
    pub fn provider_type(&self, token: &Token) -> IocResult<Option<Token>> {
        self.ensure_alive()?;
        Ok(self.origin(token))
    }

    pub(crate) fn origin(&self, token: &Token) -> Option<Token> {
        let mut current = Some(self);
        while let Some(injector) = current {
            if let Some(record) = injector.record(token) {
                return record.ty.clone();
            }
            current = injector.parent();
        }
        None
    }

    /// Registers a callback run when this injector is destroyed.
    pub fn on_destroy<F>(&self, callback: F) -> IocResult<HookId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.hooks.lock().push(Box::new(callback)))
    }

    /// Removes a destroy callback without running it.
    pub fn remove_destroy_hook(&self, id: HookId) -> bool {
        self.inner.hooks.lock().remove(id)
    }

    /// Destroys this injector and, transitively, all of its children.
    ///
    /// Destroy callbacks run in reverse registration order, then every
    /// record is removed and its unregister hook invoked. Calling `destroy`
    /// again is a no-op; any other operation afterwards fails with
    /// [`IocError::Destroyed`].
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(id = self.id(), scope = ?self.scope(), "destroying injector");

        let hooks = self.inner.hooks.lock().take();
        hooks.run_all_reverse();

        let records: Vec<_> = self.inner.records.write().drain().map(|(_, record)| record).collect();
        for record in records {
            record.unregistered();
        }
        self.inner.types.write().clear();

        if let InjectorScope::Named(name) = &self.inner.scope {
            self.inner.platform.remove_scope(name, &self.inner);
        }
        self.inner.detach_from_parent();
        self.inner.platform.observers.destroyed(&self.inner.scope);
    }
}

impl InjectorInner {
    fn detach_from_parent(&self) {
        let hook = self.parent_hook.lock().take();
        if let (Some(parent), Some(hook)) = (&self.parent, hook) {
            parent.inner.hooks.lock().remove(hook);
        }
    }
}

impl Drop for InjectorInner {
    fn drop(&mut self) {
        // Dropped without destroy: leave no dangling cascade entry behind.
        self.detach_from_parent();
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("scope", &self.inner.scope)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.id()))
            .field("records", &self.inner.records.read().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Resolver;

    fn root() -> Injector {
        Injector::root(Platform::builder().build())
    }

    #[test]
    fn root_is_unique_per_platform() {
        let platform = Platform::builder().build();
        let a = Injector::root(platform.clone());
        let b = Injector::root(platform.clone());
        assert!(a.ptr_eq(&b));
        assert_eq!(a.parent().map(|p| p.scope().clone()), Some(InjectorScope::Platform));
        assert!(platform.injector().unwrap().parent().is_none());
    }

    #[test]
    fn dropped_children_leave_no_cascade_hook() {
        let root = root();
        {
            let _child = root.create_child().unwrap();
            assert_eq!(root.child_count(), 1);
        }
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn destroyed_child_detaches_from_parent() {
        let root = root();
        let child = root.create_child().unwrap();
        child.destroy();
        assert_eq!(root.child_count(), 0);
        assert!(!root.is_destroyed());
        assert!(matches!(child.create_child(), Err(IocError::Destroyed(_))));
    }

    #[test]
    fn as_default_keeps_the_existing_record() {
        let root = root();
        let token = Token::name("mode");
        root.inject([ProviderBinding::value(token.clone(), "first")]).unwrap();
        root.inject([ProviderBinding::value(token.clone(), "second").as_default()]).unwrap();
        assert_eq!(*root.get_token::<&str>(&token).unwrap(), "first");
    }

    #[test]
    fn unregister_runs_hook_and_removes_record() {
        let root = root();
        let token = Token::name("conn");
        let closed = Arc::new(AtomicBool::new(false));
        root.set_value(token.clone(), 1u8).unwrap();
        let flag = closed.clone();
        assert!(root.set_unregister_hook(&token, move || flag.store(true, Ordering::SeqCst)).unwrap());
        assert!(root.unregister(&token).unwrap());
        assert!(closed.load(Ordering::SeqCst));
        assert!(!root.has(&token, InjectFlags::DEFAULT).unwrap());
        assert!(!root.unregister(&token).unwrap());
    }

    #[test]
    fn reads_after_destroy_fail() {
        let root = root();
        let child = root.create_child().unwrap();
        child.set_value(Token::name("id"), 1u8).unwrap();
        child.destroy();
        assert!(matches!(child.has(&Token::name("id"), InjectFlags::DEFAULT), Err(IocError::Destroyed(_))));
        assert!(matches!(child.tokens(), Err(IocError::Destroyed(_))));
        assert!(matches!(child.provider_type(&Token::name("id")), Err(IocError::Destroyed(_))));
        assert!(child.is_empty());
    }

    #[test]
    fn named_scope_is_released_on_destroy() {
        let root = root();
        let scope = root.create_scope("request").unwrap();
        assert!(root.platform().scope("request").unwrap().ptr_eq(&scope));
        scope.destroy();
        assert!(root.platform().scope("request").is_none());
    }
}
