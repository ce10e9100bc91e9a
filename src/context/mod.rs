//! Invocation contexts: short-lived resolution scopes for method calls.
//!
//! A context layers named values, call-site arguments and custom argument
//! resolvers on top of an [`Injector`], and can chain to other contexts
//! through refs. It either *owns* its injector (a dedicated child created for
//! the call, destroyed with the context) or *borrows* one it was handed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::args::Args;
use crate::descriptor::{ParamSpec, ProviderBinding};
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::injector::Injector;
use crate::internal::{DestroyHooks, HookId};
use crate::record::{AnyArc, TokenMap};
use crate::reflect::MethodReflect;
use crate::token::{Token, INVOCATION_CONTEXT};

mod resolvers;

pub use resolvers::{
    resolver_fn, ArgumentResolver, DefaultValueResolver, FnResolver, NameResolver, TokenResolver, TypeResolver,
};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Resolution scope for one method call or request.
///
/// Lookups by token check the context's own values, then its injector, then
/// each ref in order. Contexts are cheap handles; clones share state.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, InvocationContext, ParamSpec, Platform, Token};
///
/// let root = Injector::root(Platform::builder().build());
/// let ctx = InvocationContext::new(&root);
/// ctx.set_argument("user_id", 7u64).unwrap();
/// ctx.set_value(Token::name("tenant"), "acme").unwrap();
///
/// let args = ctx
///     .resolve_arguments(
///         &[ParamSpec::named("user_id"), ParamSpec::token("tenant", Token::name("tenant"))],
///         &Token::name("Handler"),
///         "handle",
///     )
///     .unwrap();
/// assert_eq!(*args.get::<u64>(0).unwrap(), 7);
/// assert_eq!(*args.get::<&str>(1).unwrap(), "acme");
///
/// ctx.destroy();
/// assert!(!root.is_destroyed()); // borrowed, not owned
/// ```
#[derive(Clone)]
pub struct InvocationContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    injector: Injector,
    owns_injector: bool,
    construction: bool,
    // Call-scoped context a construction runs under. Only its own layer is
    // visible, never the scope chain behind it.
    caller: RwLock<Option<InvocationContext>>,
    values: RwLock<TokenMap<AnyArc>>,
    payload: RwLock<HashMap<String, AnyArc>>,
    refs: RwLock<Vec<InvocationContext>>,
    resolvers: RwLock<Vec<Arc<dyn ArgumentResolver>>>,
    destroyed: AtomicBool,
    hooks: Mutex<DestroyHooks>,
}

impl InvocationContext {
    fn create(injector: Injector, owns_injector: bool, refs: Vec<InvocationContext>) -> Self {
        Self::with_caller(injector, owns_injector, false, None, refs)
    }

    fn with_caller(
        injector: Injector,
        owns_injector: bool,
        construction: bool,
        caller: Option<InvocationContext>,
        refs: Vec<InvocationContext>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
                injector,
                owns_injector,
                construction,
                caller: RwLock::new(caller),
                values: RwLock::new(TokenMap::default()),
                payload: RwLock::new(HashMap::new()),
                refs: RwLock::new(refs),
                resolvers: RwLock::new(Vec::new()),
                destroyed: AtomicBool::new(false),
                hooks: Mutex::new(DestroyHooks::default()),
            }),
        }
    }

    /// Context borrowing `injector`; destroying it leaves the injector alive.
    pub fn new(injector: &Injector) -> Self {
        Self::create(injector.clone(), false, Vec::new())
    }

    /// Context owning a fresh child of `parent` that holds `providers`.
    pub fn with_child_injector(parent: &Injector, providers: Vec<ProviderBinding>) -> IocResult<Self> {
        let child = parent.create_child()?;
        child.inject(providers)?;
        Ok(Self::create(child, true, Vec::new()))
    }

    /// Child context of `parent`, which it refs.
    ///
    /// With providers, the child owns a dedicated child of the parent's
    /// injector; without, it borrows the parent's injector.
    pub fn child_of(parent: &InvocationContext, providers: Vec<ProviderBinding>) -> IocResult<Self> {
        parent.ensure_alive()?;
        let ctx = if providers.is_empty() {
            Self::create(parent.inner.injector.clone(), false, vec![parent.clone()])
        } else {
            let child = parent.inner.injector.create_child()?;
            child.inject(providers)?;
            Self::create(child, true, vec![parent.clone()])
        };
        Ok(ctx)
    }

    /// Context used while constructing a class record owned by `injector`.
    ///
    /// The record's dependencies resolve from `injector`. Of the active
    /// context only its call-scoped layer is kept: values, arguments,
    /// resolvers and the providers of an injector it owns. A nested
    /// construction inherits the caller of the construction that triggered
    /// it. A borrowed injector is consulted after that layer; an owned class
    /// scope comes before it.
    pub(crate) fn for_construction(injector: Injector, owns_injector: bool, active: Option<&InvocationContext>) -> Self {
        let caller = match active {
            Some(active) if active.inner.construction => active.caller(),
            Some(active) => Some(active.clone()),
            None => None,
        };
        let caller = caller.filter(|c| !c.is_destroyed());
        Self::with_caller(injector, owns_injector, true, caller, Vec::new())
    }

    fn caller(&self) -> Option<InvocationContext> {
        self.inner.caller.read().clone()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn injector(&self) -> &Injector {
        &self.inner.injector
    }

    pub fn owns_injector(&self) -> bool {
        self.inner.owns_injector
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub fn ptr_eq(&self, other: &InvocationContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // Someone besides the caller still holds a handle.
    pub(crate) fn is_captured(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    fn ensure_alive(&self) -> IocResult<()> {
        if self.is_destroyed() {
            Err(IocError::Destroyed("InvocationContext"))
        } else {
            Ok(())
        }
    }

    /// Binds `token` to `value` in this context only.
    pub fn set_value<T: Send + Sync + 'static>(&self, token: Token, value: T) -> IocResult<()> {
        self.set_arc(token, Arc::new(value))
    }

    pub fn set_arc(&self, token: Token, value: AnyArc) -> IocResult<()> {
        self.ensure_alive()?;
        self.inner.values.write().insert(token, value);
        Ok(())
    }

    /// Sets a named call-site argument, matched against parameter names.
    pub fn set_argument<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) -> IocResult<()> {
        self.set_argument_arc(name.into(), Arc::new(value))
    }

    pub fn set_argument_arc(&self, name: String, value: AnyArc) -> IocResult<()> {
        self.ensure_alive()?;
        self.inner.payload.write().insert(name, value);
        Ok(())
    }

    /// Named argument from this context or, failing that, its refs.
    pub fn argument(&self, name: &str) -> IocResult<Option<AnyArc>> {
        self.ensure_alive()?;
        Ok(self.find_argument(name))
    }

    pub fn has_argument(&self, name: &str) -> IocResult<bool> {
        Ok(self.argument(name)?.is_some())
    }

    // Destroyed callers and refs are skipped.
    fn find_argument(&self, name: &str) -> Option<AnyArc> {
        if self.is_destroyed() {
            return None;
        }
        if let Some(value) = self.inner.payload.read().get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.caller().and_then(|c| c.find_argument(name)) {
            return Some(value);
        }
        self.live_refs().iter().find_map(|r| r.find_argument(name))
    }

    /// Adds `other` to the ref chain.
    ///
    /// # Errors
    ///
    /// Fails with [`IocError::Circular`] if `other` already reaches this
    /// context through its own refs.
    pub fn add_ref(&self, other: &InvocationContext) -> IocResult<()> {
        self.ensure_alive()?;
        other.ensure_alive()?;
        if other.reaches(self.inner.id) {
            return Err(IocError::Circular(vec![
                format!("InvocationContext({})", self.id()),
                format!("InvocationContext({})", other.id()),
                format!("InvocationContext({})", self.id()),
            ]));
        }
        let mut refs = self.inner.refs.write();
        if !refs.iter().any(|r| r.ptr_eq(other)) {
            refs.push(other.clone());
        }
        Ok(())
    }

    /// Drops `other` from the ref chain; `other` itself is untouched.
    pub fn remove_ref(&self, other: &InvocationContext) -> bool {
        let mut refs = self.inner.refs.write();
        let before = refs.len();
        refs.retain(|r| !r.ptr_eq(other));
        before != refs.len()
    }

    fn reaches(&self, id: u64) -> bool {
        self.inner.id == id || self.inner.refs.read().iter().any(|r| r.reaches(id))
    }

    fn live_refs(&self) -> Vec<InvocationContext> {
        self.inner.refs.read().iter().filter(|r| !r.is_destroyed()).cloned().collect()
    }

    /// Appends a custom resolver, consulted after parameter-specific ones.
    pub fn add_resolver(&self, resolver: Arc<dyn ArgumentResolver>) -> IocResult<()> {
        self.ensure_alive()?;
        self.inner.resolvers.write().push(resolver);
        Ok(())
    }

    // Own resolvers first, then the caller's, then those of the refs.
    pub(crate) fn custom_resolvers(&self) -> Vec<Arc<dyn ArgumentResolver>> {
        let mut all = self.inner.resolvers.read().clone();
        if let Some(caller) = self.caller().filter(|c| !c.is_destroyed()) {
            all.extend(caller.custom_resolvers());
        }
        for r in self.live_refs() {
            all.extend(r.custom_resolvers());
        }
        all
    }

    /// Token lookup through values, injector and refs.
    pub(crate) fn lookup(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        self.ensure_alive()?;
        if *token == INVOCATION_CONTEXT {
            return Ok(Some(Arc::new(self.clone())));
        }
        if let Some(value) = self.inner.values.read().get(token) {
            return Ok(Some(value.clone()));
        }

        let optional = flags | InjectFlags::OPTIONAL;
        let caller = self.caller();
        let caller_first = caller.is_some() && !self.inner.owns_injector;

        let mut found = None;
        if caller_first {
            found = Self::lookup_caller(caller.as_ref(), token, optional)?;
        }
        if found.is_none() {
            found = self.inner.injector.lookup(token, optional, Some(self))?;
        }
        if found.is_none() && !caller_first {
            found = Self::lookup_caller(caller.as_ref(), token, optional)?;
        }
        if found.is_none() {
            found = self.lookup_refs(token, optional)?;
        }

        match found {
            Some(value) => Ok(Some(value)),
            None if flags.is_optional() => Ok(None),
            None => Err(IocError::MissingProvider(token.to_string())),
        }
    }

    fn lookup_caller(caller: Option<&InvocationContext>, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        match caller {
            Some(caller) => caller.lookup_call_scoped(token, flags),
            None => Ok(None),
        }
    }

    // Values and owned providers of this context and its refs, without
    // walking the scope chain of any injector.
    fn lookup_call_scoped(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        if self.is_destroyed() {
            return Ok(None);
        }
        if let Some(value) = self.inner.values.read().get(token) {
            return Ok(Some(value.clone()));
        }
        if self.inner.owns_injector {
            let local = (flags - InjectFlags::SKIP_SELF) | InjectFlags::SELF | InjectFlags::OPTIONAL;
            if let Some(value) = self.inner.injector.lookup(token, local, Some(self))? {
                return Ok(Some(value));
            }
        }
        for r in self.live_refs() {
            if let Some(value) = r.lookup_call_scoped(token, flags)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn lookup_refs(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        for r in self.live_refs() {
            if let Some(value) = r.lookup(token, flags)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Resolves one parameter; `Ok(None)` if no resolver produced a value.
    ///
    /// Order: the parameter's own resolver, the context's custom resolvers,
    /// then by token, by name, by type, and finally the default value.
    pub fn resolve_argument(&self, param: &ParamSpec) -> IocResult<Option<AnyArc>> {
        self.ensure_alive()?;
        if let Some(resolver) = &param.resolver {
            if let Some(value) = try_resolver(resolver.as_ref(), param, self)? {
                return Ok(Some(value));
            }
        }
        for resolver in self.custom_resolvers() {
            if let Some(value) = try_resolver(resolver.as_ref(), param, self)? {
                return Ok(Some(value));
            }
        }
        for resolver in resolvers::builtin() {
            if let Some(value) = try_resolver(*resolver, param, self)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Resolves every parameter, reporting all unresolved non-nullable ones at once.
    pub fn resolve_arguments(&self, params: &[ParamSpec], target: &Token, method: &str) -> IocResult<Args> {
        let mut values = Vec::with_capacity(params.len());
        let mut missing = Vec::new();
        for param in params {
            let value = self.resolve_argument(param)?;
            if value.is_none() && !param.is_nullable() {
                missing.push(param.name().to_string());
            }
            values.push(value);
        }
        if !missing.is_empty() {
            return Err(IocError::MissingParameter {
                target: target.to_string(),
                method: method.to_string(),
                params: missing,
            });
        }
        let names = params.iter().map(|p| p.name()).collect();
        Ok(Args::new(values, names, Some(self.clone())))
    }

    /// Registers a callback run when this context is destroyed.
    pub fn on_destroy<F>(&self, callback: F) -> IocResult<HookId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_alive()?;
        Ok(self.inner.hooks.lock().push(Box::new(callback)))
    }

    /// Destroys the context.
    ///
    /// Runs destroy callbacks (LIFO), clears resolvers, values, arguments
    /// and refs, and destroys the injector if the context owns it. Referenced
    /// contexts are left alone. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let hooks = self.inner.hooks.lock().take();
        hooks.run_all_reverse();

        self.inner.resolvers.write().clear();
        self.inner.values.write().clear();
        self.inner.payload.write().clear();
        self.inner.refs.write().clear();
        self.inner.caller.write().take();

        if self.inner.owns_injector {
            self.inner.injector.destroy();
        }
        tracing::trace!(context = self.id(), "invocation context destroyed");
    }
}

fn try_resolver(resolver: &dyn ArgumentResolver, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
    if resolver.can_resolve(param, ctx) {
        resolver.resolve(param, ctx)
    } else {
        Ok(None)
    }
}

/// Calls a reflected method on `instance` with arguments resolved from `ctx`.
///
/// Method-level providers get their own child context, destroyed after the
/// call unless captured.
pub(crate) fn call_method(
    instance: &AnyArc,
    class: &Token,
    method: &MethodReflect,
    ctx: &InvocationContext,
) -> IocResult<AnyArc> {
    let scoped = if method.providers().is_empty() {
        None
    } else {
        Some(InvocationContext::child_of(ctx, method.providers().to_vec())?)
    };
    let call_ctx = scoped.as_ref().unwrap_or(ctx);

    let args = call_ctx.resolve_arguments(method.params(), class, method.name())?;
    let result = (method.spec.invoker)(instance, &args);
    drop(args);

    if let Some(scoped) = scoped {
        if !scoped.is_captured() {
            scoped.destroy();
        }
    }
    result
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.inner.id)
            .field("injector", &self.inner.injector.id())
            .field("owns_injector", &self.inner.owns_injector)
            .field("refs", &self.inner.refs.read().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::traits::Resolver;

    fn root() -> Injector {
        Injector::root(Platform::builder().build())
    }

    #[test]
    fn owned_injector_dies_with_the_context() {
        let root = root();
        let ctx = InvocationContext::with_child_injector(&root, vec![ProviderBinding::value(Token::name("x"), 1u8)]).unwrap();
        let child = ctx.injector().clone();
        assert_eq!(*ctx.get_token::<u8>(&Token::name("x")).unwrap(), 1);
        ctx.destroy();
        assert!(child.is_destroyed());
        assert!(!root.is_destroyed());
        assert!(matches!(ctx.get_token::<u8>(&Token::name("x")), Err(IocError::Destroyed(_))));
    }

    #[test]
    fn child_contexts_fall_back_through_refs_without_owning_them() {
        let root = root();
        let parent = InvocationContext::new(&root);
        parent.set_value(Token::name("trace"), "abc").unwrap();
        parent.set_argument("page", 2u32).unwrap();

        let child = InvocationContext::child_of(&parent, vec![]).unwrap();
        assert_eq!(*child.get_token::<&str>(&Token::name("trace")).unwrap(), "abc");
        assert!(child.has_argument("page").unwrap());

        assert!(child.remove_ref(&parent));
        assert!(!child.has_argument("page").unwrap());
        child.destroy();
        assert!(!parent.is_destroyed());
        assert!(parent.has_argument("page").unwrap());
        assert!(matches!(child.argument("page"), Err(IocError::Destroyed(_))));
    }

    #[test]
    fn ref_cycles_are_rejected() {
        let root = root();
        let a = InvocationContext::new(&root);
        let b = InvocationContext::child_of(&a, vec![]).unwrap();
        assert!(matches!(a.add_ref(&b), Err(IocError::Circular(_))));
        assert!(a.add_ref(&a).is_err());
    }

    #[test]
    fn destroy_runs_hooks_once() {
        let root = root();
        let ctx = InvocationContext::new(&root);
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        ctx.on_destroy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        ctx.destroy();
        ctx.destroy();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(ctx.on_destroy(|| {}).is_err());
    }

    #[test]
    fn missing_parameters_are_reported_together() {
        let root = root();
        let ctx = InvocationContext::new(&root);
        let err = ctx
            .resolve_arguments(
                &[
                    ParamSpec::named("name"),
                    ParamSpec::named("nickname").nullable(),
                    ParamSpec::token("age", Token::name("age")),
                ],
                &Token::name("UserController"),
                "create",
            )
            .unwrap_err();
        match err {
            IocError::MissingParameter { target, method, params } => {
                assert_eq!(target, "UserController");
                assert_eq!(method, "create");
                assert_eq!(params, vec!["name", "age"]);
            }
            other => panic!("unexpected {other}"),
        }
    }
}
