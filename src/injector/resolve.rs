//! Token resolution.
//!
//! Lookup order for `resolve_token(token, flags)`:
//!
//! 1. well-known tokens (`INJECTOR`, `ROOT_INJECTOR`, `PLATFORM`, `INVOCATION_CONTEXT`)
//! 2. platform singletons, which short-circuit the whole tree
//! 3. the injector's own record unless `SKIP_SELF`
//! 4. the parent unless `SELF`
//! 5. `None` under `OPTIONAL`, `MissingProvider` otherwise

use std::sync::Arc;
use std::time::Instant;

use crate::args::Args;
use crate::context::InvocationContext;
use crate::descriptor::{Dep, ProviderBinding};
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::internal::StackGuard;
use crate::pipeline;
use crate::record::{AnyArc, FactoryRecord, Producer};
use crate::token::{Token, INJECTOR, INVOCATION_CONTEXT, PLATFORM, ROOT_INJECTOR};

use super::Injector;

/// Options for [`Injector::resolve`].
///
/// Providers and named arguments are scoped to the single call: they live in
/// a temporary invocation context that is destroyed afterwards unless the
/// resolved value captured it.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, Platform, ProviderBinding, ResolveOptions, Token};
///
/// let root = Injector::root(Platform::builder().build());
/// let value = root
///     .resolve_as::<u32>(
///         &Token::name("limit"),
///         ResolveOptions::new().provider(ProviderBinding::value(Token::name("limit"), 10u32)),
///     )
///     .unwrap();
/// assert_eq!(*value, 10);
/// ```
#[derive(Clone, Default)]
pub struct ResolveOptions {
    pub(crate) providers: Vec<ProviderBinding>,
    pub(crate) arguments: Vec<(String, AnyArc)>,
    pub(crate) flags: InjectFlags,
    pub(crate) context: Option<InvocationContext>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, binding: ProviderBinding) -> Self {
        self.providers.push(binding);
        self
    }

    pub fn providers(mut self, bindings: impl IntoIterator<Item = ProviderBinding>) -> Self {
        self.providers.extend(bindings);
        self
    }

    /// Named value visible to argument resolution by parameter name.
    pub fn argument<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.arguments.push((name.into(), Arc::new(value)));
        self
    }

    pub fn flags(mut self, flags: InjectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Resolve within an existing context instead of a fresh one.
    pub fn context(mut self, context: InvocationContext) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("providers", &self.providers)
            .field("arguments", &self.arguments.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("flags", &self.flags)
            .field("context", &self.context.as_ref().map(|c| c.id()))
            .finish()
    }
}

impl Injector {
    /// Resolves `token` with ad-hoc providers and arguments scoped to this call.
    ///
    /// Always re-evaluates non-static cached records (`RESOLVE`). Returns
    /// `Ok(None)` only when `OPTIONAL` is among the option flags.
    pub fn resolve(&self, token: &Token, options: ResolveOptions) -> IocResult<Option<AnyArc>> {
        self.ensure_alive()?;
        let flags = options.flags | InjectFlags::RESOLVE;
        let scoped = !options.providers.is_empty() || !options.arguments.is_empty();

        let (ctx, created) = match options.context {
            Some(ctx) if !scoped => return ctx.lookup(token, flags),
            Some(parent) => (InvocationContext::child_of(&parent, options.providers)?, true),
            None if !scoped => return self.lookup(token, flags, None),
            None => (InvocationContext::with_child_injector(self, options.providers)?, true),
        };
        for (name, value) in options.arguments {
            ctx.set_argument_arc(name, value)?;
        }

        let result = ctx.lookup(token, flags);
        if created && !ctx.is_captured() {
            ctx.destroy();
        }
        result
    }

    /// Typed [`resolve`](Self::resolve); a missing value is an error.
    pub fn resolve_as<T: Send + Sync + 'static>(&self, token: &Token, options: ResolveOptions) -> IocResult<Arc<T>> {
        let value = self
            .resolve(token, options)?
            .ok_or_else(|| IocError::MissingProvider(token.to_string()))?;
        crate::args::downcast::<T>(&value)
    }

    /// Core lookup shared by every resolution path.
    pub(crate) fn lookup(
        &self,
        token: &Token,
        flags: InjectFlags,
        ctx: Option<&InvocationContext>,
    ) -> IocResult<Option<AnyArc>> {
        self.ensure_alive()?;

        if let Some(value) = self.well_known(token, ctx) {
            return Ok(Some(value));
        }
        if let Some(value) = self.inner.platform.singleton(token) {
            return Ok(Some(value));
        }

        if flags.checks_self() {
            if let Some(record) = self.record(token) {
                return self.produce(&record, flags, ctx).map(Some);
            }
        }

        if flags.checks_parent() {
            if let Some(parent) = &self.inner.parent {
                if let Some(value) = parent.lookup(token, flags.for_parent() | InjectFlags::OPTIONAL, ctx)? {
                    return Ok(Some(value));
                }
            }
        }

        if flags.is_optional() {
            Ok(None)
        } else {
            Err(IocError::MissingProvider(token.to_string()))
        }
    }

    pub(crate) fn lookup_required(&self, token: &Token, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        self.lookup(token, flags, ctx)?
            .ok_or_else(|| IocError::MissingProvider(token.to_string()))
    }

    fn well_known(&self, token: &Token, ctx: Option<&InvocationContext>) -> Option<AnyArc> {
        if !matches!(token, Token::Symbol(..)) {
            return None;
        }
        if *token == INJECTOR {
            Some(Arc::new(self.clone()))
        } else if *token == ROOT_INJECTOR {
            self.root_injector().map(|root| Arc::new(root) as AnyArc)
        } else if *token == PLATFORM {
            Some(self.inner.platform.clone())
        } else if *token == INVOCATION_CONTEXT {
            ctx.map(|ctx| Arc::new(ctx.clone()) as AnyArc)
        } else {
            None
        }
    }

    fn produce(&self, record: &Arc<FactoryRecord>, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        match &record.producer {
            Producer::Value(value) => Ok(value.clone()),
            Producer::Multi(_) => self.collect_multi(record, flags, ctx),
            _ => self.instantiate(record, flags, ctx),
        }
    }

    // Parent contributions first, then local ones in declaration order.
    fn collect_multi(&self, record: &Arc<FactoryRecord>, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        let mut values: Vec<AnyArc> = Vec::new();
        if flags.checks_parent() {
            if let Some(parent) = &self.inner.parent {
                let inherited = parent.lookup(&record.token, flags.for_parent() | InjectFlags::OPTIONAL, ctx)?;
                if let Some(inherited) = inherited {
                    match inherited.downcast::<Vec<AnyArc>>() {
                        Ok(items) => values.extend(items.iter().cloned()),
                        Err(_) => tracing::warn!(token = %record.token, "parent provider is not a multi provider, ignoring it"),
                    }
                }
            }
        }
        for item in record.items() {
            values.push(self.produce(&item, flags.inherited(), ctx)?);
        }
        Ok(Arc::new(values))
    }

    fn instantiate(&self, record: &Arc<FactoryRecord>, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        let platform = &self.inner.platform;
        let max_depth = platform.options().max_depth;

        if let Producer::Class(descriptor) = &record.producer {
            if descriptor.is_singleton() && descriptor.token() == &record.token {
                // Losers of a concurrent build share the winner's instance.
                let build = platform.singleton_build(&record.token);
                if let Some(value) = build.get() {
                    return Ok(value.clone());
                }
                let _guard = StackGuard::enter(record.id, &record.token, max_depth)?;
                return build.get_or_try_init(|| self.build_observed(record, flags, ctx)).map(Clone::clone);
            }
        }

        if record.expires_after.is_some() {
            if !flags.forces_resolve() {
                if let Some(value) = record.cached(platform.clock().now()) {
                    return Ok(value);
                }
            }
            let _guard = StackGuard::enter(record.id, &record.token, max_depth)?;
            let value = self.build_observed(record, flags, ctx)?;
            record.store(value.clone(), platform.clock().now());
            return Ok(value);
        }

        if record.is_static {
            let slot = record.slot();
            if let Some(value) = slot.get() {
                return Ok(value.clone());
            }
            // Marker goes up before the cell so re-entry errors instead of blocking.
            let _guard = StackGuard::enter(record.id, &record.token, max_depth)?;
            return slot.get_or_try_init(|| self.build_observed(record, flags, ctx)).map(Clone::clone);
        }

        let _guard = StackGuard::enter(record.id, &record.token, max_depth)?;
        self.build_observed(record, flags, ctx)
    }

    fn build_observed(&self, record: &Arc<FactoryRecord>, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        let observers = &self.inner.platform.observers;
        let started = observers.has_observers().then(Instant::now);
        if started.is_some() {
            observers.resolving(&record.token);
        }
        tracing::trace!(token = %record.token, injector = self.id(), "constructing");

        let result = self.build(record, flags, ctx);

        if let Some(started) = started {
            match &result {
                Ok(_) => observers.resolved(&record.token, started.elapsed()),
                Err(err) => observers.failed(&record.token, err),
            }
        }
        result
    }

    fn build(&self, record: &Arc<FactoryRecord>, flags: InjectFlags, ctx: Option<&InvocationContext>) -> IocResult<AnyArc> {
        match &record.producer {
            Producer::Value(value) => Ok(value.clone()),
            Producer::Multi(_) => self.collect_multi(record, flags, ctx),
            Producer::Existing(target) => self.lookup_required(target, flags.inherited(), ctx),
            Producer::Factory { factory, deps } => {
                let mut values = Vec::with_capacity(deps.len());
                for dep in deps {
                    values.push(match dep {
                        Dep::Value(value) => Some(value.clone()),
                        Dep::Token(token, dep_flags) => self.lookup(token, *dep_flags | flags.inherited(), ctx)?,
                    });
                }
                factory(&Args::new(values, Vec::new(), ctx.cloned()))
            }
            Producer::Class(descriptor) => pipeline::instantiate(self, record, descriptor, flags, ctx),
        }
    }
}
