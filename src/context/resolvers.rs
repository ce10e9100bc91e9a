//! Argument resolvers.
//!
//! Each parameter is offered to a chain of resolvers; the first one that
//! produces a value wins. Custom resolvers run before the built-in chain of
//! token, name, type and default-value resolution.

use std::sync::Arc;

use crate::descriptor::ParamSpec;
use crate::error::IocResult;
use crate::flags::InjectFlags;
use crate::record::AnyArc;
use crate::token::Token;

use super::InvocationContext;

/// Strategy producing a value for one parameter.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{resolver_fn, Injector, InvocationContext, ParamSpec, Platform, Token};
/// use std::sync::Arc;
///
/// let root = Injector::root(Platform::builder().build());
/// let ctx = InvocationContext::new(&root);
/// ctx.add_resolver(resolver_fn(|param, _ctx| {
///     Ok((param.name() == "now").then(|| Arc::new(1_700_000_000u64) as _))
/// }))
/// .unwrap();
///
/// let args = ctx
///     .resolve_arguments(&[ParamSpec::named("now")], &Token::name("Audit"), "record")
///     .unwrap();
/// assert_eq!(*args.get::<u64>(0).unwrap(), 1_700_000_000);
/// ```
pub trait ArgumentResolver: Send + Sync {
    /// Cheap pre-check; `resolve` is only called when this returns `true`.
    fn can_resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> bool;

    /// `Ok(None)` passes the parameter on to the next resolver.
    fn resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>>;
}

/// Resolves parameters that declare an explicit provider token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenResolver;

/// Resolves parameters from named arguments on the context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameResolver;

/// Resolves parameters by declared type, registering concrete types on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeResolver;

/// Falls back to the parameter's declared default value.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueResolver;

static BUILTIN: [&dyn ArgumentResolver; 4] = [&TokenResolver, &NameResolver, &TypeResolver, &DefaultValueResolver];

pub(crate) fn builtin() -> &'static [&'static dyn ArgumentResolver] {
    &BUILTIN
}

// Multi parameters never fall through: no contributions means an empty list.
fn lookup_param(param: &ParamSpec, token: &Token, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
    let found = ctx.lookup(token, param.flags | InjectFlags::OPTIONAL)?;
    if param.multi && found.is_none() {
        return Ok(Some(Arc::new(Vec::<AnyArc>::new())));
    }
    Ok(found)
}

impl ArgumentResolver for TokenResolver {
    fn can_resolve(&self, param: &ParamSpec, _ctx: &InvocationContext) -> bool {
        param.provider.is_some()
    }

    fn resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
        match &param.provider {
            Some(token) => lookup_param(param, token, ctx),
            None => Ok(None),
        }
    }
}

impl ArgumentResolver for NameResolver {
    fn can_resolve(&self, param: &ParamSpec, _ctx: &InvocationContext) -> bool {
        !param.name.is_empty()
    }

    fn resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
        ctx.argument(param.name)
    }
}

impl ArgumentResolver for TypeResolver {
    fn can_resolve(&self, param: &ParamSpec, _ctx: &InvocationContext) -> bool {
        param.ty.is_some()
    }

    fn resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
        let Some(ty) = &param.ty else {
            return Ok(None);
        };
        if let Some(value) = ctx.lookup(&ty.token, param.flags | InjectFlags::OPTIONAL)? {
            return Ok(Some(value));
        }

        let injector = ctx.injector();
        let describe = match ty.descriptor {
            Some(describe) if injector.platform().options().auto_register => describe,
            _ => return lookup_param(param, &ty.token, ctx),
        };
        let descriptor = Arc::new(describe());
        if descriptor.is_abstract() {
            return lookup_param(param, &ty.token, ctx);
        }

        let token = descriptor.token().clone();
        let owner = injector.registration_target().register_arc(descriptor)?;
        tracing::debug!(token = %token, owner = owner.id(), "auto-registered parameter type");
        lookup_param(param, &token, ctx)
    }
}

impl ArgumentResolver for DefaultValueResolver {
    fn can_resolve(&self, param: &ParamSpec, _ctx: &InvocationContext) -> bool {
        param.default.is_some()
    }

    fn resolve(&self, param: &ParamSpec, _ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
        Ok(param.default.clone())
    }
}

/// Resolver backed by a closure.
pub struct FnResolver<F> {
    resolve: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&ParamSpec, &InvocationContext) -> IocResult<Option<AnyArc>> + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

impl<F> ArgumentResolver for FnResolver<F>
where
    F: Fn(&ParamSpec, &InvocationContext) -> IocResult<Option<AnyArc>> + Send + Sync,
{
    fn can_resolve(&self, _param: &ParamSpec, _ctx: &InvocationContext) -> bool {
        true
    }

    fn resolve(&self, param: &ParamSpec, ctx: &InvocationContext) -> IocResult<Option<AnyArc>> {
        (self.resolve)(param, ctx)
    }
}

/// Shorthand for `Arc::new(FnResolver::new(f))`.
pub fn resolver_fn<F>(resolve: F) -> Arc<dyn ArgumentResolver>
where
    F: Fn(&ParamSpec, &InvocationContext) -> IocResult<Option<AnyArc>> + Send + Sync + 'static,
{
    Arc::new(FnResolver::new(resolve))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Injectable, TypeDescriptor};
    use crate::injector::Injector;
    use crate::platform::Platform;
    use crate::config::PlatformOptions;

    struct Repo;

    impl Injectable for Repo {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Repo>().construct(|_| Ok(Repo)).build()
        }
    }

    fn ctx_with(options: PlatformOptions) -> (Injector, InvocationContext) {
        let root = Injector::root(Platform::builder().options(options).build());
        let ctx = InvocationContext::new(&root);
        (root, ctx)
    }

    #[test]
    fn explicit_token_beats_named_argument() {
        let (root, ctx) = ctx_with(PlatformOptions::default());
        root.set_value(Token::name("port"), 80u16).unwrap();
        ctx.set_argument("port", 8080u16).unwrap();
        let value = ctx
            .resolve_argument(&ParamSpec::token("port", Token::name("port")))
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 80);
    }

    #[test]
    fn default_applies_when_nothing_else_matches() {
        let (_root, ctx) = ctx_with(PlatformOptions::default());
        let param = ParamSpec::token("retries", Token::name("retries")).default_value(3u8);
        let value = ctx.resolve_argument(&param).unwrap().unwrap();
        assert_eq!(*value.downcast::<u8>().unwrap(), 3);
    }

    #[test]
    fn concrete_types_register_on_demand() {
        let (root, ctx) = ctx_with(PlatformOptions::default());
        assert!(ctx.resolve_argument(&ParamSpec::of::<Repo>("repo")).unwrap().is_some());
        assert!(root.has(&Token::of::<Repo>(), InjectFlags::SELF).unwrap());
    }

    #[test]
    fn auto_registration_can_be_disabled() {
        let (root, ctx) = ctx_with(PlatformOptions::default().auto_register(false));
        assert!(ctx.resolve_argument(&ParamSpec::of::<Repo>("repo")).unwrap().is_none());
        assert!(!root.has(&Token::of::<Repo>(), InjectFlags::DEFAULT).unwrap());
    }

    #[test]
    fn missing_multi_is_an_empty_list() {
        let (_root, ctx) = ctx_with(PlatformOptions::default());
        let value = ctx
            .resolve_argument(&ParamSpec::token("hooks", Token::name("hooks")).multi())
            .unwrap()
            .unwrap();
        assert!(value.downcast::<Vec<AnyArc>>().unwrap().is_empty());
    }
}
