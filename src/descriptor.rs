//! Type descriptors: the plain-data input consumed by the registration pipeline.
//!
//! A [`TypeDescriptor`] describes one class: how to construct it, which
//! constructor parameters and properties it needs, which methods may be
//! invoked with injected arguments, and which providers it declares. The
//! crate never inspects types reflectively; descriptors are built with the
//! builder functions below (or generated by whatever metadata layer sits on
//! top) and are never mutated once registered.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::args::Args;
use crate::context::ArgumentResolver;
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::record::AnyArc;
use crate::token::Token;

/// Boxed, still-mutable instance produced by a constructor.
pub type BoxAny = Box<dyn Any + Send + Sync>;

pub(crate) type CtorFn = Arc<dyn Fn(&Args) -> IocResult<BoxAny> + Send + Sync>;
pub(crate) type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), AnyArc) -> IocResult<()> + Send + Sync>;
pub(crate) type InvokerFn = Arc<dyn Fn(&AnyArc, &Args) -> IocResult<AnyArc> + Send + Sync>;
pub(crate) type ValidateFn = Arc<dyn Fn(&Args) -> IocResult<()> + Send + Sync>;
/// Factory closure of a `useFactory` binding.
pub type FactoryFn = Arc<dyn Fn(&Args) -> IocResult<AnyArc> + Send + Sync>;

/// Types that can describe themselves for registration by type.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injectable, TypeDescriptor};
///
/// struct Clock;
///
/// impl Injectable for Clock {
///     fn descriptor() -> TypeDescriptor {
///         TypeDescriptor::builder::<Clock>()
///             .construct(|_| Ok(Clock))
///             .build()
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor;
}

/// Where a descriptor's records are registered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProvidedIn {
    /// The injector `register` was called on.
    #[default]
    None,
    /// The root injector of the tree.
    Root,
    /// The platform injector.
    Platform,
    /// A named scope; falls back to the calling injector while unregistered.
    Named(String),
}

/// Reference to a parameter's declared type.
#[derive(Clone)]
pub struct TypeRef {
    pub token: Token,
    /// Present only for concrete, registrable types.
    pub(crate) descriptor: Option<fn() -> TypeDescriptor>,
}

impl TypeRef {
    /// Concrete type that may be registered on the fly.
    pub fn injectable<T: Injectable>() -> Self {
        Self {
            token: Token::of::<T>(),
            descriptor: Some(T::descriptor),
        }
    }

    /// Abstract or primitive type: resolved by token only.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            token: Token::of::<T>(),
            descriptor: None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.descriptor.is_some()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("token", &self.token)
            .field("concrete", &self.is_concrete())
            .finish()
    }
}

/// One constructor or method parameter.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ParamSpec, Token};
///
/// let port = ParamSpec::token("port", Token::name("port")).default_value(8080u16);
/// let user = ParamSpec::named("user_id").nullable();
/// assert_eq!(port.name(), "port");
/// assert!(user.is_nullable());
/// ```
#[derive(Clone)]
pub struct ParamSpec {
    pub(crate) name: &'static str,
    pub(crate) provider: Option<Token>,
    pub(crate) ty: Option<TypeRef>,
    pub(crate) default: Option<AnyArc>,
    pub(crate) flags: InjectFlags,
    pub(crate) multi: bool,
    pub(crate) nullable: bool,
    pub(crate) resolver: Option<Arc<dyn ArgumentResolver>>,
}

impl ParamSpec {
    fn blank(name: &'static str) -> Self {
        Self {
            name,
            provider: None,
            ty: None,
            default: None,
            flags: InjectFlags::DEFAULT,
            multi: false,
            nullable: false,
            resolver: None,
        }
    }

    /// Parameter resolved by an explicit provider token.
    pub fn token(name: &'static str, token: Token) -> Self {
        Self {
            provider: Some(token),
            ..Self::blank(name)
        }
    }

    /// Parameter resolved by a concrete type, auto-registered when allowed.
    pub fn of<T: Injectable>(name: &'static str) -> Self {
        Self {
            ty: Some(TypeRef::injectable::<T>()),
            ..Self::blank(name)
        }
    }

    /// Parameter resolved by type token only (traits, primitives, foreign types).
    pub fn typed<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            ty: Some(TypeRef::of::<T>()),
            ..Self::blank(name)
        }
    }

    /// Parameter resolved by name against values set on the invocation context.
    pub fn named(name: &'static str) -> Self {
        Self::blank(name)
    }

    pub fn default_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    pub fn default_arc(mut self, value: AnyArc) -> Self {
        self.default = Some(value);
        self
    }

    /// Missing value resolves to `None` instead of failing.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Alias of [`nullable`](Self::nullable) that also sets `OPTIONAL` on lookups.
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self.flags |= InjectFlags::OPTIONAL;
        self
    }

    pub fn self_only(mut self) -> Self {
        self.flags |= InjectFlags::SELF;
        self
    }

    pub fn skip_self(mut self) -> Self {
        self.flags |= InjectFlags::SKIP_SELF;
        self
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn flags(mut self, flags: InjectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Parameter-specific resolver, consulted before any other.
    pub fn with_resolver(mut self, resolver: Arc<dyn ArgumentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn provider(&self) -> Option<&Token> {
        self.provider.as_ref()
    }

    pub fn type_ref(&self) -> Option<&TypeRef> {
        self.ty.as_ref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn inject_flags(&self) -> InjectFlags {
        self.flags
    }

    /// Token used for diagnostics and graph export.
    pub fn lookup_token(&self) -> Option<&Token> {
        self.provider.as_ref().or(self.ty.as_ref().map(|t| &t.token))
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("ty", &self.ty)
            .field("flags", &self.flags)
            .field("nullable", &self.nullable)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Property injection point applied after construction.
#[derive(Clone)]
pub struct PropertySpec {
    pub(crate) name: &'static str,
    pub(crate) token: Token,
    pub(crate) flags: InjectFlags,
    pub(crate) setter: SetterFn,
}

impl PropertySpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Method that can be called through [`Injector::invoke`](crate::Injector::invoke).
#[derive(Clone)]
pub struct MethodSpec {
    pub(crate) name: &'static str,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) auto_run: bool,
    pub(crate) invoker: InvokerFn,
}

impl MethodSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_auto_run(&self) -> bool {
        self.auto_run
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("auto_run", &self.auto_run)
            .finish()
    }
}

/// Dependency of a factory binding.
#[derive(Clone)]
pub enum Dep {
    /// Resolved through the injector with the given flags.
    Token(Token, InjectFlags),
    /// Literal value used verbatim.
    Value(AnyArc),
}

impl Dep {
    pub fn token(token: Token) -> Self {
        Dep::Token(token, InjectFlags::DEFAULT)
    }

    pub fn with_flags(token: Token, flags: InjectFlags) -> Self {
        Dep::Token(token, flags)
    }

    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Dep::Value(Arc::new(value))
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Dep::Token(token, _) => Some(token),
            Dep::Value(_) => None,
        }
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dep::Token(token, flags) => f.debug_tuple("Token").field(token).field(flags).finish(),
            Dep::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl From<Token> for Dep {
    fn from(token: Token) -> Self {
        Dep::token(token)
    }
}

/// How a provider binding produces its value.
#[derive(Clone)]
pub enum ProviderKind {
    /// `useValue`
    Value(AnyArc),
    /// `useClass`
    Class(Arc<TypeDescriptor>),
    /// `useFactory` with its dependency list
    Factory { factory: FactoryFn, deps: Vec<Dep> },
    /// `useExisting`: alias of another token
    Existing(Token),
}

impl fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Value(_) => f.write_str("Value(..)"),
            ProviderKind::Class(desc) => f.debug_tuple("Class").field(&desc.token).finish(),
            ProviderKind::Factory { deps, .. } => f.debug_struct("Factory").field("deps", deps).finish(),
            ProviderKind::Existing(token) => f.debug_tuple("Existing").field(token).finish(),
        }
    }
}

/// A `provide: Token, use...` declaration.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Dep, ProviderBinding, Token};
///
/// let url = ProviderBinding::value(Token::name("db_url"), "postgres://localhost".to_string());
/// let pool = ProviderBinding::factory(Token::name("pool"), vec![Dep::token(Token::name("db_url"))], |args| {
///     Ok(format!("pool({})", args.get::<String>(0)?))
/// })
/// .as_static();
/// let alias = ProviderBinding::existing(Token::name("database"), Token::name("pool"));
/// assert!(pool.is_static());
/// assert!(!alias.is_multi());
/// # let _ = url;
/// ```
#[derive(Clone, Debug)]
pub struct ProviderBinding {
    pub(crate) provide: Token,
    pub(crate) kind: ProviderKind,
    pub(crate) multi: bool,
    pub(crate) is_static: bool,
    pub(crate) as_default: bool,
}

impl ProviderBinding {
    pub fn new(provide: Token, kind: ProviderKind) -> Self {
        Self {
            provide,
            kind,
            multi: false,
            is_static: false,
            as_default: false,
        }
    }

    pub fn value<T: Send + Sync + 'static>(provide: Token, value: T) -> Self {
        Self::new(provide, ProviderKind::Value(Arc::new(value)))
    }

    pub fn value_arc(provide: Token, value: AnyArc) -> Self {
        Self::new(provide, ProviderKind::Value(value))
    }

    /// `useValue` for a trait object, stored as `Arc<Arc<dyn Trait>>`.
    pub fn trait_value<T: ?Sized + Send + Sync + 'static>(provide: Token, value: Arc<T>) -> Self {
        Self::new(provide, ProviderKind::Value(Arc::new(value)))
    }

    pub fn class(provide: Token, descriptor: TypeDescriptor) -> Self {
        Self::new(provide, ProviderKind::Class(Arc::new(descriptor)))
    }

    pub fn class_of<T: Injectable>(provide: Token) -> Self {
        Self::class(provide, T::descriptor())
    }

    pub fn factory<R, F>(provide: Token, deps: Vec<Dep>, factory: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&Args) -> IocResult<R> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |args: &Args| Ok(Arc::new(factory(args)?) as AnyArc));
        Self::new(provide, ProviderKind::Factory { factory, deps })
    }

    /// `useFactory` producing a trait object.
    pub fn trait_factory<T, F>(provide: Token, deps: Vec<Dep>, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Args) -> IocResult<Arc<T>> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |args: &Args| Ok(Arc::new(factory(args)?) as AnyArc));
        Self::new(provide, ProviderKind::Factory { factory, deps })
    }

    pub fn existing(provide: Token, target: Token) -> Self {
        Self::new(provide, ProviderKind::Existing(target))
    }

    /// Contribute to an aggregated multi-provider token.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Memoize the produced value in the owning injector.
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Keep an existing record for the token instead of overwriting it.
    pub fn as_default(mut self) -> Self {
        self.as_default = true;
        self
    }

    pub fn provide(&self) -> &Token {
        &self.provide
    }

    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

/// Description of a class for the registration pipeline.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) token: Token,
    pub(crate) ctor: Option<CtorFn>,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) properties: Vec<PropertySpec>,
    pub(crate) methods: Vec<MethodSpec>,
    pub(crate) providers: Vec<ProviderBinding>,
    pub(crate) ref_providers: Vec<(Token, ProviderBinding)>,
    pub(crate) method_overrides: HashMap<&'static str, Vec<(&'static str, Token)>>,
    pub(crate) method_providers: HashMap<&'static str, Vec<ProviderBinding>>,
    pub(crate) validators: Vec<ValidateFn>,
    pub(crate) provided_in: ProvidedIn,
    pub(crate) is_static: bool,
    pub(crate) singleton: bool,
    pub(crate) expires: Option<Duration>,
    pub(crate) is_abstract: bool,
}

impl TypeDescriptor {
    /// Starts a descriptor for class `T`, tokened by `Token::of::<T>()`.
    pub fn builder<T: Send + Sync + 'static>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder::new(Token::of::<T>())
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn providers(&self) -> &[ProviderBinding] {
        &self.providers
    }

    pub fn ref_providers(&self) -> &[(Token, ProviderBinding)] {
        &self.ref_providers
    }

    /// Parameter-name to token overrides declared for `method`.
    pub fn method_overrides(&self, method: &str) -> &[(&'static str, Token)] {
        self.method_overrides.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn method_providers(&self, method: &str) -> Vec<ProviderBinding> {
        self.method_providers.get(method).cloned().unwrap_or_default()
    }

    pub fn provided_in(&self) -> &ProvidedIn {
        &self.provided_in
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn expires(&self) -> Option<Duration> {
        self.expires
    }

    /// Abstract descriptors carry metadata only and can't be constructed.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract || self.ctor.is_none()
    }

    pub(crate) fn construct(&self, args: &Args) -> IocResult<BoxAny> {
        match &self.ctor {
            Some(ctor) => ctor(args),
            None => Err(IocError::construction_msg(&self.token, "type is abstract")),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("token", &self.token)
            .field("params", &self.params)
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .field("providers", &self.providers.len())
            .field("provided_in", &self.provided_in)
            .field("is_static", &self.is_static)
            .field("singleton", &self.singleton)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Builder for [`TypeDescriptor`].
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ParamSpec, ProvidedIn, TypeDescriptor};
/// use std::sync::Arc;
///
/// struct Logger;
/// struct Service {
///     logger: Arc<Logger>,
/// }
///
/// let logger = TypeDescriptor::builder::<Logger>()
///     .construct(|_| Ok(Logger))
///     .provided_in(ProvidedIn::Root)
///     .as_static()
///     .build();
///
/// let service = TypeDescriptor::builder::<Service>()
///     .param(ParamSpec::typed::<Logger>("logger"))
///     .construct(|args| Ok(Service { logger: args.get::<Logger>(0)? }))
///     .method("ping", vec![], |_svc: &Service, _args| Ok("pong"))
///     .build();
///
/// assert_eq!(service.params().len(), 1);
/// assert!(logger.is_static());
/// ```
pub struct TypeDescriptorBuilder<T> {
    inner: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeDescriptorBuilder<T> {
    fn new(token: Token) -> Self {
        Self {
            inner: TypeDescriptor {
                token,
                ctor: None,
                params: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                providers: Vec::new(),
                ref_providers: Vec::new(),
                method_overrides: HashMap::new(),
                method_providers: HashMap::new(),
                validators: Vec::new(),
                provided_in: ProvidedIn::None,
                is_static: false,
                singleton: false,
                expires: None,
                is_abstract: false,
            },
            _marker: PhantomData,
        }
    }

    /// Overrides the class token (e.g. a symbol for an abstract interface).
    pub fn token(mut self, token: Token) -> Self {
        self.inner.token = token;
        self
    }

    /// Constructor receiving the resolved constructor parameters.
    pub fn construct<F>(mut self, ctor: F) -> Self
    where
        F: Fn(&Args) -> IocResult<T> + Send + Sync + 'static,
    {
        self.inner.ctor = Some(Arc::new(move |args: &Args| Ok(Box::new(ctor(args)?) as BoxAny)));
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.inner.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.inner.params.extend(params);
        self
    }

    /// Property of concrete type `V` assigned after construction.
    pub fn property<V, F>(self, name: &'static str, token: Token, setter: F) -> Self
    where
        V: Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        self.property_with_flags(name, token, InjectFlags::DEFAULT, setter)
    }

    pub fn property_with_flags<V, F>(mut self, name: &'static str, token: Token, flags: InjectFlags, setter: F) -> Self
    where
        V: Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &mut (dyn Any + Send + Sync), value: AnyArc| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(IocError::TypeMismatch(std::any::type_name::<T>()))?;
            let value = crate::args::downcast::<V>(&value)?;
            setter(target, value);
            Ok(())
        });
        self.inner.properties.push(PropertySpec { name, token, flags, setter });
        self
    }

    /// Property holding a trait object.
    pub fn trait_property<V, F>(mut self, name: &'static str, token: Token, setter: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &mut (dyn Any + Send + Sync), value: AnyArc| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(IocError::TypeMismatch(std::any::type_name::<T>()))?;
            setter(target, crate::args::downcast_trait::<V>(&value)?);
            Ok(())
        });
        self.inner.properties.push(PropertySpec {
            name,
            token,
            flags: InjectFlags::DEFAULT,
            setter,
        });
        self
    }

    /// Method callable with injected arguments.
    pub fn method<R, F>(self, name: &'static str, params: Vec<ParamSpec>, body: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, &Args) -> IocResult<R> + Send + Sync + 'static,
    {
        self.push_method(name, params, false, body)
    }

    /// Method executed automatically once the instance exists.
    pub fn auto_run<R, F>(self, name: &'static str, params: Vec<ParamSpec>, body: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, &Args) -> IocResult<R> + Send + Sync + 'static,
    {
        self.push_method(name, params, true, body)
    }

    fn push_method<R, F>(mut self, name: &'static str, params: Vec<ParamSpec>, auto_run: bool, body: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, &Args) -> IocResult<R> + Send + Sync + 'static,
    {
        let invoker: InvokerFn = Arc::new(move |instance: &AnyArc, args: &Args| {
            let this = instance
                .downcast_ref::<T>()
                .ok_or(IocError::TypeMismatch(std::any::type_name::<T>()))?;
            Ok(Arc::new(body(this, args)?) as AnyArc)
        });
        self.inner.methods.retain(|m| m.name != name);
        self.inner.methods.push(MethodSpec {
            name,
            params,
            auto_run,
            invoker,
        });
        self
    }

    /// Resolves parameter `param` of `method` through `token` instead.
    pub fn method_override(mut self, method: &'static str, param: &'static str, token: Token) -> Self {
        self.inner.method_overrides.entry(method).or_default().push((param, token));
        self
    }

    /// Provider visible only while `method` is being invoked.
    pub fn method_provider(mut self, method: &'static str, binding: ProviderBinding) -> Self {
        self.inner.method_providers.entry(method).or_default().push(binding);
        self
    }

    /// Provider declared by this class, registered alongside it.
    pub fn provider(mut self, binding: ProviderBinding) -> Self {
        self.inner.providers.push(binding);
        self
    }

    /// Provider this class declares for another target class.
    pub fn ref_provider(mut self, target: Token, binding: ProviderBinding) -> Self {
        self.inner.ref_providers.push((target, binding));
        self
    }

    /// Pre-construction check over the resolved constructor arguments.
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&Args) -> IocResult<()> + Send + Sync + 'static,
    {
        self.inner.validators.push(Arc::new(check));
        self
    }

    pub fn provided_in(mut self, scope: ProvidedIn) -> Self {
        self.inner.provided_in = scope;
        self
    }

    /// Memoize the instance in the owning injector.
    pub fn as_static(mut self) -> Self {
        self.inner.is_static = true;
        self
    }

    /// Register the instance as a platform-wide singleton.
    pub fn singleton(mut self) -> Self {
        self.inner.singleton = true;
        self.inner.is_static = true;
        self
    }

    /// Cache the instance for `ttl` after each access.
    pub fn expires_after(mut self, ttl: Duration) -> Self {
        self.inner.expires = Some(ttl);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.inner.is_abstract = true;
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.inner
    }
}

impl<T: Send + Sync + 'static> From<TypeDescriptorBuilder<T>> for TypeDescriptor {
    fn from(builder: TypeDescriptorBuilder<T>) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter {
        greeting: String,
    }

    #[test]
    fn methods_replace_by_name() {
        let desc = TypeDescriptor::builder::<Greeter>()
            .construct(|_| Ok(Greeter { greeting: "hi".into() }))
            .method("greet", vec![], |g: &Greeter, _| Ok(g.greeting.clone()))
            .auto_run("greet", vec![], |g: &Greeter, _| Ok(g.greeting.len()))
            .build();
        assert_eq!(desc.methods().len(), 1);
        assert!(desc.method("greet").unwrap().is_auto_run());
    }

    #[test]
    fn property_setter_downcasts_target_and_value() {
        let desc = TypeDescriptor::builder::<Greeter>()
            .construct(|_| Ok(Greeter { greeting: String::new() }))
            .property::<String, _>("greeting", Token::name("greeting"), |g, v| g.greeting = (*v).clone())
            .build();
        let mut instance = desc.construct(&Args::default()).unwrap();
        (desc.properties()[0].setter)(instance.as_mut(), Arc::new("hello".to_string())).unwrap();
        assert_eq!(instance.downcast_ref::<Greeter>().unwrap().greeting, "hello");
    }

    #[test]
    fn descriptors_without_constructor_are_abstract() {
        let desc = TypeDescriptor::builder::<Greeter>().build();
        assert!(desc.is_abstract());
        assert!(desc.construct(&Args::default()).is_err());
    }

    #[test]
    fn singleton_implies_static() {
        let desc = TypeDescriptor::builder::<Greeter>().singleton().build();
        assert!(desc.is_static() && desc.is_singleton());
    }
}
