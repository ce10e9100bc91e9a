//! Resolver traits for token resolution.

use std::sync::Arc;

use crate::args::{downcast, downcast_multi, downcast_multi_trait, downcast_trait};
use crate::context::InvocationContext;
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::injector::Injector;
use crate::record::AnyArc;
use crate::token::Token;
use crate::traits::Dispose;

/// Object-safe resolution core.
///
/// Implemented by [`Injector`] and [`InvocationContext`]. Most callers want
/// the typed methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves `token` under `flags`.
    ///
    /// Returns `Ok(None)` only when `flags` contains
    /// [`InjectFlags::OPTIONAL`] and nothing provides the token.
    fn resolve_token(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>>;

    /// Attaches a cleanup callback to this resolver's destroy.
    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) -> IocResult<()>;
}

/// Typed resolution on top of [`ResolverCore`].
///
/// Values are stored type-erased. Concrete types come back through
/// [`get`](Self::get) and [`get_token`](Self::get_token), trait objects
/// (stored as `Arc<Arc<dyn Trait>>`) through [`get_trait`](Self::get_trait),
/// and multi-provider aggregates through [`get_multi`](Self::get_multi).
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Injector, Platform, ProviderBinding, Resolver, Token};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {msg}")
///     }
/// }
///
/// let root = Injector::root(Platform::builder().build());
/// root.set_value(Token::of::<usize>(), 42usize).unwrap();
/// root.inject([
///     ProviderBinding::trait_value(Token::name("logger"), Arc::new(ConsoleLogger) as Arc<dyn Logger>),
///     ProviderBinding::value(Token::name("hooks"), "first").multi(),
///     ProviderBinding::value(Token::name("hooks"), "second").multi(),
/// ])
/// .unwrap();
///
/// assert_eq!(*root.get::<usize>().unwrap(), 42);
/// let logger = root.get_trait::<dyn Logger>(&Token::name("logger")).unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// let hooks = root.get_multi::<&str>(&Token::name("hooks")).unwrap();
/// assert_eq!(hooks.iter().map(|h| **h).collect::<Vec<_>>(), vec!["first", "second"]);
/// assert!(root.try_get_token::<u8>(&Token::name("missing")).unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the class token of `T`.
    fn get<T: Send + Sync + 'static>(&self) -> IocResult<Arc<T>> {
        self.get_token::<T>(&Token::of::<T>())
    }

    /// Resolves `token` as a concrete `T`.
    fn get_token<T: Send + Sync + 'static>(&self, token: &Token) -> IocResult<Arc<T>> {
        let value = self
            .resolve_token(token, InjectFlags::DEFAULT)?
            .ok_or_else(|| IocError::MissingProvider(token.to_string()))?;
        downcast::<T>(&value)
    }

    /// Like [`get`](Self::get), but a missing provider yields `Ok(None)`.
    fn try_get<T: Send + Sync + 'static>(&self) -> IocResult<Option<Arc<T>>> {
        self.try_get_token::<T>(&Token::of::<T>())
    }

    fn try_get_token<T: Send + Sync + 'static>(&self, token: &Token) -> IocResult<Option<Arc<T>>> {
        self.get_with_flags::<T>(token, InjectFlags::OPTIONAL)
    }

    /// Resolves `token` under explicit flags.
    fn get_with_flags<T: Send + Sync + 'static>(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<Arc<T>>> {
        match self.resolve_token(token, flags)? {
            Some(value) => downcast::<T>(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves a trait object registered under `token`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, token: &Token) -> IocResult<Arc<T>> {
        let value = self
            .resolve_token(token, InjectFlags::DEFAULT)?
            .ok_or_else(|| IocError::MissingProvider(token.to_string()))?;
        downcast_trait::<T>(&value)
    }

    /// Every contribution to a multi-provider token, parents first.
    ///
    /// A token nobody contributes to yields an empty list.
    fn get_multi<T: Send + Sync + 'static>(&self, token: &Token) -> IocResult<Vec<Arc<T>>> {
        match self.resolve_token(token, InjectFlags::OPTIONAL)? {
            Some(value) => downcast_multi::<T>(&value),
            None => Ok(Vec::new()),
        }
    }

    fn get_multi_trait<T: ?Sized + Send + Sync + 'static>(&self, token: &Token) -> IocResult<Vec<Arc<T>>> {
        match self.resolve_token(token, InjectFlags::OPTIONAL)? {
            Some(value) => downcast_multi_trait::<T>(&value),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if `T` cannot be resolved.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves a trait object, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if `token` cannot be resolved as `T`.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self, token: &Token) -> Arc<T> {
        self.get_trait::<T>(token)
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {}", std::any::type_name::<T>(), e))
    }

    /// Disposes `service` when this resolver is destroyed.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) -> IocResult<()> {
        self.push_disposer(Box::new(move || service.dispose()))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

impl ResolverCore for Injector {
    fn resolve_token(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        self.lookup(token, flags, None)
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) -> IocResult<()> {
        self.on_destroy(f).map(|_| ())
    }
}

impl ResolverCore for InvocationContext {
    fn resolve_token(&self, token: &Token, flags: InjectFlags) -> IocResult<Option<AnyArc>> {
        self.lookup(token, flags)
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) -> IocResult<()> {
        self.on_destroy(f).map(|_| ())
    }
}
