//! # ferrous-ioc
//!
//! A hierarchical injector with a pluggable two-phase registration pipeline
//! and invocation contexts for calling methods with injected arguments.
//!
//! ## Features
//!
//! - **Hierarchical scopes**: platform, root, named and per-request injectors
//!   resolving through their parents, with `SELF`/`SKIP_SELF`/`OPTIONAL` flags
//! - **Tokens**: types, strings and symbols all work as lookup keys
//! - **Providers**: values, classes, factories with dependency lists, aliases
//!   and ordered multi-providers
//! - **Caching**: static memoization, single-flight under contention, and
//!   time-boxed caching driven by a pluggable [`Clock`]
//! - **Registration pipeline**: ordered, replaceable design and runtime stages
//! - **Invocation contexts**: call-scoped providers, named arguments and
//!   custom argument resolvers, destroyed automatically unless captured
//! - **Circular dependency detection** with the full token path
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{Injector, ParamSpec, Platform, ProvidedIn, Resolver, TypeDescriptor};
//! use std::sync::Arc;
//!
//! struct Logger;
//!
//! struct Service {
//!     logger: Arc<Logger>,
//! }
//!
//! let root = Injector::root(Platform::builder().build());
//! root.register(
//!     TypeDescriptor::builder::<Logger>()
//!         .construct(|_| Ok(Logger))
//!         .provided_in(ProvidedIn::Root)
//!         .as_static()
//!         .build(),
//! )
//! .unwrap();
//! root.register(
//!     TypeDescriptor::builder::<Service>()
//!         .param(ParamSpec::typed::<Logger>("logger"))
//!         .construct(|args| Ok(Service { logger: args.get::<Logger>(0)? }))
//!         .build(),
//! )
//! .unwrap();
//!
//! let a = root.get::<Service>().unwrap();
//! let b = root.get::<Service>().unwrap();
//! assert!(!Arc::ptr_eq(&a, &b)); // not static
//! assert!(Arc::ptr_eq(&a.logger, &b.logger)); // static
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use ferrous_ioc::{Injector, Platform, Resolver, Token};
//!
//! let root = Injector::root(Platform::builder().build());
//! root.set_value(Token::name("env"), "prod").unwrap();
//!
//! let request = root.create_child().unwrap();
//! request.set_value(Token::name("request_id"), 7u64).unwrap();
//!
//! assert_eq!(*request.get_token::<&str>(&Token::name("env")).unwrap(), "prod");
//! assert!(root.try_get_token::<u64>(&Token::name("request_id")).unwrap().is_none());
//!
//! request.destroy();
//! assert!(request.get_token::<&str>(&Token::name("env")).is_err());
//! ```

pub mod args;
pub mod clock;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod flags;
pub mod injector;
pub mod observer;
pub mod pipeline;
pub mod platform;
pub mod reflect;
pub mod token;
pub mod traits;

#[cfg(feature = "async")]
pub mod loader;

// Internal modules
mod internal;
mod record;

pub use args::Args;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PlatformOptions, DEFAULT_MAX_DEPTH};
pub use context::{
    resolver_fn, ArgumentResolver, DefaultValueResolver, FnResolver, InvocationContext, NameResolver, TokenResolver,
    TypeResolver,
};
pub use descriptor::{
    BoxAny, Dep, FactoryFn, Injectable, MethodSpec, ParamSpec, PropertySpec, ProvidedIn, ProviderBinding, ProviderKind,
    TypeDescriptor, TypeDescriptorBuilder, TypeRef,
};
pub use diagnostics::{InjectorSnapshot, RecordSnapshot};
pub use error::{IocError, IocResult};
pub use flags::InjectFlags;
pub use injector::{Injector, InjectorScope, InvokeArgs, InvokeTarget, ResolveOptions};
pub use internal::HookId;
pub use observer::{ResolutionObserver, TracingObserver};
pub use pipeline::{DesignContext, DesignStage, RuntimeContext, RuntimePhase, RuntimeStage};
pub use platform::{Platform, PlatformBuilder};
pub use record::{AnyArc, RecordKind};
pub use reflect::{MethodReflect, TypeReflect};
pub use token::{Token, INJECTOR, INVOCATION_CONTEXT, PLATFORM, ROOT_INJECTOR};
pub use traits::{Dispose, Resolver, ResolverCore};

#[cfg(feature = "async")]
pub use loader::{DescriptorSource, LoadedModule};
