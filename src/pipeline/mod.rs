//! The two-phase registration pipeline.
//!
//! Registration runs a descriptor through an ordered list of
//! [`DesignStage`]s once, producing records and a [`TypeReflect`]. Every
//! construction of a class record then runs the ordered list of
//! [`RuntimeStage`]s. Both lists live on the [`Platform`](crate::Platform)
//! and can be replaced, reordered or extended through its builder.
//!
//! # Examples
//!
//! ```rust
//! use ferrous_ioc::pipeline::{RuntimeContext, RuntimePhase, RuntimeStage};
//! use ferrous_ioc::{Injector, IocResult, Platform, Resolver, TypeDescriptor};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct CountConstructions(AtomicUsize);
//!
//! impl RuntimeStage for CountConstructions {
//!     fn name(&self) -> &'static str {
//!         "count-constructions"
//!     }
//!     fn phase(&self) -> RuntimePhase {
//!         RuntimePhase::Commit
//!     }
//!     fn run(&self, _ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! struct Job;
//!
//! let counter = Arc::new(CountConstructions::default());
//! let root = Injector::root(Platform::builder().runtime_stage(counter.clone()).build());
//! root.register(TypeDescriptor::builder::<Job>().construct(|_| Ok(Job)).build()).unwrap();
//! root.get::<Job>().unwrap();
//! root.get::<Job>().unwrap();
//! assert_eq!(counter.0.load(Ordering::SeqCst), 2);
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::args::Args;
use crate::context::InvocationContext;
use crate::descriptor::{BoxAny, TypeDescriptor};
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::injector::Injector;
use crate::platform::Platform;
use crate::record::{AnyArc, FactoryRecord};
use crate::reflect::TypeReflect;
use crate::token::Token;

mod design;
mod runtime;

pub use design::{BindClass, BindProviders, IndexReflection, RegisterRefProviders};
pub use runtime::{AutoRun, Construct, InjectProperties, RegisterSingleton, ResolveConstructorArgs, Validate};

/// One step of type registration.
pub trait DesignStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()>;
}

/// Mutable state threaded through the design stages of one registration.
pub struct DesignContext<'a> {
    owner: &'a Injector,
    descriptor: &'a Arc<TypeDescriptor>,
    reflect: TypeReflect,
}

impl<'a> DesignContext<'a> {
    pub(crate) fn new(owner: &'a Injector, descriptor: &'a Arc<TypeDescriptor>) -> Self {
        Self {
            owner,
            descriptor,
            reflect: TypeReflect::new(descriptor.clone()),
        }
    }

    /// Injector the descriptor's records are written into.
    pub fn owner(&self) -> &Injector {
        self.owner
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        self.descriptor
    }

    pub fn platform(&self) -> &Arc<Platform> {
        self.owner.platform()
    }

    pub fn reflect(&self) -> &TypeReflect {
        &self.reflect
    }

    pub fn reflect_mut(&mut self) -> &mut TypeReflect {
        &mut self.reflect
    }

    pub(crate) fn into_reflect(self) -> TypeReflect {
        self.reflect
    }
}

pub(crate) fn run_design(stages: &[Arc<dyn DesignStage>], ctx: &mut DesignContext<'_>) -> IocResult<()> {
    for stage in stages {
        tracing::trace!(stage = stage.name(), token = %ctx.descriptor.token(), "design stage");
        stage.run(ctx)?;
    }
    Ok(())
}

/// Default design stages, in order.
pub fn default_design_stages() -> Vec<Arc<dyn DesignStage>> {
    vec![
        Arc::new(RegisterRefProviders),
        Arc::new(BindProviders),
        Arc::new(IndexReflection),
        Arc::new(BindClass),
    ]
}

/// Ordering bucket of a runtime stage.
///
/// Stages in `Prepare` and `Construct` run before an instance exists,
/// `Initialize` stages see the instance while it is still exclusively owned
/// and mutable, `Commit` stages see the shared instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimePhase {
    Prepare,
    Construct,
    Initialize,
    Commit,
}

/// One step of class construction.
pub trait RuntimeStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase(&self) -> RuntimePhase;

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()>;
}

/// Default runtime stages, in order.
pub fn default_runtime_stages() -> Vec<Arc<dyn RuntimeStage>> {
    vec![
        Arc::new(ResolveConstructorArgs),
        Arc::new(Validate),
        Arc::new(Construct),
        Arc::new(InjectProperties),
        Arc::new(RegisterSingleton),
        Arc::new(AutoRun),
    ]
}

/// State of one class construction.
pub struct RuntimeContext<'a> {
    owner: &'a Injector,
    record: &'a Arc<FactoryRecord>,
    descriptor: &'a Arc<TypeDescriptor>,
    reflect: Arc<TypeReflect>,
    context: InvocationContext,
    flags: InjectFlags,
    args: Option<Args>,
    pending: Option<BoxAny>,
    instance: Option<AnyArc>,
}

impl<'a> RuntimeContext<'a> {
    /// Injector that owns the record being constructed.
    pub fn owner(&self) -> &Injector {
        self.owner
    }

    /// Token the record is registered under.
    pub fn token(&self) -> &Token {
        &self.record.token
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        self.descriptor
    }

    pub fn reflect(&self) -> &TypeReflect {
        &self.reflect
    }

    /// Context dependencies are resolved through.
    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    pub fn flags(&self) -> InjectFlags {
        self.flags
    }

    pub fn args(&self) -> Option<&Args> {
        self.args.as_ref()
    }

    pub fn set_args(&mut self, args: Args) {
        self.args = Some(args);
    }

    /// The instance while it is still exclusively owned.
    pub fn pending_mut(&mut self) -> Option<&mut (dyn Any + Send + Sync)> {
        self.pending.as_deref_mut()
    }

    pub fn set_pending(&mut self, instance: BoxAny) {
        self.pending = Some(instance);
    }

    /// The shared instance, available from the `Commit` phase on.
    pub fn instance(&self) -> Option<&AnyArc> {
        self.instance.as_ref()
    }

    /// Replaces the shared instance, e.g. with a proxy or an existing singleton.
    pub fn set_instance(&mut self, instance: AnyArc) {
        self.pending = None;
        self.instance = Some(instance);
    }

    // Moves the mutable instance into shared ownership.
    fn commit(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.instance = Some(Arc::from(pending));
        }
    }
}

/// Runs the platform's runtime stages for a class record.
///
/// Class-scoped extra providers get a dedicated static child of `owner`,
/// consulted before the caller's context. Without them, the caller's context
/// is consulted before `owner`.
pub(crate) fn instantiate(
    owner: &Injector,
    record: &Arc<FactoryRecord>,
    descriptor: &Arc<TypeDescriptor>,
    flags: InjectFlags,
    active: Option<&InvocationContext>,
) -> IocResult<AnyArc> {
    let platform = owner.platform();
    let reflect = platform.reflect_or_index(descriptor);
    let extra = platform.class_providers(descriptor.token());
    let context = if extra.is_empty() {
        InvocationContext::for_construction(owner.clone(), false, active)
    } else {
        InvocationContext::for_construction(owner.create_static_child(extra)?, true, active)
    };

    let mut rc = RuntimeContext {
        owner,
        record,
        descriptor,
        reflect,
        context,
        flags,
        args: None,
        pending: None,
        instance: None,
    };
    let outcome = run_runtime(platform.runtime_stages(), &mut rc);
    // Constructor args hold a handle on the context.
    rc.args = None;

    let RuntimeContext { context, instance, .. } = rc;
    if !context.is_captured() {
        context.destroy();
    }
    outcome?;
    instance.ok_or_else(|| IocError::construction_msg(&record.token, "no runtime stage produced an instance"))
}

fn run_runtime(stages: &[Arc<dyn RuntimeStage>], rc: &mut RuntimeContext<'_>) -> IocResult<()> {
    for stage in stages {
        if stage.phase() == RuntimePhase::Commit {
            rc.commit();
        }
        tracing::trace!(stage = stage.name(), token = %rc.record.token, "runtime stage");
        stage.run(rc)?;
    }
    rc.commit();
    Ok(())
}
