//! Default runtime stages.

use std::sync::Arc;

use crate::args::Args;
use crate::context::call_method;
use crate::error::{IocError, IocResult};

use super::{RuntimeContext, RuntimePhase, RuntimeStage};

/// Resolves constructor parameters through the construction context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveConstructorArgs;

impl RuntimeStage for ResolveConstructorArgs {
    fn name(&self) -> &'static str {
        "resolve-constructor-args"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Prepare
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        let descriptor = ctx.descriptor.clone();
        let args = ctx
            .context
            .resolve_arguments(descriptor.params(), descriptor.token(), "constructor")?;
        ctx.args = Some(args);
        Ok(())
    }
}

/// Runs the descriptor's pre-construction checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validate;

impl RuntimeStage for Validate {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Prepare
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        let empty = Args::default();
        let args = ctx.args.as_ref().unwrap_or(&empty);
        for check in &ctx.descriptor.validators {
            check(args)?;
        }
        Ok(())
    }
}

/// Calls the constructor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Construct;

impl RuntimeStage for Construct {
    fn name(&self) -> &'static str {
        "construct"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Construct
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        if ctx.pending.is_some() || ctx.instance.is_some() {
            return Ok(());
        }
        let empty = Args::default();
        let instance = ctx.descriptor.construct(ctx.args.as_ref().unwrap_or(&empty))?;
        ctx.pending = Some(instance);
        Ok(())
    }
}

/// Assigns indexed properties on the freshly built instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectProperties;

impl RuntimeStage for InjectProperties {
    fn name(&self) -> &'static str {
        "inject-properties"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Initialize
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        let reflect = ctx.reflect.clone();
        if reflect.properties().is_empty() {
            return Ok(());
        }
        for property in reflect.properties() {
            let Some(value) = ctx.context.lookup(&property.token, property.flags)? else {
                continue;
            };
            let target = ctx.pending.as_deref_mut().ok_or_else(|| {
                IocError::construction_msg(&ctx.record.token, format!("property `{}` set on a shared instance", property.name))
            })?;
            (property.setter)(target, value)?;
        }
        Ok(())
    }
}

/// Publishes singleton classes on the platform.
///
/// With strict singletons a second instance is an error; otherwise the
/// instance already published wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegisterSingleton;

impl RuntimeStage for RegisterSingleton {
    fn name(&self) -> &'static str {
        "register-singleton"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Commit
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        if !ctx.descriptor.is_singleton() {
            return Ok(());
        }
        let Some(instance) = ctx.instance.clone() else {
            return Ok(());
        };
        let platform = ctx.owner.platform().clone();
        let token = ctx.descriptor.token().clone();

        match platform.register_singleton(token.clone(), instance) {
            Ok(()) => {
                let weak = Arc::downgrade(&platform);
                ctx.record.set_unregister_hook(Box::new(move || {
                    if let Some(platform) = weak.upgrade() {
                        platform.remove_singleton(&token);
                    }
                }));
                Ok(())
            }
            Err(err) if platform.options().strict_singletons => Err(err),
            Err(_) => {
                tracing::warn!(token = %token, "singleton already published, reusing it");
                if let Some(existing) = platform.singleton(&token) {
                    ctx.instance = Some(existing);
                }
                Ok(())
            }
        }
    }
}

/// Runs the auto-run methods against the shared instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoRun;

impl RuntimeStage for AutoRun {
    fn name(&self) -> &'static str {
        "auto-run"
    }

    fn phase(&self) -> RuntimePhase {
        RuntimePhase::Commit
    }

    fn run(&self, ctx: &mut RuntimeContext<'_>) -> IocResult<()> {
        let reflect = ctx.reflect.clone();
        let Some(instance) = ctx.instance.clone() else {
            return Ok(());
        };
        for name in reflect.auto_run() {
            if let Some(method) = reflect.method(name) {
                call_method(&instance, reflect.class(), method, &ctx.context)?;
            }
        }
        Ok(())
    }
}
