//! Default design stages.

use crate::error::IocResult;
use crate::record::FactoryRecord;

use super::{DesignContext, DesignStage};

/// Files the descriptor's providers for other classes on the platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegisterRefProviders;

impl DesignStage for RegisterRefProviders {
    fn name(&self) -> &'static str {
        "register-ref-providers"
    }

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()> {
        for (target, binding) in ctx.descriptor().ref_providers() {
            ctx.platform().add_class_provider(target.clone(), binding.clone());
        }
        Ok(())
    }
}

/// Binds the providers a class declares into its owning injector.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindProviders;

impl DesignStage for BindProviders {
    fn name(&self) -> &'static str {
        "bind-providers"
    }

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()> {
        for binding in ctx.descriptor().providers() {
            ctx.owner().bind(binding)?;
        }
        Ok(())
    }
}

/// Indexes property injection points, method overrides and auto-run methods.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexReflection;

impl DesignStage for IndexReflection {
    fn name(&self) -> &'static str {
        "index-reflection"
    }

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()> {
        let reflect = ctx.reflect_mut();
        reflect.index_properties();
        reflect.index_methods();
        Ok(())
    }
}

/// Registers the class's own constructor record.
///
/// Abstract descriptors only contribute metadata and are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindClass;

impl DesignStage for BindClass {
    fn name(&self) -> &'static str {
        "bind-class"
    }

    fn run(&self, ctx: &mut DesignContext<'_>) -> IocResult<()> {
        let descriptor = ctx.descriptor().clone();
        if descriptor.is_abstract() {
            tracing::trace!(token = %descriptor.token(), "abstract type, no constructor record");
            return Ok(());
        }

        let platform = ctx.platform();
        let expiry = match descriptor.expires() {
            Some(ttl) => Some(ttl),
            None if !descriptor.is_static() => platform.options().default_expiry,
            None => None,
        };
        let token = descriptor.token().clone();
        let record = FactoryRecord::class(token.clone(), descriptor.clone())
            .with_static(descriptor.is_static())
            .with_expiry(expiry);

        let owner = ctx.owner();
        owner.insert_record(record, false);
        platform.observers.registered(&token, owner.scope());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ProviderBinding, TypeDescriptor};
    use crate::injector::Injector;
    use crate::platform::Platform;
    use crate::token::Token;
    use crate::flags::InjectFlags;
    use std::sync::Arc;

    struct Widget;

    #[test]
    fn skipping_bind_class_leaves_only_metadata() {
        let platform = Platform::builder()
            .design_stages(vec![Arc::new(RegisterRefProviders), Arc::new(BindProviders), Arc::new(IndexReflection)])
            .build();
        let root = Injector::root(platform.clone());
        root.register(
            TypeDescriptor::builder::<Widget>()
                .construct(|_| Ok(Widget))
                .provider(ProviderBinding::value(Token::name("widget.size"), 3u8))
                .build(),
        )
        .unwrap();
        assert!(!root.has(&Token::of::<Widget>(), InjectFlags::SELF).unwrap());
        assert!(root.has(&Token::name("widget.size"), InjectFlags::SELF).unwrap());
        assert!(platform.reflect(&Token::of::<Widget>()).is_some());
    }

    #[test]
    fn abstract_types_get_no_record() {
        let root = Injector::root(Platform::builder().build());
        root.register(TypeDescriptor::builder::<Widget>().abstract_type().build()).unwrap();
        assert!(root.is_empty());
    }
}
