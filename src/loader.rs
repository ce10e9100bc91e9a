//! Async loading of descriptor modules.
//!
//! Sources are fetched concurrently (config files, remote manifests, plugin
//! discovery) and then registered one after another in the order they were
//! given, so registration itself stays deterministic.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::descriptor::{ProviderBinding, TypeDescriptor};
use crate::error::{IocError, IocResult};
use crate::injector::Injector;

/// Something that produces descriptors and provider bindings asynchronously.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use ferrous_ioc::{DescriptorSource, Injector, IocResult, LoadedModule, Platform, ProviderBinding, Resolver, Token};
/// use std::sync::Arc;
///
/// struct EnvSource;
///
/// #[async_trait]
/// impl DescriptorSource for EnvSource {
///     async fn load(&self) -> IocResult<LoadedModule> {
///         Ok(LoadedModule::new().provider(ProviderBinding::value(Token::name("region"), "eu-west-1")))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> IocResult<()> {
/// let root = Injector::root(Platform::builder().build());
/// root.load(&[Arc::new(EnvSource) as Arc<dyn DescriptorSource>]).await?;
/// assert_eq!(*root.get_token::<&str>(&Token::name("region"))?, "eu-west-1");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn load(&self) -> IocResult<LoadedModule>;
}

/// Descriptors and top-level bindings delivered by one source.
#[derive(Clone, Debug, Default)]
pub struct LoadedModule {
    pub descriptors: Vec<TypeDescriptor>,
    pub providers: Vec<ProviderBinding>,
}

impl LoadedModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn provider(mut self, binding: ProviderBinding) -> Self {
        self.providers.push(binding);
        self
    }
}

#[async_trait]
impl DescriptorSource for LoadedModule {
    async fn load(&self) -> IocResult<LoadedModule> {
        Ok(self.clone())
    }
}

impl Injector {
    /// Loads every source concurrently, then registers them in order.
    ///
    /// Bindings of a module are injected before its descriptors are
    /// registered. A descriptor whose token was already seen earlier in the
    /// same load is skipped. Returns the number of descriptors registered.
    ///
    /// # Errors
    ///
    /// The first failing source (in source order) aborts the load before
    /// anything is registered.
    pub async fn load(&self, sources: &[Arc<dyn DescriptorSource>]) -> IocResult<usize> {
        self.ensure_alive()?;

        let mut tasks = JoinSet::new();
        for (index, source) in sources.iter().cloned().enumerate() {
            tasks.spawn(async move { (index, source.load().await) });
        }
        let mut results: Vec<Option<IocResult<LoadedModule>>> = sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| IocError::construction("DescriptorSource", e))?;
            results[index] = Some(result);
        }
        let modules = results.into_iter().flatten().collect::<IocResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut registered = 0;
        for module in modules {
            self.inject(module.providers)?;
            for descriptor in module.descriptors {
                if !seen.insert(descriptor.token().clone()) {
                    tracing::debug!(token = %descriptor.token(), "duplicate descriptor skipped");
                    continue;
                }
                self.register(descriptor)?;
                registered += 1;
            }
        }
        tracing::debug!(sources = sources.len(), registered, "descriptor modules loaded");
        Ok(registered)
    }
}
