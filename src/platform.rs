//! Process-scoped state shared by one injector tree.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::config::PlatformOptions;
use crate::descriptor::{ProviderBinding, TypeDescriptor};
use crate::error::{IocError, IocResult};
use crate::injector::{Injector, InjectorInner};
use crate::observer::{Observers, ResolutionObserver};
use crate::pipeline::{default_design_stages, default_runtime_stages, DesignStage, RuntimeStage};
use crate::record::{AnyArc, TokenMap};
use crate::reflect::TypeReflect;
use crate::token::Token;

/// State shared by every injector of one tree.
///
/// The platform owns the global singleton map, the named-scope lookup, the
/// registration pipeline stages and the per-class extra provider lists. It is
/// an explicit object handed to [`Injector::root`]; nothing here is a
/// language-level global.
///
/// Injectors hold the platform strongly; the platform only observes its
/// injectors through weak references.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, ManualClock, Platform, PlatformOptions};
/// use std::sync::Arc;
///
/// let clock = Arc::new(ManualClock::new());
/// let platform = Platform::builder()
///     .clock(clock.clone())
///     .options(PlatformOptions::default().auto_register(false))
///     .build();
///
/// let root = Injector::root(platform.clone());
/// assert!(platform.root().is_some());
/// assert!(!platform.options().auto_register);
/// # let _ = root;
/// ```
pub struct Platform {
    options: PlatformOptions,
    clock: Arc<dyn Clock>,
    pub(crate) observers: Observers,
    design: Vec<Arc<dyn DesignStage>>,
    runtime: Vec<Arc<dyn RuntimeStage>>,
    singletons: RwLock<TokenMap<AnyArc>>,
    // One in-flight build per singleton class, shared by every scope.
    singleton_builds: Mutex<TokenMap<Arc<OnceCell<AnyArc>>>>,
    scopes: RwLock<HashMap<String, Weak<InjectorInner>>>,
    class_providers: RwLock<TokenMap<Vec<ProviderBinding>>>,
    reflects: RwLock<TokenMap<Arc<TypeReflect>>>,
    // (platform injector, root injector)
    tree: Mutex<Option<(Weak<InjectorInner>, Weak<InjectorInner>)>>,
}

impl Platform {
    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::new()
    }

    pub fn options(&self) -> &PlatformOptions {
        &self.options
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn design_stages(&self) -> &[Arc<dyn DesignStage>] {
        &self.design
    }

    pub fn runtime_stages(&self) -> &[Arc<dyn RuntimeStage>] {
        &self.runtime
    }

    /// The platform-scope injector, while the tree is alive.
    pub fn injector(&self) -> Option<Injector> {
        let tree = self.tree.lock();
        tree.as_ref().and_then(|(platform, _)| Injector::upgrade(platform))
    }

    /// The root injector, while the tree is alive.
    pub fn root(&self) -> Option<Injector> {
        let tree = self.tree.lock();
        tree.as_ref().and_then(|(_, root)| Injector::upgrade(root))
    }

    /// Returns the live root or creates the platform and root injectors.
    pub(crate) fn root_or_init(self: &Arc<Self>, init: impl FnOnce() -> (Injector, Injector)) -> Injector {
        let mut tree = self.tree.lock();
        if let Some(root) = tree.as_ref().and_then(|(_, root)| Injector::upgrade(root)) {
            return root;
        }
        let (platform_injector, root) = init();
        *tree = Some((platform_injector.downgrade(), root.downgrade()));
        root
    }

    /// Global singleton for `token`, if one was registered.
    pub fn singleton(&self, token: &Token) -> Option<AnyArc> {
        self.singletons.read().get(token).cloned()
    }

    pub fn has_singleton(&self, token: &Token) -> bool {
        self.singletons.read().contains_key(token)
    }

    /// Registers a platform-wide singleton.
    ///
    /// # Errors
    ///
    /// [`IocError::DuplicateSingleton`] if the token already holds one.
    pub fn register_singleton(&self, token: Token, value: AnyArc) -> IocResult<()> {
        let mut singletons = self.singletons.write();
        if singletons.contains_key(&token) {
            return Err(IocError::DuplicateSingleton(token.to_string()));
        }
        tracing::debug!(token = %token, "singleton registered");
        singletons.insert(token, value);
        Ok(())
    }

    pub fn remove_singleton(&self, token: &Token) -> Option<AnyArc> {
        self.singleton_builds.lock().remove(token);
        self.singletons.write().remove(token)
    }

    // Cell concurrent builds of the singleton class `token` wait on.
    pub(crate) fn singleton_build(&self, token: &Token) -> Arc<OnceCell<AnyArc>> {
        self.singleton_builds.lock().entry(token.clone()).or_default().clone()
    }

    /// Injector registered under a named scope.
    pub fn scope(&self, name: &str) -> Option<Injector> {
        let scopes = self.scopes.read();
        scopes.get(name).and_then(Injector::upgrade)
    }

    pub(crate) fn set_scope(&self, name: &str, injector: &Injector) {
        self.scopes.write().insert(name.to_string(), injector.downgrade());
    }

    pub(crate) fn remove_scope(&self, name: &str, injector: &InjectorInner) {
        let mut scopes = self.scopes.write();
        let ours = scopes
            .get(name)
            .map(|weak| std::ptr::eq(weak.as_ptr(), injector as *const InjectorInner))
            .unwrap_or(false);
        if ours {
            scopes.remove(name);
        }
    }

    /// Adds a provider that only applies while constructing `target`.
    pub fn add_class_provider(&self, target: Token, binding: ProviderBinding) {
        self.class_providers.write().entry(target).or_default().push(binding);
    }

    pub fn class_providers(&self, target: &Token) -> Vec<ProviderBinding> {
        self.class_providers.read().get(target).cloned().unwrap_or_default()
    }

    /// Indexed reflection for a class token.
    pub fn reflect(&self, class: &Token) -> Option<Arc<TypeReflect>> {
        self.reflects.read().get(class).cloned()
    }

    pub(crate) fn store_reflect(&self, reflect: Arc<TypeReflect>) {
        self.reflects.write().insert(reflect.class().clone(), reflect);
    }

    /// Reflection for `descriptor`, indexing it on first use.
    pub(crate) fn reflect_or_index(&self, descriptor: &Arc<TypeDescriptor>) -> Arc<TypeReflect> {
        if let Some(found) = self.reflect(descriptor.token()) {
            return found;
        }
        let mut reflects = self.reflects.write();
        reflects
            .entry(descriptor.token().clone())
            .or_insert_with(|| Arc::new(TypeReflect::index(descriptor.clone())))
            .clone()
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("options", &self.options)
            .field("singletons", &self.singletons.read().len())
            .field("scopes", &self.scopes.read().keys().collect::<Vec<_>>())
            .field("design_stages", &self.design.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("runtime_stages", &self.runtime.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Platform`].
///
/// Stage lists start from the defaults. `design_stage` and `runtime_stage`
/// append to them; `design_stages` and `runtime_stages` replace the whole
/// ordered list, which is how stages are skipped or reordered.
pub struct PlatformBuilder {
    options: PlatformOptions,
    clock: Arc<dyn Clock>,
    observers: Observers,
    design: Vec<Arc<dyn DesignStage>>,
    runtime: Vec<Arc<dyn RuntimeStage>>,
}

impl PlatformBuilder {
    fn new() -> Self {
        Self {
            options: PlatformOptions::default(),
            clock: Arc::new(SystemClock),
            observers: Observers::default(),
            design: default_design_stages(),
            runtime: default_runtime_stages(),
        }
    }

    pub fn options(mut self, options: PlatformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn design_stage(mut self, stage: Arc<dyn DesignStage>) -> Self {
        self.design.push(stage);
        self
    }

    pub fn design_stages(mut self, stages: Vec<Arc<dyn DesignStage>>) -> Self {
        self.design = stages;
        self
    }

    pub fn runtime_stage(mut self, stage: Arc<dyn RuntimeStage>) -> Self {
        self.runtime.push(stage);
        self
    }

    pub fn runtime_stages(mut self, stages: Vec<Arc<dyn RuntimeStage>>) -> Self {
        self.runtime = stages;
        self
    }

    pub fn build(self) -> Arc<Platform> {
        let mut runtime = self.runtime;
        // Stable: stages keep their relative order inside a phase.
        runtime.sort_by_key(|stage| stage.phase());
        Arc::new(Platform {
            options: self.options,
            clock: self.clock,
            observers: self.observers,
            design: self.design,
            runtime,
            singletons: RwLock::new(TokenMap::default()),
            singleton_builds: Mutex::new(TokenMap::default()),
            scopes: RwLock::new(HashMap::new()),
            class_providers: RwLock::new(TokenMap::default()),
            reflects: RwLock::new(TokenMap::default()),
            tree: Mutex::new(None),
        })
    }
}

impl Default for PlatformBuilder {
    fn default() -> Self {
        Self::new()
    }
}
