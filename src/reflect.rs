//! Derived per-class metadata produced by the design stage.
//!
//! A [`TypeReflect`] is what the runtime stage actually consumes: the
//! descriptor plus everything indexed from it (property injection points,
//! per-method providers, parameter overrides, the auto-run list). The
//! descriptor itself is never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{MethodSpec, ParamSpec, PropertySpec, ProviderBinding, TypeDescriptor};
use crate::token::Token;

/// Indexed view of one class.
#[derive(Clone, Debug)]
pub struct TypeReflect {
    descriptor: Arc<TypeDescriptor>,
    pub(crate) properties: Vec<PropertySpec>,
    pub(crate) methods: HashMap<&'static str, MethodReflect>,
    pub(crate) auto_run: Vec<&'static str>,
}

/// Indexed view of one invocable method.
#[derive(Clone, Debug)]
pub struct MethodReflect {
    pub(crate) spec: MethodSpec,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) providers: Vec<ProviderBinding>,
}

impl MethodReflect {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Parameters after provider overrides were applied.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Providers layered into the invocation injector for this method.
    pub fn providers(&self) -> &[ProviderBinding] {
        &self.providers
    }
}

impl TypeReflect {
    /// Bare reflection: descriptor data without any indexing applied.
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            descriptor,
            properties: Vec::new(),
            methods: HashMap::new(),
            auto_run: Vec::new(),
        }
    }

    /// Fully indexed reflection, equivalent to the default design stage.
    pub fn index(descriptor: Arc<TypeDescriptor>) -> Self {
        let mut reflect = Self::new(descriptor);
        reflect.index_properties();
        reflect.index_methods();
        reflect
    }

    pub(crate) fn index_properties(&mut self) {
        self.properties = self.descriptor.properties().to_vec();
    }

    pub(crate) fn index_methods(&mut self) {
        let descriptor = self.descriptor.clone();
        self.auto_run.clear();
        for method in descriptor.methods() {
            let params = method
                .params()
                .iter()
                .map(|param| apply_override(param, descriptor.method_overrides(method.name())))
                .collect();
            let providers = descriptor.method_providers(method.name());
            self.methods.insert(
                method.name(),
                MethodReflect {
                    spec: method.clone(),
                    params,
                    providers,
                },
            );
            if method.is_auto_run() {
                self.auto_run.push(method.name());
            }
        }
    }

    pub fn class(&self) -> &Token {
        self.descriptor.token()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn method(&self, name: &str) -> Option<&MethodReflect> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Methods run once an instance exists, in declaration order.
    pub fn auto_run(&self) -> &[&'static str] {
        &self.auto_run
    }
}

// A parameter override swaps the lookup token of a parameter with the same name.
fn apply_override(param: &ParamSpec, overrides: &[(&'static str, Token)]) -> ParamSpec {
    match overrides.iter().find(|(name, _)| *name == param.name()) {
        Some((_, token)) => {
            let mut param = param.clone();
            param.provider = Some(token.clone());
            param
        }
        None => param.clone(),
    }
}
