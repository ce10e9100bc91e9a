//! Method invocation with injected arguments.

use std::sync::Arc;

use crate::context::{call_method, InvocationContext};
use crate::descriptor::ProviderBinding;
use crate::error::{IocError, IocResult};
use crate::flags::InjectFlags;
use crate::record::AnyArc;
use crate::token::Token;

use super::Injector;

/// What [`Injector::invoke`] calls a method on.
#[derive(Clone)]
pub enum InvokeTarget {
    /// Resolve (and construct if needed) the token first.
    Token(Token),
    /// An existing instance of class `class`.
    Instance { instance: AnyArc, class: Token },
}

impl InvokeTarget {
    pub fn instance<T: Send + Sync + 'static>(instance: Arc<T>) -> Self {
        InvokeTarget::Instance {
            instance,
            class: Token::of::<T>(),
        }
    }
}

impl From<Token> for InvokeTarget {
    fn from(token: Token) -> Self {
        InvokeTarget::Token(token)
    }
}

impl std::fmt::Debug for InvokeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeTarget::Token(token) => f.debug_tuple("Token").field(token).finish(),
            InvokeTarget::Instance { class, .. } => f.debug_struct("Instance").field("class", class).finish(),
        }
    }
}

/// Arguments source for [`Injector::invoke`].
///
/// Without a context, a fresh one is created for the call and destroyed
/// afterwards unless the method captured it. A supplied context is reused
/// and never destroyed by `invoke`; if providers or named arguments are
/// added on top, they go into a child of that context instead.
#[derive(Clone, Default)]
pub struct InvokeArgs {
    providers: Vec<ProviderBinding>,
    arguments: Vec<(String, AnyArc)>,
    context: Option<InvocationContext>,
}

impl InvokeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, binding: ProviderBinding) -> Self {
        self.providers.push(binding);
        self
    }

    pub fn providers(mut self, bindings: impl IntoIterator<Item = ProviderBinding>) -> Self {
        self.providers.extend(bindings);
        self
    }

    /// Named value matched against parameter names.
    pub fn argument<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.arguments.push((name.into(), Arc::new(value)));
        self
    }

    pub fn context(mut self, context: InvocationContext) -> Self {
        self.context = Some(context);
        self
    }

    // (context, created by this call)
    fn into_context(self, injector: &Injector) -> IocResult<(InvocationContext, bool)> {
        let scoped = !self.providers.is_empty() || !self.arguments.is_empty();
        let (ctx, created) = match self.context {
            Some(ctx) if !scoped => return Ok((ctx, false)),
            Some(parent) => (InvocationContext::child_of(&parent, self.providers)?, true),
            None if self.providers.is_empty() => (InvocationContext::new(injector), true),
            None => (InvocationContext::with_child_injector(injector, self.providers)?, true),
        };
        for (name, value) in self.arguments {
            ctx.set_argument_arc(name, value)?;
        }
        Ok((ctx, created))
    }
}

impl std::fmt::Debug for InvokeArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeArgs")
            .field("providers", &self.providers.len())
            .field("arguments", &self.arguments.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("context", &self.context.as_ref().map(|c| c.id()))
            .finish()
    }
}

impl Injector {
    /// Calls `method` on `target` with arguments resolved from a context.
    ///
    /// The target is resolved from this injector when given as a token. The
    /// method and its parameters come from the indexed reflection of the
    /// target's class.
    ///
    /// # Errors
    ///
    /// * [`IocError::MissingMethod`] if the class has no such method
    /// * [`IocError::MissingParameter`] listing every unresolved parameter
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_ioc::{InvokeArgs, Injector, ParamSpec, Platform, Token, TypeDescriptor};
    ///
    /// struct Greeter;
    ///
    /// let root = Injector::root(Platform::builder().build());
    /// root.register(
    ///     TypeDescriptor::builder::<Greeter>()
    ///         .construct(|_| Ok(Greeter))
    ///         .method("greet", vec![ParamSpec::named("name")], |_: &Greeter, args| {
    ///             Ok(format!("hello {}", args.get::<String>(0)?))
    ///         })
    ///         .build(),
    /// )
    /// .unwrap();
    ///
    /// let reply = root
    ///     .invoke_as::<String>(
    ///         Token::of::<Greeter>(),
    ///         "greet",
    ///         InvokeArgs::new().argument("name", "ada".to_string()),
    ///     )
    ///     .unwrap();
    /// assert_eq!(*reply, "hello ada");
    /// ```
    pub fn invoke(&self, target: impl Into<InvokeTarget>, method: &str, args: InvokeArgs) -> IocResult<AnyArc> {
        self.ensure_alive()?;
        let (instance, class) = match target.into() {
            InvokeTarget::Token(token) => {
                let instance = self.lookup_required(&token, InjectFlags::DEFAULT, args.context.as_ref())?;
                (instance, self.class_of(&token))
            }
            InvokeTarget::Instance { instance, class } => (instance, class),
        };

        let missing = || IocError::MissingMethod {
            target: class.to_string(),
            method: method.to_string(),
        };
        let reflect = self.inner.platform.reflect(&class).ok_or_else(missing)?;
        let reflected = reflect.method(method).ok_or_else(missing)?;

        let (ctx, created) = args.into_context(self)?;
        tracing::trace!(class = %class, method, context = ctx.id(), "invoking");
        let result = call_method(&instance, &class, reflected, &ctx);
        if created && !ctx.is_captured() {
            ctx.destroy();
        }
        result
    }

    /// Typed [`invoke`](Self::invoke).
    pub fn invoke_as<R: Send + Sync + 'static>(
        &self,
        target: impl Into<InvokeTarget>,
        method: &str,
        args: InvokeArgs,
    ) -> IocResult<Arc<R>> {
        let value = self.invoke(target, method, args)?;
        crate::args::downcast::<R>(&value)
    }

    // Follows provider-type links to the class that owns the methods.
    fn class_of(&self, token: &Token) -> Token {
        let mut class = token.clone();
        for _ in 0..8 {
            match self.origin(&class) {
                Some(next) if next != class => class = next,
                _ => break,
            }
        }
        class
    }
}
