//! Typed resolution traits shared by injectors and invocation contexts.

mod dispose;
mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};
