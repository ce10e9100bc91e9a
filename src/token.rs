//! Tokens naming the capabilities an injector can provide.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Ids below this are reserved for the well-known symbols.
static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(64);

/// Resolves to the injector performing the lookup.
pub const INJECTOR: Token = Token::Symbol(0, "Injector");
/// Resolves to the root injector of the tree.
pub const ROOT_INJECTOR: Token = Token::Symbol(1, "RootInjector");
/// Resolves to the shared [`Platform`](crate::Platform).
pub const PLATFORM: Token = Token::Symbol(2, "Platform");
/// Resolves to the active [`InvocationContext`](crate::InvocationContext), if any.
pub const INVOCATION_CONTEXT: Token = Token::Symbol(3, "InvocationContext");

/// Opaque identifier for a requested dependency.
///
/// # Token Types
///
/// - **Type**: a Rust type used as its own token (the class reference)
/// - **Name**: a string token, typically for configuration values
/// - **Symbol**: a unique opaque id with a description for diagnostics
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::Token;
///
/// struct Database;
///
/// let by_type = Token::of::<Database>();
/// let by_name = Token::name("db_url");
/// let by_symbol = Token::symbol("DB_POOL");
///
/// assert_eq!(by_type, Token::of::<Database>());
/// assert_eq!(by_name, Token::name("db_url"));
/// assert_ne!(by_symbol, Token::symbol("DB_POOL")); // every symbol is unique
/// assert!(by_type.display_name().ends_with("Database"));
/// ```
#[derive(Debug, Clone)]
pub enum Token {
    /// Concrete type token with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// String token
    Name(Arc<str>),
    /// Unique symbol with a description
    Symbol(u64, &'static str),
}

impl Token {
    /// Token for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// String token.
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    /// New process-unique symbol.
    pub fn symbol(description: &'static str) -> Self {
        Token::Symbol(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed), description)
    }

    /// Human readable name for errors and logs.
    pub fn display_name(&self) -> &str {
        match self {
            Token::Type(_, name) => name,
            Token::Name(name) => name,
            Token::Symbol(_, desc) => desc,
        }
    }

    /// Returns the TypeId for type tokens.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Token::Type(id, _) => Some(*id),
            _ => None,
        }
    }

    /// Returns true for class-reference tokens.
    pub fn is_type(&self) -> bool {
        matches!(self, Token::Type(..))
    }
}

// TypeId-only comparison for type tokens; the name is diagnostic.
impl PartialEq for Token {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type(a, _), Token::Type(b, _)) => a == b,
            (Token::Name(a), Token::Name(b)) => a == b,
            (Token::Symbol(a, _), Token::Symbol(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Token::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Token::Name(name) => {
                1u8.hash(state);
                name.hash(state);
            }
            Token::Symbol(id, _) => {
                2u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(id, desc) if *id < 64 => write!(f, "{}", desc),
            Token::Symbol(_, desc) => write!(f, "Symbol({})", desc),
            other => f.write_str(other.display_name()),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::name(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn type_tokens_compare_by_type_id() {
        let a = Token::Type(TypeId::of::<u32>(), "u32");
        let b = Token::Type(TypeId::of::<u32>(), "alias");
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn symbols_are_unique_even_with_same_description() {
        let a = Token::symbol("HANDLERS");
        let b = Token::symbol("HANDLERS");
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn names_and_symbols_never_collide() {
        assert_ne!(Token::name("Injector"), INJECTOR);
        assert_eq!(INJECTOR.to_string(), "Injector");
    }

    #[test]
    fn trait_objects_have_tokens() {
        trait Plugin {}
        let token = Token::of::<dyn Plugin>();
        assert!(token.display_name().contains("Plugin"));
        assert!(token.is_type());
    }
}
