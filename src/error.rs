//! Error types for the injector tree.

use std::sync::Arc;

use thiserror::Error;

/// Injector errors
///
/// Every failure of registration, resolution, invocation or lifecycle
/// operations is reported through this enum. All variants are raised
/// synchronously to the immediate caller; nothing here is retried.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, IocError, Platform, Resolver, Token};
///
/// let root = Injector::root(Platform::builder().build());
/// match root.get_token::<String>(&Token::name("missing")) {
///     Err(IocError::MissingProvider(token)) => assert_eq!(token, "missing"),
///     other => panic!("unexpected: {:?}", other.map(|_| ())),
/// }
/// ```
///
/// ```rust
/// use ferrous_ioc::IocError;
///
/// let circular = IocError::Circular(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum IocError {
    /// Token could not be resolved anywhere in the injector chain
    #[error("No provider for {0}")]
    MissingProvider(String),
    /// Circular dependency detected during construction (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),
    /// One or more parameters could not be resolved by any argument resolver
    #[error("Missing parameters [{}] for {target}::{method}", .params.join(", "))]
    MissingParameter {
        /// Class whose method or constructor was being called
        target: String,
        /// Method name, `constructor` for constructors
        method: String,
        /// Every parameter that stayed unresolved
        params: Vec<String>,
    },
    /// Operation attempted on a destroyed injector or context
    #[error("{0} has been destroyed")]
    Destroyed(&'static str),
    /// A platform-wide singleton already exists for the token
    #[error("Singleton already registered for {0}")]
    DuplicateSingleton(String),
    /// Resolved value did not have the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Invoked method is not declared on the target's descriptor
    #[error("Method {method} not found on {target}")]
    MissingMethod {
        /// Target class
        target: String,
        /// Requested method
        method: String,
    },
    /// A constructor, factory or method body failed
    #[error("Failed to construct {token}: {source}")]
    Construction {
        /// Token being produced
        token: String,
        /// Failure reported by user code
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl IocError {
    /// Wraps an arbitrary error raised by user code while producing `token`.
    pub fn construction<E>(token: impl std::fmt::Display, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        IocError::Construction {
            token: token.to_string(),
            source: Arc::new(error),
        }
    }

    /// Wraps a plain message raised by user code while producing `token`.
    pub fn construction_msg(token: impl std::fmt::Display, message: impl Into<String>) -> Self {
        IocError::Construction {
            token: token.to_string(),
            source: Arc::new(Message(message.into())),
        }
    }

    /// Returns true for [`IocError::MissingProvider`].
    pub fn is_missing_provider(&self) -> bool {
        matches!(self, IocError::MissingProvider(_))
    }

    /// Returns true for [`IocError::Destroyed`].
    pub fn is_destroyed(&self) -> bool {
        matches!(self, IocError::Destroyed(_))
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Result type for injector operations
///
/// A convenience alias for `Result<T, IocError>` used throughout ferrous-ioc.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{IocResult, IocError};
///
/// fn lookup() -> IocResult<u32> {
///     Err(IocError::MissingProvider("port".into()))
/// }
///
/// assert!(lookup().unwrap_err().is_missing_provider());
/// ```
pub type IocResult<T> = Result<T, IocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_lists_all_params() {
        let err = IocError::MissingParameter {
            target: "UserController".into(),
            method: "create".into(),
            params: vec!["name".into(), "age".into()],
        };
        assert_eq!(err.to_string(), "Missing parameters [name, age] for UserController::create");
    }

    #[test]
    fn construction_keeps_source() {
        let err = IocError::construction_msg("Database", "connection refused");
        assert_eq!(err.to_string(), "Failed to construct Database: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }
}
