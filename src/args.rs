//! Resolved arguments handed to constructors, factories and methods.

use std::sync::Arc;

use crate::context::InvocationContext;
use crate::error::{IocError, IocResult};
use crate::record::AnyArc;

/// Positional arguments resolved for a single call.
///
/// Values are type-erased; the typed accessors downcast them and report
/// [`IocError::TypeMismatch`] when the registration does not match the
/// expected type. Trait objects are stored as `Arc<Arc<dyn Trait>>`, so use
/// [`get_trait`](Self::get_trait) for them.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Args, AnyArc};
/// use std::sync::Arc;
///
/// let args = Args::from_values(vec![Some(Arc::new(8080u16) as AnyArc), None]);
/// assert_eq!(*args.get::<u16>(0).unwrap(), 8080);
/// assert!(args.opt::<String>(1).unwrap().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Args {
    values: Vec<Option<AnyArc>>,
    names: Vec<&'static str>,
    context: Option<InvocationContext>,
}

impl Args {
    /// Builds arguments from already resolved values.
    pub fn from_values(values: Vec<Option<AnyArc>>) -> Self {
        Self {
            values,
            names: Vec::new(),
            context: None,
        }
    }

    pub(crate) fn new(
        values: Vec<Option<AnyArc>>,
        names: Vec<&'static str>,
        context: Option<InvocationContext>,
    ) -> Self {
        Self { values, names, context }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`, `None` if absent or unresolved.
    pub fn raw(&self, index: usize) -> Option<&AnyArc> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    /// Declared parameter name at `index`, if known.
    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.names.get(index).copied()
    }

    /// Context the call was resolved in.
    pub fn context(&self) -> Option<&InvocationContext> {
        self.context.as_ref()
    }

    /// Required argument of concrete type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> IocResult<Arc<T>> {
        self.opt::<T>(index)?.ok_or_else(|| self.missing(index))
    }

    /// Optional argument of concrete type `T`.
    pub fn opt<T: Send + Sync + 'static>(&self, index: usize) -> IocResult<Option<Arc<T>>> {
        match self.raw(index) {
            Some(value) => downcast::<T>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Required trait-object argument.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> IocResult<Arc<T>> {
        let value = self.raw(index).ok_or_else(|| self.missing(index))?;
        downcast_trait::<T>(value)
    }

    /// Aggregated multi-provider argument of concrete type `T`.
    pub fn get_multi<T: Send + Sync + 'static>(&self, index: usize) -> IocResult<Vec<Arc<T>>> {
        let value = self.raw(index).ok_or_else(|| self.missing(index))?;
        downcast_multi::<T>(value)
    }

    fn missing(&self, index: usize) -> IocError {
        IocError::MissingParameter {
            target: "<args>".to_string(),
            method: "<call>".to_string(),
            params: vec![self
                .name(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", index))],
        }
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("len", &self.values.len())
            .field("names", &self.names)
            .field("resolved", &self.values.iter().filter(|v| v.is_some()).count())
            .finish()
    }
}

/// Downcasts a type-erased value to `T`.
pub fn downcast<T: Send + Sync + 'static>(value: &AnyArc) -> IocResult<Arc<T>> {
    value
        .clone()
        .downcast::<T>()
        .map_err(|_| IocError::TypeMismatch(std::any::type_name::<T>()))
}

/// Downcasts a value stored as `Arc<Arc<dyn Trait>>`.
pub fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> IocResult<Arc<T>> {
    value
        .clone()
        .downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| IocError::TypeMismatch(std::any::type_name::<T>()))
}

/// Downcasts an aggregated multi-provider value.
pub fn downcast_multi<T: Send + Sync + 'static>(value: &AnyArc) -> IocResult<Vec<Arc<T>>> {
    let items = value
        .clone()
        .downcast::<Vec<AnyArc>>()
        .map_err(|_| IocError::TypeMismatch("Vec<AnyArc>"))?;
    items.iter().map(downcast::<T>).collect()
}

/// Downcasts an aggregated multi-provider value of trait objects.
pub fn downcast_multi_trait<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> IocResult<Vec<Arc<T>>> {
    let items = value
        .clone()
        .downcast::<Vec<AnyArc>>()
        .map_err(|_| IocError::TypeMismatch("Vec<AnyArc>"))?;
    items.iter().map(downcast_trait::<T>).collect()
}
