//! Opaque binding values
//!
//! Language plugins hand the engine whatever runtime values their modules
//! export. The engine never inspects `Data` payloads; it only distinguishes
//! plain data from directly invocable entry points, which the callable
//! inline-cache variant relies on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Signature of a directly invocable entry point.
pub type CallFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A binding value produced by a language plugin.
///
/// Values are cheaply clonable and safe to share across threads.
#[derive(Clone)]
pub enum Value {
    /// Opaque host datum.
    Data(Arc<dyn Any + Send + Sync>),
    /// Directly invocable entry point.
    Callable(CallFn),
}

impl Value {
    /// Wrap a host datum.
    pub fn data<T: Any + Send + Sync>(value: T) -> Self {
        Value::Data(Arc::new(value))
    }

    /// Wrap a callable entry point.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Callable(Arc::new(f))
    }

    /// Borrow the datum as `T`, if this is a `Data` value of that type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Value::Data(data) => data.downcast_ref::<T>(),
            Value::Callable(_) => None,
        }
    }

    /// Whether this value can be invoked directly.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    /// Borrow the entry point, if this is a `Callable` value.
    pub fn as_callable(&self) -> Option<&CallFn> {
        match self {
            Value::Callable(f) => Some(f),
            Value::Data(_) => None,
        }
    }

    /// Identity comparison: both values share the same underlying allocation.
    ///
    /// Used to observe that an inline cache returned the same value twice
    /// rather than recomputing it.
    pub fn same_value(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Data(x), Value::Data(y)) => Arc::ptr_eq(x, y),
            (Value::Callable(x), Value::Callable(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(_) => f.write_str("Value::Data(..)"),
            Value::Callable(_) => f.write_str("Value::Callable(..)"),
        }
    }
}
