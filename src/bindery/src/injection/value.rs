use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::types::TypeKey;
use crate::util::any::{AsAny, DowncastRef};

/// Anything that can be injected or produced by a fragment.
pub trait Managed: AsAny + Send + Sync + 'static {}

impl<T> Managed for T where T: Send + Sync + 'static {}

/// A type-erased injected value.
///
/// Cloning is cheap. Values produced by composites remember where they came
/// from, see [`describe_value`].
#[derive(Clone)]
pub struct Value {
    object: Arc<dyn Managed>,
    origin: Option<Arc<Origin>>,
}

impl Value {
    pub fn new<T: Managed>(object: T) -> Self {
        Self {
            object: Arc::new(object),
            origin: None,
        }
    }

    pub(crate) fn with_origin(mut self, origin: Arc<Origin>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn downcast<T: Managed + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    pub fn downcast_ref<T: Managed>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn is<T: Managed>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::from_parts((*self.object).concrete_type_id(), (*self.object).type_name())
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_deref()
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Value")
            .field("type", &self.type_key())
            .field("origin", &self.origin)
            .finish()
    }
}

/// The composite, module and layer that produced a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub composite: TypeKey,
    pub module: String,
    pub layer: String,
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "composite {} in module {} of layer {}",
            self.composite, self.module, self.layer
        )
    }
}

/// Describes `value` for error messages: its runtime type and, if known,
/// the composite that produced it.
pub fn describe_value(value: &Value) -> String {
    match value.origin() {
        Some(origin) => format!("a value of type {} produced by {origin}", value.type_key()),
        None => format!("a value of type {}", value.type_key()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_downcast_succeeds() {
        let value = Value::new(String::from("text"));

        assert!(value.is::<String>());
        assert_eq!(value.downcast::<String>(), Some(String::from("text")));
        assert_eq!(value.downcast::<i32>(), None);
        assert_eq!(value.type_key(), TypeKey::of::<String>());
    }

    #[test]
    fn describe_value_reports_origin() {
        let origin = Arc::new(Origin {
            composite: TypeKey::of::<u8>(),
            module: String::from("domain"),
            layer: String::from("core"),
        });

        assert_eq!(describe_value(&Value::new(1u8)), "a value of type u8");
        assert_eq!(
            describe_value(&Value::new(1u8).with_origin(origin)),
            "a value of type u8 produced by composite u8 in module domain of layer core"
        );
    }
}
