use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::injection::{Managed, Value};
use crate::types::TypeKey;

/// Typed values attached to a service or an invocation, at most one per
/// type.
#[derive(Clone, Default)]
pub struct MetaInfo {
    entries: Vec<Value>,
}

impl MetaInfo {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds `value`, replacing any earlier value of the same type.
    pub fn with<T: Managed + Clone>(mut self, value: T) -> Self {
        self.set(Value::new(value));
        self
    }

    pub fn set(&mut self, value: Value) {
        let key = value.type_key();
        self.entries.retain(|entry| entry.type_key() != key);
        self.entries.push(value);
    }

    pub fn get<T: Managed + Clone>(&self) -> Option<T> {
        self.value(TypeKey::of::<T>()).and_then(Value::downcast::<T>)
    }

    pub fn get_ref<T: Managed>(&self) -> Option<&T> {
        self.value(TypeKey::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn value(&self, ty: TypeKey) -> Option<&Value> {
        self.entries.iter().find(|entry| entry.type_key() == ty)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for MetaInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list()
            .entries(self.entries.iter().map(Value::type_key))
            .finish()
    }
}
