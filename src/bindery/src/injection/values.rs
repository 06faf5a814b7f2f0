use std::sync::Arc;

use snafu::prelude::*;

use crate::dependency::DependencyDescriptor;
use crate::injection::{
    describe_value, InjectionError, Managed, MissingValueSnafu, SlotUnavailableSnafu,
    TypeMismatchSnafu, Value,
};
use crate::types::GenericType;

/// The raw result of one provider.
#[derive(Debug, Clone)]
pub enum Injected {
    Absent,
    Single(Value),
    Many(Vec<Value>),
}

impl Injected {
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Single(_) => false,
            Self::Many(values) => values.is_empty(),
        }
    }
}

/// Converts a [`Value`] to a framework handle type such as [`This`].
///
/// [`This`]: crate::injection::This
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;

    /// The type to declare for injection points of this type.
    fn declared_type() -> GenericType;
}

/// The injected values of a constructor or of one setter field, ready to be
/// assigned.
///
/// Each slot can be taken once, converted to the type of the Rust parameter.
#[derive(Debug)]
pub struct InjectedValues {
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    injected: Option<Injected>,
    descriptor: Arc<DependencyDescriptor>,
}

impl InjectedValues {
    pub(crate) fn new<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = (Injected, Arc<DependencyDescriptor>)>,
    {
        let slots = slots
            .into_iter()
            .map(|(injected, descriptor)| Slot {
                injected: Some(injected),
                descriptor,
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn take<T: Managed + Clone>(&mut self, index: usize) -> Result<T, InjectionError> {
        self.take_with(index, Value::downcast::<T>)
    }

    pub fn take_optional<T: Managed + Clone>(
        &mut self,
        index: usize,
    ) -> Result<Option<T>, InjectionError> {
        self.take_optional_with(index, Value::downcast::<T>)
    }

    pub fn take_all<T: Managed + Clone>(&mut self, index: usize) -> Result<Vec<T>, InjectionError> {
        self.take_all_with(index, Value::downcast::<T>)
    }

    /// Takes a mandatory value. If several values were injected, the first
    /// one is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is empty or already taken, or if
    /// `convert` rejects the value.
    pub fn take_with<T, F>(&mut self, index: usize, convert: F) -> Result<T, InjectionError>
    where
        F: Fn(&Value) -> Option<T>,
    {
        let (injected, descriptor) = self.take_slot(index)?;
        let value = match injected {
            Injected::Single(value) => Some(value),
            Injected::Many(values) => values.into_iter().next(),
            Injected::Absent => None,
        };

        let Some(value) = value else {
            return MissingValueSnafu {
                fragment: descriptor.fragment(),
                point: descriptor.point(),
                annotations: descriptor.annotations().to_string(),
                hint: "",
            }
            .fail();
        };
        convert_value(&descriptor, &value, &convert)
    }

    pub fn take_optional_with<T, F>(
        &mut self,
        index: usize,
        convert: F,
    ) -> Result<Option<T>, InjectionError>
    where
        F: Fn(&Value) -> Option<T>,
    {
        let (injected, descriptor) = self.take_slot(index)?;
        let value = match injected {
            Injected::Single(value) => Some(value),
            Injected::Many(values) => values.into_iter().next(),
            Injected::Absent => None,
        };

        value
            .map(|value| convert_value(&descriptor, &value, &convert))
            .transpose()
    }

    /// Takes every injected value. A single value becomes a one-element
    /// vector and an absent value an empty one.
    pub fn take_all_with<T, F>(&mut self, index: usize, convert: F) -> Result<Vec<T>, InjectionError>
    where
        F: Fn(&Value) -> Option<T>,
    {
        let (injected, descriptor) = self.take_slot(index)?;
        let values = match injected {
            Injected::Single(value) => vec![value],
            Injected::Many(values) => values,
            Injected::Absent => Vec::new(),
        };

        values
            .iter()
            .map(|value| convert_value(&descriptor, value, &convert))
            .collect()
    }

    fn take_slot(
        &mut self,
        index: usize,
    ) -> Result<(Injected, Arc<DependencyDescriptor>), InjectionError> {
        let slot = self
            .slots
            .get_mut(index)
            .context(SlotUnavailableSnafu { index })?;
        let injected = slot
            .injected
            .take()
            .context(SlotUnavailableSnafu { index })?;
        Ok((injected, Arc::clone(&slot.descriptor)))
    }
}

fn convert_value<T, F>(
    descriptor: &DependencyDescriptor,
    value: &Value,
    convert: &F,
) -> Result<T, InjectionError>
where
    F: Fn(&Value) -> Option<T>,
{
    convert(value).with_context(|| TypeMismatchSnafu {
        fragment: descriptor.fragment(),
        point: descriptor.point(),
        annotations: descriptor.annotations().to_string(),
        expected: descriptor.generic_type().clone(),
        actual: describe_value(value),
    })
}

#[cfg(test)]
mod tests {
    use crate::dependency::{DependencyDeclaration, InjectionPoint, InjectionScope};
    use crate::types::TypeKey;

    use super::*;

    fn descriptor(name: &'static str, ty: GenericType) -> Arc<DependencyDescriptor> {
        let declaration = DependencyDeclaration::new(InjectionScope::Uses, name, ty.clone());
        let point = InjectionPoint::Parameter { index: 0, name };
        Arc::new(DependencyDescriptor::new(
            TypeKey::of::<u8>(),
            point,
            &declaration,
            ty,
        ))
    }

    #[test]
    fn injected_values_take_succeeds() {
        let mut values = InjectedValues::new([
            (
                Injected::Single(Value::new(5i32)),
                descriptor("a", GenericType::of::<i32>()),
            ),
            (
                Injected::Many(vec![Value::new(1i32), Value::new(2i32)]),
                descriptor("b", GenericType::iterable(GenericType::of::<i32>())),
            ),
            (Injected::Absent, descriptor("c", GenericType::of::<i32>())),
            (
                Injected::Single(Value::new(7i32)),
                descriptor("d", GenericType::iterable(GenericType::of::<i32>())),
            ),
        ]);

        assert_eq!(values.take::<i32>(0).unwrap(), 5);
        assert_eq!(values.take_all::<i32>(1).unwrap(), [1, 2]);
        assert_eq!(values.take_optional::<i32>(2).unwrap(), None);
        assert_eq!(values.take_all::<i32>(3).unwrap(), [7]);
    }

    #[test]
    fn injected_values_take_fails_when_slot_is_taken_twice() {
        let mut values = InjectedValues::new([(
            Injected::Single(Value::new(5i32)),
            descriptor("a", GenericType::of::<i32>()),
        )]);

        assert!(values.take::<i32>(0).is_ok());
        assert!(matches!(
            values.take::<i32>(0),
            Err(InjectionError::SlotUnavailable { index: 0 })
        ));
        assert!(matches!(
            values.take::<i32>(1),
            Err(InjectionError::SlotUnavailable { index: 1 })
        ));
    }

    #[test]
    fn injected_values_take_fails_when_type_mismatches() {
        let mut values = InjectedValues::new([(
            Injected::Single(Value::new(String::from("text"))),
            descriptor("count", GenericType::of::<i32>()),
        )]);

        let err = values.take::<i32>(0).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, InjectionError::TypeMismatch { .. }));
        assert!(message.contains("`count`"));
        assert!(message.contains("#[uses]"));
        assert!(message.contains("a value of type String"));
    }
}
