use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use snafu::prelude::*;

use crate::injection::{FromValue, InjectionError, InvalidPropertySnafu, Managed, Value};
use crate::runtime::{
    CompositeInstance, NoSuchViewSnafu, ServiceError, ServiceReference, WeakComposite,
};
use crate::structure::StateDescriptor;
use crate::types::{GenericType, TypeKey};

/// A lazy handle to a view of the composite owning the fragment.
///
/// The handle doesn't keep the composite alive, and the views of a composite
/// are only available once all its mixins are constructed, so [`This::get`]
/// returns [`None`] while the composite is being instantiated or after it is
/// dropped.
pub struct This<T> {
    composite: WeakComposite,
    _marker: PhantomData<fn() -> T>,
}

impl<T> This<T>
where
    T: Managed + Clone,
{
    pub fn get(&self) -> Option<T> {
        self.composite.upgrade()?.view::<T>()
    }

    pub fn composite(&self) -> Option<CompositeInstance> {
        self.composite.upgrade()
    }
}

impl<T> Clone for This<T> {
    fn clone(&self) -> Self {
        Self {
            composite: self.composite.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Debug for This<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("This")
            .field("view", &TypeKey::of::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> FromValue for This<T>
where
    T: Managed + Clone,
{
    fn from_value(value: &Value) -> Option<Self> {
        let composite = value.downcast_ref::<CompositeInstance>()?;
        Some(Self {
            composite: composite.downgrade(),
            _marker: PhantomData,
        })
    }

    fn declared_type() -> GenericType {
        GenericType::parameterized::<This<()>>([GenericType::of::<T>()])
    }
}

/// A typed handle to a service, activating it on first access.
pub struct ServiceRef<T> {
    reference: ServiceReference,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ServiceRef<T>
where
    T: Managed + Clone,
{
    pub fn new(reference: ServiceReference) -> Self {
        Self {
            reference,
            _marker: PhantomData,
        }
    }

    /// Returns the service's view of type `T`, activating the service if it
    /// isn't active yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the service fails to activate or has no view of
    /// type `T`.
    pub fn get(&self) -> Result<T, ServiceError> {
        let ty = TypeKey::of::<T>();
        let value = self.reference.get(ty)?;
        value.downcast::<T>().context(NoSuchViewSnafu {
            identity: self.reference.identity(),
            ty,
        })
    }

    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    pub fn identity(&self) -> &str {
        self.reference.identity()
    }

    pub fn is_active(&self) -> bool {
        self.reference.is_active()
    }

    pub fn is_available(&self) -> bool {
        self.reference.is_available()
    }
}

impl<T> Clone for ServiceRef<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Debug for ServiceRef<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ServiceRef")
            .field("identity", &self.reference.identity())
            .field("view", &TypeKey::of::<T>())
            .finish()
    }
}

impl<T> FromValue for ServiceRef<T>
where
    T: Managed + Clone,
{
    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<ServiceReference>().map(Self::new)
    }

    fn declared_type() -> GenericType {
        GenericType::service_reference(GenericType::of::<T>())
    }
}

/// The properties of one composite instance.
#[derive(Clone, Default)]
pub struct StateHolder {
    properties: Arc<Vec<PropertyCell>>,
}

impl StateHolder {
    /// Creates the state of a composite, filling properties from `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if an initial value names an undeclared property or
    /// has the wrong type.
    pub(crate) fn new(
        composite: TypeKey,
        descriptor: &StateDescriptor,
        initial: Vec<(String, Value)>,
    ) -> Result<Self, InjectionError> {
        let properties: Vec<_> = descriptor
            .properties()
            .iter()
            .map(|property| PropertyCell::new(property.name(), property.ty()))
            .collect();

        for (name, value) in initial {
            let cell = properties
                .iter()
                .find(|cell| *cell.name == *name)
                .with_context(|| InvalidPropertySnafu {
                    composite,
                    name: name.clone(),
                    reason: "the property is not declared",
                })?;
            ensure!(
                value.type_key() == cell.ty,
                InvalidPropertySnafu {
                    composite,
                    name,
                    reason: format!("expects {} but was given {}", cell.ty, value.type_key()),
                }
            );
            *cell.value.write() = Some(value);
        }

        Ok(Self {
            properties: Arc::new(properties),
        })
    }

    pub fn cell(&self, name: &str) -> Option<&PropertyCell> {
        self.properties.iter().find(|cell| *cell.name == *name)
    }

    /// Returns the property `name` if it holds values of type `T`.
    pub fn property<T: Managed + Clone>(&self, name: &str) -> Option<Property<T>> {
        self.cell(name)
            .and_then(|cell| Property::from_cell(cell.clone()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|cell| &*cell.name)
    }
}

impl Debug for StateHolder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.properties.iter()).finish()
    }
}

/// The untyped storage of one property.
#[derive(Clone)]
pub struct PropertyCell {
    name: Arc<str>,
    ty: TypeKey,
    value: Arc<RwLock<Option<Value>>>,
}

impl PropertyCell {
    fn new(name: &str, ty: TypeKey) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            value: Arc::new(RwLock::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn value(&self) -> Option<Value> {
        self.value.read().clone()
    }
}

impl Debug for PropertyCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PropertyCell")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// A typed handle to one property of a composite.
pub struct Property<T> {
    cell: PropertyCell,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T>
where
    T: Managed + Clone,
{
    fn from_cell(cell: PropertyCell) -> Option<Self> {
        (cell.ty == TypeKey::of::<T>()).then_some(Self {
            cell,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    pub fn get(&self) -> Option<T> {
        self.cell.value.read().as_ref().and_then(Value::downcast::<T>)
    }

    pub fn set(&self, value: T) {
        *self.cell.value.write() = Some(Value::new(value));
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Debug for Property<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Property")
            .field("name", &self.cell.name)
            .field("ty", &TypeKey::of::<T>())
            .finish()
    }
}

impl<T> FromValue for Property<T>
where
    T: Managed + Clone,
{
    fn from_value(value: &Value) -> Option<Self> {
        value
            .downcast::<PropertyCell>()
            .and_then(Property::from_cell)
    }

    fn declared_type() -> GenericType {
        GenericType::property(GenericType::of::<T>())
    }
}
