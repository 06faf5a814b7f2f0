use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use snafu::prelude::*;

use crate::fragment::Fragment;
use crate::injection::{
    ApplicationDroppedSnafu, InjectionContext, InjectionError, Managed, NoSuchCompositeSnafu,
    NoSuchViewSnafu, ServiceRef, Uses, Value,
};
use crate::runtime::application::ApplicationRuntime;
use crate::runtime::{ApplicationInstance, CompositeInstance, LayerInstance};
use crate::structure::{ApplicationModel, CompositeKind, LayerId, ModuleDescriptor, ModuleId};
use crate::types::TypeKey;

/// One module of a running application, the place where instances are
/// created.
///
/// A module instance doesn't keep its application alive. Creating instances
/// fails with [`InjectionError::ApplicationDropped`] once every
/// [`ApplicationInstance`] is dropped.
#[derive(Clone)]
pub struct ModuleInstance {
    model: Arc<ApplicationModel>,
    id: ModuleId,
    runtime: Weak<ApplicationRuntime>,
}

impl ModuleInstance {
    pub(crate) fn new(
        model: Arc<ApplicationModel>,
        id: ModuleId,
        runtime: Weak<ApplicationRuntime>,
    ) -> Self {
        Self { model, id, runtime }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.model.module(self.id).map_or("", |module| module.name())
    }

    pub fn model(&self) -> &Arc<ApplicationModel> {
        &self.model
    }

    pub fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(Arc::clone(&self.model), self.id)
    }

    pub fn layer(&self) -> LayerInstance {
        let layer = self
            .model
            .module(self.id)
            .map_or(LayerId(0), |module| module.layer());
        LayerInstance::new(Arc::clone(&self.model), layer, Weak::clone(&self.runtime))
    }

    /// The application, unless it has been dropped.
    pub fn application(&self) -> Option<ApplicationInstance> {
        self.runtime.upgrade().map(ApplicationInstance::from_runtime)
    }

    /// The first visible service exposing `T`, in resolution order.
    pub fn find_service<T: Managed + Clone>(&self) -> Option<ServiceRef<T>> {
        self.find_services::<T>().into_iter().next()
    }

    /// Every visible service exposing `T`, in resolution order.
    pub fn find_services<T: Managed + Clone>(&self) -> Vec<ServiceRef<T>> {
        let Some(application) = self.application() else {
            return Vec::new();
        };
        self.model
            .visible_services(self.id, TypeKey::of::<T>())
            .into_iter()
            .filter_map(|(id, _)| application.service(id))
            .map(ServiceRef::new)
            .collect()
    }

    /// Creates the object `F` declared in a visible module.
    ///
    /// # Errors
    ///
    /// Returns an error if no such object is visible, or if it fails to be
    /// injected or constructed.
    pub fn new_object<F: Fragment>(&self, uses: Uses) -> Result<F::Constructed, InjectionError> {
        let runtime = self.runtime()?;
        let ty = TypeKey::of::<F>();
        let bound = self
            .model
            .visible_composites(self.id)
            .into_iter()
            .find(|(_, composite)| {
                composite.kind() == CompositeKind::Object && composite.mixins()[0].ty() == ty
            })
            .and_then(|(id, _)| runtime.application().composite(id))
            .with_context(|| NoSuchCompositeSnafu {
                kind: CompositeKind::Object,
                ty,
                module: self.name(),
            })?;

        let context = InjectionContext::for_object(self.clone(), uses);
        let value = bound.mixins()[0].new_instance(&context)?;
        value.downcast::<F::Constructed>().context(NoSuchViewSnafu {
            composite: ty,
            ty: TypeKey::of::<F::Constructed>(),
        })
    }

    /// Injects the setter fields of an object created elsewhere.
    ///
    /// The object must be declared in a visible module. Its constructor
    /// parameters are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if no such object is visible, or if a field fails to
    /// be injected.
    pub fn inject_fields<F>(&self, fragment: &mut F, uses: Uses) -> Result<(), InjectionError>
    where
        F: Fragment + Clone,
    {
        let runtime = self.runtime()?;
        let ty = TypeKey::of::<F>();
        let bound = self
            .model
            .visible_composites(self.id)
            .into_iter()
            .find(|(_, composite)| {
                composite.kind() == CompositeKind::Object && composite.mixins()[0].ty() == ty
            })
            .and_then(|(id, _)| runtime.application().composite(id))
            .with_context(|| NoSuchCompositeSnafu {
                kind: CompositeKind::Object,
                ty,
                module: self.name(),
            })?;

        let instance = Value::new(fragment.clone());
        let context = InjectionContext::for_object_instance(self.clone(), uses, instance);
        for field in bound.mixins()[0].fields() {
            field.inject(&context, fragment)?;
        }
        Ok(())
    }

    /// Starts building a transient composite exposing `T`.
    pub fn new_transient<T: Managed + Clone>(&self) -> TransientBuilder<T> {
        TransientBuilder::new(self.clone(), CompositeKind::Transient)
    }

    /// Starts building a value composite exposing `T`.
    pub fn new_value<T: Managed + Clone>(&self) -> TransientBuilder<T> {
        TransientBuilder::new(self.clone(), CompositeKind::Value)
    }

    fn runtime(&self) -> Result<Arc<ApplicationRuntime>, InjectionError> {
        self.runtime.upgrade().context(ApplicationDroppedSnafu)
    }
}

impl Debug for ModuleInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Collects what a new transient or value composite is created with.
pub struct TransientBuilder<T> {
    module: ModuleInstance,
    kind: CompositeKind,
    uses: Uses,
    properties: Vec<(String, Value)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TransientBuilder<T>
where
    T: Managed + Clone,
{
    fn new(module: ModuleInstance, kind: CompositeKind) -> Self {
        Self {
            module,
            kind,
            uses: Uses::new(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Supplies a value to `#[uses]` dependencies.
    pub fn using<V: Managed>(mut self, value: V) -> Self {
        self.uses.push(Value::new(value));
        self
    }

    /// Sets the initial value of the property `name`.
    pub fn property<V: Managed>(mut self, name: impl Into<String>, value: V) -> Self {
        self.properties.push((name.into(), Value::new(value)));
        self
    }

    /// Creates the composite and returns its view `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if no visible composite exposes `T`, or if it fails
    /// to be instantiated.
    pub fn build(self) -> Result<T, InjectionError> {
        let ty = TypeKey::of::<T>();
        let instance = self.build_composite()?;
        instance
            .view_value(ty)?
            .downcast::<T>()
            .context(NoSuchViewSnafu {
                composite: instance.ty(),
                ty,
            })
    }

    /// Creates the composite and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if no visible composite exposes `T`, or if it fails
    /// to be instantiated.
    pub fn build_composite(self) -> Result<CompositeInstance, InjectionError> {
        let runtime = self.module.runtime()?;
        let ty = TypeKey::of::<T>();
        let (id, bound) = self
            .module
            .model
            .visible_of_kinds(self.module.id, &[self.kind], ty)
            .into_iter()
            .find_map(|(id, _)| runtime.application().composite(id).map(|bound| (id, bound)))
            .with_context(|| NoSuchCompositeSnafu {
                kind: self.kind,
                ty,
                module: self.module.name(),
            })?;

        let owner = ModuleInstance::new(
            Arc::clone(&self.module.model),
            id.module,
            Arc::downgrade(&runtime),
        );
        CompositeInstance::new(owner, Arc::clone(bound), self.uses, self.properties)
    }
}

impl<T> Debug for TransientBuilder<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TransientBuilder")
            .field("module", &self.module.name())
            .field("kind", &self.kind)
            .field("uses", &self.uses)
            .finish_non_exhaustive()
    }
}
