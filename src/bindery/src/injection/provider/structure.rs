use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{
    BindingError, BindingOutcome, InvalidInjectionSnafu, Resolution, UnknownStructureSnafu,
};
use crate::dependency::DependencyDescriptor;
use crate::injection::{
    ApplicationDroppedSnafu, Injected, InjectionContext, InjectionError, InjectionProvider,
    InjectionProviderFactory, Value,
};
use crate::runtime::{ApplicationInstance, LayerInstance, ModuleInstance};
use crate::structure::{ApplicationDescriptor, ModuleDescriptor};
use crate::types::TypeKey;

/// Binds `#[structure]` dependencies to the application structure or to a
/// registered structural singleton.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureInjectionProviderFactory;

impl InjectionProviderFactory for StructureInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let ty = dependency.generic_type();
        ensure!(
            !ty.is_iterable(),
            InvalidInjectionSnafu {
                reason: format!("#[structure] can't inject the iterable {ty}"),
            }
        );

        let unknown = || UnknownStructureSnafu { ty: ty.clone() };
        let raw = ty.raw().with_context(unknown)?;
        let target = StructureTarget::of(raw)
            .or_else(|| {
                resolution
                    .application
                    .structural(raw)
                    .map(|(index, _)| StructureTarget::Singleton(index))
            })
            .with_context(unknown)?;

        let provider = StructureInjectionProvider { ty: raw, target };
        Ok(Some(Arc::new(provider)))
    }
}

/// Returns true if `ty` is provided by the application structure itself.
pub(crate) fn is_structure_type(ty: TypeKey) -> bool {
    StructureTarget::of(ty).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructureTarget {
    Module,
    Layer,
    Application,
    ModuleDescriptor,
    ApplicationDescriptor,
    Singleton(usize),
}

impl StructureTarget {
    fn of(ty: TypeKey) -> Option<Self> {
        let target = if ty == TypeKey::of::<ModuleInstance>() {
            Self::Module
        } else if ty == TypeKey::of::<LayerInstance>() {
            Self::Layer
        } else if ty == TypeKey::of::<ApplicationInstance>() {
            Self::Application
        } else if ty == TypeKey::of::<ModuleDescriptor>() {
            Self::ModuleDescriptor
        } else if ty == TypeKey::of::<ApplicationDescriptor>() {
            Self::ApplicationDescriptor
        } else {
            return None;
        };
        Some(target)
    }
}

#[derive(Debug)]
struct StructureInjectionProvider {
    ty: TypeKey,
    target: StructureTarget,
}

impl InjectionProvider for StructureInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let module = context.module();
        let value = match self.target {
            StructureTarget::Module => Some(Value::new(module.clone())),
            StructureTarget::Layer => Some(Value::new(module.layer())),
            StructureTarget::Application => Some(Value::new(
                module.application().context(ApplicationDroppedSnafu)?,
            )),
            StructureTarget::ModuleDescriptor => Some(Value::new(module.descriptor())),
            StructureTarget::ApplicationDescriptor => {
                Some(Value::new(ApplicationDescriptor::new(Arc::clone(module.model()))))
            }
            StructureTarget::Singleton(index) => module.model().structurals().get(index).cloned(),
        };
        Ok(value.map_or(Injected::Absent, Injected::Single))
    }

    fn outcome(&self) -> BindingOutcome {
        BindingOutcome::Structure(self.ty)
    }
}

#[cfg(test)]
mod tests {
    use crate::dependency::{DependencyDeclaration, InjectionScope};
    use crate::fragment::FragmentRole;
    use crate::injection::provider::tests::{bind_with, dependency, single_module_model};
    use crate::types::GenericType;

    use super::*;

    #[derive(Debug, Clone)]
    struct UnitOfWorkFactory;

    fn structure_dependency(ty: GenericType) -> DependencyDescriptor {
        dependency(DependencyDeclaration::new(InjectionScope::Structure, "structure", ty))
    }

    #[test]
    fn structure_factory_binds_structure_types() {
        let model = single_module_model();
        let factory = StructureInjectionProviderFactory;

        let module = structure_dependency(GenericType::of::<ModuleInstance>());
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &module)
            .unwrap()
            .unwrap();
        assert_eq!(
            provider.outcome(),
            BindingOutcome::Structure(TypeKey::of::<ModuleInstance>())
        );
        assert!(is_structure_type(TypeKey::of::<ApplicationDescriptor>()));
        assert!(!is_structure_type(TypeKey::of::<UnitOfWorkFactory>()));
    }

    #[test]
    fn structure_factory_fails_when_type_is_unknown_even_if_optional() {
        let model = single_module_model();
        let factory = StructureInjectionProviderFactory;

        let unknown = dependency(
            DependencyDeclaration::new(
                InjectionScope::Structure,
                "uow",
                GenericType::of::<UnitOfWorkFactory>(),
            )
            .optional(),
        );
        let err = bind_with(&factory, &model, FragmentRole::Mixin, &unknown).unwrap_err();
        assert!(matches!(err, BindingError::UnknownStructure { .. }));
        assert!(err.to_string().contains("UnitOfWorkFactory"));
    }
}
