use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{
    BindingError, BindingOutcome, InvalidInjectionSnafu, PropertyTypeMismatchSnafu, Resolution,
    UnknownPropertySnafu,
};
use crate::dependency::{DependencyDescriptor, InjectionScope};
use crate::injection::provider::InjectionSite;
use crate::injection::{
    Injected, InjectionContext, InjectionError, InjectionProvider, InjectionProviderFactory,
    StateHolder, Value,
};
use crate::structure::CompositeKind;
use crate::types::{GenericType, TypeKey};

/// Binds `#[state]` dependencies to the state of the composite: the whole
/// [`StateHolder`], or one declared property.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateInjectionProviderFactory;

impl InjectionProviderFactory for StateInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let composite = resolution.composite;
        ensure!(
            composite.kind() != CompositeKind::Object,
            InvalidInjectionSnafu {
                reason: "#[state] is not available in objects",
            }
        );

        let ty = dependency.generic_type();
        let target = if ty.raw() == Some(TypeKey::of::<StateHolder>()) && !ty.is_iterable() {
            StateTarget::Holder
        } else if ty.is_property() {
            let name = dependency.property_name();
            let property =
                composite
                    .state()
                    .property(name)
                    .with_context(|| UnknownPropertySnafu {
                        composite: composite.ty(),
                        name,
                    })?;
            let expected = ty
                .first_argument()
                .and_then(GenericType::raw)
                .with_context(|| InvalidInjectionSnafu {
                    reason: format!("the property type of {ty} is unresolved"),
                })?;
            ensure!(
                property.ty() == expected,
                PropertyTypeMismatchSnafu {
                    composite: composite.ty(),
                    name,
                    expected,
                    actual: property.ty(),
                }
            );
            StateTarget::Property(name)
        } else {
            return InvalidInjectionSnafu {
                reason: format!("#[state] injects StateHolder or Property<T>, not {ty}"),
            }
            .fail();
        };

        let provider = StateInjectionProvider {
            site: InjectionSite::of(dependency),
            target,
        };
        Ok(Some(Arc::new(provider)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateTarget {
    Holder,
    Property(&'static str),
}

#[derive(Debug)]
struct StateInjectionProvider {
    site: InjectionSite,
    target: StateTarget,
}

impl InjectionProvider for StateInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let state = context
            .state()
            .or_else(|| context.proxy_handler().map(|proxy| proxy.state()))
            .ok_or_else(|| self.site.context_unavailable(InjectionScope::State))?;

        let value = match self.target {
            StateTarget::Holder => Some(Value::new(state.clone())),
            StateTarget::Property(name) => state.cell(name).cloned().map(Value::new),
        };
        Ok(value.map_or(Injected::Absent, Injected::Single))
    }

    fn outcome(&self) -> BindingOutcome {
        match self.target {
            StateTarget::Holder => BindingOutcome::StateHolder,
            StateTarget::Property(name) => BindingOutcome::Property(name.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::assembly::{self, ApplicationAssembly, ModuleAssembly};
    use crate::dependency::DependencyDeclaration;
    use crate::fragment::FragmentRole;
    use crate::injection::provider::tests::{bind_with, dependency, Plain};
    use crate::injection::{FromValue, Property};
    use crate::structure::ApplicationModel;

    use super::*;

    fn person_model() -> ApplicationModel {
        let mut application = ApplicationAssembly::new("test");
        let layer = application.layer("domain");
        application.module(layer, "core", |module: &mut ModuleAssembly| {
            assembly::value::<Plain>()
                .with_property::<String>("name")
                .set_on(module);
        });
        application.build().unwrap()
    }

    fn state_dependency(name: &'static str, ty: GenericType) -> DependencyDescriptor {
        dependency(DependencyDeclaration::new(InjectionScope::State, name, ty))
    }

    #[test]
    fn state_factory_binds_declared_properties() {
        let model = person_model();
        let factory = StateInjectionProviderFactory;

        let holder = state_dependency("state", GenericType::of::<StateHolder>());
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &holder)
            .unwrap()
            .unwrap();
        assert_eq!(provider.outcome(), BindingOutcome::StateHolder);

        let name = state_dependency("name", <Property<String> as FromValue>::declared_type());
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &name)
            .unwrap()
            .unwrap();
        assert_eq!(
            provider.outcome(),
            BindingOutcome::Property(String::from("name"))
        );
    }

    #[test]
    fn state_factory_fails_when_property_is_invalid() {
        let model = person_model();
        let factory = StateInjectionProviderFactory;

        let unknown = state_dependency("email", <Property<String> as FromValue>::declared_type());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &unknown),
            Err(BindingError::UnknownProperty { name, .. }) if name == "email"
        ));

        let mistyped = state_dependency("name", <Property<u32> as FromValue>::declared_type());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &mistyped),
            Err(BindingError::PropertyTypeMismatch { .. })
        ));

        let plain = state_dependency("name", GenericType::of::<String>());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &plain),
            Err(BindingError::InvalidInjection { .. })
        ));
    }
}
