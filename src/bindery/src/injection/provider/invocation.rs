use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, BindingOutcome, InvalidInjectionSnafu, Resolution};
use crate::dependency::{DependencyDescriptor, InjectionScope};
use crate::injection::provider::InjectionSite;
use crate::injection::{
    Injected, InjectionContext, InjectionError, InjectionProvider, InjectionProviderFactory,
    Invocation, Value,
};
use crate::types::TypeKey;

/// Binds `#[invocation]` dependencies of concerns and side-effects to the
/// invocation they handle, or to meta-info attached to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationInjectionProviderFactory;

impl InjectionProviderFactory for InvocationInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let role = resolution.fragment.role();
        ensure!(
            role.is_modifier(),
            InvalidInjectionSnafu {
                reason: format!(
                    "#[invocation] is only available in concerns and side-effects, not in a {role}"
                ),
            }
        );

        let ty = dependency.generic_type();
        let raw = ty
            .raw()
            .filter(|_| !ty.is_iterable())
            .with_context(|| InvalidInjectionSnafu {
                reason: format!("#[invocation] can't inject {ty}"),
            })?;

        let provider = InvocationInjectionProvider {
            site: InjectionSite::of(dependency),
            ty: raw,
        };
        Ok(Some(Arc::new(provider)))
    }
}

#[derive(Debug)]
struct InvocationInjectionProvider {
    site: InjectionSite,
    ty: TypeKey,
}

impl InjectionProvider for InvocationInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let invocation = context
            .invocation()
            .ok_or_else(|| self.site.context_unavailable(InjectionScope::Invocation))?;

        if self.ty == TypeKey::of::<Invocation>() {
            return Ok(Injected::Single(Value::new(invocation.clone())));
        }
        Ok(invocation
            .meta()
            .value(self.ty)
            .cloned()
            .map_or(Injected::Absent, Injected::Single))
    }

    fn outcome(&self) -> BindingOutcome {
        BindingOutcome::Invocation(self.ty)
    }
}

#[cfg(test)]
mod tests {
    use crate::dependency::DependencyDeclaration;
    use crate::fragment::FragmentRole;
    use crate::injection::provider::tests::{bind_with, dependency, single_module_model};
    use crate::types::GenericType;

    use super::*;

    #[test]
    fn invocation_factory_binds_only_in_modifiers() {
        let model = single_module_model();
        let factory = InvocationInjectionProviderFactory;
        let invocation = dependency(DependencyDeclaration::new(
            InjectionScope::Invocation,
            "invocation",
            GenericType::of::<Invocation>(),
        ));

        let provider = bind_with(&factory, &model, FragmentRole::Concern, &invocation)
            .unwrap()
            .unwrap();
        assert_eq!(
            provider.outcome(),
            BindingOutcome::Invocation(TypeKey::of::<Invocation>())
        );
        assert!(bind_with(&factory, &model, FragmentRole::SideEffect, &invocation).is_ok());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &invocation),
            Err(BindingError::InvalidInjection { .. })
        ));
    }
}
