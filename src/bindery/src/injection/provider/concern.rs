use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, BindingOutcome, InvalidInjectionSnafu, Resolution};
use crate::dependency::{DependencyDescriptor, InjectionScope};
use crate::injection::provider::InjectionSite;
use crate::injection::{
    Injected, InjectionContext, InjectionError, InjectionProvider, InjectionProviderFactory,
};
use crate::types::TypeKey;

/// Binds `#[concern_for]` dependencies to the next link of the invocation
/// chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcernInjectionProviderFactory;

impl InjectionProviderFactory for ConcernInjectionProviderFactory {
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
                    "#[concern_for] is only available in concerns and side-effects, not in a {role}"
                ),
            }
        );

        let ty = dependency.generic_type();
        let composite = resolution.composite;
        let next = ty
            .raw()
            .filter(|raw| {
                !ty.is_iterable() && composite.exposes(*raw, resolution.application.hierarchy())
            })
            .with_context(|| InvalidInjectionSnafu {
                reason: format!("composite {} does not expose {ty}", composite.ty()),
            })?;

        let provider = ConcernInjectionProvider {
            site: InjectionSite::of(dependency),
            next,
        };
        Ok(Some(Arc::new(provider)))
    }
}

#[derive(Debug)]
struct ConcernInjectionProvider {
    site: InjectionSite,
    next: TypeKey,
}

impl InjectionProvider for ConcernInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let next = context
            .next()
            .ok_or_else(|| self.site.context_unavailable(InjectionScope::ConcernFor))?;
        Ok(Injected::Single(next.clone()))
    }

    fn outcome(&self) -> BindingOutcome {
        BindingOutcome::ConcernFor(self.next)
    }
}
