use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, BindingOutcome, InvalidInjectionSnafu, Resolution};
use crate::dependency::DependencyDescriptor;
use crate::injection::provider::InjectionSite;
use crate::injection::{
    Injected, InjectionContext, InjectionError, InjectionProvider, InjectionProviderFactory,
    MissingUsesSnafu,
};
use crate::types::{GenericType, TypeKey};

/// Binds `#[uses]` dependencies to the values supplied by the caller
/// creating an instance.
///
/// Nothing is known about those values while binding, so a missing mandatory
/// value is only reported when an instance is created.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsesInjectionProviderFactory;

impl InjectionProviderFactory for UsesInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        _resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let ty = dependency.generic_type();
        let element = ty.raw().with_context(|| InvalidInjectionSnafu {
            reason: format!("the type {ty} is unresolved"),
        })?;

        let provider = UsesInjectionProvider {
            site: InjectionSite::of(dependency),
            ty: ty.clone(),
            element,
            optional: dependency.is_optional(),
        };
        Ok(Some(Arc::new(provider)))
    }
}

#[derive(Debug)]
struct UsesInjectionProvider {
    site: InjectionSite,
    ty: GenericType,
    element: TypeKey,
    optional: bool,
}

impl InjectionProvider for UsesInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let uses = context.uses();
        if self.ty.is_iterable() {
            let values = uses.map_or_else(Vec::new, |uses| uses.find_all(self.element));
            return Ok(Injected::Many(values));
        }

        match uses.and_then(|uses| uses.find(self.element)) {
            Some(value) => Ok(Injected::Single(value.clone())),
            None if self.optional => Ok(Injected::Absent),
            None => MissingUsesSnafu {
                fragment: self.site.fragment,
                point: self.site.point,
                ty: self.ty.clone(),
            }
            .fail(),
        }
    }

    fn outcome(&self) -> BindingOutcome {
        BindingOutcome::Uses(self.ty.clone())
    }
}
