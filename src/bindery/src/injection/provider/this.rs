use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, BindingOutcome, InvalidInjectionSnafu, Resolution};
use crate::dependency::{DependencyDescriptor, InjectionScope};
use crate::fragment::FragmentRole;
use crate::injection::provider::InjectionSite;
use crate::injection::{
    Injected, InjectionContext, InjectionError, InjectionProvider, InjectionProviderFactory, This,
    Value,
};
use crate::runtime::CompositeInstance;
use crate::structure::CompositeKind;
use crate::types::{GenericType, TypeKey};

/// Binds `#[this]` dependencies to the composite owning the fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThisInjectionProviderFactory;

impl InjectionProviderFactory for ThisInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let composite = resolution.composite;
        ensure!(
            composite.kind() != CompositeKind::Object
                && resolution.fragment.role() != FragmentRole::Object,
            InvalidInjectionSnafu {
                reason: "#[this] is not available in objects",
            }
        );

        let exposed = |target: TypeKey| -> Result<TypeKey, BindingError> {
            ensure!(
                composite.exposes(target, resolution.application.hierarchy()),
                InvalidInjectionSnafu {
                    reason: format!("composite {} does not expose {target}", composite.ty()),
                }
            );
            Ok(target)
        };

        let ty = dependency.generic_type();
        let target = match ty {
            GenericType::Concrete(raw) if *raw == TypeKey::of::<CompositeInstance>() => {
                ThisTarget::Composite
            }
            GenericType::Parameterized { raw, arguments } if *raw == TypeKey::of::<This<()>>() => {
                let view = arguments
                    .first()
                    .and_then(GenericType::raw)
                    .with_context(|| InvalidInjectionSnafu {
                        reason: format!("the view of {ty} is unresolved"),
                    })?;
                ThisTarget::Handle(exposed(view)?)
            }
            GenericType::Concrete(raw) => ThisTarget::View(exposed(*raw)?),
            _ => {
                return InvalidInjectionSnafu {
                    reason: format!("#[this] can't inject {ty}"),
                }
                .fail()
            }
        };

        let provider = ThisInjectionProvider {
            site: InjectionSite::of(dependency),
            target,
        };
        Ok(Some(Arc::new(provider)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThisTarget {
    Composite,
    Handle(TypeKey),
    View(TypeKey),
}

#[derive(Debug)]
struct ThisInjectionProvider {
    site: InjectionSite,
    target: ThisTarget,
}

impl InjectionProvider for ThisInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        // Concerns and side-effects see the composite through the proxy.
        let instance = context
            .composite_instance()
            .or_else(|| context.proxy_handler())
            .ok_or_else(|| self.site.context_unavailable(InjectionScope::This))?;

        let value = match self.target {
            ThisTarget::Composite | ThisTarget::Handle(_) => Value::new(instance.clone()),
            ThisTarget::View(ty) => instance.view_value(ty)?,
        };
        Ok(Injected::Single(value))
    }

    fn outcome(&self) -> BindingOutcome {
        match self.target {
            ThisTarget::Composite => BindingOutcome::This(TypeKey::of::<CompositeInstance>()),
            ThisTarget::Handle(ty) | ThisTarget::View(ty) => BindingOutcome::This(ty),
        }
    }
}
