use std::sync::Arc;

use snafu::prelude::*;
use tracing::warn;

use crate::binder::{
    AmbiguousSnafu, BindingError, BindingOutcome, InvalidInjectionSnafu, NoCandidatesSnafu,
    Resolution, ServiceLocator, ServiceShape,
};
use crate::dependency::DependencyDescriptor;
use crate::injection::provider::structure::is_structure_type;
use crate::injection::{
    ApplicationDroppedSnafu, Injected, InjectionContext, InjectionError, InjectionProvider,
    InjectionProviderFactory, ServiceUnavailableSnafu, Value,
};
use crate::options::AmbiguityPolicy;
use crate::qualifier::{QualifiedServices, ServiceCandidate, ServiceQualifier};
use crate::runtime::ServiceReference;
use crate::structure::{CompositeId, MetaInfo, ServiceDescriptor};
use crate::types::{GenericType, TypeKey};

/// Binds `#[service]` dependencies to the visible services exposing the
/// requested type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceInjectionProviderFactory;

impl InjectionProviderFactory for ServiceInjectionProviderFactory {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let (shape, target) = shape_of(dependency.generic_type())?;
        let application = resolution.application;
        ensure!(
            !is_structure_type(target) && application.structural(target).is_none(),
            InvalidInjectionSnafu {
                reason: format!("{target} is a structure type; inject it with #[structure]"),
            }
        );

        let source: Vec<_> = application
            .visible_services(resolution.module.id(), target)
            .into_iter()
            .filter_map(|(id, composite)| {
                composite
                    .service()
                    .map(|descriptor| StaticCandidate { id, descriptor })
            })
            .collect();
        let qualifier = dependency.qualifier();
        let candidates: Vec<_> = QualifiedServices::new(&source, qualifier)
            .possible()
            .map(|candidate| ServiceLocator {
                id: candidate.id,
                identity: candidate.descriptor.identity().to_owned(),
            })
            .collect();

        if candidates.is_empty() {
            if dependency.is_optional() {
                return Ok(None);
            }
            return NoCandidatesSnafu {
                ty: dependency.generic_type().clone(),
                qualifier: qualifier.map(ToString::to_string),
            }
            .fail();
        }

        if candidates.len() > 1 && !shape.is_iterable() && qualifier.is_none() {
            let identities: Vec<_> = candidates.iter().map(|c| c.identity.clone()).collect();
            match application.options().ambiguity {
                AmbiguityPolicy::Reject => {
                    return AmbiguousSnafu {
                        ty: dependency.generic_type().clone(),
                        identities,
                    }
                    .fail();
                }
                AmbiguityPolicy::FirstDeclared => warn!(
                    fragment = %dependency.fragment(),
                    point = %dependency.point(),
                    chosen = %identities[0],
                    candidates = ?identities,
                    "several services match a single service dependency; using the first"
                ),
            }
        }

        let provider = ServiceInjectionProvider {
            source: source.iter().map(|candidate| candidate.id).collect(),
            candidates,
            qualifier: qualifier.cloned(),
            shape,
            target,
        };
        Ok(Some(Arc::new(provider)))
    }
}

fn shape_of(ty: &GenericType) -> Result<(ServiceShape, TypeKey), BindingError> {
    let (shape, target) = match ty {
        GenericType::Iterable(element) if element.is_iterable() => {
            return InvalidInjectionSnafu {
                reason: format!("nested iterable {ty} can't be injected"),
            }
            .fail();
        }
        GenericType::Iterable(element) if element.is_service_reference() => {
            (ServiceShape::IterableReference, element.first_argument())
        }
        GenericType::Iterable(element) => (ServiceShape::Iterable, Some(&**element)),
        ty if ty.is_service_reference() => (ServiceShape::Reference, ty.first_argument()),
        ty => (ServiceShape::Single, Some(ty)),
    };

    let target = target
        .and_then(GenericType::raw)
        .with_context(|| InvalidInjectionSnafu {
            reason: format!("the service type of {ty} is unresolved"),
        })?;
    Ok((shape, target))
}

struct StaticCandidate<'a> {
    id: CompositeId,
    descriptor: &'a ServiceDescriptor,
}

impl ServiceCandidate for StaticCandidate<'_> {
    fn identity(&self) -> &str {
        self.descriptor.identity()
    }

    fn tags(&self) -> &[String] {
        self.descriptor.tags()
    }

    fn meta_info(&self) -> &MetaInfo {
        self.descriptor.meta_info()
    }

    fn is_active(&self) -> Option<bool> {
        None
    }

    fn is_available(&self) -> Option<bool> {
        None
    }
}

#[derive(Debug)]
struct ServiceInjectionProvider {
    /// Every visible service exposing the target, qualified again at runtime.
    source: Vec<CompositeId>,
    candidates: Vec<ServiceLocator>,
    qualifier: Option<ServiceQualifier>,
    shape: ServiceShape,
    target: TypeKey,
}

impl ServiceInjectionProvider {
    fn view(&self, reference: &ServiceReference) -> Result<Value, InjectionError> {
        reference
            .get(self.target)
            .context(ServiceUnavailableSnafu {
                identity: reference.identity(),
            })
    }
}

impl InjectionProvider for ServiceInjectionProvider {
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let application = context
            .module()
            .application()
            .context(ApplicationDroppedSnafu)?;
        let live: Vec<_> = self
            .source
            .iter()
            .filter_map(|id| application.service(*id))
            .collect();
        let qualified = QualifiedServices::new(&live, self.qualifier.as_ref());

        let injected = match self.shape {
            ServiceShape::Single => match qualified.first() {
                Some(reference) => Injected::Single(self.view(reference)?),
                None => Injected::Absent,
            },
            ServiceShape::Reference => match qualified.first() {
                Some(reference) => Injected::Single(Value::new(reference.clone())),
                None => Injected::Absent,
            },
            ServiceShape::Iterable => Injected::Many(
                qualified
                    .iter()
                    .map(|reference| self.view(reference))
                    .collect::<Result<_, _>>()?,
            ),
            ServiceShape::IterableReference => Injected::Many(
                qualified
                    .iter()
                    .map(|reference| Value::new(reference.clone()))
                    .collect(),
            ),
        };
        Ok(injected)
    }

    fn outcome(&self) -> BindingOutcome {
        BindingOutcome::Services {
            candidates: self.candidates.clone(),
            shape: self.shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use crate::assembly::{self, ApplicationAssembly, ModuleAssembly};
    use crate::dependency::{DependencyDeclaration, FragmentDeclaration, InjectionScope};
    use crate::fragment::{Fragment, FragmentRole};
    use crate::injection::provider::tests::{bind_with, dependency, Plain};
    use crate::injection::{FromValue, InjectedValues, ServiceRef};
    use crate::options::BindingOptions;
    use crate::qualifier::{first, first_of, with_tags};
    use crate::structure::{ApplicationModel, ModuleDescriptor};

    use super::*;

    pub trait Cache: Send + Sync + 'static {}

    pub struct CacheMixin;

    impl Cache for CacheMixin {}

    impl Fragment for CacheMixin {
        type Constructed = Arc<dyn Cache>;

        type Error = Infallible;

        fn injection_points() -> FragmentDeclaration {
            FragmentDeclaration::new()
        }

        fn construct(
            _values: &mut InjectedValues,
        ) -> Result<Result<Self, Self::Error>, InjectionError> {
            Ok(Ok(CacheMixin))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    fn cache_model(options: BindingOptions) -> ApplicationModel {
        let mut application = ApplicationAssembly::new("test");
        application.options(options);
        let layer = application.layer("domain");
        application.module(layer, "core", |module: &mut ModuleAssembly| {
            assembly::transient::<Plain>().set_on(module);
            assembly::service::<CacheMixin>()
                .identified_by("svc1")
                .tagged(["fast"])
                .set_on(module);
            assembly::service::<CacheMixin>()
                .identified_by("svc2")
                .set_on(module);
        });
        application.build().unwrap()
    }

    fn service_dependency(ty: GenericType) -> DependencyDescriptor {
        dependency(DependencyDeclaration::new(InjectionScope::Service, "cache", ty))
    }

    fn identities(outcome: BindingOutcome) -> Vec<String> {
        match outcome {
            BindingOutcome::Services { candidates, .. } => {
                candidates.into_iter().map(|c| c.identity).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn service_factory_binds_every_candidate_in_declaration_order() {
        let model = cache_model(BindingOptions::new());
        let factory = ServiceInjectionProviderFactory;

        let single = service_dependency(GenericType::of::<Arc<dyn Cache>>());
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &single)
            .unwrap()
            .unwrap();
        assert_eq!(identities(provider.outcome()), ["svc1", "svc2"]);

        let all = service_dependency(GenericType::iterable(
            <ServiceRef<Arc<dyn Cache>> as FromValue>::declared_type(),
        ));
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &all)
            .unwrap()
            .unwrap();
        assert!(matches!(
            provider.outcome(),
            BindingOutcome::Services {
                shape: ServiceShape::IterableReference,
                ..
            }
        ));
    }

    #[test]
    fn service_factory_fails_when_single_reference_is_ambiguous() {
        let options = BindingOptions::new().with_ambiguity(AmbiguityPolicy::Reject);
        let model = cache_model(options);
        let factory = ServiceInjectionProviderFactory;

        let single = service_dependency(GenericType::of::<Arc<dyn Cache>>());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &single),
            Err(BindingError::Ambiguous { identities, .. }) if identities.len() == 2
        ));

        let qualified = dependency(
            DependencyDeclaration::new(
                InjectionScope::Service,
                "cache",
                GenericType::of::<Arc<dyn Cache>>(),
            )
            .qualified_by(first_of([with_tags(["fast"]), first()])),
        );
        let provider = bind_with(&factory, &model, FragmentRole::Mixin, &qualified)
            .unwrap()
            .unwrap();
        assert_eq!(identities(provider.outcome()), ["svc1"]);
    }

    #[test]
    fn service_factory_handles_missing_candidates() {
        let model = cache_model(BindingOptions::new());
        let factory = ServiceInjectionProviderFactory;

        let mandatory = service_dependency(GenericType::of::<String>());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &mandatory),
            Err(BindingError::NoCandidates { .. })
        ));

        let optional = dependency(
            DependencyDeclaration::new(InjectionScope::Service, "name", GenericType::of::<String>())
                .optional(),
        );
        assert!(bind_with(&factory, &model, FragmentRole::Mixin, &optional)
            .unwrap()
            .is_none());
    }

    #[test]
    fn service_factory_fails_when_injection_is_invalid() {
        let model = cache_model(BindingOptions::new());
        let factory = ServiceInjectionProviderFactory;

        let nested = service_dependency(GenericType::iterable(GenericType::iterable(
            GenericType::of::<Arc<dyn Cache>>(),
        )));
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &nested),
            Err(BindingError::InvalidInjection { .. })
        ));

        let structure = service_dependency(GenericType::of::<ModuleDescriptor>());
        assert!(matches!(
            bind_with(&factory, &model, FragmentRole::Mixin, &structure),
            Err(BindingError::InvalidInjection { .. })
        ));
    }
}
