mod bound;
mod error;

use std::sync::Arc;

use tracing::{debug, info};

use crate::assembly::AssemblyError;
use crate::dependency::{self, DependencyDescriptor, ScannedFragment};
use crate::fragment::FragmentModel;
use crate::injection::provider::InjectionProviderFactoryStrategy;
use crate::injection::{
    DependencyModel, InjectedFieldModel, InjectedParametersModel, InjectionProviderFactory,
};
use crate::structure::{ApplicationModel, CompositeId, CompositeModel, ModuleModel};
use crate::types::{GenericType, TypeKey};

pub use bound::{Application, BoundComposite, BoundFragment};
pub use error::{BindingError, BindingFailure};
pub(crate) use error::{
    AmbiguousSnafu, InvalidInjectionSnafu, NoCandidatesSnafu, PropertyTypeMismatchSnafu,
    UnknownPropertySnafu, UnknownStructureSnafu, UnsupportedScopeSnafu,
};

/// Where one dependency is being bound.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub application: &'a ApplicationModel,
    pub module: &'a ModuleModel,
    pub composite: &'a CompositeModel,
    pub fragment: &'a FragmentModel,
}

/// What an injection point was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    /// An optional dependency without any candidate.
    Absent,
    Services {
        candidates: Vec<ServiceLocator>,
        shape: ServiceShape,
    },
    Structure(TypeKey),
    This(TypeKey),
    Uses(GenericType),
    Invocation(TypeKey),
    StateHolder,
    Property(String),
    ConcernFor(TypeKey),
}

/// A service candidate found while binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocator {
    pub id: CompositeId,
    pub identity: String,
}

/// How the services of a service dependency are injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceShape {
    /// `T`, the view of one service.
    Single,
    /// `ServiceRef<T>`, a reference to one service.
    Reference,
    /// `Vec<T>`, the views of every service.
    Iterable,
    /// `Vec<ServiceRef<T>>`, references to every service.
    IterableReference,
}

impl ServiceShape {
    pub fn is_iterable(&self) -> bool {
        matches!(self, Self::Iterable | Self::IterableReference)
    }
}

/// Binds every injection point of an application to a provider.
pub struct Binder {
    factory: Arc<dyn InjectionProviderFactory>,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            factory: Arc::new(InjectionProviderFactoryStrategy::new()),
        }
    }

    /// Creates a binder dispatching to `factory`, typically an
    /// [`InjectionProviderFactoryStrategy`] with extra scopes.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: InjectionProviderFactory,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Binds `model`. Every composite is scanned first, then every dependency
    /// is resolved against the complete structure.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Binding`] listing every injection point that
    /// failed to scan or bind.
    pub fn bind(&self, model: Arc<ApplicationModel>) -> Result<Application, AssemblyError> {
        let mut failures = Vec::new();

        let scanned: Vec<_> = model
            .modules()
            .iter()
            .flat_map(|module| {
                module
                    .composites()
                    .iter()
                    .enumerate()
                    .map(move |(index, composite)| (module, index, composite))
            })
            .map(|(module, index, composite)| ScannedComposite {
                id: CompositeId {
                    module: module.id(),
                    index,
                },
                module,
                composite,
                mixins: scan_all(&model, module, composite, composite.mixins(), &mut failures),
                concerns: scan_all(&model, module, composite, composite.concerns(), &mut failures),
                side_effects: scan_all(
                    &model,
                    module,
                    composite,
                    composite.side_effects(),
                    &mut failures,
                ),
            })
            .collect();

        let mut composites = vec![Vec::new(); model.modules().len()];
        for scanned in &scanned {
            let mut bind_all = |fragments: &[(&FragmentModel, ScannedFragment)]| {
                fragments
                    .iter()
                    .map(|(fragment, descriptors)| {
                        let resolution = Resolution {
                            application: &model,
                            module: scanned.module,
                            composite: scanned.composite,
                            fragment,
                        };
                        self.bind_fragment(&resolution, descriptors, &mut failures)
                    })
                    .collect::<Vec<_>>()
            };
            let bound = BoundComposite::new(
                scanned.id,
                Arc::clone(scanned.composite),
                bind_all(&scanned.mixins),
                bind_all(&scanned.concerns),
                bind_all(&scanned.side_effects),
            );
            composites[scanned.id.module.index()].push(Arc::new(bound));
        }

        if !failures.is_empty() {
            debug!(
                application = model.name(),
                failures = failures.len(),
                "binding failed"
            );
            return Err(AssemblyError::Binding { failures });
        }

        info!(
            application = model.name(),
            composites = scanned.len(),
            "application bound"
        );
        drop(scanned);
        Ok(Application::new(model, composites))
    }

    fn bind_fragment(
        &self,
        resolution: &Resolution<'_>,
        scanned: &ScannedFragment,
        failures: &mut Vec<BindingFailure>,
    ) -> BoundFragment {
        let mut bind = |descriptor: &DependencyDescriptor| {
            let provider = match self.factory.new_injection_provider(resolution, descriptor) {
                Ok(provider) => provider,
                Err(error) => {
                    failures.push(BindingFailure {
                        module: resolution.module.name().to_owned(),
                        composite: resolution.composite.ty(),
                        fragment: resolution.fragment.ty(),
                        point: descriptor.point(),
                        error,
                    });
                    None
                }
            };
            let model = DependencyModel::new(Arc::new(descriptor.clone()), provider);
            debug!(
                module = resolution.module.name(),
                fragment = %resolution.fragment.ty(),
                point = %descriptor.point(),
                outcome = ?model.outcome(),
                "bound dependency"
            );
            model
        };

        let parameters = scanned.parameters.iter().map(&mut bind).collect();
        let fields = scanned
            .fields
            .iter()
            .map(|descriptor| InjectedFieldModel::new(bind(descriptor)))
            .collect();

        BoundFragment::new(
            resolution.fragment.clone(),
            InjectedParametersModel::new(parameters),
            fields,
        )
    }
}

struct ScannedComposite<'a> {
    id: CompositeId,
    module: &'a ModuleModel,
    composite: &'a Arc<CompositeModel>,
    mixins: Vec<(&'a FragmentModel, ScannedFragment)>,
    concerns: Vec<(&'a FragmentModel, ScannedFragment)>,
    side_effects: Vec<(&'a FragmentModel, ScannedFragment)>,
}

fn scan_all<'a>(
    model: &ApplicationModel,
    module: &ModuleModel,
    composite: &CompositeModel,
    fragments: &'a [FragmentModel],
    failures: &mut Vec<BindingFailure>,
) -> Vec<(&'a FragmentModel, ScannedFragment)> {
    let mut scanned = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let (descriptors, errors) = dependency::scan(fragment, composite, model.hierarchy());
        failures.extend(errors.into_iter().map(|failure| BindingFailure {
            module: module.name().to_owned(),
            composite: composite.ty(),
            fragment: fragment.ty(),
            point: failure.point,
            error: BindingError::UnresolvedType {
                source: failure.error,
            },
        }));
        scanned.push((fragment, descriptors));
    }
    scanned
}
