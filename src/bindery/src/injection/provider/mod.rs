mod concern;
mod invocation;
mod service;
mod state;
mod structure;
mod this;
mod uses;

use std::collections::HashMap;
use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, Resolution, UnsupportedScopeSnafu};
use crate::dependency::{DependencyDescriptor, InjectionPoint, InjectionScope};
use crate::injection::{
    ContextUnavailableSnafu, InjectionError, InjectionProvider, InjectionProviderFactory,
};
use crate::types::TypeKey;

pub use concern::ConcernInjectionProviderFactory;
pub use invocation::InvocationInjectionProviderFactory;
pub use service::ServiceInjectionProviderFactory;
pub use state::StateInjectionProviderFactory;
pub use structure::StructureInjectionProviderFactory;
pub use this::ThisInjectionProviderFactory;
pub use uses::UsesInjectionProviderFactory;

/// Dispatches each dependency to the factory registered for its scope.
pub struct InjectionProviderFactoryStrategy {
    factories: HashMap<InjectionScope, Arc<dyn InjectionProviderFactory>>,
}

impl InjectionProviderFactoryStrategy {
    /// Creates a strategy with a factory for every built-in scope.
    pub fn new() -> Self {
        Self::empty()
            .with_factory(InjectionScope::Service, ServiceInjectionProviderFactory)
            .with_factory(InjectionScope::Structure, StructureInjectionProviderFactory)
            .with_factory(InjectionScope::This, ThisInjectionProviderFactory)
            .with_factory(InjectionScope::Uses, UsesInjectionProviderFactory)
            .with_factory(InjectionScope::Invocation, InvocationInjectionProviderFactory)
            .with_factory(InjectionScope::State, StateInjectionProviderFactory)
            .with_factory(InjectionScope::ConcernFor, ConcernInjectionProviderFactory)
    }

    /// Creates a strategy without any factory.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` for `scope`, replacing the previous one.
    pub fn with_factory<F>(mut self, scope: InjectionScope, factory: F) -> Self
    where
        F: InjectionProviderFactory,
    {
        self.factories.insert(scope, Arc::new(factory));
        self
    }
}

impl InjectionProviderFactory for InjectionProviderFactoryStrategy {
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError> {
        let scope = dependency.scope();
        let factory = self
            .factories
            .get(&scope)
            .context(UnsupportedScopeSnafu { scope })?;
        factory.new_injection_provider(resolution, dependency)
    }
}

/// The injection point a provider was bound for.
#[derive(Debug, Clone, Copy)]
struct InjectionSite {
    fragment: TypeKey,
    point: InjectionPoint,
}

impl InjectionSite {
    fn of(dependency: &DependencyDescriptor) -> Self {
        Self {
            fragment: dependency.fragment(),
            point: dependency.point(),
        }
    }

    fn context_unavailable(&self, scope: InjectionScope) -> InjectionError {
        ContextUnavailableSnafu {
            fragment: self.fragment,
            point: self.point,
            scope,
        }
        .build()
    }
}
