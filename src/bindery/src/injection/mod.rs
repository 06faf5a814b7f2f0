mod context;
mod handle;
mod model;
pub mod provider;
mod value;
mod values;

use std::error::Error;
use std::fmt::Debug;
use std::sync::Arc;

use snafu::prelude::*;

use crate::binder::{BindingError, BindingOutcome, Resolution};
use crate::dependency::{DependencyDescriptor, InjectionPoint, InjectionScope};
use crate::runtime::ServiceError;
use crate::structure::CompositeKind;
use crate::types::{GenericType, TypeKey};

pub use context::{ContextKind, InjectionContext, Invocation, Uses};
pub use handle::{Property, PropertyCell, ServiceRef, StateHolder, This};
pub use model::{DependencyModel, InjectedFieldModel, InjectedParametersModel};
pub use value::{describe_value, Managed, Origin, Value};
pub use values::{FromValue, Injected, InjectedValues};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Supplies the value of one bound injection point.
///
/// Providers are created once while binding and shared by every instance of
/// the declaring fragment.
#[cfg_attr(test, mockall::automock)]
pub trait InjectionProvider: Debug + Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns an error if the value exists but can't be produced, e.g. a
    /// service fails to activate.
    fn provide_injection(&self, context: &InjectionContext) -> Result<Injected, InjectionError>;

    /// What this provider was bound to.
    fn outcome(&self) -> BindingOutcome;
}

/// Binds the injection points of one scope.
pub trait InjectionProviderFactory: Send + Sync + 'static {
    /// Returns `Ok(None)` if an optional dependency has nothing to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if the injection point is invalid for this scope or a
    /// mandatory dependency can't be satisfied.
    fn new_injection_provider(
        &self,
        resolution: &Resolution<'_>,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<Arc<dyn InjectionProvider>>, BindingError>;
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum InjectionError {
    #[snafu(display(
        "{point} of {fragment} ({annotations}) expects {expected} but was given {actual}"
    ))]
    #[non_exhaustive]
    TypeMismatch {
        fragment: TypeKey,
        point: InjectionPoint,
        annotations: String,
        expected: GenericType,
        actual: String,
    },
    #[snafu(display(
        "no value was injected into mandatory {point} of {fragment} ({annotations}){hint}"
    ))]
    #[non_exhaustive]
    MissingValue {
        fragment: TypeKey,
        point: InjectionPoint,
        annotations: String,
        hint: &'static str,
    },
    #[snafu(display(
        "no value of type {ty} was supplied for {point} of {fragment}; pass one as a used value"
    ))]
    #[non_exhaustive]
    MissingUses {
        fragment: TypeKey,
        point: InjectionPoint,
        ty: GenericType,
    },
    #[snafu(display("{scope} is not available when injecting {point} of {fragment}"))]
    #[non_exhaustive]
    ContextUnavailable {
        fragment: TypeKey,
        point: InjectionPoint,
        scope: InjectionScope,
    },
    #[snafu(display("service {identity} could not provide its value"))]
    #[non_exhaustive]
    ServiceUnavailable {
        identity: String,
        #[snafu(source(from(ServiceError, Box::new)))]
        source: Box<ServiceError>,
    },
    #[snafu(display("fragment {fragment} fails to construct"))]
    #[non_exhaustive]
    Construction {
        fragment: TypeKey,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("no {kind} exposing {ty} is visible from module {module}"))]
    #[non_exhaustive]
    NoSuchComposite {
        kind: CompositeKind,
        ty: TypeKey,
        module: String,
    },
    #[snafu(display("composite {composite} has no view of type {ty}"))]
    #[non_exhaustive]
    NoSuchView { composite: TypeKey, ty: TypeKey },
    #[snafu(display(
        "composite {composite} is still being instantiated; inject `This<{ty}>` to access it lazily"
    ))]
    #[non_exhaustive]
    ViewUnavailable { composite: TypeKey, ty: TypeKey },
    #[snafu(display("property {name:?} of {composite} is invalid: {reason}"))]
    #[non_exhaustive]
    InvalidProperty {
        composite: TypeKey,
        name: String,
        reason: String,
    },
    #[snafu(display("injected slot #{index} was already taken or does not exist"))]
    #[non_exhaustive]
    SlotUnavailable { index: usize },
    #[snafu(display("the application owning this instance has been dropped"))]
    #[non_exhaustive]
    ApplicationDropped,
}
