use std::fmt::{Display, Formatter, Result as FmtResult};

use snafu::prelude::*;

use crate::dependency::{InjectionPoint, InjectionScope};
use crate::types::{GenericType, TypeError, TypeKey};

/// Why one injection point can't be bound.
#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum BindingError {
    #[snafu(display("invalid injection: {reason}"))]
    #[non_exhaustive]
    InvalidInjection { reason: String },
    #[snafu(display(
        "no visible service exposes {ty}{}",
        qualifier.as_ref().map(|q| format!(" and satisfies {q}")).unwrap_or_default()
    ))]
    #[non_exhaustive]
    NoCandidates {
        ty: GenericType,
        qualifier: Option<String>,
    },
    #[snafu(display(
        "{} services expose {ty} ({}) but a single one is expected; add a qualifier",
        identities.len(),
        identities.join(", ")
    ))]
    #[non_exhaustive]
    Ambiguous { ty: GenericType, identities: Vec<String> },
    #[snafu(display("{ty} is neither a structure type nor a registered structural singleton"))]
    #[non_exhaustive]
    UnknownStructure { ty: GenericType },
    #[snafu(display("composite {composite} declares no property {name:?}"))]
    #[non_exhaustive]
    UnknownProperty { composite: TypeKey, name: String },
    #[snafu(display(
        "property {name:?} of composite {composite} holds {actual} but {expected} is requested"
    ))]
    #[non_exhaustive]
    PropertyTypeMismatch {
        composite: TypeKey,
        name: String,
        expected: TypeKey,
        actual: TypeKey,
    },
    #[snafu(display("the type of the injection point can't be resolved"))]
    #[non_exhaustive]
    UnresolvedType { source: TypeError },
    #[snafu(display("no injection provider factory is registered for {scope}"))]
    #[non_exhaustive]
    UnsupportedScope { scope: InjectionScope },
}

/// A binding error located in the application structure.
#[derive(Debug, Clone)]
pub struct BindingFailure {
    pub module: String,
    pub composite: TypeKey,
    pub fragment: TypeKey,
    pub point: InjectionPoint,
    pub error: BindingError,
}

impl Display for BindingFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} of fragment {} in composite {} of module {}: {}",
            self.point, self.fragment, self.composite, self.module, self.error
        )?;
        if let Some(source) = std::error::Error::source(&self.error) {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}
