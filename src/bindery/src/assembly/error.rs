use std::fmt::{Display, Formatter, Result as FmtResult};

use snafu::prelude::*;

use crate::binder::BindingFailure;
use crate::injection::BoxError;
use crate::types::TypeKey;

/// Why an application could not be assembled or bound.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum AssemblyError {
    #[snafu(display("service identity {identity:?} is declared twice in module {module}"))]
    #[non_exhaustive]
    DuplicatedIdentity { identity: String, module: String },
    #[snafu(display("{context} refers to layer #{index} which does not exist"))]
    #[non_exhaustive]
    UnknownLayer { index: usize, context: String },
    #[snafu(display("layer {layer} uses itself, directly or through other layers"))]
    #[non_exhaustive]
    CyclicLayers { layer: String },
    #[snafu(display("assembler {assembler} fails to set up module {module}"))]
    #[non_exhaustive]
    AssemblerInner {
        assembler: &'static str,
        module: String,
        source: BoxError,
    },
    #[snafu(display("composite {ty} in module {module} is invalid: {reason}"))]
    #[non_exhaustive]
    InvalidComposite {
        ty: TypeKey,
        module: String,
        reason: String,
    },
    #[snafu(display(
        "{} injection points could not be bound:\n{}",
        failures.len(),
        AggregatedDisplayer::new(failures)
    ))]
    #[non_exhaustive]
    Binding { failures: Vec<BindingFailure> },
    #[snafu(display("aggregated assembly errors:\n{}", AggregatedDisplayer::new(errors)))]
    Aggregated { errors: Vec<AssemblyError> },
}

impl AssemblyError {
    /// Combines `errors` into one error. Returns [`None`] if there is none.
    pub(crate) fn aggregate(mut errors: Vec<AssemblyError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Aggregated { errors }),
        }
    }
}

struct AggregatedDisplayer<'a, E> {
    errors: &'a [E],
}

impl<'a, E> AggregatedDisplayer<'a, E> {
    fn new(errors: &'a [E]) -> Self {
        Self { errors }
    }
}

impl<E> Display for AggregatedDisplayer<'_, E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, error)?;
        }
        Ok(())
    }
}
