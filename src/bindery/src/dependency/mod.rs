mod descriptor;

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::qualifier::ServiceQualifier;
use crate::types::GenericType;

pub use descriptor::{Annotations, DependencyDescriptor};
pub(crate) use descriptor::{scan, ScannedFragment};

/// Where an injected value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionScope {
    /// A service visible from the declaring module.
    Service,
    /// The application structure or a registered structural singleton.
    Structure,
    /// The composite the fragment belongs to.
    This,
    /// A value supplied by the caller creating the instance.
    Uses,
    /// The method invocation being handled by a concern or side-effect.
    Invocation,
    /// The state of the composite.
    State,
    /// The next link of a concern chain.
    ConcernFor,
}

impl InjectionScope {
    pub fn attribute_name(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Structure => "structure",
            Self::This => "this",
            Self::Uses => "uses",
            Self::Invocation => "invocation",
            Self::State => "state",
            Self::ConcernFor => "concern_for",
        }
    }
}

impl Display for InjectionScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#[{}]", self.attribute_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionPoint {
    Parameter { index: usize, name: &'static str },
    Field { index: usize, name: &'static str },
}

impl InjectionPoint {
    pub fn index(&self) -> usize {
        match self {
            Self::Parameter { index, .. } | Self::Field { index, .. } => *index,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Parameter { name, .. } | Self::Field { name, .. } => *name,
        }
    }
}

impl Display for InjectionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Parameter { index, name } => {
                write!(f, "constructor parameter `{name}` (#{index})")
            }
            Self::Field { index, name } => write!(f, "field `{name}` (#{index})"),
        }
    }
}

/// The declared facts of one injection point, before type resolution.
#[derive(Debug, Clone)]
pub struct DependencyDeclaration {
    scope: InjectionScope,
    name: &'static str,
    ty: GenericType,
    optional: bool,
    qualifiers: Vec<ServiceQualifier>,
    property: Option<&'static str>,
}

impl DependencyDeclaration {
    pub fn new(scope: InjectionScope, name: &'static str, ty: GenericType) -> Self {
        Self {
            scope,
            name,
            ty,
            optional: false,
            qualifiers: Vec::new(),
            property: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Adds a qualifier. Several qualifiers must all accept a service.
    pub fn qualified_by(mut self, qualifier: ServiceQualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Names the property injected through the state scope. Defaults to the
    /// injection point name.
    pub fn named(mut self, property: &'static str) -> Self {
        self.property = Some(property);
        self
    }

    pub fn scope(&self) -> InjectionScope {
        self.scope
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> &GenericType {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn qualifiers(&self) -> &[ServiceQualifier] {
        &self.qualifiers
    }

    pub fn property(&self) -> Option<&'static str> {
        self.property
    }
}

/// Every injection point of a fragment: constructor parameters in order,
/// then setter fields in order.
#[derive(Debug, Clone, Default)]
pub struct FragmentDeclaration {
    constructor: Vec<DependencyDeclaration>,
    fields: Vec<DependencyDeclaration>,
}

impl FragmentDeclaration {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn parameter(mut self, dependency: DependencyDeclaration) -> Self {
        self.constructor.push(dependency);
        self
    }

    pub fn field(mut self, dependency: DependencyDeclaration) -> Self {
        self.fields.push(dependency);
        self
    }

    pub fn constructor(&self) -> &[DependencyDeclaration] {
        &self.constructor
    }

    pub fn fields(&self) -> &[DependencyDeclaration] {
        &self.fields
    }

    pub fn points(&self) -> impl Iterator<Item = (InjectionPoint, &DependencyDeclaration)> {
        let parameters = self.constructor.iter().enumerate().map(|(index, dep)| {
            let point = InjectionPoint::Parameter {
                index,
                name: dep.name,
            };
            (point, dep)
        });
        let fields = self.fields.iter().enumerate().map(|(index, dep)| {
            let point = InjectionPoint::Field {
                index,
                name: dep.name,
            };
            (point, dep)
        });
        parameters.chain(fields)
    }
}
