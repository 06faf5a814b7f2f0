mod hierarchy;

use std::any::{self, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};

use snafu::prelude::*;

pub use hierarchy::{TypeDeclaration, TypeHierarchy};

use crate::injection::Property;
use crate::runtime::ServiceReference;

/// Identity of a Rust type known to the binder: its [`TypeId`] plus its name
/// for diagnostics. Equality and hashing only look at the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    pub(crate) fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The name without module paths, e.g. `Arc<dyn MyService>`.
    pub fn simple_name(&self) -> String {
        simplify_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl Debug for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.simple_name())
    }
}

fn simplify_type_name(name: &str) -> String {
    let mut simplified = String::with_capacity(name.len());
    let mut segment = String::new();
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            simplified.push_str(segment.rsplit("::").next().unwrap_or_default());
            segment.clear();
            simplified.push(ch);
        }
    }
    simplified.push_str(segment.rsplit("::").next().unwrap_or_default());
    simplified
}

/// A type variable `name` declared on the generic type `declared_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVariable {
    declared_on: TypeKey,
    name: &'static str,
}

impl TypeVariable {
    pub fn new(declared_on: TypeKey, name: &'static str) -> Self {
        Self { declared_on, name }
    }

    pub fn declared_on(&self) -> TypeKey {
        self.declared_on
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Display for TypeVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}::{}", self.declared_on, self.name)
    }
}

/// The declared type of an injection point, possibly generic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericType {
    Concrete(TypeKey),
    Parameterized {
        raw: TypeKey,
        arguments: Vec<GenericType>,
    },
    Iterable(Box<GenericType>),
    Variable(TypeVariable),
}

impl GenericType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Concrete(TypeKey::of::<T>())
    }

    pub fn parameterized<R: ?Sized + 'static>(
        arguments: impl IntoIterator<Item = GenericType>,
    ) -> Self {
        Self::Parameterized {
            raw: TypeKey::of::<R>(),
            arguments: arguments.into_iter().collect(),
        }
    }

    pub fn iterable(element: GenericType) -> Self {
        Self::Iterable(Box::new(element))
    }

    pub fn variable<D: ?Sized + 'static>(name: &'static str) -> Self {
        Self::Variable(TypeVariable::new(TypeKey::of::<D>(), name))
    }

    /// A typed service reference handle for services of type `target`.
    pub fn service_reference(target: GenericType) -> Self {
        Self::Parameterized {
            raw: TypeKey::of::<ServiceReference>(),
            arguments: vec![target],
        }
    }

    /// A property handle holding values of type `target`.
    pub fn property(target: GenericType) -> Self {
        Self::Parameterized {
            raw: TypeKey::of::<Property<()>>(),
            arguments: vec![target],
        }
    }

    /// The raw type, if it is known without resolving type variables.
    pub fn raw(&self) -> Option<TypeKey> {
        match self {
            Self::Concrete(key) => Some(*key),
            Self::Parameterized { raw, .. } => Some(*raw),
            Self::Iterable(element) => element.raw(),
            Self::Variable(_) => None,
        }
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self, Self::Iterable(_))
    }

    pub fn is_service_reference(&self) -> bool {
        matches!(self, Self::Parameterized { raw, .. } if *raw == TypeKey::of::<ServiceReference>())
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Self::Parameterized { raw, .. } if *raw == TypeKey::of::<Property<()>>())
    }

    /// Returns the first type argument, i.e. the element of an iterable or the
    /// target of a handle type.
    pub fn first_argument(&self) -> Option<&GenericType> {
        match self {
            Self::Iterable(element) => Some(element),
            Self::Parameterized { arguments, .. } => arguments.first(),
            _ => None,
        }
    }

    /// Returns true if no type variable occurs anywhere in the type.
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Concrete(_) => true,
            Self::Parameterized { arguments, .. } => arguments.iter().all(Self::is_resolved),
            Self::Iterable(element) => element.is_resolved(),
            Self::Variable(_) => false,
        }
    }

    pub fn variables(&self) -> Vec<TypeVariable> {
        let mut variables = Vec::new();
        self.collect_variables(&mut variables);
        variables
    }

    fn collect_variables(&self, variables: &mut Vec<TypeVariable>) {
        match self {
            Self::Concrete(_) => {}
            Self::Parameterized { arguments, .. } => arguments
                .iter()
                .for_each(|arg| arg.collect_variables(variables)),
            Self::Iterable(element) => element.collect_variables(variables),
            Self::Variable(variable) => variables.push(*variable),
        }
    }

    /// Replaces every variable found in `bindings` with its binding.
    pub(crate) fn substitute(&self, bindings: &HashMap<TypeVariable, GenericType>) -> Self {
        match self {
            Self::Concrete(_) => self.clone(),
            Self::Parameterized { raw, arguments } => Self::Parameterized {
                raw: *raw,
                arguments: arguments.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Iterable(element) => Self::Iterable(Box::new(element.substitute(bindings))),
            Self::Variable(variable) => bindings
                .get(variable)
                .cloned()
                .unwrap_or_else(|| self.clone()),
        }
    }
}

impl From<TypeKey> for GenericType {
    fn from(key: TypeKey) -> Self {
        Self::Concrete(key)
    }
}

impl Display for GenericType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Concrete(key) => write!(f, "{key}"),
            Self::Parameterized { raw, arguments } => {
                let raw = raw.simple_name();
                let raw = raw.split('<').next().unwrap_or_default();
                write!(f, "{raw}<")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Self::Iterable(element) => write!(f, "Vec<{element}>"),
            Self::Variable(variable) => write!(f, "{variable}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[non_exhaustive]
pub enum TypeError {
    #[snafu(display("type variable {variable} could not be resolved against {concrete}"))]
    #[non_exhaustive]
    UnboundVariable {
        variable: TypeVariable,
        concrete: TypeKey,
    },
    #[snafu(display(
        "{declaration} declares {expected} type parameters but is used with {actual} arguments"
    ))]
    #[non_exhaustive]
    ArityMismatch {
        declaration: TypeKey,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    trait Service {}

    #[test]
    fn type_key_eq_uses_type_id() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<i64>());
        assert_eq!(TypeKey::of::<Arc<dyn Service>>().to_string(), "Arc<dyn Service>");
    }

    #[test]
    fn generic_type_raw_succeeds() {
        let iterable = GenericType::iterable(GenericType::of::<i32>());
        assert_eq!(iterable.raw(), Some(TypeKey::of::<i32>()));
        assert!(iterable.is_iterable());

        let variable = GenericType::variable::<dyn Service>("T");
        assert_eq!(variable.raw(), None);
        assert!(!variable.is_resolved());

        let reference = GenericType::service_reference(GenericType::of::<i32>());
        assert!(reference.is_service_reference());
        assert_eq!(reference.first_argument(), Some(&GenericType::of::<i32>()));
    }

    #[test]
    fn generic_type_substitute_succeeds() {
        let variable = TypeVariable::new(TypeKey::of::<dyn Service>(), "T");
        let ty = GenericType::iterable(GenericType::Variable(variable));
        let bindings = HashMap::from([(variable, GenericType::of::<String>())]);

        assert_eq!(
            ty.substitute(&bindings),
            GenericType::iterable(GenericType::of::<String>())
        );
        assert_eq!(ty.variables(), vec![variable]);
    }
}
