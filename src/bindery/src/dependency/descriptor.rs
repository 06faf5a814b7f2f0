use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::dependency::{DependencyDeclaration, InjectionPoint, InjectionScope};
use crate::fragment::FragmentModel;
use crate::qualifier::ServiceQualifier;
use crate::structure::CompositeModel;
use crate::types::{GenericType, TypeError, TypeHierarchy, TypeKey};

/// The static facts of one injection point, with type variables resolved
/// against the composite declaring it.
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    scope: InjectionScope,
    point: InjectionPoint,
    declared: GenericType,
    resolved: GenericType,
    optional: bool,
    qualifier: Option<ServiceQualifier>,
    property: Option<&'static str>,
    fragment: TypeKey,
}

impl DependencyDescriptor {
    pub fn new(
        fragment: TypeKey,
        point: InjectionPoint,
        declaration: &DependencyDeclaration,
        resolved: GenericType,
    ) -> Self {
        let qualifier = match declaration.qualifiers() {
            [] => None,
            [qualifier] => Some(qualifier.clone()),
            qualifiers => Some(ServiceQualifier::And(qualifiers.to_vec())),
        };

        Self {
            scope: declaration.scope(),
            point,
            declared: declaration.ty().clone(),
            resolved,
            optional: declaration.is_optional(),
            qualifier,
            property: declaration.property(),
            fragment,
        }
    }

    pub fn scope(&self) -> InjectionScope {
        self.scope
    }

    pub fn point(&self) -> InjectionPoint {
        self.point
    }

    /// The type as written, possibly containing type variables.
    pub fn declared_type(&self) -> &GenericType {
        &self.declared
    }

    /// The declared type with every type variable resolved.
    pub fn generic_type(&self) -> &GenericType {
        &self.resolved
    }

    /// The raw type of the resolved type. For iterables this is the raw type
    /// of the element.
    pub fn raw_type(&self) -> Option<TypeKey> {
        self.resolved.raw()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn qualifier(&self) -> Option<&ServiceQualifier> {
        self.qualifier.as_ref()
    }

    /// The property injected through the state scope.
    pub fn property_name(&self) -> &'static str {
        self.property.unwrap_or(self.point.name())
    }

    /// The fragment declaring this injection point.
    pub fn fragment(&self) -> TypeKey {
        self.fragment
    }

    pub fn annotations(&self) -> Annotations<'_> {
        Annotations { descriptor: self }
    }
}

/// Renders the attributes of an injection point, for diagnostics.
pub struct Annotations<'a> {
    descriptor: &'a DependencyDescriptor,
}

impl Display for Annotations<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let descriptor = self.descriptor;
        write!(f, "{}", descriptor.scope)?;
        if let Some(property) = descriptor.property {
            write!(f, "({property:?})")?;
        }
        if descriptor.optional {
            write!(f, " #[optional]")?;
        }
        if let Some(qualifier) = &descriptor.qualifier {
            write!(f, " #[qualified({qualifier})]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScannedFragment {
    pub parameters: Vec<DependencyDescriptor>,
    pub fields: Vec<DependencyDescriptor>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanFailure {
    pub point: InjectionPoint,
    pub error: TypeError,
}

/// Builds the descriptors of every injection point of `fragment`.
///
/// Points whose type can't be resolved are reported as failures and left out
/// of the scanned fragment. The other points are still returned so that they
/// can be bound and their own failures reported.
pub(crate) fn scan(
    fragment: &FragmentModel,
    composite: &CompositeModel,
    hierarchy: &TypeHierarchy,
) -> (ScannedFragment, Vec<ScanFailure>) {
    let mut scanned = ScannedFragment::default();
    let mut failures = Vec::new();

    let concretes: Vec<_> = [fragment.ty(), composite.ty()]
        .into_iter()
        .chain(composite.types().iter().copied())
        .collect();

    for (point, declaration) in fragment.declaration().points() {
        match resolve_type(declaration.ty(), &concretes, hierarchy) {
            Ok(resolved) => {
                let descriptor =
                    DependencyDescriptor::new(fragment.ty(), point, declaration, resolved);
                match point {
                    InjectionPoint::Parameter { .. } => scanned.parameters.push(descriptor),
                    InjectionPoint::Field { .. } => scanned.fields.push(descriptor),
                }
            }
            Err(error) => failures.push(ScanFailure { point, error }),
        }
    }

    (scanned, failures)
}

// The most derived type binding a variable wins: the fragment first, then the
// types of its composite.
fn resolve_type(
    ty: &GenericType,
    concretes: &[TypeKey],
    hierarchy: &TypeHierarchy,
) -> Result<GenericType, TypeError> {
    if ty.is_resolved() {
        return Ok(ty.clone());
    }

    let mut result = hierarchy.resolve(concretes[0], ty);
    for concrete in &concretes[1..] {
        if result.is_ok() {
            break;
        }
        if let Ok(resolved) = hierarchy.resolve(*concrete, ty) {
            result = Ok(resolved);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use crate::qualifier::{where_active, with_tags};
    use crate::types::TypeDeclaration;

    use super::*;

    trait Type1 {}
    trait Type2 {}

    #[test]
    fn dependency_descriptor_combines_qualifiers() {
        let declaration =
            DependencyDeclaration::new(InjectionScope::Service, "cache", GenericType::of::<i32>())
                .optional()
                .qualified_by(with_tags(["fast"]))
                .qualified_by(where_active());
        let point = InjectionPoint::Parameter {
            index: 0,
            name: "cache",
        };
        let descriptor = DependencyDescriptor::new(
            TypeKey::of::<String>(),
            point,
            &declaration,
            GenericType::of::<i32>(),
        );

        assert!(matches!(
            descriptor.qualifier(),
            Some(ServiceQualifier::And(qualifiers)) if qualifiers.len() == 2
        ));
        assert_eq!(
            descriptor.annotations().to_string(),
            r#"#[service] #[optional] #[qualified(and(with_tags(["fast"]), where_active()))]"#
        );
        assert_eq!(descriptor.property_name(), "cache");
    }

    #[test]
    fn resolve_type_prefers_first_binding_concrete() {
        let mut hierarchy = TypeHierarchy::new();
        hierarchy.declare(TypeDeclaration::of::<dyn Type2>().with_parameters(["A"]));
        hierarchy.declare(TypeDeclaration::of::<dyn Type1>().extends(
            GenericType::parameterized::<dyn Type2>([GenericType::of::<String>()]),
        ));
        let ty = GenericType::variable::<dyn Type2>("A");

        let resolved = resolve_type(
            &ty,
            &[TypeKey::of::<u8>(), TypeKey::of::<dyn Type1>()],
            &hierarchy,
        );
        assert_eq!(resolved.unwrap(), GenericType::of::<String>());

        let unresolved = resolve_type(&ty, &[TypeKey::of::<u8>()], &hierarchy);
        assert!(matches!(unresolved, Err(TypeError::UnboundVariable { .. })));
    }
}
