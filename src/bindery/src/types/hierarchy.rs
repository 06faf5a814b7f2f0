use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use snafu::prelude::*;

use crate::types::{
    ArityMismatchSnafu, GenericType, TypeError, TypeKey, TypeVariable, UnboundVariableSnafu,
};

/// Declares the type parameters and direct supertypes of one type.
///
/// Rust offers no runtime view of trait inheritance, so generic chains that
/// injection points rely on are declared once, up front:
///
/// ```rust
/// # use bindery::types::{GenericType, TypeDeclaration};
/// trait Repository {}
/// trait UserRepository {}
///
/// let declaration = TypeDeclaration::of::<dyn UserRepository>()
///     .extends(GenericType::parameterized::<dyn Repository>([GenericType::of::<String>()]));
/// ```
#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    ty: TypeKey,
    parameters: Vec<&'static str>,
    supertypes: Vec<GenericType>,
}

impl TypeDeclaration {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            parameters: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    pub fn with_parameters<I>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.parameters.extend(parameters);
        self
    }

    pub fn extends(mut self, supertype: GenericType) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn parameters(&self) -> &[&'static str] {
        &self.parameters
    }

    pub fn supertypes(&self) -> &[GenericType] {
        &self.supertypes
    }

    fn bindings(
        &self,
        arguments: &[GenericType],
    ) -> Result<HashMap<TypeVariable, GenericType>, TypeError> {
        ensure!(
            self.parameters.len() == arguments.len(),
            ArityMismatchSnafu {
                declaration: self.ty,
                expected: self.parameters.len(),
                actual: arguments.len(),
            }
        );

        Ok(self
            .parameters
            .iter()
            .zip(arguments)
            .map(|(name, arg)| (TypeVariable::new(self.ty, *name), arg.clone()))
            .collect())
    }
}

/// The declared inheritance graph between types, used for assignability
/// checks and type variable resolution.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    declarations: HashMap<TypeKey, TypeDeclaration>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a declaration. A later declaration of the same type replaces the
    /// earlier one.
    pub fn declare(&mut self, declaration: TypeDeclaration) {
        self.declarations.insert(declaration.ty, declaration);
    }

    pub fn get(&self, ty: TypeKey) -> Option<&TypeDeclaration> {
        self.declarations.get(&ty)
    }

    /// Returns true if a value of type `from` may be used where `to` is
    /// expected. The relation is reflexive and transitive.
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![from];

        while let Some(current) = pending.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(declaration) = self.declarations.get(&current) {
                pending.extend(declaration.supertypes.iter().filter_map(GenericType::raw));
            }
        }
        false
    }

    /// Resolves `variable` as seen from `concrete`, by walking the supertypes
    /// of `concrete` depth-first and substituting type arguments on the way.
    pub fn resolve_variable(
        &self,
        concrete: TypeKey,
        variable: TypeVariable,
    ) -> Result<GenericType, TypeError> {
        let mut visited = HashSet::new();
        let found = self.search(concrete, &HashMap::new(), variable, &mut visited)?;

        match found {
            Some(ty) if ty.is_resolved() => Ok(ty),
            _ => UnboundVariableSnafu { variable, concrete }.fail(),
        }
    }

    /// Resolves every type variable occurring in `ty` against `concrete`.
    pub fn resolve(&self, concrete: TypeKey, ty: &GenericType) -> Result<GenericType, TypeError> {
        let mut bindings = HashMap::new();
        for variable in ty.variables() {
            if let Entry::Vacant(entry) = bindings.entry(variable) {
                entry.insert(self.resolve_variable(concrete, variable)?);
            }
        }
        Ok(ty.substitute(&bindings))
    }

    fn search(
        &self,
        current: TypeKey,
        bindings: &HashMap<TypeVariable, GenericType>,
        variable: TypeVariable,
        visited: &mut HashSet<TypeKey>,
    ) -> Result<Option<GenericType>, TypeError> {
        if !visited.insert(current) {
            return Ok(None);
        }
        let Some(declaration) = self.declarations.get(&current) else {
            return Ok(None);
        };

        for supertype in &declaration.supertypes {
            let (raw, arguments) = match supertype.substitute(bindings) {
                GenericType::Parameterized { raw, arguments } => (raw, arguments),
                GenericType::Concrete(raw) => (raw, Vec::new()),
                _ => continue,
            };

            let Some(super_declaration) = self.declarations.get(&raw) else {
                continue;
            };
            let super_bindings = super_declaration.bindings(&arguments)?;

            if raw == variable.declared_on() {
                return Ok(super_bindings.get(&variable).cloned());
            }
            if let Some(found) = self.search(raw, &super_bindings, variable, visited)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
