use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::binder::BoundFragment;
use crate::dependency::FragmentDeclaration;
use crate::injection::{BoxError, InjectedValues, InjectionContext, InjectionError, Managed, Value};
use crate::types::TypeKey;

/// A mixin, concern, side-effect or object with injectable dependencies.
///
/// Usually, you don't need to implement [`Fragment`] manually, because the
/// [`fragment`] macro helps with this. A hand-written implementation looks
/// like this:
///
/// ```rust
/// # use std::convert::Infallible;
/// # use std::sync::Arc;
/// # use bindery::dependency::{DependencyDeclaration, FragmentDeclaration, InjectionScope};
/// # use bindery::fragment::Fragment;
/// # use bindery::injection::{InjectedValues, InjectionError};
/// # use bindery::types::GenericType;
/// #
/// trait Greeter: Send + Sync + 'static {
///     fn greet(&self) -> String;
/// }
///
/// struct GreeterMixin {
///     greeting: String,
/// }
///
/// impl Greeter for GreeterMixin {
///     fn greet(&self) -> String {
///         self.greeting.clone()
///     }
/// }
///
/// impl Fragment for GreeterMixin {
///     type Constructed = Arc<dyn Greeter>;
///
///     type Error = Infallible;
///
///     fn injection_points() -> FragmentDeclaration {
///         FragmentDeclaration::new().parameter(DependencyDeclaration::new(
///             InjectionScope::Uses,
///             "greeting",
///             GenericType::of::<String>(),
///         ))
///     }
///
///     fn construct(
///         values: &mut InjectedValues,
///     ) -> Result<Result<Self, Self::Error>, InjectionError> {
///         let greeting = values.take(0)?;
///         Ok(Ok(Self { greeting }))
///     }
///
///     fn post_process(self) -> Self::Constructed {
///         Arc::new(self)
///     }
/// }
/// ```
///
/// [`fragment`]: macro@crate::fragment
pub trait Fragment: Managed + Sized {
    /// What the fragment contributes to its composite, typically
    /// `Arc<dyn Trait>`.
    type Constructed: Managed + Clone;

    /// The error occurred in construction after all dependencies are
    /// injected.
    type Error: Into<BoxError>;

    /// Declares the constructor parameters and setter fields to inject.
    fn injection_points() -> FragmentDeclaration;

    /// Creates the fragment from its injected constructor parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter can't be taken from `values`.
    ///
    /// Returns an inner error [`Fragment::Error`] wrapped in the outer [`Ok`]
    /// if the construction itself fails.
    fn construct(values: &mut InjectedValues) -> Result<Result<Self, Self::Error>, InjectionError>;

    /// Assigns the setter field `field`, whose value is the only slot of
    /// `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value can't be taken from `values`.
    fn inject_field(
        &mut self,
        field: usize,
        values: &mut InjectedValues,
    ) -> Result<(), InjectionError> {
        let _ = (field, values);
        Ok(())
    }

    /// Converts `self` to [`Fragment::Constructed`].
    fn post_process(self) -> Self::Constructed;
}

/// Creates instances of one bound fragment.
pub trait FragmentFactory: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns an error if any dependency can't be injected or the fragment
    /// fails to construct.
    fn new_fragment(
        &self,
        bound: &BoundFragment,
        context: &InjectionContext,
    ) -> Result<Value, InjectionError>;
}

pub struct FragmentProvider<F>
where
    F: Fragment,
{
    _marker: PhantomData<fn() -> F>,
}

impl<F> FragmentProvider<F>
where
    F: Fragment,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<F> Debug for FragmentProvider<F>
where
    F: Fragment,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FragmentProvider<F>").finish_non_exhaustive()
    }
}

impl<F> FragmentFactory for FragmentProvider<F>
where
    F: Fragment,
{
    fn new_fragment(
        &self,
        bound: &BoundFragment,
        context: &InjectionContext,
    ) -> Result<Value, InjectionError> {
        let mut values = bound.parameters().new_parameters(context)?;
        let mut fragment = match F::construct(&mut values) {
            Ok(Ok(fragment)) => fragment,
            Ok(Err(err)) => {
                return Err(InjectionError::Construction {
                    fragment: TypeKey::of::<F>(),
                    source: Arc::from(err.into()),
                })
            }
            Err(err) => return Err(err),
        };
        for field in bound.fields() {
            field.inject(context, &mut fragment)?;
        }
        Ok(Value::new(fragment.post_process()))
    }
}

/// The part a fragment plays in its composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentRole {
    Mixin,
    Concern,
    SideEffect,
    Object,
}

impl FragmentRole {
    /// Returns true for concerns and side-effects, which handle invocations.
    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Concern | Self::SideEffect)
    }
}

impl Display for FragmentRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Mixin => write!(f, "mixin"),
            Self::Concern => write!(f, "concern"),
            Self::SideEffect => write!(f, "side-effect"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// The static model of one fragment of a composite.
#[derive(Clone)]
pub struct FragmentModel {
    ty: TypeKey,
    output: TypeKey,
    role: FragmentRole,
    declaration: Arc<FragmentDeclaration>,
    factory: Arc<dyn FragmentFactory>,
}

impl FragmentModel {
    pub fn of<F: Fragment>(role: FragmentRole) -> Self {
        Self {
            ty: TypeKey::of::<F>(),
            output: TypeKey::of::<F::Constructed>(),
            role,
            declaration: Arc::new(F::injection_points()),
            factory: Arc::new(FragmentProvider::<F>::new()),
        }
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// The type of the value the fragment contributes.
    pub fn output(&self) -> TypeKey {
        self.output
    }

    pub fn role(&self) -> FragmentRole {
        self.role
    }

    pub fn declaration(&self) -> &FragmentDeclaration {
        &self.declaration
    }

    pub fn factory(&self) -> &Arc<dyn FragmentFactory> {
        &self.factory
    }
}

impl Debug for FragmentModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FragmentModel")
            .field("ty", &self.ty)
            .field("output", &self.output)
            .field("role", &self.role)
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}
