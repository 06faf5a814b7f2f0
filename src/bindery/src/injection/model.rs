use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::prelude::*;
use tracing::trace;

use crate::binder::BindingOutcome;
use crate::dependency::{DependencyDescriptor, InjectionScope};
use crate::fragment::Fragment;
use crate::injection::{
    Injected, InjectedValues, InjectionContext, InjectionError, InjectionProvider,
    MissingValueSnafu,
};

/// One injection point together with the provider it was bound to.
///
/// An optional dependency without any candidate has no provider and always
/// injects [`Injected::Absent`].
#[derive(Clone)]
pub struct DependencyModel {
    descriptor: Arc<DependencyDescriptor>,
    provider: Option<Arc<dyn InjectionProvider>>,
}

impl DependencyModel {
    pub(crate) fn new(
        descriptor: Arc<DependencyDescriptor>,
        provider: Option<Arc<dyn InjectionProvider>>,
    ) -> Self {
        Self {
            descriptor,
            provider,
        }
    }

    pub fn descriptor(&self) -> &Arc<DependencyDescriptor> {
        &self.descriptor
    }

    pub fn outcome(&self) -> BindingOutcome {
        self.provider
            .as_ref()
            .map_or(BindingOutcome::Absent, |provider| provider.outcome())
    }

    /// Pulls the value of this dependency from its bound provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails, or if a mandatory dependency
    /// gets no value. An empty iterable is a valid value.
    pub fn inject(&self, context: &InjectionContext) -> Result<Injected, InjectionError> {
        let injected = match &self.provider {
            Some(provider) => provider.provide_injection(context)?,
            None => Injected::Absent,
        };

        let descriptor = &*self.descriptor;
        trace!(
            fragment = %descriptor.fragment(),
            point = %descriptor.point(),
            absent = injected.is_absent(),
            "injecting dependency"
        );

        let mandatory = !descriptor.is_optional() && !descriptor.generic_type().is_iterable();
        ensure!(
            !(mandatory && injected.is_absent()),
            MissingValueSnafu {
                fragment: descriptor.fragment(),
                point: descriptor.point(),
                annotations: descriptor.annotations().to_string(),
                hint: missing_value_hint(descriptor),
            }
        );
        Ok(injected)
    }
}

impl Debug for DependencyModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DependencyModel")
            .field("descriptor", &self.descriptor)
            .field("outcome", &self.outcome())
            .finish()
    }
}

fn missing_value_hint(descriptor: &DependencyDescriptor) -> &'static str {
    let looks_like_service = descriptor
        .raw_type()
        .is_some_and(|ty| ty.simple_name().contains("Service"));
    if looks_like_service && descriptor.scope() != InjectionScope::Service {
        " (did you mean #[service]?)"
    } else {
        ""
    }
}

/// The bound constructor parameters of a fragment.
#[derive(Debug, Clone, Default)]
pub struct InjectedParametersModel {
    parameters: Vec<DependencyModel>,
}

impl InjectedParametersModel {
    pub(crate) fn new(parameters: Vec<DependencyModel>) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &[DependencyModel] {
        &self.parameters
    }

    /// Injects every parameter, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first error of any parameter.
    pub fn new_parameters(
        &self,
        context: &InjectionContext,
    ) -> Result<InjectedValues, InjectionError> {
        let injected = self
            .parameters
            .iter()
            .map(|parameter| {
                parameter
                    .inject(context)
                    .map(|injected| (injected, Arc::clone(parameter.descriptor())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InjectedValues::new(injected))
    }
}

/// One bound setter field of a fragment.
#[derive(Debug, Clone)]
pub struct InjectedFieldModel {
    index: usize,
    dependency: DependencyModel,
}

impl InjectedFieldModel {
    pub(crate) fn new(dependency: DependencyModel) -> Self {
        Self {
            index: dependency.descriptor().point().index(),
            dependency,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dependency(&self) -> &DependencyModel {
        &self.dependency
    }

    /// Injects the field into an already constructed fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the value can't be injected or doesn't fit the
    /// field.
    pub fn inject<F>(&self, context: &InjectionContext, fragment: &mut F) -> Result<(), InjectionError>
    where
        F: Fragment,
    {
        let injected = self.dependency.inject(context)?;
        let mut values =
            InjectedValues::new([(injected, Arc::clone(self.dependency.descriptor()))]);
        fragment.inject_field(self.index, &mut values)
    }
}

#[cfg(test)]
mod tests {
    use crate::dependency::{DependencyDeclaration, InjectionPoint};
    use crate::injection::{MockInjectionProvider, Uses, Value};
    use crate::runtime::tests::module_instance;
    use crate::types::{GenericType, TypeKey};

    use super::*;

    struct AuditService;

    fn descriptor(scope: InjectionScope, ty: GenericType, optional: bool) -> Arc<DependencyDescriptor> {
        let mut declaration = DependencyDeclaration::new(scope, "audit", ty.clone());
        if optional {
            declaration = declaration.optional();
        }
        let point = InjectionPoint::Field {
            index: 0,
            name: "audit",
        };
        Arc::new(DependencyDescriptor::new(
            TypeKey::of::<u8>(),
            point,
            &declaration,
            ty,
        ))
    }

    fn provider_returning(injected: Injected) -> Arc<dyn InjectionProvider> {
        let mut provider = MockInjectionProvider::new();
        provider
            .expect_provide_injection()
            .returning(move |_| Ok(injected.clone()));
        provider
            .expect_outcome()
            .returning(|| BindingOutcome::Uses(GenericType::of::<i32>()));
        Arc::new(provider)
    }

    #[test]
    fn dependency_model_inject_succeeds() {
        let context = InjectionContext::for_object(module_instance(), Uses::new());
        let model = DependencyModel::new(
            descriptor(InjectionScope::Uses, GenericType::of::<i32>(), false),
            Some(provider_returning(Injected::Single(Value::new(1i32)))),
        );

        let injected = model.inject(&context).unwrap();
        assert!(matches!(injected, Injected::Single(value) if value.is::<i32>()));
        assert_eq!(model.outcome(), BindingOutcome::Uses(GenericType::of::<i32>()));
    }

    #[test]
    fn dependency_model_inject_fails_when_mandatory_value_is_absent() {
        let context = InjectionContext::for_object(module_instance(), Uses::new());
        let model = DependencyModel::new(
            descriptor(InjectionScope::Uses, GenericType::of::<AuditService>(), false),
            Some(provider_returning(Injected::Absent)),
        );

        let err = model.inject(&context).unwrap_err();
        assert!(matches!(err, InjectionError::MissingValue { .. }));
        assert!(err.to_string().contains("did you mean #[service]?"));
    }

    #[test]
    fn dependency_model_inject_succeeds_when_optional_or_iterable_is_absent() {
        let context = InjectionContext::for_object(module_instance(), Uses::new());

        let optional = DependencyModel::new(
            descriptor(InjectionScope::Service, GenericType::of::<i32>(), true),
            None,
        );
        assert!(optional.inject(&context).unwrap().is_absent());
        assert_eq!(optional.outcome(), BindingOutcome::Absent);

        let iterable = DependencyModel::new(
            descriptor(
                InjectionScope::Uses,
                GenericType::iterable(GenericType::of::<i32>()),
                false,
            ),
            Some(provider_returning(Injected::Many(Vec::new()))),
        );
        assert!(iterable.inject(&context).unwrap().is_absent());
    }

    #[test]
    fn injected_parameters_model_new_parameters_succeeds() {
        let context = InjectionContext::for_object(module_instance(), Uses::new());
        let model = InjectedParametersModel::new(vec![
            DependencyModel::new(
                descriptor(InjectionScope::Uses, GenericType::of::<i32>(), false),
                Some(provider_returning(Injected::Single(Value::new(7i32)))),
            ),
            DependencyModel::new(
                descriptor(InjectionScope::Service, GenericType::of::<String>(), true),
                None,
            ),
        ]);

        let mut values = model.new_parameters(&context).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.take::<i32>(0).unwrap(), 7);
        assert_eq!(values.take_optional::<String>(1).unwrap(), None);
    }
}
