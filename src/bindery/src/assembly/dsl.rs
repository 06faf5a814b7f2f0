use crate::assembly::{InvalidCompositeSnafu, ModuleAssembly};
use crate::fragment::{Fragment, FragmentModel, FragmentRole};
use crate::injection::Managed;
use crate::runtime::CircuitBreakerConfig;
use crate::structure::{
    CompositeKind, CompositeModel, MetaInfo, PropertyDescriptor, ServiceDescriptor,
    StateDescriptor, Visibility,
};
use crate::types::TypeKey;

/// Declares a service whose first mixin is `F`.
pub fn service<F: Fragment>() -> CompositeDeclaration {
    CompositeDeclaration::new::<F>(CompositeKind::Service)
}

/// Declares a transient composite whose first mixin is `F`.
pub fn transient<F: Fragment>() -> CompositeDeclaration {
    CompositeDeclaration::new::<F>(CompositeKind::Transient)
}

/// Declares a value composite whose first mixin is `F`.
pub fn value<F: Fragment>() -> CompositeDeclaration {
    CompositeDeclaration::new::<F>(CompositeKind::Value)
}

/// Declares `F` as a plain object.
pub fn object<F: Fragment>() -> CompositeDeclaration {
    CompositeDeclaration::new::<F>(CompositeKind::Object)
}

/// A composite being declared, added to a module by
/// [`CompositeDeclaration::set_on`].
#[must_use = "a declaration does nothing until `set_on` is called"]
pub struct CompositeDeclaration {
    kind: CompositeKind,
    mixins: Vec<FragmentModel>,
    concerns: Vec<FragmentModel>,
    side_effects: Vec<FragmentModel>,
    visibility: Visibility,
    identity: Option<String>,
    tags: Vec<String>,
    meta: MetaInfo,
    state: StateDescriptor,
    circuit_breaker: Option<CircuitBreakerConfig>,
    instantiate_on_startup: bool,
}

impl CompositeDeclaration {
    fn new<F: Fragment>(kind: CompositeKind) -> Self {
        let role = match kind {
            CompositeKind::Object => FragmentRole::Object,
            _ => FragmentRole::Mixin,
        };
        Self {
            kind,
            mixins: vec![FragmentModel::of::<F>(role)],
            concerns: Vec::new(),
            side_effects: Vec::new(),
            visibility: Visibility::default(),
            identity: None,
            tags: Vec::new(),
            meta: MetaInfo::new(),
            state: StateDescriptor::new(),
            circuit_breaker: None,
            instantiate_on_startup: false,
        }
    }

    pub fn identified_by(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn meta_info<T: Managed + Clone>(mut self, value: T) -> Self {
        self.meta = self.meta.with(value);
        self
    }

    pub fn visible_in(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_mixin<F: Fragment>(mut self) -> Self {
        self.mixins.push(FragmentModel::of::<F>(FragmentRole::Mixin));
        self
    }

    /// Adds a concern wrapping the mixin whose output is `F::Constructed`.
    /// Concerns added first are invoked first.
    pub fn with_concern<F: Fragment>(mut self) -> Self {
        self.concerns
            .push(FragmentModel::of::<F>(FragmentRole::Concern));
        self
    }

    pub fn with_side_effect<F: Fragment>(mut self) -> Self {
        self.side_effects
            .push(FragmentModel::of::<F>(FragmentRole::SideEffect));
        self
    }

    /// Declares the property `name` holding values of type `T`.
    pub fn with_property<T: Managed>(mut self, name: impl Into<String>) -> Self {
        self.state
            .add(PropertyDescriptor::new(name, TypeKey::of::<T>()));
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Activates the service with the application instead of on first use.
    pub fn instantiate_on_startup(mut self) -> Self {
        self.instantiate_on_startup = true;
        self
    }

    /// Adds the composite to `module`, or reports why it is invalid.
    pub fn set_on(self, module: &mut ModuleAssembly) {
        let ty = self.mixins[0].output();
        match self.into_model(module) {
            Ok(composite) => module.add(composite),
            Err(reason) => {
                let error = InvalidCompositeSnafu {
                    ty,
                    module: module.name(),
                    reason,
                }
                .build();
                module.report_error(error);
            }
        }
    }

    fn into_model(self, module: &ModuleAssembly) -> Result<CompositeModel, String> {
        if self.kind == CompositeKind::Object {
            if !self.concerns.is_empty() || !self.side_effects.is_empty() {
                return Err(String::from("objects have no concerns nor side-effects"));
            }
            if self.mixins.len() > 1 {
                return Err(String::from("objects are made of a single fragment"));
            }
            if !self.state.is_empty() {
                return Err(String::from("objects have no state"));
            }
        }

        let service_only = self.identity.is_some()
            || !self.tags.is_empty()
            || self.circuit_breaker.is_some()
            || self.instantiate_on_startup;
        if self.kind != CompositeKind::Service && service_only {
            return Err(format!(
                "only services have identities, tags, circuit breakers or startup activation, \
                 but this is a {}",
                self.kind
            ));
        }

        let ty = self.mixins[0].output();
        let mut types = Vec::with_capacity(self.mixins.len());
        for mixin in &self.mixins {
            if !types.contains(&mixin.output()) {
                types.push(mixin.output());
            }
        }
        if let Some(concern) = self
            .concerns
            .iter()
            .chain(&self.side_effects)
            .find(|modifier| !types.contains(&modifier.output()))
        {
            return Err(format!(
                "{} {} modifies {} which no mixin provides",
                concern.role(),
                concern.ty(),
                concern.output()
            ));
        }

        let service = (self.kind == CompositeKind::Service).then(|| ServiceDescriptor {
            identity: self
                .identity
                .unwrap_or_else(|| module.generate_identity(ty)),
            tags: self.tags,
            meta: self.meta,
            circuit_breaker: self.circuit_breaker,
            instantiate_on_startup: self.instantiate_on_startup,
        });

        Ok(CompositeModel {
            kind: self.kind,
            ty,
            types,
            visibility: self.visibility,
            service,
            state: self.state,
            mixins: self.mixins,
            concerns: self.concerns,
            side_effects: self.side_effects,
        })
    }
}
