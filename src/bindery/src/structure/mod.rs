mod descriptor;
mod meta;
mod visibility;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::fragment::FragmentModel;
use crate::injection::Value;
use crate::options::BindingOptions;
use crate::qualifier::ServiceCandidate;
use crate::runtime::CircuitBreakerConfig;
use crate::types::{TypeHierarchy, TypeKey};

pub use descriptor::{ApplicationDescriptor, ModuleDescriptor};
pub use meta::MetaInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Addresses one composite: its module and its position in that module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeId {
    pub module: ModuleId,
    pub index: usize,
}

/// How far outside its own module a composite can be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
    #[default]
    Module,
    Layer,
    Application,
}

/// The static structure of an application: layers, modules and the
/// composites declared in them.
#[derive(Debug)]
pub struct ApplicationModel {
    name: String,
    layers: Vec<LayerModel>,
    modules: Vec<ModuleModel>,
    hierarchy: TypeHierarchy,
    structurals: Vec<Value>,
    options: BindingOptions,
}

impl ApplicationModel {
    pub(crate) fn new(
        name: String,
        layers: Vec<LayerModel>,
        modules: Vec<ModuleModel>,
        hierarchy: TypeHierarchy,
        structurals: Vec<Value>,
        options: BindingOptions,
    ) -> Self {
        Self {
            name,
            layers,
            modules,
            hierarchy,
            structurals,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[LayerModel] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerModel> {
        self.layers.get(id.0)
    }

    pub fn modules(&self) -> &[ModuleModel] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleModel> {
        self.modules.get(id.0)
    }

    pub fn module_by_name(&self, name: &str) -> Option<&ModuleModel> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn composite(&self, id: CompositeId) -> Option<&CompositeModel> {
        self.module(id.module)
            .and_then(|module| module.composites.get(id.index))
            .map(Arc::as_ref)
    }

    /// Every composite of every module, modules in declaration order.
    pub fn composites(&self) -> impl Iterator<Item = (CompositeId, &CompositeModel)> {
        self.modules.iter().flat_map(|module| {
            module
                .composites
                .iter()
                .enumerate()
                .map(move |(index, composite)| {
                    let id = CompositeId {
                        module: module.id,
                        index,
                    };
                    (id, &**composite)
                })
        })
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Application-wide singletons injectable through the structure scope.
    pub fn structurals(&self) -> &[Value] {
        &self.structurals
    }

    pub fn structural(&self, ty: TypeKey) -> Option<(usize, &Value)> {
        self.structurals
            .iter()
            .enumerate()
            .find(|(_, value)| value.type_key() == ty)
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }
}

#[derive(Debug)]
pub struct LayerModel {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) uses: Vec<LayerId>,
    pub(crate) modules: Vec<ModuleId>,
}

impl LayerModel {
    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layers whose application-visible composites this layer can see.
    pub fn uses(&self) -> &[LayerId] {
        &self.uses
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }
}

#[derive(Debug)]
pub struct ModuleModel {
    pub(crate) id: ModuleId,
    pub(crate) name: String,
    pub(crate) layer: LayerId,
    pub(crate) composites: Vec<Arc<CompositeModel>>,
}

impl ModuleModel {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn composites(&self) -> &[Arc<CompositeModel>] {
        &self.composites
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Service,
    Transient,
    Value,
    Object,
}

impl Display for CompositeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Service => write!(f, "service"),
            Self::Transient => write!(f, "transient"),
            Self::Value => write!(f, "value"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A composite: the types it exposes and the fragments implementing them.
///
/// An object is modelled as a composite of exactly one fragment.
#[derive(Debug)]
pub struct CompositeModel {
    pub(crate) kind: CompositeKind,
    pub(crate) ty: TypeKey,
    pub(crate) types: Vec<TypeKey>,
    pub(crate) visibility: Visibility,
    pub(crate) service: Option<ServiceDescriptor>,
    pub(crate) state: StateDescriptor,
    pub(crate) mixins: Vec<FragmentModel>,
    pub(crate) concerns: Vec<FragmentModel>,
    pub(crate) side_effects: Vec<FragmentModel>,
}

impl CompositeModel {
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    /// The primary type, i.e. the output of the first mixin.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn types(&self) -> &[TypeKey] {
        &self.types
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn service(&self) -> Option<&ServiceDescriptor> {
        self.service.as_ref()
    }

    pub fn state(&self) -> &StateDescriptor {
        &self.state
    }

    pub fn mixins(&self) -> &[FragmentModel] {
        &self.mixins
    }

    pub fn concerns(&self) -> &[FragmentModel] {
        &self.concerns
    }

    pub fn side_effects(&self) -> &[FragmentModel] {
        &self.side_effects
    }

    pub fn fragments(&self) -> impl Iterator<Item = &FragmentModel> {
        self.mixins
            .iter()
            .chain(&self.concerns)
            .chain(&self.side_effects)
    }

    /// Returns true if some exposed type is assignable to `ty`.
    pub fn exposes(&self, ty: TypeKey, hierarchy: &TypeHierarchy) -> bool {
        self.types.iter().any(|t| hierarchy.is_assignable(*t, ty))
    }
}

/// The identity and metadata of a service composite.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub(crate) identity: String,
    pub(crate) tags: Vec<String>,
    pub(crate) meta: MetaInfo,
    pub(crate) circuit_breaker: Option<CircuitBreakerConfig>,
    pub(crate) instantiate_on_startup: bool,
}

impl ServiceDescriptor {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn circuit_breaker(&self) -> Option<CircuitBreakerConfig> {
        self.circuit_breaker
    }

    pub fn instantiate_on_startup(&self) -> bool {
        self.instantiate_on_startup
    }
}

impl ServiceCandidate for ServiceDescriptor {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn meta_info(&self) -> &MetaInfo {
        &self.meta
    }

    fn is_active(&self) -> Option<bool> {
        None
    }

    fn is_available(&self) -> Option<bool> {
        None
    }
}

/// The properties a composite declares.
#[derive(Debug, Clone, Default)]
pub struct StateDescriptor {
    properties: Vec<PropertyDescriptor>,
}

impl StateDescriptor {
    pub fn new() -> Self {
        Default::default()
    }

    pub(crate) fn add(&mut self, property: PropertyDescriptor) {
        self.properties.retain(|p| p.name != property.name);
        self.properties.push(property);
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    ty: TypeKey,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeKey) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }
}
