mod dsl;
mod error;

use std::collections::HashSet;
use std::sync::Arc;

use snafu::IntoError;
use tracing::debug;

use crate::binder::{Application, Binder};
use crate::injection::{BoxError, Managed, Value};
use crate::options::BindingOptions;
use crate::structure::{
    ApplicationModel, CompositeModel, LayerId, LayerModel, ModuleId, ModuleModel,
};
use crate::types::{TypeDeclaration, TypeHierarchy, TypeKey};

pub use dsl::{object, service, transient, value, CompositeDeclaration};
pub use error::AssemblyError;
pub(crate) use error::{
    AssemblerInnerSnafu, CyclicLayersSnafu, DuplicatedIdentitySnafu, InvalidCompositeSnafu,
    UnknownLayerSnafu,
};

/// Declares the composites of one module.
///
/// Closures taking a `&mut ModuleAssembly` are assemblers too, so small
/// modules can be set up inline:
///
/// ```rust
/// # use std::convert::Infallible;
/// # use std::sync::Arc;
/// # use bindery::assembly::{self, ApplicationAssembly, ModuleAssembly};
/// # use bindery::dependency::FragmentDeclaration;
/// # use bindery::fragment::Fragment;
/// # use bindery::injection::{InjectedValues, InjectionError};
/// #
/// struct Clock;
///
/// impl Fragment for Clock {
///     type Constructed = Arc<Clock>;
///
///     type Error = Infallible;
///
///     fn injection_points() -> FragmentDeclaration {
///         FragmentDeclaration::new()
///     }
///
///     fn construct(
///         _values: &mut InjectedValues,
///     ) -> Result<Result<Self, Self::Error>, InjectionError> {
///         Ok(Ok(Clock))
///     }
///
///     fn post_process(self) -> Self::Constructed {
///         Arc::new(self)
///     }
/// }
///
/// let mut application = ApplicationAssembly::new("shop");
/// let domain = application.layer("domain");
/// application.module(domain, "time", |module: &mut ModuleAssembly| {
///     assembly::service::<Clock>().set_on(module);
/// });
/// assert!(application.bind().is_ok());
/// ```
pub trait Assembler: 'static {
    fn setup(&self, module: &mut ModuleAssembly) {
        if let Err(err) = self.assemble(module) {
            module.report_assembler_error(std::any::type_name::<Self>(), err);
        }
    }

    fn assemble(&self, module: &mut ModuleAssembly) -> Result<(), BoxError>;
}

impl<F> Assembler for F
where
    F: Fn(&mut ModuleAssembly) + 'static,
{
    fn assemble(&self, module: &mut ModuleAssembly) -> Result<(), BoxError> {
        self(module);
        Ok(())
    }
}

/// Several assemblers applied to the same module, in order.
#[derive(Default)]
pub struct Configuration {
    assemblers: Vec<Box<dyn Assembler>>,
}

impl Configuration {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with<A: Assembler>(mut self, assembler: A) -> Self {
        self.assemblers.push(Box::new(assembler));
        self
    }

    pub fn compose(mut self, mut other: Configuration) -> Self {
        self.assemblers.append(&mut other.assemblers);
        self
    }
}

impl Assembler for Configuration {
    fn assemble(&self, module: &mut ModuleAssembly) -> Result<(), BoxError> {
        self.assemblers
            .iter()
            .for_each(|assembler| assembler.setup(module));
        Ok(())
    }
}

/// The composites declared in one module so far.
pub struct ModuleAssembly {
    id: ModuleId,
    name: String,
    layer: LayerId,
    composites: Vec<CompositeModel>,
    errors: Vec<AssemblyError>,
}

impl ModuleAssembly {
    fn new(id: ModuleId, name: String, layer: LayerId) -> Self {
        Self {
            id,
            name,
            layer,
            composites: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn composites(&self) -> &[CompositeModel] {
        &self.composites
    }

    pub fn report_assembler_error(&mut self, assembler: &'static str, err: BoxError) {
        let error = AssemblerInnerSnafu {
            assembler,
            module: self.name.clone(),
        }
        .into_error(err);
        self.report_error(error);
    }

    pub(crate) fn report_error(&mut self, error: AssemblyError) {
        debug!(module = %self.name, %error, "assembly error reported");
        self.errors.push(error);
    }

    pub(crate) fn add(&mut self, composite: CompositeModel) {
        if let Some(service) = composite.service() {
            let identity = service.identity();
            let duplicated = self
                .composites
                .iter()
                .filter_map(CompositeModel::service)
                .any(|declared| declared.identity() == identity);
            if duplicated {
                let error = DuplicatedIdentitySnafu {
                    identity,
                    module: self.name.clone(),
                }
                .build();
                self.report_error(error);
                return;
            }
        }
        self.composites.push(composite);
    }

    /// An identity not yet taken in this module: the simple name of `ty`,
    /// suffixed with `_1`, `_2`... if it is.
    pub(crate) fn generate_identity(&self, ty: TypeKey) -> String {
        let base = default_identity(ty);
        let taken = |identity: &str| {
            self.composites
                .iter()
                .filter_map(CompositeModel::service)
                .any(|service| service.identity() == identity)
        };

        let mut identity = base.clone();
        let mut index = 0;
        while taken(&identity) {
            index += 1;
            identity = format!("{base}_{index}");
        }
        identity
    }
}

const WRAPPER_NAMES: &[&str] = &["Arc", "Box", "Rc", "dyn"];

fn default_identity(ty: TypeKey) -> String {
    let name = ty.simple_name();
    name.split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .find(|token| !token.is_empty() && !WRAPPER_NAMES.contains(token))
        .unwrap_or(name.as_str())
        .to_owned()
}

struct LayerAssembly {
    name: String,
    uses: Vec<LayerId>,
    modules: Vec<ModuleId>,
}

/// The input of binding: layers, their modules, and application-wide
/// declarations.
pub struct ApplicationAssembly {
    name: String,
    layers: Vec<LayerAssembly>,
    modules: Vec<ModuleAssembly>,
    hierarchy: TypeHierarchy,
    structurals: Vec<Value>,
    options: BindingOptions,
    errors: Vec<AssemblyError>,
}

impl ApplicationAssembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            modules: Vec::new(),
            hierarchy: TypeHierarchy::new(),
            structurals: Vec::new(),
            options: BindingOptions::new(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = LayerId(self.layers.len());
        self.layers.push(LayerAssembly {
            name: name.into(),
            uses: Vec::new(),
            modules: Vec::new(),
        });
        id
    }

    /// Lets `layer` see the application-visible composites of `used`.
    pub fn uses(&mut self, layer: LayerId, used: LayerId) -> &mut Self {
        if used.0 >= self.layers.len() {
            let error = UnknownLayerSnafu {
                index: used.0,
                context: String::from("a layer use"),
            }
            .build();
            self.errors.push(error);
            return self;
        }
        match self.layers.get_mut(layer.0) {
            Some(layer) if !layer.uses.contains(&used) => layer.uses.push(used),
            Some(_) => {}
            None => self.errors.push(
                UnknownLayerSnafu {
                    index: layer.0,
                    context: String::from("a layer use"),
                }
                .build(),
            ),
        }
        self
    }

    /// Adds a module to `layer` and lets `assembler` declare its composites.
    pub fn module<A>(&mut self, layer: LayerId, name: impl Into<String>, assembler: A) -> ModuleId
    where
        A: Assembler,
    {
        let id = ModuleId(self.modules.len());
        let mut module = ModuleAssembly::new(id, name.into(), layer);
        match self.layers.get_mut(layer.0) {
            Some(layer) => layer.modules.push(id),
            None => {
                let error = UnknownLayerSnafu {
                    index: layer.0,
                    context: format!("module {}", module.name),
                }
                .build();
                self.errors.push(error);
            }
        }
        assembler.setup(&mut module);
        self.modules.push(module);
        id
    }

    pub fn options(&mut self, options: BindingOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Declares the type parameters and supertypes of a type, see
    /// [`TypeDeclaration`].
    pub fn declare_type(&mut self, declaration: TypeDeclaration) -> &mut Self {
        self.hierarchy.declare(declaration);
        self
    }

    pub fn hierarchy_mut(&mut self) -> &mut TypeHierarchy {
        &mut self.hierarchy
    }

    /// Registers an application-wide singleton injectable with
    /// `#[structure]`, replacing any previous one of the same type.
    pub fn structural<T: Managed>(&mut self, value: T) -> &mut Self {
        let value = Value::new(value);
        self.structurals
            .retain(|registered| registered.type_key() != value.type_key());
        self.structurals.push(value);
        self
    }

    /// Validates the assembly and builds the static model.
    ///
    /// # Errors
    ///
    /// Returns every error reported while assembling, aggregated if there is
    /// more than one.
    pub fn build(self) -> Result<ApplicationModel, AssemblyError> {
        let mut errors = self.errors;
        errors.extend(cyclic_layers(&self.layers));

        let mut modules = Vec::with_capacity(self.modules.len());
        for module in self.modules {
            errors.extend(module.errors);
            modules.push(ModuleModel {
                id: module.id,
                name: module.name,
                layer: module.layer,
                composites: module.composites.into_iter().map(Arc::new).collect(),
            });
        }

        if let Some(error) = AssemblyError::aggregate(errors) {
            return Err(error);
        }

        let layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, layer)| LayerModel {
                id: LayerId(index),
                name: layer.name,
                uses: layer.uses,
                modules: layer.modules,
            })
            .collect::<Vec<_>>();

        debug!(
            application = %self.name,
            layers = layers.len(),
            modules = modules.len(),
            "application assembled"
        );
        Ok(ApplicationModel::new(
            self.name,
            layers,
            modules,
            self.hierarchy,
            self.structurals,
            self.options,
        ))
    }

    /// Builds the model and binds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembly is invalid or any injection point
    /// can't be bound.
    pub fn bind(self) -> Result<Application, AssemblyError> {
        let model = self.build()?;
        Binder::new().bind(Arc::new(model))
    }
}

fn cyclic_layers(layers: &[LayerAssembly]) -> Vec<AssemblyError> {
    let reaches_itself = |start: usize| {
        let mut visited = HashSet::new();
        let mut pending: Vec<_> = layers[start].uses.iter().map(|id| id.0).collect();
        while let Some(index) = pending.pop() {
            if index == start {
                return true;
            }
            if visited.insert(index) {
                if let Some(layer) = layers.get(index) {
                    pending.extend(layer.uses.iter().map(|id| id.0));
                }
            }
        }
        false
    };

    (0..layers.len())
        .filter(|index| reaches_itself(*index))
        .map(|index| {
            CyclicLayersSnafu {
                layer: layers[index].name.clone(),
            }
            .build()
        })
        .collect()
}
