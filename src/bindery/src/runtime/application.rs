use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Weak};

use snafu::prelude::*;
use tracing::{debug, info};

use crate::binder::Application;
use crate::injection::Managed;
use crate::options::ActivationPolicy;
use crate::runtime::service::ActivationGraph;
use crate::runtime::{ModuleInstance, ServiceError, ServiceReference};
use crate::structure::{ApplicationDescriptor, ApplicationModel, CompositeId, LayerId, ModuleId};
use crate::types::TypeKey;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ActivationError {
    #[snafu(display("service {identity} fails to activate on startup"))]
    #[non_exhaustive]
    Service {
        identity: String,
        source: ServiceError,
    },
}

/// What a running application owns: its bound composites and one reference
/// per service.
pub(crate) struct ApplicationRuntime {
    application: Application,
    services: Vec<Vec<Option<ServiceReference>>>,
}

impl ApplicationRuntime {
    fn new(application: Application, this: &Weak<ApplicationRuntime>) -> Self {
        let model = Arc::clone(application.model());
        let graph = Arc::new(ActivationGraph::default());
        let services = model
            .modules()
            .iter()
            .map(|module| {
                module
                    .composites()
                    .iter()
                    .enumerate()
                    .map(|(index, composite)| {
                        let id = CompositeId {
                            module: module.id(),
                            index,
                        };
                        let descriptor = composite.service()?.clone();
                        let bound = application.composite(id)?;
                        Some(ServiceReference::new(
                            Arc::clone(bound),
                            descriptor,
                            Weak::clone(this),
                            Arc::clone(&graph),
                        ))
                    })
                    .collect()
            })
            .collect();
        Self {
            application,
            services,
        }
    }

    pub(crate) fn model(&self) -> &Arc<ApplicationModel> {
        self.application.model()
    }

    pub(crate) fn application(&self) -> &Application {
        &self.application
    }

    fn service(&self, id: CompositeId) -> Option<&ServiceReference> {
        self.services
            .get(id.module.index())
            .and_then(|module| module.get(id.index))
            .and_then(Option::as_ref)
    }

    fn services(&self) -> impl Iterator<Item = &ServiceReference> {
        self.services.iter().flatten().flatten()
    }
}

impl Drop for ApplicationRuntime {
    fn drop(&mut self) {
        // Mixins may hold references to other services, which keep their
        // instances alive.
        for service in self.services() {
            service.passivate();
        }
    }
}

impl Application {
    /// Starts the application.
    ///
    /// Services declared with `instantiate_on_startup` are activated now, or
    /// every service under [`ActivationPolicy::Eager`]. The others are
    /// activated on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a service activated on startup fails to activate.
    pub fn activate(self) -> Result<ApplicationInstance, ActivationError> {
        let eager = self.model().options().activation == ActivationPolicy::Eager;
        let runtime = Arc::new_cyclic(|this| ApplicationRuntime::new(self, this));
        let instance = ApplicationInstance { runtime };

        for service in instance.runtime.services() {
            if eager || service.descriptor().instantiate_on_startup() {
                service.activate().context(ServiceSnafu {
                    identity: service.identity(),
                })?;
            }
        }

        info!(
            application = instance.name(),
            services = instance.runtime.services().count(),
            "application activated"
        );
        Ok(instance)
    }
}

/// A running application.
///
/// The application lives as long as any clone of its instance. Modules,
/// services and composites only refer to it weakly.
#[derive(Clone)]
pub struct ApplicationInstance {
    runtime: Arc<ApplicationRuntime>,
}

impl ApplicationInstance {
    pub(crate) fn from_runtime(runtime: Arc<ApplicationRuntime>) -> Self {
        Self { runtime }
    }

    pub fn name(&self) -> &str {
        self.model().name()
    }

    pub fn model(&self) -> &Arc<ApplicationModel> {
        self.runtime.model()
    }

    pub fn descriptor(&self) -> ApplicationDescriptor {
        ApplicationDescriptor::new(Arc::clone(self.model()))
    }

    pub fn layers(&self) -> Vec<LayerInstance> {
        self.model()
            .layers()
            .iter()
            .map(|layer| {
                LayerInstance::new(
                    Arc::clone(self.model()),
                    layer.id(),
                    Arc::downgrade(&self.runtime),
                )
            })
            .collect()
    }

    pub fn modules(&self) -> Vec<ModuleInstance> {
        self.model()
            .modules()
            .iter()
            .map(|module| self.module_by_id(module.id()))
            .collect()
    }

    pub fn module(&self, name: &str) -> Option<ModuleInstance> {
        self.model()
            .module_by_name(name)
            .map(|module| self.module_by_id(module.id()))
    }

    pub fn module_by_id(&self, id: ModuleId) -> ModuleInstance {
        ModuleInstance::new(Arc::clone(self.model()), id, Arc::downgrade(&self.runtime))
    }

    pub fn service(&self, id: CompositeId) -> Option<ServiceReference> {
        self.runtime.service(id).cloned()
    }

    /// Every service of the application, in declaration order.
    pub fn services(&self) -> Vec<ServiceReference> {
        self.runtime.services().cloned().collect()
    }

    /// The structural value registered while assembling, by type.
    pub fn structural<T: Managed + Clone>(&self) -> Option<T> {
        self.model()
            .structural(TypeKey::of::<T>())
            .and_then(|(_, value)| value.downcast::<T>())
    }

    /// Passivates every active service. The application stays usable and
    /// activates services again on demand.
    pub fn passivate(&self) {
        for service in self.runtime.services() {
            service.passivate();
        }
        debug!(application = self.name(), "application passivated");
    }
}

impl PartialEq for ApplicationInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.runtime, &other.runtime)
    }
}

impl Eq for ApplicationInstance {}

impl Debug for ApplicationInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ApplicationInstance")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// One layer of a running application.
#[derive(Clone)]
pub struct LayerInstance {
    model: Arc<ApplicationModel>,
    id: LayerId,
    runtime: Weak<ApplicationRuntime>,
}

impl LayerInstance {
    pub(crate) fn new(
        model: Arc<ApplicationModel>,
        id: LayerId,
        runtime: Weak<ApplicationRuntime>,
    ) -> Self {
        Self { model, id, runtime }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.model.layer(self.id).map_or("", |layer| layer.name())
    }

    pub fn modules(&self) -> Vec<ModuleInstance> {
        self.model
            .layer(self.id)
            .map(|layer| layer.modules())
            .unwrap_or_default()
            .iter()
            .map(|id| ModuleInstance::new(Arc::clone(&self.model), *id, Weak::clone(&self.runtime)))
            .collect()
    }

    /// The layers this one uses directly.
    pub fn uses(&self) -> Vec<LayerInstance> {
        self.model
            .layer(self.id)
            .map(|layer| layer.uses())
            .unwrap_or_default()
            .iter()
            .map(|id| Self::new(Arc::clone(&self.model), *id, Weak::clone(&self.runtime)))
            .collect()
    }
}

impl Debug for LayerInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LayerInstance")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
