use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use oneshot::Sender;
use parking_lot::Mutex;
use snafu::prelude::*;
use tracing::{debug, trace};

use crate::binder::BoundComposite;
use crate::injection::{InjectionError, Uses, Value};
use crate::qualifier::ServiceCandidate;
use crate::runtime::application::ApplicationRuntime;
use crate::runtime::{CircuitBreaker, CompositeInstance, ModuleInstance};
use crate::structure::{CompositeId, MetaInfo, ServiceDescriptor};
use crate::types::TypeKey;

/// Why a service can't provide its value.
#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum ServiceError {
    #[snafu(display("service {identity} depends on itself while it is being activated"))]
    #[non_exhaustive]
    CyclicActivation { identity: String },
    #[snafu(display("service {identity} fails to activate"))]
    #[non_exhaustive]
    Activation {
        identity: String,
        #[snafu(source(from(InjectionError, Box::new)))]
        source: Box<InjectionError>,
    },
    #[snafu(display("service {identity} has no view of type {ty}"))]
    #[non_exhaustive]
    NoSuchView { identity: String, ty: TypeKey },
    #[snafu(display("service {identity} is unavailable until its circuit breaker is on again"))]
    #[non_exhaustive]
    Unavailable { identity: String },
    #[snafu(display("the application owning service {identity} has been dropped"))]
    #[non_exhaustive]
    ApplicationDropped { identity: String },
    #[snafu(display("the activation of service {identity} was aborted by another thread"))]
    #[non_exhaustive]
    ActivationAborted { identity: String },
}

/// A handle to one service of a running application.
///
/// The service is activated on the first call to [`ServiceReference::get`]
/// or [`ServiceReference::activate`]. Concurrent first calls wait for the
/// thread doing the activation.
#[derive(Clone)]
pub struct ServiceReference {
    inner: Arc<ServiceInner>,
}

pub(crate) struct ServiceInner {
    composite: Arc<BoundComposite>,
    descriptor: ServiceDescriptor,
    application: Weak<ApplicationRuntime>,
    active: AtomicBool,
    breaker: Option<CircuitBreaker>,
    activation: Mutex<ActivationState>,
    graph: Arc<ActivationGraph>,
}

#[derive(Default)]
struct ActivationState {
    instance: Option<CompositeInstance>,
    constructing: Option<ConstructingServiceContext>,
}

impl ServiceReference {
    pub(crate) fn new(
        composite: Arc<BoundComposite>,
        descriptor: ServiceDescriptor,
        application: Weak<ApplicationRuntime>,
        graph: Arc<ActivationGraph>,
    ) -> Self {
        let breaker = descriptor
            .circuit_breaker()
            .map(|config| CircuitBreaker::new(descriptor.identity(), config));
        let inner = ServiceInner {
            composite,
            descriptor,
            application,
            active: AtomicBool::new(false),
            breaker,
            activation: Mutex::new(ActivationState::default()),
            graph,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> CompositeId {
        self.inner.composite.id()
    }

    pub fn identity(&self) -> &str {
        self.inner.descriptor.identity()
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.inner.descriptor
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.inner.breaker.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Returns true if the service can be used, i.e. its circuit breaker, if
    /// any, is on.
    pub fn is_available(&self) -> bool {
        self.inner.breaker.as_ref().map_or(true, CircuitBreaker::is_on)
    }

    /// Returns the view of type `ty` of the service, activating it first if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the service fails to activate or has no view of
    /// type `ty`.
    pub fn get(&self, ty: TypeKey) -> Result<Value, ServiceError> {
        let instance = self.activate()?;
        instance.view_value(ty).map_err(|_| {
            NoSuchViewSnafu {
                identity: self.identity(),
                ty,
            }
            .build()
        })
    }

    /// Activates the service if it isn't active yet and returns its
    /// composite.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unavailable, depends on itself, or
    /// any of its mixins fails to construct.
    pub fn activate(&self) -> Result<CompositeInstance, ServiceError> {
        let inner = &*self.inner;
        if let Some(breaker) = &inner.breaker {
            ensure!(
                breaker.is_on(),
                UnavailableSnafu {
                    identity: self.identity()
                }
            );
        }

        let receiver = {
            let mut state = inner.activation.lock();
            if let Some(instance) = &state.instance {
                return Ok(instance.clone());
            }
            match &mut state.constructing {
                Some(constructing) => {
                    ensure!(
                        !constructing.is_on_current_thread() && inner.graph.wait_for(self.id()),
                        CyclicActivationSnafu {
                            identity: self.identity()
                        }
                    );
                    let (sender, receiver) = oneshot::channel();
                    constructing.register_waiter(sender);
                    Some(receiver)
                }
                None => {
                    let on_thread = thread::current().id();
                    state.constructing = Some(ConstructingServiceContext::new(on_thread));
                    inner.graph.start(self.id(), on_thread);
                    None
                }
            }
        };

        if let Some(receiver) = receiver {
            trace!(service = self.identity(), "waiting for activation on another thread");
            let response = receiver.recv();
            inner.graph.stop_waiting();
            return match response {
                Ok(WaitResponse::Activated(instance)) => Ok(instance),
                Ok(WaitResponse::Error(err)) => Err(err),
                Err(_) => ActivationAbortedSnafu {
                    identity: self.identity(),
                }
                .fail(),
            };
        }

        trace!(service = self.identity(), "activating service");
        let result = self.construct();

        let constructing = {
            let mut state = inner.activation.lock();
            if let Ok(instance) = &result {
                state.instance = Some(instance.clone());
                inner.active.store(true, Ordering::Release);
            }
            inner.graph.finish(self.id());
            state.constructing.take()
        };

        let response = match &result {
            Ok(instance) => {
                if let Some(breaker) = &inner.breaker {
                    breaker.success();
                }
                debug!(service = self.identity(), "service activated");
                WaitResponse::Activated(instance.clone())
            }
            Err(err) => {
                if let Some(breaker) = &inner.breaker {
                    breaker.failure();
                }
                debug!(service = self.identity(), error = %err, "service failed to activate");
                WaitResponse::Error(err.clone())
            }
        };
        if let Some(constructing) = constructing {
            constructing.notify(response);
        }
        result
    }

    /// Drops the instance of the service. The next access activates it
    /// again.
    pub fn passivate(&self) {
        let instance = {
            let mut state = self.inner.activation.lock();
            self.inner.active.store(false, Ordering::Release);
            state.instance.take()
        };
        if instance.is_some() {
            debug!(service = self.identity(), "service passivated");
        }
    }

    fn construct(&self) -> Result<CompositeInstance, ServiceError> {
        let identity = self.identity();
        let runtime = self
            .inner
            .application
            .upgrade()
            .context(ApplicationDroppedSnafu { identity })?;
        let module = ModuleInstance::new(
            Arc::clone(runtime.model()),
            self.id().module,
            Arc::downgrade(&runtime),
        );
        CompositeInstance::new(
            module,
            Arc::clone(&self.inner.composite),
            Uses::new(),
            Vec::new(),
        )
        .context(ActivationSnafu { identity })
    }
}

impl ServiceCandidate for ServiceReference {
    fn identity(&self) -> &str {
        self.inner.descriptor.identity()
    }

    fn tags(&self) -> &[String] {
        self.inner.descriptor.tags()
    }

    fn meta_info(&self) -> &MetaInfo {
        self.inner.descriptor.meta_info()
    }

    fn is_active(&self) -> Option<bool> {
        Some(ServiceReference::is_active(self))
    }

    fn is_available(&self) -> Option<bool> {
        Some(ServiceReference::is_available(self))
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ServiceReference {}

impl Debug for ServiceReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ServiceReference")
            .field("identity", &self.identity())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

struct ConstructingServiceContext {
    on_thread: ThreadId,
    waiters: Vec<Sender<WaitResponse>>,
}

impl ConstructingServiceContext {
    fn new(on_thread: ThreadId) -> Self {
        Self {
            on_thread,
            waiters: Vec::new(),
        }
    }

    fn is_on_current_thread(&self) -> bool {
        thread::current().id() == self.on_thread
    }

    fn register_waiter(&mut self, sender: Sender<WaitResponse>) {
        self.waiters.push(sender);
    }

    fn notify(self, response: WaitResponse) {
        for sender in self.waiters {
            let _ = sender.send(response.clone());
        }
    }
}

/// Which thread activates which service of an application, and which service
/// each blocked thread waits for.
///
/// A thread may only wait for a service if following the waits from the
/// thread activating it never leads back to the waiting thread. Waits are
/// therefore always acyclic.
#[derive(Debug, Default)]
pub(crate) struct ActivationGraph {
    state: Mutex<GraphState>,
}

#[derive(Debug, Default)]
struct GraphState {
    activating: HashMap<CompositeId, ThreadId>,
    waiting: HashMap<ThreadId, CompositeId>,
}

impl ActivationGraph {
    fn start(&self, service: CompositeId, on_thread: ThreadId) {
        self.state.lock().activating.insert(service, on_thread);
    }

    fn finish(&self, service: CompositeId) {
        let mut state = self.state.lock();
        state.activating.remove(&service);
        state.waiting.retain(|_, waited| *waited != service);
    }

    /// Records that the current thread waits for `service`. Returns false
    /// without recording anything if the wait would never end.
    fn wait_for(&self, service: CompositeId) -> bool {
        let current = thread::current().id();
        let mut state = self.state.lock();

        let mut next = Some(service);
        while let Some(waited) = next {
            let Some(owner) = state.activating.get(&waited).copied() else {
                break;
            };
            if owner == current {
                return false;
            }
            next = state.waiting.get(&owner).copied();
        }

        state.waiting.insert(current, service);
        true
    }

    fn stop_waiting(&self) {
        self.state.lock().waiting.remove(&thread::current().id());
    }
}

#[derive(Clone)]
enum WaitResponse {
    Activated(CompositeInstance),
    Error(ServiceError),
}
