mod application;
mod circuit_breaker;
mod composite;
mod module;
mod service;

pub use application::{ActivationError, ApplicationInstance, LayerInstance};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use composite::{CompositeInstance, InvocationChain, WeakComposite};
pub use module::{ModuleInstance, TransientBuilder};
pub use service::{ServiceError, ServiceReference};
pub(crate) use service::NoSuchViewSnafu;
