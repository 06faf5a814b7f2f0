use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use bindery::assembly::{object, service, transient};
use bindery::injection::InjectionError;
use bindery::prelude::*;
use bindery::runtime::{ActivationError, ServiceError};

pub trait Greeter: Send + Sync + 'static {
    fn greet(&self) -> String;
}

pub struct GreeterMixin {
    name: Property<String>,
}

impl Greeter for GreeterMixin {
    fn greet(&self) -> String {
        format!("hello, {}", self.name.get().unwrap_or_default())
    }
}

#[fragment(Arc<dyn Greeter>, Arc::new)]
impl GreeterMixin {
    #[inject]
    pub fn new(#[state] name: Property<String>) -> Self {
        Self { name }
    }
}

pub struct Exclaim {
    next: Arc<dyn Greeter>,
    method: &'static str,
}

impl Greeter for Exclaim {
    fn greet(&self) -> String {
        format!("{}! ({})", self.next.greet(), self.method)
    }
}

#[fragment(Arc<dyn Greeter>, Arc::new)]
impl Exclaim {
    #[inject]
    pub fn new(#[concern_for] next: Arc<dyn Greeter>, #[invocation] invocation: Invocation) -> Self {
        Self {
            next,
            method: invocation.method(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct CountingSideEffect {
    counter: Counter,
}

impl Greeter for CountingSideEffect {
    fn greet(&self) -> String {
        self.counter.0.fetch_add(1, Ordering::SeqCst);
        String::new()
    }
}

#[fragment(Arc<dyn Greeter>, Arc::new)]
impl CountingSideEffect {
    #[inject]
    pub fn new(#[structure] counter: Counter) -> Self {
        Self { counter }
    }
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> u64;
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        42
    }
}

#[fragment(Arc<dyn Clock>, Arc::new)]
impl FixedClock {
    #[inject]
    pub fn new(#[structure] instances: Counter) -> Self {
        instances.0.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        Self
    }
}

pub trait Ping: Send + Sync + 'static {
    fn ping(&self) -> String;
}

pub trait Pong: Send + Sync + 'static {
    fn pong(&self) -> String;
}

pub struct EagerPing {
    _pong: Arc<dyn Pong>,
}

impl Ping for EagerPing {
    fn ping(&self) -> String {
        String::from("ping")
    }
}

#[fragment(Arc<dyn Ping>, Arc::new)]
impl EagerPing {
    #[inject]
    pub fn new(#[service] pong: Arc<dyn Pong>) -> Self {
        Self { _pong: pong }
    }
}

pub struct EagerPong {
    _ping: Arc<dyn Ping>,
}

impl Pong for EagerPong {
    fn pong(&self) -> String {
        String::from("pong")
    }
}

#[fragment(Arc<dyn Pong>, Arc::new)]
impl EagerPong {
    #[inject]
    pub fn new(#[service] ping: Arc<dyn Ping>) -> Self {
        Self { _ping: ping }
    }
}

pub trait Rendezvous: Send + Sync + 'static {}

#[derive(Debug, Clone)]
pub struct Gate(Arc<Barrier>);

/// Holds its constructing thread until every party of the gate arrives.
pub struct GateMixin;

impl Rendezvous for GateMixin {}

#[fragment(Arc<dyn Rendezvous>, Arc::new)]
impl GateMixin {
    #[inject]
    pub fn new(#[structure] gate: Gate) -> Self {
        gate.0.wait();
        Self
    }
}

pub struct LazyPing {
    pong: ServiceRef<Arc<dyn Pong>>,
}

impl Ping for LazyPing {
    fn ping(&self) -> String {
        self.pong.get().map(|pong| pong.pong()).unwrap_or_default()
    }
}

#[fragment(Arc<dyn Ping>, Arc::new)]
impl LazyPing {
    #[inject]
    pub fn new(#[service] pong: ServiceRef<Arc<dyn Pong>>) -> Self {
        Self { pong }
    }
}

pub struct LazyPong {
    ping: ServiceRef<Arc<dyn Ping>>,
}

impl Pong for LazyPong {
    fn pong(&self) -> String {
        format!("pong to {}", self.ping.identity())
    }
}

#[fragment(Arc<dyn Pong>, Arc::new)]
impl LazyPong {
    #[inject]
    pub fn new(#[service] ping: ServiceRef<Arc<dyn Ping>>) -> Self {
        Self { ping }
    }
}

#[derive(Debug)]
pub struct Unreachable;

impl std::fmt::Display for Unreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "the remote clock is unreachable")
    }
}

impl Error for Unreachable {}

pub struct RemoteClock;

impl Clock for RemoteClock {
    fn now(&self) -> u64 {
        0
    }
}

#[fragment(Arc<dyn Clock>, Arc::new)]
impl RemoteClock {
    #[inject]
    pub fn new() -> Result<Self, Unreachable> {
        Err(Unreachable)
    }
}

#[derive(Clone)]
pub struct Banner {
    prefix: String,
    suffix: Option<u32>,
    clock: Option<Arc<dyn Clock>>,
}

#[fragment]
impl Banner {
    #[inject]
    pub fn new(#[uses] prefix: String, #[uses] suffix: Option<u32>) -> Self {
        Self {
            prefix,
            suffix,
            clock: None,
        }
    }

    #[inject]
    pub fn set_clock(&mut self, #[service] clock: Arc<dyn Clock>) {
        self.clock = Some(clock);
    }
}

fn single_module(declare: impl Fn(&mut ModuleAssembly) + 'static) -> ApplicationAssembly {
    let mut application = ApplicationAssembly::new("runtime");
    let domain = application.layer("domain");
    application.module(domain, "main", declare);
    application
}

fn error_chain(err: &dyn Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(err) = source {
        chain.push(err.to_string());
        source = err.source();
    }
    chain
}

#[test]
fn service_activates_lazily_once() {
    let counter = Counter::default();
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<FixedClock>().set_on(module);
    });
    assembly.structural(counter.clone());

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("main").unwrap();
    let clock = module.find_service::<Arc<dyn Clock>>().unwrap();
    assert!(!clock.is_active());
    assert_eq!(counter.count(), 0);

    assert_eq!(clock.get().unwrap().now(), 42);
    assert_eq!(clock.get().unwrap().now(), 42);
    assert!(clock.is_active());
    assert_eq!(counter.count(), 1);

    instance.passivate();
    assert!(!clock.is_active());
    assert_eq!(clock.get().unwrap().now(), 42);
    assert_eq!(counter.count(), 2);
}

#[test]
fn service_activates_once_when_used_concurrently() {
    let counter = Counter::default();
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<FixedClock>().set_on(module);
    });
    assembly.structural(counter.clone());

    let instance = assembly.bind().unwrap().activate().unwrap();
    let clock = instance
        .module("main")
        .unwrap()
        .find_service::<Arc<dyn Clock>>()
        .unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let clock = clock.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                clock.get().map(|clock| clock.now())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }
    assert_eq!(counter.count(), 1);
}

#[test]
fn application_activates_startup_services() {
    let counter = Counter::default();
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<FixedClock>().instantiate_on_startup().set_on(module);
    });
    assembly.structural(counter.clone());

    let instance = assembly.bind().unwrap().activate().unwrap();
    assert_eq!(counter.count(), 1);
    assert!(instance.services()[0].is_active());
}

#[test]
fn application_activates_every_service_when_eager() {
    let counter = Counter::default();
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<FixedClock>().identified_by("first").set_on(module);
        service::<FixedClock>().identified_by("second").set_on(module);
    });
    assembly
        .structural(counter.clone())
        .options(BindingOptions::new().with_activation(ActivationPolicy::Eager));

    let instance = assembly.bind().unwrap().activate().unwrap();
    assert_eq!(counter.count(), 2);
    assert!(instance.services().iter().all(|service| service.is_active()));
}

#[test]
fn eager_activation_fails_when_services_depend_on_each_other() {
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<EagerPing>().set_on(module);
        service::<EagerPong>().set_on(module);
    });
    assembly.options(BindingOptions::new().with_activation(ActivationPolicy::Eager));

    let err = assembly.bind().unwrap().activate().map(|_| ()).unwrap_err();
    assert!(matches!(err, ActivationError::Service { .. }));
    assert!(error_chain(&err)
        .iter()
        .any(|message| message.contains("depends on itself")));
}

#[test]
fn lazy_activation_fails_when_services_depend_on_each_other() {
    let assembly = single_module(|module: &mut ModuleAssembly| {
        service::<EagerPing>().set_on(module);
        service::<EagerPong>().set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let ping = instance
        .module("main")
        .unwrap()
        .find_service::<Arc<dyn Ping>>()
        .unwrap();
    let err = ping.get().map(|_| ()).unwrap_err();
    assert!(error_chain(&err)
        .iter()
        .any(|message| message.contains("depends on itself")));
    assert!(!ping.is_active());

    // A failed activation leaves the service ready to be activated again.
    let err = ping.get().map(|_| ()).unwrap_err();
    assert!(matches!(err, ServiceError::Activation { .. }));
}

#[test]
fn activation_fails_when_threads_wait_for_each_other() {
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<GateMixin>()
            .identified_by("ping")
            .with_mixin::<EagerPing>()
            .set_on(module);
        service::<GateMixin>()
            .identified_by("pong")
            .with_mixin::<EagerPong>()
            .set_on(module);
    });
    assembly.structural(Gate(Arc::new(Barrier::new(2))));

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("main").unwrap();
    let ping = module.find_service::<Arc<dyn Ping>>().unwrap();
    let pong = module.find_service::<Arc<dyn Pong>>().unwrap();

    let ping = thread::spawn(move || ping.get().map(|_| ()));
    let pong = thread::spawn(move || pong.get().map(|_| ()));
    for handle in [ping, pong] {
        let err = handle.join().unwrap().unwrap_err();
        assert!(error_chain(&err)
            .iter()
            .any(|message| message.contains("depends on itself")));
    }
}

#[test]
fn service_references_break_activation_cycles() {
    let assembly = single_module(|module: &mut ModuleAssembly| {
        service::<LazyPing>().identified_by("ping").set_on(module);
        service::<LazyPong>().identified_by("pong").set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let ping = instance
        .module("main")
        .unwrap()
        .find_service::<Arc<dyn Ping>>()
        .unwrap();
    assert_eq!(ping.get().unwrap().ping(), "pong to ping");
}

#[test]
fn circuit_breaker_makes_failing_service_unavailable() {
    let assembly = single_module(|module: &mut ModuleAssembly| {
        service::<RemoteClock>()
            .with_circuit_breaker(
                CircuitBreakerConfig::new()
                    .with_threshold(1)
                    .with_timeout(Duration::from_secs(60)),
            )
            .set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let clock = instance
        .module("main")
        .unwrap()
        .find_service::<Arc<dyn Clock>>()
        .unwrap();
    assert!(clock.is_available());

    let err = clock.get().map(|_| ()).unwrap_err();
    assert!(matches!(err, ServiceError::Activation { .. }));
    assert!(error_chain(&err)
        .iter()
        .any(|message| message.contains("unreachable")));
    assert!(!clock.is_available());

    let err = clock.get().map(|_| ()).unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable { .. }));
}

#[test]
fn transient_builder_sets_properties() {
    let assembly = single_module(|module: &mut ModuleAssembly| {
        transient::<GreeterMixin>()
            .with_property::<String>("name")
            .set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("main").unwrap();
    let greeter = module
        .new_transient::<Arc<dyn Greeter>>()
        .property("name", String::from("world"))
        .build()
        .unwrap();
    assert_eq!(greeter.greet(), "hello, world");

    let err = module
        .new_transient::<Arc<dyn Greeter>>()
        .property("name", 7_u32)
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, InjectionError::InvalidProperty { .. }));
}

#[test]
fn invocation_chain_applies_concerns_and_side_effects() {
    let counter = Counter::default();
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        transient::<GreeterMixin>()
            .with_property::<String>("name")
            .with_concern::<Exclaim>()
            .with_side_effect::<CountingSideEffect>()
            .set_on(module);
    });
    assembly.structural(counter.clone());

    let instance = assembly.bind().unwrap().activate().unwrap();
    let composite = instance
        .module("main")
        .unwrap()
        .new_transient::<Arc<dyn Greeter>>()
        .property("name", String::from("chain"))
        .build_composite()
        .unwrap();

    let chain = composite
        .invocation_chain::<Arc<dyn Greeter>>(Invocation::new("greet"))
        .unwrap();
    assert_eq!(chain.side_effects().len(), 1);
    assert_eq!(chain.invoke(|greeter| greeter.greet()), "hello, chain! (greet)");
    assert_eq!(counter.count(), 1);
}

#[test]
fn object_receives_used_values_and_fields() {
    let mut assembly = single_module(|module: &mut ModuleAssembly| {
        service::<FixedClock>().set_on(module);
        object::<Banner>().set_on(module);
    });
    assembly.structural(Counter::default());

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("main").unwrap();
    let banner = module
        .new_object::<Banner>(Uses::new().with(String::from(">>")))
        .unwrap();
    assert_eq!(banner.prefix, ">>");
    assert_eq!(banner.suffix, None);
    assert_eq!(banner.clock.map(|clock| clock.now()), Some(42));

    let err = module
        .new_object::<Banner>(Uses::new())
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, InjectionError::MissingUses { .. }));

    let mut detached = Banner {
        prefix: String::from("<<"),
        suffix: Some(1),
        clock: None,
    };
    module.inject_fields(&mut detached, Uses::new()).unwrap();
    assert!(detached.clock.is_some());
}

#[test]
fn module_instance_fails_after_application_is_dropped() {
    let assembly = single_module(|module: &mut ModuleAssembly| {
        transient::<GreeterMixin>()
            .with_property::<String>("name")
            .set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("main").unwrap();
    assert_eq!(module.layer().name(), "domain");
    assert!(module.application().is_some());

    drop(instance);
    assert!(module.application().is_none());
    let err = module
        .new_transient::<Arc<dyn Greeter>>()
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, InjectionError::ApplicationDropped { .. }));
}
