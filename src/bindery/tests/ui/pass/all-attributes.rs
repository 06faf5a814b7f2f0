use std::sync::Arc;

use bindery::dependency::InjectionScope;
use bindery::fragment::Fragment;
use bindery::prelude::*;
use bindery::qualifier::{first, first_of, with_tags};

pub trait Store: Send + Sync + 'static {}

pub trait Document: Send + Sync + 'static {}

#[derive(Debug, Clone)]
pub struct Clock;

pub struct Test {
    _store: Arc<dyn Store>,
}

impl Document for Test {}

#[fragment(Arc<dyn Document>, Arc::new)]
impl Test {
    #[inject]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        #[service] store: Arc<dyn Store>,
        #[service]
        #[optional]
        #[tagged("primary", "local")]
        _primary: Option<ServiceRef<Arc<dyn Store>>>,
        #[service]
        #[identified_by("archive")]
        #[available]
        _archive: Option<Arc<dyn Store>>,
        #[service]
        #[active]
        _active: Vec<Arc<dyn Store>>,
        #[service]
        #[qualified(first_of([with_tags(["fast"]), first()]))]
        _fast: ServiceRef<Arc<dyn Store>>,
        #[structure] _clock: Clock,
        #[this] _this: This<Arc<dyn Document>>,
        #[uses] _title: Option<String>,
        #[state] _state: StateHolder,
        #[state("body")] _body: Property<String>,
    ) -> Self {
        Self { _store: store }
    }

    #[inject]
    pub fn set_clock(&mut self, #[structure] _clock: Clock) {}
}

#[derive(Clone)]
pub struct Audit;

#[fragment]
impl Audit {
    #[inject]
    pub fn new(#[concern_for] _next: Arc<dyn Document>, #[invocation] _invocation: Invocation) -> Self {
        Self
    }
}

fn main() {
    let declaration = Test::injection_points();
    assert_eq!(declaration.constructor().len(), 10);
    assert_eq!(declaration.fields().len(), 1);

    let scopes: Vec<_> = declaration
        .constructor()
        .iter()
        .map(|dependency| dependency.scope())
        .collect();
    assert_eq!(
        scopes,
        [
            InjectionScope::Service,
            InjectionScope::Service,
            InjectionScope::Service,
            InjectionScope::Service,
            InjectionScope::Service,
            InjectionScope::Structure,
            InjectionScope::This,
            InjectionScope::Uses,
            InjectionScope::State,
            InjectionScope::State,
        ]
    );

    let constructor = declaration.constructor();
    assert!(!constructor[0].is_optional());
    assert!(constructor[1].is_optional());
    assert_eq!(constructor[1].qualifiers().len(), 1);
    assert_eq!(constructor[2].qualifiers().len(), 2);
    assert!(constructor[7].is_optional());
    assert_eq!(constructor[9].property(), Some("body"));
    assert_eq!(constructor[8].property(), None);

    let audit = Audit::injection_points();
    assert_eq!(audit.constructor()[0].scope(), InjectionScope::ConcernFor);
    assert_eq!(audit.constructor()[1].scope(), InjectionScope::Invocation);
}
