use std::convert::Infallible;
use std::sync::Arc;

use bindery::assembly::{object, service, transient};
use bindery::binder::{Binder, BindingError, BindingOutcome};
use bindery::dependency::{DependencyDeclaration, FragmentDeclaration, InjectionScope};
use bindery::injection::{InjectedValues, InjectionError};
use bindery::prelude::*;
use bindery::qualifier::{first, first_of, with_tags};
use bindery::types::GenericType;

pub trait Repository: Send + Sync + 'static {
    fn kind(&self) -> &'static str;
}

pub struct SqlRepository;

impl Repository for SqlRepository {
    fn kind(&self) -> &'static str {
        "sql"
    }
}

#[fragment(Arc<dyn Repository>, Arc::new)]
impl SqlRepository {
    #[inject]
    pub fn new() -> Self {
        Self
    }
}

pub trait Catalog: Send + Sync + 'static {
    fn repository(&self) -> Option<String>;
}

pub struct CatalogMixin {
    repository: Option<ServiceRef<Arc<dyn Repository>>>,
}

impl Catalog for CatalogMixin {
    fn repository(&self) -> Option<String> {
        self.repository
            .as_ref()
            .map(|repository| repository.identity().to_owned())
    }
}

#[fragment(Arc<dyn Catalog>, Arc::new)]
impl CatalogMixin {
    #[inject]
    pub fn new(
        #[service]
        #[qualified(first_of([with_tags(["fast"]), first()]))]
        repository: Option<ServiceRef<Arc<dyn Repository>>>,
    ) -> Self {
        Self { repository }
    }
}

pub struct StrictCatalog {
    repository: Arc<dyn Repository>,
}

impl Catalog for StrictCatalog {
    fn repository(&self) -> Option<String> {
        Some(self.repository.kind().to_owned())
    }
}

#[fragment(Arc<dyn Catalog>, Arc::new)]
impl StrictCatalog {
    #[inject]
    pub fn new(#[service] repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitOfWorkFactory {
    pub name: &'static str,
}

#[derive(Clone)]
pub struct Reporter {
    factory: UnitOfWorkFactory,
}

#[fragment]
impl Reporter {
    #[inject]
    pub fn new(#[structure] factory: UnitOfWorkFactory) -> Self {
        Self { factory }
    }
}

pub trait Ledger: Send + Sync + 'static {}

pub trait Journal: Send + Sync + 'static {}

/// Declares a point typed by a variable that no declared type binds.
#[derive(Clone)]
pub struct LedgerReport;

impl Fragment for LedgerReport {
    type Constructed = Self;

    type Error = Infallible;

    fn injection_points() -> FragmentDeclaration {
        FragmentDeclaration::new()
            .parameter(DependencyDeclaration::new(
                InjectionScope::Service,
                "unbound",
                GenericType::variable::<dyn Ledger>("T"),
            ))
            .parameter(DependencyDeclaration::new(
                InjectionScope::Service,
                "journal",
                GenericType::of::<Arc<dyn Journal>>(),
            ))
    }

    fn construct(
        _values: &mut InjectedValues,
    ) -> Result<Result<Self, Self::Error>, InjectionError> {
        Ok(Ok(Self))
    }

    fn post_process(self) -> Self::Constructed {
        self
    }
}

fn application(declare: impl Fn(&mut ModuleAssembly) + 'static) -> ApplicationAssembly {
    let mut application = ApplicationAssembly::new("shop");
    let domain = application.layer("domain");
    application.module(domain, "catalog", declare);
    application
}

#[test]
fn binding_fails_when_mandatory_service_is_missing() {
    let assembly = application(|module: &mut ModuleAssembly| {
        service::<StrictCatalog>().set_on(module);
    });

    let Err(AssemblyError::Binding { failures, .. }) = assembly.bind() else {
        panic!("binding should fail");
    };
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].error, BindingError::NoCandidates { .. }));

    let message = failures[0].to_string();
    assert!(message.contains("StrictCatalog"));
    assert!(message.contains("repository"));
}

#[test]
fn binding_reports_every_failing_point_of_every_fragment() {
    let assembly = application(|module: &mut ModuleAssembly| {
        object::<LedgerReport>().set_on(module);
        service::<StrictCatalog>().set_on(module);
    });

    let Err(AssemblyError::Binding { failures, .. }) = assembly.bind() else {
        panic!("binding should fail");
    };
    let mut points: Vec<_> = failures
        .iter()
        .map(|failure| (failure.fragment.to_string(), failure.point.name()))
        .collect();
    points.sort();
    assert_eq!(
        points,
        [
            (String::from("LedgerReport"), "journal"),
            (String::from("LedgerReport"), "unbound"),
            (String::from("StrictCatalog"), "repository"),
        ]
    );
    assert!(failures
        .iter()
        .any(|failure| matches!(failure.error, BindingError::UnresolvedType { .. })));
    assert_eq!(
        failures
            .iter()
            .filter(|failure| matches!(failure.error, BindingError::NoCandidates { .. }))
            .count(),
        2
    );
}

#[test]
fn binding_injects_none_when_optional_service_is_missing() {
    let assembly = application(|module: &mut ModuleAssembly| {
        service::<CatalogMixin>().set_on(module);
    });

    let application = assembly.bind().unwrap();
    let (_, _, _, outcome) = &application.outcomes()[0];
    assert_eq!(*outcome, BindingOutcome::Absent);

    let instance = application.activate().unwrap();
    let module = instance.module("catalog").unwrap();
    let catalog = module.find_service::<Arc<dyn Catalog>>().unwrap();
    assert_eq!(catalog.get().unwrap().repository(), None);
}

#[test]
fn binding_selects_first_satisfiable_qualifier_branch() {
    let assembly = application(|module: &mut ModuleAssembly| {
        service::<SqlRepository>()
            .identified_by("svc1")
            .tagged(["fast"])
            .set_on(module);
        service::<SqlRepository>()
            .identified_by("svc2")
            .set_on(module);
        service::<CatalogMixin>().set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("catalog").unwrap();
    let catalog = module.find_service::<Arc<dyn Catalog>>().unwrap();
    assert_eq!(catalog.get().unwrap().repository().as_deref(), Some("svc1"));
}

#[test]
fn binding_falls_back_to_first_service_without_tags() {
    let assembly = application(|module: &mut ModuleAssembly| {
        service::<SqlRepository>()
            .identified_by("svc1")
            .set_on(module);
        service::<SqlRepository>()
            .identified_by("svc2")
            .tagged(["slow"])
            .set_on(module);
        service::<CatalogMixin>().set_on(module);
    });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("catalog").unwrap();
    let catalog = module.find_service::<Arc<dyn Catalog>>().unwrap();
    assert_eq!(catalog.get().unwrap().repository().as_deref(), Some("svc1"));
}

#[test]
fn binding_same_model_twice_yields_equal_outcomes() {
    let assembly = application(|module: &mut ModuleAssembly| {
        service::<SqlRepository>()
            .identified_by("svc1")
            .set_on(module);
        service::<SqlRepository>()
            .identified_by("svc2")
            .tagged(["fast"])
            .set_on(module);
        service::<CatalogMixin>().set_on(module);
        service::<StrictCatalog>().set_on(module);
    });
    let model = Arc::new(assembly.build().unwrap());

    let first = Binder::new().bind(Arc::clone(&model)).unwrap();
    let second = Binder::new().bind(model).unwrap();
    assert_eq!(first.outcomes(), second.outcomes());

    let selected: Vec<_> = first
        .outcomes()
        .into_iter()
        .filter_map(|(_, _, _, outcome)| match outcome {
            BindingOutcome::Services { candidates, .. } => Some(candidates[0].identity.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(selected, ["svc2", "svc1"]);
}

#[test]
fn binding_fails_when_single_reference_is_ambiguous_and_rejected() {
    let mut assembly = application(|module: &mut ModuleAssembly| {
        service::<SqlRepository>()
            .identified_by("svc1")
            .set_on(module);
        service::<SqlRepository>()
            .identified_by("svc2")
            .set_on(module);
        service::<StrictCatalog>().set_on(module);
    });
    assembly.options(BindingOptions::new().with_ambiguity(AmbiguityPolicy::Reject));

    let Err(AssemblyError::Binding { failures, .. }) = assembly.bind() else {
        panic!("binding should fail");
    };
    assert!(matches!(
        &failures[0].error,
        BindingError::Ambiguous { identities, .. } if identities == &["svc1", "svc2"]
    ));
}

#[test]
fn binding_injects_structural_singleton() {
    let mut assembly = application(|module: &mut ModuleAssembly| {
        object::<Reporter>().set_on(module);
    });
    assembly.structural(UnitOfWorkFactory { name: "memory" });

    let instance = assembly.bind().unwrap().activate().unwrap();
    let module = instance.module("catalog").unwrap();
    let reporter = module.new_object::<Reporter>(Uses::new()).unwrap();
    assert_eq!(reporter.factory, UnitOfWorkFactory { name: "memory" });
}

#[test]
fn binding_fails_when_structural_singleton_is_missing() {
    let assembly = application(|module: &mut ModuleAssembly| {
        object::<Reporter>().set_on(module);
    });

    let Err(AssemblyError::Binding { failures, .. }) = assembly.bind() else {
        panic!("binding should fail");
    };
    assert!(matches!(
        failures[0].error,
        BindingError::UnknownStructure { .. }
    ));

    let message = failures[0].to_string();
    assert!(message.contains("factory"));
    assert!(message.contains("Reporter"));
}

#[test]
fn binding_respects_module_visibility() {
    let mut assembly = ApplicationAssembly::new("shop");
    let infrastructure = assembly.layer("infrastructure");
    let domain = assembly.layer("domain");
    assembly.uses(domain, infrastructure);
    assembly.module(infrastructure, "storage", |module: &mut ModuleAssembly| {
        service::<SqlRepository>()
            .identified_by("hidden")
            .set_on(module);
        service::<SqlRepository>()
            .identified_by("shared")
            .visible_in(Visibility::Application)
            .set_on(module);
    });
    assembly.module(domain, "catalog", |module: &mut ModuleAssembly| {
        transient::<StrictCatalog>().set_on(module);
    });

    let application = assembly.bind().unwrap();
    let candidates: Vec<_> = application
        .outcomes()
        .into_iter()
        .filter_map(|(_, _, _, outcome)| match outcome {
            BindingOutcome::Services { candidates, .. } => Some(candidates),
            _ => None,
        })
        .flatten()
        .map(|candidate| candidate.identity)
        .collect();
    assert_eq!(candidates, ["shared"]);
}
