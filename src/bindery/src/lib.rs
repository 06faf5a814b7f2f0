#![allow(clippy::new_without_default)]

extern crate self as bindery;

pub mod assembly;
pub mod binder;
pub mod dependency;
pub mod fragment;
pub mod injection;
pub mod options;
pub mod qualifier;
pub mod runtime;
pub mod structure;
pub mod types;
mod util;

pub use bindery_derive::fragment;

pub mod prelude {
    pub use crate::assembly::{
        self, ApplicationAssembly, Assembler, AssemblyError, Configuration, ModuleAssembly,
    };
    pub use crate::binder::Application;
    pub use crate::fragment;
    pub use crate::fragment::Fragment;
    pub use crate::injection::{
        InjectionError, Invocation, Property, ServiceRef, StateHolder, This, Uses,
    };
    pub use crate::options::{ActivationPolicy, AmbiguityPolicy, BindingOptions};
    pub use crate::qualifier;
    pub use crate::runtime::{
        ApplicationInstance, CircuitBreakerConfig, CompositeInstance, ModuleInstance,
        ServiceReference,
    };
    pub use crate::structure::Visibility;
}
