use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::injection::{Managed, StateHolder, Value};
use crate::runtime::{CompositeInstance, ModuleInstance};
use crate::structure::MetaInfo;
use crate::types::TypeKey;

/// What bound providers may draw from while one instance is created.
///
/// A context is created for one instantiation and never shared. Accessors of
/// fields that the context variant doesn't carry return [`None`].
#[derive(Clone)]
pub struct InjectionContext {
    module: ModuleInstance,
    kind: ContextKind,
}

#[derive(Clone)]
pub enum ContextKind {
    /// A mixin of a composite being instantiated.
    Composite {
        instance: CompositeInstance,
        uses: Uses,
        state: StateHolder,
    },
    /// A concern or side-effect handling an invocation.
    Modifier {
        next: Value,
        proxy: CompositeInstance,
        invocation: Invocation,
    },
    /// A plain object, created or having its fields injected.
    Object { uses: Uses, instance: Option<Value> },
}

impl InjectionContext {
    pub fn for_composite(
        module: ModuleInstance,
        instance: CompositeInstance,
        uses: Uses,
        state: StateHolder,
    ) -> Self {
        Self {
            module,
            kind: ContextKind::Composite {
                instance,
                uses,
                state,
            },
        }
    }

    pub fn for_modifier(
        module: ModuleInstance,
        next: Value,
        proxy: CompositeInstance,
        invocation: Invocation,
    ) -> Self {
        Self {
            module,
            kind: ContextKind::Modifier {
                next,
                proxy,
                invocation,
            },
        }
    }

    pub fn for_object(module: ModuleInstance, uses: Uses) -> Self {
        Self {
            module,
            kind: ContextKind::Object {
                uses,
                instance: None,
            },
        }
    }

    pub fn for_object_instance(module: ModuleInstance, uses: Uses, instance: Value) -> Self {
        Self {
            module,
            kind: ContextKind::Object {
                uses,
                instance: Some(instance),
            },
        }
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn module(&self) -> &ModuleInstance {
        &self.module
    }

    pub fn composite_instance(&self) -> Option<&CompositeInstance> {
        match &self.kind {
            ContextKind::Composite { instance, .. } => Some(instance),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<&StateHolder> {
        match &self.kind {
            ContextKind::Composite { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn uses(&self) -> Option<&Uses> {
        match &self.kind {
            ContextKind::Composite { uses, .. } | ContextKind::Object { uses, .. } => Some(uses),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<&Value> {
        match &self.kind {
            ContextKind::Modifier { next, .. } => Some(next),
            _ => None,
        }
    }

    pub fn proxy_handler(&self) -> Option<&CompositeInstance> {
        match &self.kind {
            ContextKind::Modifier { proxy, .. } => Some(proxy),
            _ => None,
        }
    }

    pub fn invocation(&self) -> Option<&Invocation> {
        match &self.kind {
            ContextKind::Modifier { invocation, .. } => Some(invocation),
            _ => None,
        }
    }

    pub fn instance(&self) -> Option<&Value> {
        match &self.kind {
            ContextKind::Object { instance, .. } => instance.as_ref(),
            _ => None,
        }
    }
}

impl Debug for InjectionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let kind = match &self.kind {
            ContextKind::Composite { .. } => "composite",
            ContextKind::Modifier { .. } => "modifier",
            ContextKind::Object { .. } => "object",
        };
        f.debug_struct("InjectionContext")
            .field("module", &self.module.name())
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

/// Values supplied by the caller creating an instance, looked up by type.
#[derive(Clone, Default)]
pub struct Uses {
    values: Vec<Value>,
}

impl Uses {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with<T: Managed>(mut self, value: T) -> Self {
        self.values.push(Value::new(value));
        self
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// The first value of type `ty`.
    pub fn find(&self, ty: TypeKey) -> Option<&Value> {
        self.values.iter().find(|value| value.type_key() == ty)
    }

    pub fn find_all(&self, ty: TypeKey) -> Vec<Value> {
        self.values
            .iter()
            .filter(|value| value.type_key() == ty)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for Uses {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list()
            .entries(self.values.iter().map(Value::type_key))
            .finish()
    }
}

/// A method invocation seen by concerns and side-effects.
#[derive(Debug, Clone)]
pub struct Invocation {
    method: &'static str,
    meta: MetaInfo,
}

impl Invocation {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            meta: MetaInfo::new(),
        }
    }

    pub fn with_meta<T: Managed + Clone>(mut self, value: T) -> Self {
        self.meta = self.meta.with(value);
        self
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn meta(&self) -> &MetaInfo {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_find_succeeds() {
        let uses = Uses::new().with(1i32).with(String::from("a")).with(2i32);

        assert_eq!(
            uses.find(TypeKey::of::<i32>()).and_then(Value::downcast::<i32>),
            Some(1)
        );
        assert_eq!(uses.find_all(TypeKey::of::<i32>()).len(), 2);
        assert!(uses.find(TypeKey::of::<u8>()).is_none());
    }

    #[test]
    fn invocation_meta_succeeds() {
        let invocation = Invocation::new("greet").with_meta(3u8);

        assert_eq!(invocation.method(), "greet");
        assert_eq!(invocation.meta().get::<u8>(), Some(3));
    }

    #[test]
    fn object_context_exposes_uses_only() {
        let module = crate::runtime::tests::module_instance();
        let context = InjectionContext::for_object(module, Uses::new().with(5u16));

        assert!(context.uses().is_some_and(|uses| !uses.is_empty()));
        assert!(context.composite_instance().is_none());
        assert!(context.state().is_none());
        assert!(context.next().is_none());
        assert!(context.invocation().is_none());
        assert!(context.instance().is_none());
    }
}
