use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, OnceLock, Weak};

use snafu::prelude::*;
use tracing::trace;

use crate::binder::BoundComposite;
use crate::injection::{
    InjectionContext, InjectionError, Invocation, Managed, NoSuchViewSnafu, Origin, StateHolder,
    Uses, Value, ViewUnavailableSnafu,
};
use crate::runtime::ModuleInstance;
use crate::structure::CompositeModel;
use crate::types::TypeKey;

/// One instance of a composite: the values of its mixins and its state.
///
/// Mixins receiving the composite through `#[this]` should prefer
/// [`This<T>`](crate::injection::This), which doesn't keep the composite
/// alive.
#[derive(Clone)]
pub struct CompositeInstance {
    inner: Arc<CompositeState>,
}

struct CompositeState {
    composite: Arc<BoundComposite>,
    module: ModuleInstance,
    origin: Arc<Origin>,
    state: StateHolder,
    mixins: OnceLock<Vec<Value>>,
}

impl CompositeInstance {
    /// Instantiates `composite` in `module`, constructing every mixin in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a property value is invalid, or if any mixin
    /// fails to be injected or constructed.
    pub(crate) fn new(
        module: ModuleInstance,
        composite: Arc<BoundComposite>,
        uses: Uses,
        properties: Vec<(String, Value)>,
    ) -> Result<Self, InjectionError> {
        let model = composite.model();
        let state = StateHolder::new(model.ty(), model.state(), properties)?;
        let origin = Arc::new(Origin {
            composite: model.ty(),
            module: module.name().to_owned(),
            layer: module.layer().name().to_owned(),
        });

        let instance = Self {
            inner: Arc::new(CompositeState {
                composite: Arc::clone(&composite),
                module: module.clone(),
                origin: Arc::clone(&origin),
                state: state.clone(),
                mixins: OnceLock::new(),
            }),
        };

        let context = InjectionContext::for_composite(module, instance.clone(), uses, state);
        let mixins = composite
            .mixins()
            .iter()
            .map(|mixin| {
                mixin
                    .new_instance(&context)
                    .map(|value| value.with_origin(Arc::clone(&origin)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Mixins see the instance while it is being built, so the cell is only
        // filled here, once.
        instance.inner.mixins.set(mixins).ok();

        trace!(composite = %origin.composite, module = %origin.module, "composite instantiated");
        Ok(instance)
    }

    /// The primary type of the composite.
    pub fn ty(&self) -> TypeKey {
        self.model().ty()
    }

    pub fn model(&self) -> &CompositeModel {
        self.inner.composite.model()
    }

    pub fn module(&self) -> &ModuleInstance {
        &self.inner.module
    }

    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    pub fn state(&self) -> &StateHolder {
        &self.inner.state
    }

    /// Returns the mixin value of type `ty`, or failing that, the first one
    /// whose type is assignable to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the composite is still being instantiated or
    /// exposes no such type.
    pub fn view_value(&self, ty: TypeKey) -> Result<Value, InjectionError> {
        let composite = self.ty();
        let mixins = self
            .inner
            .mixins
            .get()
            .context(ViewUnavailableSnafu { composite, ty })?;
        let hierarchy = self.inner.module.model().hierarchy();

        mixins
            .iter()
            .find(|value| value.type_key() == ty)
            .or_else(|| {
                mixins
                    .iter()
                    .find(|value| hierarchy.is_assignable(value.type_key(), ty))
            })
            .cloned()
            .context(NoSuchViewSnafu { composite, ty })
    }

    pub fn view<T: Managed + Clone>(&self) -> Option<T> {
        self.view_value(TypeKey::of::<T>())
            .ok()
            .and_then(|value| value.downcast::<T>())
    }

    pub fn downgrade(&self) -> WeakComposite {
        WeakComposite {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Builds the chain handling `invocation` on the view `T`.
    ///
    /// The concerns of `T` wrap the mixin, the first declared concern being
    /// the head of the chain. Side-effects are instantiated with the mixin as
    /// their next link and are meant to be invoked after the head.
    ///
    /// # Errors
    ///
    /// Returns an error if the composite has no view `T`, or if a concern or
    /// side-effect fails to be injected or constructed.
    pub fn invocation_chain<T: Managed + Clone>(
        &self,
        invocation: Invocation,
    ) -> Result<InvocationChain<T>, InjectionError> {
        let ty = TypeKey::of::<T>();
        let composite = &self.inner.composite;
        let target = self.view_value(ty)?;
        let modifier_context = |next: Value| {
            InjectionContext::for_modifier(
                self.inner.module.clone(),
                next,
                self.clone(),
                invocation.clone(),
            )
        };
        let downcast = |value: Value| {
            value.downcast::<T>().context(NoSuchViewSnafu {
                composite: self.ty(),
                ty,
            })
        };

        let mut next = target.clone();
        for concern in composite
            .concerns()
            .iter()
            .rev()
            .filter(|concern| concern.model().output() == ty)
        {
            next = concern
                .new_instance(&modifier_context(next))?
                .with_origin(Arc::clone(&self.inner.origin));
        }

        let side_effects = composite
            .side_effects()
            .iter()
            .filter(|side_effect| side_effect.model().output() == ty)
            .map(|side_effect| {
                side_effect
                    .new_instance(&modifier_context(target.clone()))
                    .and_then(downcast)
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!(
            composite = %self.ty(),
            method = invocation.method(),
            side_effects = side_effects.len(),
            "invocation chain built"
        );
        Ok(InvocationChain {
            head: downcast(next)?,
            side_effects,
        })
    }
}

impl PartialEq for CompositeInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CompositeInstance {}

impl Debug for CompositeInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CompositeInstance")
            .field("origin", &self.inner.origin)
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}

/// A composite that isn't kept alive by its holder.
#[derive(Clone)]
pub struct WeakComposite {
    inner: Weak<CompositeState>,
}

impl WeakComposite {
    pub fn upgrade(&self) -> Option<CompositeInstance> {
        self.inner.upgrade().map(|inner| CompositeInstance { inner })
    }
}

impl Debug for WeakComposite {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("WeakComposite").finish_non_exhaustive()
    }
}

/// The concerns and side-effects handling one invocation.
#[derive(Clone)]
pub struct InvocationChain<T> {
    head: T,
    side_effects: Vec<T>,
}

impl<T> InvocationChain<T> {
    /// The first concern, or the mixin itself if there is no concern.
    pub fn head(&self) -> &T {
        &self.head
    }

    pub fn side_effects(&self) -> &[T] {
        &self.side_effects
    }

    /// Calls `method` on the head, then on every side-effect, and returns
    /// what the head returned.
    pub fn invoke<R, F>(&self, method: F) -> R
    where
        F: Fn(&T) -> R,
    {
        let result = method(&self.head);
        for side_effect in &self.side_effects {
            method(side_effect);
        }
        result
    }
}

impl<T: 'static> Debug for InvocationChain<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InvocationChain")
            .field("view", &TypeKey::of::<T>())
            .field("side_effects", &self.side_effects.len())
            .finish()
    }
}
