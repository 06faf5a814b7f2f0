use std::sync::Arc;

use crate::binder::BindingOutcome;
use crate::dependency::InjectionPoint;
use crate::fragment::FragmentModel;
use crate::injection::{
    InjectedFieldModel, InjectedParametersModel, InjectionContext, InjectionError, Value,
};
use crate::structure::{ApplicationModel, CompositeId, CompositeModel};
use crate::types::TypeKey;

/// A fragment whose injection points are all bound.
#[derive(Debug, Clone)]
pub struct BoundFragment {
    model: FragmentModel,
    parameters: InjectedParametersModel,
    fields: Vec<InjectedFieldModel>,
}

impl BoundFragment {
    pub(crate) fn new(
        model: FragmentModel,
        parameters: InjectedParametersModel,
        fields: Vec<InjectedFieldModel>,
    ) -> Self {
        Self {
            model,
            parameters,
            fields,
        }
    }

    pub fn model(&self) -> &FragmentModel {
        &self.model
    }

    pub fn parameters(&self) -> &InjectedParametersModel {
        &self.parameters
    }

    pub fn fields(&self) -> &[InjectedFieldModel] {
        &self.fields
    }

    /// Creates one instance of the fragment, injecting everything from
    /// `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency can't be injected or the fragment
    /// fails to construct.
    pub fn new_instance(&self, context: &InjectionContext) -> Result<Value, InjectionError> {
        self.model.factory().new_fragment(self, context)
    }

    /// What every injection point was bound to, constructor parameters
    /// first.
    pub fn outcomes(&self) -> Vec<(InjectionPoint, BindingOutcome)> {
        let parameters = self.parameters.parameters().iter();
        let fields = self.fields.iter().map(InjectedFieldModel::dependency);
        parameters
            .chain(fields)
            .map(|dependency| (dependency.descriptor().point(), dependency.outcome()))
            .collect()
    }
}

/// A composite whose fragments are all bound.
#[derive(Debug)]
pub struct BoundComposite {
    id: CompositeId,
    model: Arc<CompositeModel>,
    mixins: Vec<BoundFragment>,
    concerns: Vec<BoundFragment>,
    side_effects: Vec<BoundFragment>,
}

impl BoundComposite {
    pub(crate) fn new(
        id: CompositeId,
        model: Arc<CompositeModel>,
        mixins: Vec<BoundFragment>,
        concerns: Vec<BoundFragment>,
        side_effects: Vec<BoundFragment>,
    ) -> Self {
        Self {
            id,
            model,
            mixins,
            concerns,
            side_effects,
        }
    }

    pub fn id(&self) -> CompositeId {
        self.id
    }

    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    pub fn mixins(&self) -> &[BoundFragment] {
        &self.mixins
    }

    pub fn concerns(&self) -> &[BoundFragment] {
        &self.concerns
    }

    pub fn side_effects(&self) -> &[BoundFragment] {
        &self.side_effects
    }

    pub fn fragments(&self) -> impl Iterator<Item = &BoundFragment> {
        self.mixins
            .iter()
            .chain(&self.concerns)
            .chain(&self.side_effects)
    }
}

/// A fully bound application, ready to be activated.
///
/// An [`Application`] only exists if every injection point of every
/// fragment was bound successfully.
#[derive(Debug)]
pub struct Application {
    model: Arc<ApplicationModel>,
    composites: Vec<Vec<Arc<BoundComposite>>>,
}

impl Application {
    pub(crate) fn new(
        model: Arc<ApplicationModel>,
        composites: Vec<Vec<Arc<BoundComposite>>>,
    ) -> Self {
        Self { model, composites }
    }

    pub fn model(&self) -> &Arc<ApplicationModel> {
        &self.model
    }

    pub fn composite(&self, id: CompositeId) -> Option<&Arc<BoundComposite>> {
        self.composites
            .get(id.module.index())
            .and_then(|module| module.get(id.index))
    }

    pub fn composites(&self) -> impl Iterator<Item = &Arc<BoundComposite>> {
        self.composites.iter().flatten()
    }

    /// What every injection point of the application was bound to, in
    /// declaration order.
    pub fn outcomes(&self) -> Vec<(CompositeId, TypeKey, InjectionPoint, BindingOutcome)> {
        self.composites()
            .flat_map(|composite| {
                composite.fragments().flat_map(move |fragment| {
                    fragment
                        .outcomes()
                        .into_iter()
                        .map(move |(point, outcome)| {
                            (composite.id(), fragment.model().ty(), point, outcome)
                        })
                })
            })
            .collect()
    }
}
