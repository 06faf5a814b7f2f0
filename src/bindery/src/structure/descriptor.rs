use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::structure::{ApplicationModel, ModuleId, ModuleModel};

/// Read-only view of the application structure, injectable through the
/// structure scope.
#[derive(Clone)]
pub struct ApplicationDescriptor {
    model: Arc<ApplicationModel>,
}

impl ApplicationDescriptor {
    pub(crate) fn new(model: Arc<ApplicationModel>) -> Self {
        Self { model }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.model.layers().iter().map(|layer| layer.name()).collect()
    }

    pub fn model(&self) -> &ApplicationModel {
        &self.model
    }
}

impl Debug for ApplicationDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ApplicationDescriptor")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Read-only view of one module, injectable through the structure scope.
#[derive(Clone)]
pub struct ModuleDescriptor {
    model: Arc<ApplicationModel>,
    id: ModuleId,
}

impl ModuleDescriptor {
    pub(crate) fn new(model: Arc<ApplicationModel>, id: ModuleId) -> Self {
        Self { model, id }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.module().map_or("", |module| module.name())
    }

    pub fn layer_name(&self) -> &str {
        self.module()
            .and_then(|module| self.model.layer(module.layer()))
            .map_or("", |layer| layer.name())
    }

    pub fn module(&self) -> Option<&ModuleModel> {
        self.model.module(self.id)
    }
}

impl Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name())
            .field("layer", &self.layer_name())
            .finish()
    }
}
