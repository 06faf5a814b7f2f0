use crate::structure::{
    ApplicationModel, CompositeId, CompositeKind, CompositeModel, ModuleId, Visibility,
};
use crate::types::TypeKey;

impl ApplicationModel {
    /// Composites that code in module `from` can see, in resolution order:
    /// the module itself, then the other modules of its layer, then the
    /// modules of the layers it uses. Declaration order is kept within each
    /// module.
    pub fn visible_composites(&self, from: ModuleId) -> Vec<(CompositeId, &CompositeModel)> {
        let Some(module) = self.module(from) else {
            return Vec::new();
        };
        let Some(layer) = self.layer(module.layer) else {
            return Vec::new();
        };

        let own = self.composites_of(from, Visibility::Module);
        let siblings = layer
            .modules
            .iter()
            .filter(|id| **id != from)
            .flat_map(|id| self.composites_of(*id, Visibility::Layer));
        let used = layer
            .uses
            .iter()
            .filter_map(|id| self.layer(*id))
            .flat_map(|used| used.modules.iter())
            .flat_map(|id| self.composites_of(*id, Visibility::Application));

        own.chain(siblings).chain(used).collect()
    }

    /// Visible services exposing a type assignable to `ty`.
    pub fn visible_services(
        &self,
        from: ModuleId,
        ty: TypeKey,
    ) -> Vec<(CompositeId, &CompositeModel)> {
        self.visible_of_kinds(from, &[CompositeKind::Service], ty)
    }

    /// Visible composites of one of `kinds` exposing a type assignable to
    /// `ty`.
    pub fn visible_of_kinds(
        &self,
        from: ModuleId,
        kinds: &[CompositeKind],
        ty: TypeKey,
    ) -> Vec<(CompositeId, &CompositeModel)> {
        self.visible_composites(from)
            .into_iter()
            .filter(|(_, composite)| kinds.contains(&composite.kind))
            .filter(|(_, composite)| composite.exposes(ty, &self.hierarchy))
            .collect()
    }

    fn composites_of(
        &self,
        module: ModuleId,
        at_least: Visibility,
    ) -> impl Iterator<Item = (CompositeId, &CompositeModel)> {
        self.module(module)
            .into_iter()
            .flat_map(|module| module.composites.iter().enumerate())
            .filter(move |(_, composite)| composite.visibility >= at_least)
            .map(move |(index, composite)| (CompositeId { module, index }, &**composite))
    }
}
