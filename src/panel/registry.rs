//! Constructor registry and path resolution for panel types.

use std::collections::HashMap;

use super::{Controller, PanelTypeId};
use crate::resource::ResourceKey;

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Maps registered panel type ids to controller constructors.
///
/// Types are registered once at startup; the navigator consults the
/// registry whenever a panel must be constructed fresh rather than reused
/// from the pool.
#[derive(Default)]
pub struct PanelRegistry {
    factories: HashMap<PanelTypeId, ControllerFactory>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `type_id`. Re-registering a type replaces
    /// its previous constructor.
    pub fn register<F, C>(&mut self, type_id: impl Into<PanelTypeId>, factory: F)
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        self.factories
            .insert(type_id.into(), Box::new(move || Box::new(factory())));
    }

    pub fn is_registered(&self, type_id: &PanelTypeId) -> bool {
        self.factories.contains_key(type_id)
    }

    pub(crate) fn create(&self, type_id: &PanelTypeId) -> Option<Box<dyn Controller>> {
        self.factories.get(type_id).map(|factory| factory())
    }
}

/// Resolves a panel type to the storage location of its visual resource.
pub trait PathTable: Send + Sync {
    fn resolve(&self, type_id: &PanelTypeId) -> Option<ResourceKey>;
}

/// In-memory path table populated at startup.
#[derive(Debug, Default)]
pub struct StaticPathTable {
    paths: HashMap<PanelTypeId, ResourceKey>,
}

impl StaticPathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_id: impl Into<PanelTypeId>, key: impl Into<ResourceKey>) {
        self.paths.insert(type_id.into(), key.into());
    }
}

impl PathTable for StaticPathTable {
    fn resolve(&self, type_id: &PanelTypeId) -> Option<ResourceKey> {
        self.paths.get(type_id).cloned()
    }
}
