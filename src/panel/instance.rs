use uuid::Uuid;

use super::{Controller, Model, PanelTypeId};
use crate::host::{SurfaceHandle, VisualHost};
use crate::phase::{Phase, PhaseCell};
use crate::resource::{OwnerId, ResourceCache, ResourceKey};

/// A live controller + surface pairing.
///
/// Owned by exactly one of the navigation stack (while open) or the panel
/// pool (while parked), never both. The controller and model slots are
/// temporarily vacated while an asynchronous hook runs on them; the
/// `in_transition` flag keeps every other operation off the instance until
/// they return.
pub struct PanelInstance {
    id: Uuid,
    type_id: PanelTypeId,
    pub(crate) controller: Option<Box<dyn Controller>>,
    pub(crate) model: Option<Model>,
    pub(crate) surface: Option<SurfaceHandle>,
    pub(crate) resource_key: Option<ResourceKey>,
    pub(crate) phase: PhaseCell,
    pub(crate) in_transition: bool,
}

impl PanelInstance {
    pub(crate) fn new(type_id: PanelTypeId, controller: Box<dyn Controller>, model: Model) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_id,
            controller: Some(controller),
            model: Some(model),
            surface: None,
            resource_key: None,
            phase: PhaseCell::new(),
            in_transition: false,
        }
    }

    /// Stable identity of this instance, distinct from its type. Survives
    /// pooling, so a reused panel reports the same id it had before.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_id(&self) -> &PanelTypeId {
        &self.type_id
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    /// The identity this instance registers against cache entries.
    pub(crate) fn owner_id(&self) -> OwnerId {
        OwnerId::new(self.id.to_string())
    }

    /// Tear the instance down: destroy its surface and detach it from its
    /// cached resource.
    pub(crate) fn destroy(self, host: &dyn VisualHost, cache: &ResourceCache) {
        if let Some(surface) = self.surface {
            host.destroy(surface);
        }
        if let Some(key) = &self.resource_key {
            cache.release(key, &self.owner_id());
        }
    }
}
