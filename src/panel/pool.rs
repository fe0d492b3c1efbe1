//! Pool of deactivated, reusable panel instances, keyed by type.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use super::{PanelInstance, PanelTypeId};
use crate::host::VisualHost;
use crate::phase::Phase;
use crate::resource::ResourceCache;

/// Parking space for panels that exited but may be reopened. At most one
/// instance per type is ever parked.
pub struct PanelPool {
    host: Arc<dyn VisualHost>,
    cache: Arc<ResourceCache>,
    parked: Mutex<HashMap<PanelTypeId, PanelInstance>>,
}

impl PanelPool {
    pub fn new(host: Arc<dyn VisualHost>, cache: Arc<ResourceCache>) -> Self {
        Self {
            host,
            cache,
            parked: Mutex::new(HashMap::new()),
        }
    }

    /// Remove and return the parked instance for `type_id`, flipping it
    /// back to idle for reuse.
    pub fn try_take(&self, type_id: &PanelTypeId) -> Option<PanelInstance> {
        let mut parked = self.parked.lock().unwrap();
        let instance = parked.remove(type_id)?;
        if let Err(err) = instance.phase.advance(Phase::Idle) {
            warn!("pooled panel `{}` in unexpected phase: {}", type_id, err);
        }
        debug!("reusing pooled panel `{}`", type_id);
        Some(instance)
    }

    /// Park a deactivated instance, hiding its surface. If the slot for its
    /// type is already occupied the incoming instance is destroyed outright
    /// rather than replacing the parked one.
    pub fn put(&self, instance: PanelInstance) {
        if let Some(surface) = instance.surface {
            self.host.set_visible(surface, false);
        }
        let duplicate = {
            let mut parked = self.parked.lock().unwrap();
            match parked.entry(instance.type_id().clone()) {
                Entry::Occupied(_) => Some(instance),
                Entry::Vacant(slot) => {
                    slot.insert(instance);
                    None
                }
            }
        };
        if let Some(instance) = duplicate {
            debug!(
                "pool slot for `{}` already occupied, destroying incoming instance",
                instance.type_id()
            );
            instance.destroy(self.host.as_ref(), &self.cache);
        }
    }

    /// Destroy every parked instance's backing resources and empty the
    /// pool.
    pub fn clear(&self) {
        let drained: Vec<PanelInstance> = {
            let mut parked = self.parked.lock().unwrap();
            parked.drain().map(|(_, instance)| instance).collect()
        };
        for instance in drained {
            instance.destroy(self.host.as_ref(), &self.cache);
        }
    }

    pub fn contains(&self, type_id: &PanelTypeId) -> bool {
        self.parked.lock().unwrap().contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.lock().unwrap().is_empty()
    }
}
