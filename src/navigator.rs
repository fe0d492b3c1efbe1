//! Navigation stack manager.
//!
//! Owns the ordered stack of open panels and drives each one through its
//! lifecycle phases: opening acquires the panel's resource through the
//! cache (or reuses a pooled instance), closing runs the rejectable exit
//! routine and parks the instance for reuse. Stack order is open order and
//! doubles as render order and per-frame update order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::NavigatorConfig;
use crate::error::StackError;
use crate::host::{SurfaceHandle, VisualHost};
use crate::panel::{
    Controller, Model, PanelInstance, PanelPool, PanelRegistry, PanelTypeId, PathTable,
};
use crate::phase::Phase;
use crate::resource::{ResourceCache, ResourceKey};

/// Observer invoked after a panel reaches its active phase.
pub type ActivatedHook = Box<dyn Fn(&PanelRef, &Model) + Send + Sync>;

/// Read-only snapshot of a stacked panel.
#[derive(Debug, Clone)]
pub struct PanelRef {
    pub instance_id: Uuid,
    pub type_id: PanelTypeId,
    pub phase: Phase,
    pub surface: Option<SurfaceHandle>,
}

struct NavState {
    stack: Vec<PanelInstance>,
    /// Types with an open in progress that have not reached the stack yet.
    opening: HashSet<PanelTypeId>,
}

/// The navigation stack manager. One per UI surface, constructed explicitly
/// with its collaborators; methods take `&self` and may be called from any
/// task driven by the host loop.
pub struct Navigator {
    config: NavigatorConfig,
    cache: Arc<ResourceCache>,
    host: Arc<dyn VisualHost>,
    paths: Arc<dyn PathTable>,
    registry: PanelRegistry,
    pool: PanelPool,
    state: Mutex<NavState>,
    on_activated: Mutex<Option<ActivatedHook>>,
}

impl Navigator {
    pub fn new(
        config: NavigatorConfig,
        cache: Arc<ResourceCache>,
        host: Arc<dyn VisualHost>,
        paths: Arc<dyn PathTable>,
        registry: PanelRegistry,
    ) -> Self {
        let pool = PanelPool::new(host.clone(), cache.clone());
        Self {
            config,
            cache,
            host,
            paths,
            registry,
            pool,
            state: Mutex::new(NavState {
                stack: Vec::new(),
                opening: HashSet::new(),
            }),
            on_activated: Mutex::new(None),
        }
    }

    /// Register the observer notified whenever a panel becomes active.
    pub fn set_on_activated(&self, hook: impl Fn(&PanelRef, &Model) + Send + Sync + 'static) {
        *self.on_activated.lock().unwrap() = Some(Box::new(hook));
    }

    /// Open a panel of `type_id` with a fresh `model`, reusing the pooled
    /// instance when one is parked. At most one instance per type may be
    /// open: a duplicate open is rejected. Resolves with the panel already
    /// active.
    pub async fn open(
        &self,
        type_id: impl Into<PanelTypeId>,
        model: Model,
    ) -> Result<PanelRef, StackError> {
        let type_id = type_id.into();
        {
            let mut state = self.state.lock().unwrap();
            if state.stack.iter().any(|p| *p.type_id() == type_id)
                || state.opening.contains(&type_id)
            {
                return Err(StackError::AlreadyOpen(type_id));
            }
            state.opening.insert(type_id.clone());
        }

        let result = self.open_guarded(&type_id, model).await;
        self.state.lock().unwrap().opening.remove(&type_id);
        result
    }

    async fn open_guarded(
        &self,
        type_id: &PanelTypeId,
        model: Model,
    ) -> Result<PanelRef, StackError> {
        // Reuse the parked instance when the pool has one; otherwise build
        // fresh. Path resolution happens before any phase moves so a
        // misconfigured type aborts cleanly.
        let (mut instance, key_to_acquire) = match self.pool.try_take(type_id) {
            Some(mut parked) => {
                parked.model = Some(model);
                (parked, None)
            }
            None => {
                let Some(key) = self.paths.resolve(type_id) else {
                    error!("no resource path registered for `{}`", type_id);
                    return Err(StackError::UnknownPathForType(type_id.clone()));
                };
                let controller = self
                    .registry
                    .create(type_id)
                    .ok_or_else(|| StackError::Unregistered(type_id.clone()))?;
                let instance = PanelInstance::new(type_id.clone(), controller, model);
                (instance, Some(key))
            }
        };
        let from_pool = key_to_acquire.is_none();

        instance.phase.advance(Phase::Loading)?;

        let mut controller = instance.controller.take().expect("settled panel has controller");
        let mut model = instance.model.take().expect("settled panel has model");
        let loading = controller.on_loading(&mut model).await;
        instance.controller = Some(controller);
        instance.model = Some(model);

        if let Err(err) = loading {
            warn!("loading aborted for panel `{}`: {err:#}", type_id);
            if from_pool {
                // The parked instance keeps its surface and resource; put it
                // back the way we found it.
                instance.phase.force(Phase::Disabled);
                self.pool.put(instance);
            }
            return Err(StackError::LoadingAborted {
                type_id: type_id.clone(),
                message: format!("{err:#}"),
            });
        }

        if let Some(key) = key_to_acquire {
            self.materialize(&mut instance, key).await?;
        }

        instance.phase.advance(Phase::Loaded)?;

        // Push topmost and let the surface take the top of the render order.
        // The transition guard stays up until entering settles.
        instance.in_transition = true;
        let instance_id = instance.id();
        let phase = instance.phase.clone();
        let surface = instance.surface;
        let order = {
            let mut state = self.state.lock().unwrap();
            let order = state.stack.len();
            state.stack.push(instance);
            order
        };
        if let Some(surface) = surface {
            self.host.set_order(surface, order);
        }

        phase.advance(Phase::Entering)?;
        let (mut controller, mut model) = match self.take_entry(instance_id) {
            Some(parts) => parts,
            None => {
                // Torn down by clear_all while we were pushing
                debug!("panel `{}` disappeared before entering", type_id);
                return Err(StackError::NotOnStack(type_id.clone()));
            }
        };
        controller.on_enter(&mut model).await;
        if let Some(surface) = surface {
            self.host.set_visible(surface, true);
        }
        phase.advance(Phase::Active)?;

        let panel = PanelRef {
            instance_id,
            type_id: type_id.clone(),
            phase: Phase::Active,
            surface,
        };
        if let Some(hook) = self.on_activated.lock().unwrap().as_ref() {
            hook(&panel, &model);
        }

        if !self.restore_entry(instance_id, controller, model) {
            debug!("panel `{}` disappeared while entering", type_id);
            return Err(StackError::NotOnStack(type_id.clone()));
        }

        info!("opened panel `{}`", type_id);
        Ok(panel)
    }

    /// Acquire the panel's backing resource and instantiate its surface.
    async fn materialize(
        &self,
        instance: &mut PanelInstance,
        key: ResourceKey,
    ) -> Result<(), StackError> {
        let handle = self.cache.acquire(&key, &instance.owner_id()).await?;
        instance.resource_key = Some(key);
        match self.host.instantiate(&handle) {
            Ok(surface) => {
                instance.surface = Some(surface);
                Ok(())
            }
            Err(err) => {
                error!(
                    "failed to instantiate surface for `{}`: {err:#}",
                    instance.type_id()
                );
                if let Some(key) = &instance.resource_key {
                    self.cache.release(key, &instance.owner_id());
                }
                Err(StackError::SurfaceFailed {
                    type_id: instance.type_id().clone(),
                    message: format!("{err:#}"),
                })
            }
        }
    }

    /// Close the active panel of `type_id`, running its exit routine. A
    /// rejected exit returns `Ok(false)` with the panel untouched. Closing
    /// a type that is not open is a caller error, never silently ignored.
    pub async fn close(&self, type_id: impl Into<PanelTypeId>) -> Result<bool, StackError> {
        let type_id = type_id.into();

        let (phase, mut controller, mut model, surface, instance_id) = {
            let mut state = self.state.lock().unwrap();
            let Some(pos) = state.stack.iter().rposition(|p| *p.type_id() == type_id) else {
                drop(state);
                error!("attempted to close `{}` which is not on the stack", type_id);
                if self.config.halt_on_stack_corruption {
                    panic!("navigation stack corruption: `{type_id}` closed but not open");
                }
                return Err(StackError::NotOnStack(type_id));
            };
            let entry = &mut state.stack[pos];
            if entry.in_transition || entry.phase() != Phase::Active {
                return Err(StackError::TransitionInFlight(type_id));
            }
            entry.in_transition = true;
            (
                entry.phase.clone(),
                entry.controller.take().expect("settled panel has controller"),
                entry.model.take().expect("settled panel has model"),
                entry.surface,
                entry.id(),
            )
        };

        phase.advance(Phase::Exiting)?;
        let allowed = controller.on_exit(&mut model).await;

        if !allowed {
            // Close rejected: the panel stays active and visible.
            phase.advance(Phase::Active)?;
            if !self.restore_entry(instance_id, controller, model) {
                debug!("panel `{}` disappeared during rejected close", type_id);
            }
            debug!("close of `{}` rejected by exit routine", type_id);
            return Ok(false);
        }

        if let Some(surface) = surface {
            self.host.set_visible(surface, false);
        }
        phase.advance(Phase::Disabled)?;

        let removed = {
            let mut state = self.state.lock().unwrap();
            state
                .stack
                .iter()
                .position(|p| p.id() == instance_id)
                .map(|pos| state.stack.remove(pos))
        };
        match removed {
            Some(mut instance) => {
                instance.controller = Some(controller);
                instance.model = Some(model);
                instance.in_transition = false;
                self.pool.put(instance);
                info!("closed panel `{}`", type_id);
                Ok(true)
            }
            None => {
                debug!("panel `{}` disappeared during close, skipping pooling", type_id);
                Ok(true)
            }
        }
    }

    /// Close the topmost panel. Returns `Ok(false)` on an empty stack.
    pub async fn back(&self) -> Result<bool, StackError> {
        let top = {
            let state = self.state.lock().unwrap();
            state.stack.last().map(|p| p.type_id().clone())
        };
        match top {
            Some(type_id) => self.close(type_id).await,
            None => Ok(false),
        }
    }

    /// Per-frame fan-out, invoked once per tick by the host loop. Delivered
    /// in open order, only to panels that are active, settled and whose
    /// surface is still alive. Panels whose surface was destroyed behind
    /// our back are skipped, never removed: removal is `close`'s job.
    pub fn update(&self) {
        let mut state = self.state.lock().unwrap();
        for entry in state.stack.iter_mut() {
            if entry.in_transition || !entry.phase().receives_update() {
                continue;
            }
            let Some(surface) = entry.surface else { continue };
            if !self.host.is_alive(surface) {
                continue;
            }
            if let (Some(controller), Some(model)) = (entry.controller.as_mut(), entry.model.as_mut())
            {
                controller.on_update(model);
            }
        }
    }

    /// Mutate the model of an open panel in place.
    pub fn update_model<F>(&self, type_id: &PanelTypeId, f: F) -> Result<(), StackError>
    where
        F: FnOnce(&mut Model),
    {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state
            .stack
            .iter_mut()
            .rev()
            .find(|p| p.type_id() == type_id)
        else {
            return Err(StackError::NotOnStack(type_id.clone()));
        };
        if entry.in_transition {
            return Err(StackError::TransitionInFlight(type_id.clone()));
        }
        f(entry.model.as_mut().expect("settled panel has model"));
        Ok(())
    }

    /// Run the panel's refresh hook to re-synchronise it with its model.
    pub async fn refresh(&self, type_id: impl Into<PanelTypeId>) -> Result<(), StackError> {
        let type_id = type_id.into();
        let (mut controller, mut model, instance_id) = {
            let mut state = self.state.lock().unwrap();
            let Some(entry) = state
                .stack
                .iter_mut()
                .rev()
                .find(|p| *p.type_id() == type_id)
            else {
                return Err(StackError::NotOnStack(type_id));
            };
            if entry.in_transition || entry.phase() != Phase::Active {
                return Err(StackError::TransitionInFlight(type_id));
            }
            entry.in_transition = true;
            (
                entry.controller.take().expect("settled panel has controller"),
                entry.model.take().expect("settled panel has model"),
                entry.id(),
            )
        };

        controller.on_refresh(&mut model).await;

        if !self.restore_entry(instance_id, controller, model) {
            debug!("panel `{}` disappeared during refresh", type_id);
        }
        Ok(())
    }

    /// Destroy every open panel immediately, bypassing exit routines and
    /// the pool. For full scene teardown; pair with [`Navigator::clear_pool`].
    pub fn clear_all(&self) {
        let drained: Vec<PanelInstance> = {
            let mut state = self.state.lock().unwrap();
            state.stack.drain(..).collect()
        };
        if !drained.is_empty() {
            info!("tearing down {} open panels", drained.len());
        }
        for instance in drained {
            instance.destroy(self.host.as_ref(), &self.cache);
        }
    }

    /// Destroy every pooled panel and empty the pool.
    pub fn clear_pool(&self) {
        self.pool.clear();
    }

    pub fn is_open(&self, type_id: &PanelTypeId) -> bool {
        self.find(type_id).is_some()
    }

    /// Topmost-first lookup of an open panel.
    pub fn find(&self, type_id: &PanelTypeId) -> Option<PanelRef> {
        let state = self.state.lock().unwrap();
        state
            .stack
            .iter()
            .rev()
            .find(|p| p.type_id() == type_id)
            .map(snapshot)
    }

    pub fn top(&self) -> Option<PanelRef> {
        let state = self.state.lock().unwrap();
        state.stack.last().map(snapshot)
    }

    pub fn depth(&self) -> usize {
        self.state.lock().unwrap().stack.len()
    }

    pub fn pool(&self) -> &PanelPool {
        &self.pool
    }

    /// Vacate a stacked entry's controller and model for an async hook.
    fn take_entry(&self, instance_id: Uuid) -> Option<(Box<dyn Controller>, Model)> {
        let mut state = self.state.lock().unwrap();
        let entry = state.stack.iter_mut().find(|p| p.id() == instance_id)?;
        let controller = entry.controller.take()?;
        let model = entry.model.take()?;
        Some((controller, model))
    }

    /// Put a vacated entry back and drop its transition guard. Returns
    /// false if the entry was torn down in the meantime.
    fn restore_entry(
        &self,
        instance_id: Uuid,
        controller: Box<dyn Controller>,
        model: Model,
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.stack.iter_mut().find(|p| p.id() == instance_id) {
            Some(entry) => {
                entry.controller = Some(controller);
                entry.model = Some(model);
                entry.in_transition = false;
                true
            }
            None => false,
        }
    }
}

fn snapshot(instance: &PanelInstance) -> PanelRef {
    PanelRef {
        instance_id: instance.id(),
        type_id: instance.type_id().clone(),
        phase: instance.phase(),
        surface: instance.surface(),
    }
}
