//! Shared in-memory collaborators for the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use panelkit::{
    Controller, Model, ResourceData, ResourceFetcher, ResourceHandle, ResourceKey, SurfaceHandle,
    VisualHost,
};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn index_of(journal: &Journal, entry: &str) -> usize {
    entries(journal)
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("`{entry}` not in journal {:?}", entries(journal)))
}

/// Fetcher over an in-memory key/bytes map with optional per-call latency.
pub struct MapFetcher {
    data: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn insert(mut self, key: &str, bytes: &[u8]) -> Self {
        self.data.insert(key.to_string(), bytes.to_vec());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for MapFetcher {
    async fn fetch(&self, key: &ResourceKey) -> anyhow::Result<ResourceData> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.data.get(key.as_str()) {
            Some(bytes) => Ok(ResourceData {
                key: key.clone(),
                bytes: bytes.clone(),
            }),
            None => anyhow::bail!("no such resource: {key}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceState {
    pub alive: bool,
    pub visible: bool,
    pub order: usize,
}

/// Visual host that records surface state instead of rendering anything.
#[derive(Default)]
pub struct RecordingHost {
    next_id: AtomicU64,
    surfaces: Mutex<HashMap<u64, SurfaceState>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destroy a surface behind the navigator's back.
    pub fn kill(&self, surface: SurfaceHandle) {
        if let Some(state) = self.surfaces.lock().unwrap().get_mut(&surface.0) {
            state.alive = false;
        }
    }

    pub fn state(&self, surface: SurfaceHandle) -> SurfaceState {
        self.surfaces.lock().unwrap()[&surface.0]
    }

    pub fn alive_count(&self) -> usize {
        self.surfaces
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.alive)
            .count()
    }
}

impl VisualHost for RecordingHost {
    fn instantiate(&self, _resource: &ResourceHandle) -> anyhow::Result<SurfaceHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.surfaces.lock().unwrap().insert(
            id,
            SurfaceState {
                alive: true,
                visible: false,
                order: 0,
            },
        );
        Ok(SurfaceHandle(id))
    }

    fn set_visible(&self, surface: SurfaceHandle, visible: bool) {
        if let Some(state) = self.surfaces.lock().unwrap().get_mut(&surface.0) {
            state.visible = visible;
        }
    }

    fn set_order(&self, surface: SurfaceHandle, index: usize) {
        if let Some(state) = self.surfaces.lock().unwrap().get_mut(&surface.0) {
            state.order = index;
        }
    }

    fn destroy(&self, surface: SurfaceHandle) {
        if let Some(state) = self.surfaces.lock().unwrap().get_mut(&surface.0) {
            state.alive = false;
        }
    }

    fn is_alive(&self, surface: SurfaceHandle) -> bool {
        self.surfaces
            .lock()
            .unwrap()
            .get(&surface.0)
            .map(|s| s.alive)
            .unwrap_or(false)
    }
}

/// Controller that journals every hook invocation.
pub struct ProbeController {
    name: &'static str,
    journal: Journal,
    allow_exit: Arc<AtomicBool>,
    fail_loading: Arc<AtomicBool>,
    updates: Arc<AtomicUsize>,
}

impl ProbeController {
    pub fn new(
        name: &'static str,
        journal: Journal,
        allow_exit: Arc<AtomicBool>,
        fail_loading: Arc<AtomicBool>,
        updates: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            name,
            journal,
            allow_exit,
            fail_loading,
            updates,
        }
    }

    fn push(&self, hook: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{hook}:{}", self.name));
    }
}

#[async_trait]
impl Controller for ProbeController {
    async fn on_loading(&mut self, _model: &mut Model) -> anyhow::Result<()> {
        self.push("load");
        if self.fail_loading.load(Ordering::SeqCst) {
            anyhow::bail!("simulated loading failure");
        }
        Ok(())
    }

    async fn on_enter(&mut self, _model: &mut Model) {
        self.push("enter");
    }

    async fn on_exit(&mut self, _model: &mut Model) -> bool {
        self.push("exit");
        self.allow_exit.load(Ordering::SeqCst)
    }

    async fn on_refresh(&mut self, _model: &mut Model) {
        self.push("refresh");
    }

    fn on_update(&mut self, _model: &mut Model) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }
}
