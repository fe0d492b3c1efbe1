//! Panel types: controller behavior hooks, per-open models, live instances,
//! the reuse pool and the constructor registry.

mod instance;
mod pool;
mod registry;

pub use instance::PanelInstance;
pub use pool::PanelPool;
pub use registry::{PanelRegistry, PathTable, StaticPathTable};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Registered identifier for a class of panel (one controller + view
/// pairing). Registration replaces runtime reflection: the navigator looks
/// ids up in a [`PanelRegistry`] and a [`PathTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PanelTypeId(String);

impl PanelTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelTypeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PanelTypeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Per-open data attached 1:1 to a panel instance. A fresh model replaces
/// the previous one every time the panel type is (re)opened.
#[derive(Debug, Clone)]
pub struct Model {
    /// Whether the panel participates in back-navigation ordering.
    pub stacked: bool,
    /// Free-form panel data.
    pub payload: Value,
}

impl Model {
    pub fn new() -> Self {
        Self {
            stacked: true,
            payload: Value::Null,
        }
    }

    pub fn with_payload(payload: Value) -> Self {
        Self {
            stacked: true,
            payload,
        }
    }

    pub fn unstacked(mut self) -> Self {
        self.stacked = false;
        self
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// Behavior hooks for a panel. Every hook defaults to a no-op so
/// controllers implement only the stages they care about.
#[async_trait]
pub trait Controller: Send {
    /// Entry work before the panel becomes visible (data loads, warmup).
    /// Returning an error aborts the open; anything acquired for the panel
    /// is rolled back.
    async fn on_loading(&mut self, _model: &mut Model) -> anyhow::Result<()> {
        Ok(())
    }

    /// Activation logic once the panel's surface exists, run just before
    /// the surface is shown.
    async fn on_enter(&mut self, _model: &mut Model) {}

    /// Exit routine. Returning `false` rejects the close and the panel
    /// stays active and visible.
    async fn on_exit(&mut self, _model: &mut Model) -> bool {
        true
    }

    /// Re-synchronise the panel's visible state with its model.
    async fn on_refresh(&mut self, _model: &mut Model) {}

    /// Per-frame update, delivered in stack order while the panel is
    /// active.
    fn on_update(&mut self, _model: &mut Model) {}
}
