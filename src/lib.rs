//! Lifecycle and caching protocol for stacked interactive panels.
//!
//! Three pieces work together: a reference-counted [`ResourceCache`] that
//! deduplicates concurrent loads, a [`Navigator`] that owns the ordered
//! stack of open panels and drives each through its asynchronous lifecycle
//! phases (pooling exited panels for reuse), and a [`FlowManager`] that
//! sequences coarse application flows through the same [`Phase`] ladder,
//! never letting two flows run concurrently. Rendering, storage and path
//! lookup stay behind collaborator traits ([`VisualHost`],
//! [`ResourceFetcher`], [`PathTable`]) implemented by the embedding engine.

pub mod config;
pub mod error;
pub mod flow;
pub mod host;
pub mod navigator;
pub mod panel;
pub mod phase;
pub mod resource;

pub use config::NavigatorConfig;
pub use error::{CacheError, StackError};
pub use flow::{Flow, FlowManager};
pub use host::{SurfaceHandle, VisualHost};
pub use navigator::{ActivatedHook, Navigator, PanelRef};
pub use panel::{
    Controller, Model, PanelInstance, PanelPool, PanelRegistry, PanelTypeId, PathTable,
    StaticPathTable,
};
pub use phase::{Phase, PhaseCell, PhaseError};
pub use resource::{
    CacheStats, OwnerId, ResourceCache, ResourceData, ResourceFetcher, ResourceHandle, ResourceKey,
};
