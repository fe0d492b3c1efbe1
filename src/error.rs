//! Typed errors for the resource cache and the navigation stack.
//!
//! Release-side operations never fail, and a rejected panel close is not an
//! error at all (`Navigator::close` reports it as `Ok(false)`); the variants
//! here cover fetch failures, misconfiguration and caller invariant
//! violations.

use thiserror::Error;

use crate::panel::PanelTypeId;
use crate::phase::PhaseError;
use crate::resource::ResourceKey;

/// Errors surfaced by resource acquisition.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The injected fetcher failed for this key. The cache entry has been
    /// removed; no retry is attempted.
    #[error("failed to fetch resource `{key}`: {message}")]
    FetchFailed { key: ResourceKey, message: String },
}

/// Errors surfaced by the navigation stack manager.
#[derive(Debug, Error)]
pub enum StackError {
    /// No resource path is registered for the panel type; the open aborts
    /// before any phase transition.
    #[error("no resource path registered for panel type `{0}`")]
    UnknownPathForType(PanelTypeId),

    /// No controller constructor is registered for the panel type.
    #[error("no controller registered for panel type `{0}`")]
    Unregistered(PanelTypeId),

    /// The panel type already has an active instance on the stack.
    #[error("panel type `{0}` is already open")]
    AlreadyOpen(PanelTypeId),

    /// The targeted panel is not on the stack. For closes this indicates a
    /// corrupted caller invariant, not a tolerable race.
    #[error("panel type `{0}` is not on the stack")]
    NotOnStack(PanelTypeId),

    /// Another transition for this panel is still underway; retry once it
    /// settles.
    #[error("panel type `{0}` has a transition in flight")]
    TransitionInFlight(PanelTypeId),

    /// The visual host failed to instantiate the panel's surface.
    #[error("failed to instantiate surface for panel type `{type_id}`: {message}")]
    SurfaceFailed {
        type_id: PanelTypeId,
        message: String,
    },

    /// The panel's loading hook aborted the open. Acquired resources have
    /// been rolled back.
    #[error("loading aborted for panel type `{type_id}`: {message}")]
    LoadingAborted {
        type_id: PanelTypeId,
        message: String,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}
