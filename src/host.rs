//! Interface to the rendering/scene host.

use crate::resource::ResourceHandle;

/// Opaque identifier for an instantiated visual surface. Allocation and
/// meaning belong to the [`VisualHost`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// The rendering collaborator: instantiates visual objects from loaded
/// resources and exposes the activation and ordering operations the
/// navigation stack drives. Engine bindings implement this; the crate never
/// renders anything itself.
pub trait VisualHost: Send + Sync {
    /// Create a visual surface from a loaded resource.
    fn instantiate(&self, resource: &ResourceHandle) -> anyhow::Result<SurfaceHandle>;

    /// Show or hide the surface.
    fn set_visible(&self, surface: SurfaceHandle, visible: bool);

    /// Place the surface in the render order (0 = bottom-most).
    fn set_order(&self, surface: SurfaceHandle, index: usize);

    /// Destroy the surface and free its engine-side objects.
    fn destroy(&self, surface: SurfaceHandle);

    /// Whether the surface still exists. Surfaces can be destroyed behind
    /// the stack's back; dead ones are skipped during update delivery.
    fn is_alive(&self, surface: SurfaceHandle) -> bool;
}
