/// Behavioral configuration for the navigation stack manager.
///
/// Constructed explicitly and handed to [`crate::Navigator::new`]; designed
/// to be filled from config files or CLI arguments by the embedding
/// application.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Closing a panel that is not on the stack means a caller invariant
    /// was violated upstream. When set, such a close panics so the state
    /// can be inspected instead of silently continuing; it is always logged
    /// and surfaced as an error either way. Defaults to on in debug builds.
    pub halt_on_stack_corruption: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            halt_on_stack_corruption: cfg!(debug_assertions),
        }
    }
}
