//! Lifecycle phase machine shared by panels and flows.
//!
//! The same phase ladder drives both granularities: a single panel on the
//! navigation stack and a whole application flow. Entities advance one legal
//! step at a time, and the in-flight phases double as a transition lock: no
//! new transition may begin while one is underway.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// One discrete stage of an entity's asynchronous lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not yet scheduled, or freshly pulled from a pool
    Idle,

    /// Resource acquisition and predecessor coordination in progress
    Loading,

    /// Loading finished, entry logic not yet started
    Loaded,

    /// User-visible activation logic in progress
    Entering,

    /// Live; receives per-frame updates
    Active,

    /// Exit routine in progress, may still be rejected
    Exiting,

    /// Fully exited; parkable in a pool
    Disabled,
}

impl Phase {
    /// Whether stepping from `self` to `next` is legal.
    ///
    /// `Exiting -> Active` is the rejected-close revert and
    /// `Disabled -> Idle` is pool reuse; everything else walks the ladder
    /// forward one step.
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Loading)
                | (Phase::Loading, Phase::Loaded)
                | (Phase::Loaded, Phase::Entering)
                | (Phase::Entering, Phase::Active)
                | (Phase::Active, Phase::Exiting)
                | (Phase::Exiting, Phase::Disabled)
                | (Phase::Exiting, Phase::Active)
                | (Phase::Disabled, Phase::Idle)
        )
    }

    /// Phases during which an asynchronous entry action is still running.
    /// While one of these holds, no other transition may begin for the
    /// entity.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Loading | Phase::Entering | Phase::Exiting)
    }

    /// Per-frame updates are delivered only while active.
    pub fn receives_update(self) -> bool {
        self == Phase::Active
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A phase step that is not in the legal transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
}

/// Shared, observable phase slot.
///
/// Both the navigation stack and the flow manager park an entity's phase in
/// one of these. Transitions are validated against the table atomically, and
/// other tasks can await a particular phase through [`PhaseCell::subscribe`].
#[derive(Clone)]
pub struct PhaseCell {
    tx: Arc<watch::Sender<Phase>>,
}

impl PhaseCell {
    /// New cell starting at [`Phase::Idle`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Current phase.
    pub fn get(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Step to `next`, failing without modification if the step is not in
    /// the transition table. The check and the update are a single atomic
    /// operation on the cell.
    pub fn advance(&self, next: Phase) -> Result<(), PhaseError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| {
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                result = Err(PhaseError::IllegalTransition {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        result
    }

    /// Overwrite the phase outside the transition table. Reserved for
    /// teardown of entities that never ran and for abandoning a flow whose
    /// load failed.
    pub(crate) fn force(&self, next: Phase) {
        self.tx.send_modify(|current| *current = next);
    }

    /// Receiver for awaiting phase changes (`Receiver::wait_for`).
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhaseCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PhaseCell").field(&self.get()).finish()
    }
}
