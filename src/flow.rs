//! Coarse-grained application flows driven through the shared phase ladder.
//!
//! A flow is a whole screen or scene sequenced with the same phases as a
//! panel, at a coarser granularity. The manager drives exactly one current
//! flow per frame tick and serialises switches: a new flow's loading never
//! begins until the flow it replaced has fully exited.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::phase::{Phase, PhaseCell};

/// A coarse application mode driven through the phase ladder. Unlike a
/// panel close, a flow exit cannot be rejected.
#[async_trait]
pub trait Flow: Send {
    /// Resource and data loading for the flow. An error abandons the flow.
    async fn load(&mut self) -> anyhow::Result<()>;

    /// First-entry logic once loading completes.
    async fn enter(&mut self);

    /// Per-frame update while the flow is active.
    fn update(&mut self);

    /// Teardown when the flow is replaced.
    async fn exit(&mut self);
}

#[derive(Clone)]
struct FlowSlot {
    flow: Arc<Mutex<Box<dyn Flow>>>,
    phase: PhaseCell,
}

impl FlowSlot {
    fn new(flow: Box<dyn Flow>) -> Self {
        Self {
            flow: Arc::new(Mutex::new(flow)),
            phase: PhaseCell::new(),
        }
    }
}

/// Drives a single current flow through its phases, one spawned transition
/// at a time, and hands each superseded flow to its successor to wait out.
///
/// Must be driven from within a Tokio runtime: transition entry actions run
/// as spawned tasks whose completion is observed through the flow's phase
/// cell.
#[derive(Default)]
pub struct FlowManager {
    current: Option<FlowSlot>,
    /// Predecessor not yet claimed by a successor's loading task.
    pending_previous: Option<FlowSlot>,
    /// Observation handle for the predecessor until it reaches `Disabled`.
    previous_phase: Option<PhaseCell>,
}

impl FlowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `flow` as the current flow. The flow it replaces becomes the
    /// predecessor that the newcomer's loading waits out. A replaced flow
    /// that was never scheduled is discarded without running any hooks.
    pub fn switch_flow(&mut self, flow: Box<dyn Flow>) {
        if let Some(old) = self.current.take() {
            if self.pending_previous.is_some() {
                // Only reachable while `old` is still Idle: a scheduled flow
                // claims the predecessor slot when it starts loading. Keep
                // the older predecessor for the newcomer to await.
                old.phase.force(Phase::Disabled);
                debug!("discarded never-scheduled flow in favour of a newer switch");
            } else {
                self.previous_phase = Some(old.phase.clone());
                self.pending_previous = Some(old);
            }
        }
        self.current = Some(FlowSlot::new(flow));
        info!("switched current flow");
    }

    /// Per-frame driver: dispatches on the current flow's phase. In-flight
    /// phases are left alone until their task settles the phase cell.
    pub fn update(&mut self) {
        if self
            .previous_phase
            .as_ref()
            .is_some_and(|cell| cell.get() == Phase::Disabled)
        {
            self.previous_phase = None;
        }

        let Some(current) = &self.current else { return };
        match current.phase.get() {
            Phase::Idle => {
                if let Err(err) = current.phase.advance(Phase::Loading) {
                    error!("flow scheduling failed: {}", err);
                    return;
                }
                let slot = current.clone();
                let predecessor = self.pending_previous.take();
                tokio::spawn(async move {
                    if let Some(previous) = predecessor {
                        drive_full_exit(previous).await;
                    }
                    let mut flow = slot.flow.lock().await;
                    match flow.load().await {
                        Ok(()) => settle(&slot.phase, Phase::Loaded),
                        Err(err) => {
                            error!("flow load failed, abandoning flow: {err:#}");
                            slot.phase.force(Phase::Disabled);
                        }
                    }
                });
            }
            Phase::Loaded => {
                if let Err(err) = current.phase.advance(Phase::Entering) {
                    error!("flow entering failed: {}", err);
                    return;
                }
                let slot = current.clone();
                tokio::spawn(async move {
                    let mut flow = slot.flow.lock().await;
                    flow.enter().await;
                    settle(&slot.phase, Phase::Active);
                });
            }
            Phase::Active => {
                // Free while no transition holds the lock
                if let Ok(mut flow) = current.flow.try_lock() {
                    flow.update();
                }
            }
            Phase::Loading | Phase::Entering | Phase::Exiting | Phase::Disabled => {}
        }
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current.as_ref().map(|slot| slot.phase.get())
    }

    /// Phase of the flow being waited out, if one has not yet fully exited.
    pub fn previous_phase(&self) -> Option<Phase> {
        self.previous_phase.as_ref().map(|cell| cell.get())
    }
}

/// Walk a superseded flow through its remaining legal transitions until it
/// reaches `Disabled`, waiting out any transition already in flight. A flow
/// still Idle is discarded without hooks; one caught mid-arrival is driven
/// the rest of the way in (enter) before being exited, keeping every step
/// inside the transition table.
async fn drive_full_exit(slot: FlowSlot) {
    let mut rx = slot.phase.subscribe();
    loop {
        let settled_phase = match rx.wait_for(|p| !p.is_in_flight()).await {
            Ok(phase) => *phase,
            Err(_) => return,
        };
        match settled_phase {
            Phase::Idle => {
                slot.phase.force(Phase::Disabled);
                return;
            }
            Phase::Loaded => {
                if slot.phase.advance(Phase::Entering).is_err() {
                    return;
                }
                let mut flow = slot.flow.lock().await;
                flow.enter().await;
                settle(&slot.phase, Phase::Active);
            }
            Phase::Active => {
                if slot.phase.advance(Phase::Exiting).is_err() {
                    return;
                }
                let mut flow = slot.flow.lock().await;
                flow.exit().await;
                settle(&slot.phase, Phase::Disabled);
                debug!("previous flow fully exited");
                return;
            }
            Phase::Disabled => return,
            // Filtered out by the wait predicate
            Phase::Loading | Phase::Entering | Phase::Exiting => {}
        }
    }
}

fn settle(phase: &PhaseCell, next: Phase) {
    if let Err(err) = phase.advance(next) {
        error!("flow transition could not settle: {}", err);
    }
}
