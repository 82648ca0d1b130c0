//! Circuit-relay lifecycle manager.
//!
//! [`controller`] holds the pure state machine driving reservation
//! gain/loss and recovery (§4.D's four-state table); [`refresh`] performs
//! the actual seven-step IO recovery algorithm. [`RelayManager`] wires the
//! two together with real event sources: the transport host's circuit
//! events, a periodic tick, and inbound relay-refresh pulses delivered by
//! the Stream Dispatcher.

mod controller;
mod error;
mod pulse;
mod refresh;

pub use controller::{RelayAction, RelayController, RelayEvent, RelayState};
pub use error::RelayError;
pub use pulse::PulseFn;
pub use refresh::{refresh as run_refresh, SingleFlight};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use goop_transport::{CircuitEvent, GoopNode, Peerstore, RelayInfo};
use tokio::sync::mpsc;

fn state_to_u8(state: RelayState) -> u8 {
    match state {
        RelayState::NoCircuit => 0,
        RelayState::Acquiring => 1,
        RelayState::Healthy => 2,
        RelayState::Recovering => 3,
    }
}

/// Drives a [`RelayController`] from live event sources and runs the
/// refresh algorithm whenever the controller asks for it.
pub struct RelayManager {
    pulse_tx: mpsc::Sender<()>,
    state: Arc<AtomicU8>,
}

impl RelayManager {
    /// Spawn the manager's background task. `tick_interval` should be
    /// shorter than `relay.recovery_grace` so grace-elapsed transitions
    /// are observed promptly. `directory_pulse` is the optional §6
    /// `PulseFn` collaborator supplied by the rendezvous directory
    /// (out of scope); when present it is tried alongside the direct
    /// dial during every refresh.
    pub fn spawn(
        node: Arc<GoopNode>,
        peerstore: Arc<Peerstore>,
        relay: RelayInfo,
        tick_interval: Duration,
        directory_pulse: Option<Arc<dyn PulseFn>>,
    ) -> Self {
        let (pulse_tx, mut pulse_rx) = mpsc::channel(8);
        let state = Arc::new(AtomicU8::new(state_to_u8(RelayState::NoCircuit)));
        let state_for_task = state.clone();

        tokio::spawn(async move {
            let mut controller = RelayController::new(relay.recovery_grace);
            let guard = SingleFlight::new();
            let mut circuit_events = node.circuit_events();
            let mut ticker = tokio::time::interval(tick_interval);

            apply(&mut controller, RelayEvent::Init, &node, &peerstore, &relay, &guard, directory_pulse.as_ref()).await;
            state_for_task.store(state_to_u8(controller.state()), Ordering::Relaxed);

            loop {
                let event = tokio::select! {
                    _ = ticker.tick() => RelayEvent::Tick,
                    received = circuit_events.recv() => match received {
                        Ok(CircuitEvent::Gained) => RelayEvent::CircuitGained,
                        Ok(CircuitEvent::Lost) => RelayEvent::CircuitLost,
                        Err(_) => continue,
                    },
                    pulse = pulse_rx.recv() => {
                        if pulse.is_none() {
                            break;
                        }
                        RelayEvent::InboundPulse
                    }
                };
                apply(&mut controller, event, &node, &peerstore, &relay, &guard, directory_pulse.as_ref()).await;
                state_for_task.store(state_to_u8(controller.state()), Ordering::Relaxed);
            }
        });

        Self { pulse_tx, state }
    }

    /// Deliver an inbound relay-refresh pulse (§4.D, §6 `PulseFn`) —
    /// called by the Stream Dispatcher when a relay-refresh stream
    /// arrives from the relay peer.
    pub async fn pulse(&self) {
        let _ = self.pulse_tx.send(()).await;
    }

    /// Current controller state, for the relay-refresh handler's
    /// `{ok, has_circuit, recovering?}` response (§4.F).
    pub fn is_recovering(&self) -> bool {
        self.state.load(Ordering::Relaxed) == state_to_u8(RelayState::Recovering)
    }
}

/// Apply one event to the controller, perform the resulting action, and
/// feed any follow-up event the action produces back into the controller.
async fn apply(
    controller: &mut RelayController,
    event: RelayEvent,
    node: &Arc<GoopNode>,
    peerstore: &Arc<Peerstore>,
    relay: &RelayInfo,
    guard: &SingleFlight,
    directory_pulse: Option<&Arc<dyn PulseFn>>,
) {
    let action = controller.handle(event);
    let follow_up = match action {
        RelayAction::ConnectAndSubscribe | RelayAction::RunRefresh => {
            match run_refresh(guard, node, peerstore, relay, directory_pulse).await {
                Ok(()) => Some(RelayEvent::RefreshAcquired),
                Err(RelayError::AlreadyRecovering) => None,
                Err(e) => {
                    tracing::warn!(relay = %relay.relay_id, error = %e, "relay refresh failed");
                    Some(RelayEvent::RefreshDeadlineElapsed)
                }
            }
        }
        RelayAction::NudgePeerstore => {
            peerstore.clear_backoff_hint(relay.relay_id);
            None
        }
        RelayAction::LogAcquired => {
            tracing::info!(relay = %relay.relay_id, "circuit relay reservation acquired");
            None
        }
        RelayAction::ScheduleRetryAfter(after) => {
            tracing::warn!(relay = %relay.relay_id, retry_after = ?after, "relay recovery gave up, will retry");
            None
        }
        RelayAction::RemainAcquiring | RelayAction::None => None,
    };

    if let Some(event) = follow_up {
        let action = controller.handle(event);
        // Follow-up actions here are only ever logging/bookkeeping —
        // RunRefresh never immediately re-fires from RefreshAcquired or
        // RefreshDeadlineElapsed in the state table.
        apply_terminal(action, peerstore, relay);
    }
}

fn apply_terminal(action: RelayAction, peerstore: &Arc<Peerstore>, relay: &RelayInfo) {
    match action {
        RelayAction::LogAcquired => {
            tracing::info!(relay = %relay.relay_id, "circuit relay reservation acquired");
        }
        RelayAction::ScheduleRetryAfter(after) => {
            tracing::warn!(relay = %relay.relay_id, retry_after = ?after, "relay recovery gave up, will retry");
        }
        RelayAction::NudgePeerstore => {
            peerstore.clear_backoff_hint(relay.relay_id);
        }
        _ => {}
    }
}
