use std::sync::Arc;
use std::time::Duration;

use goop_transport::{GoopNode, Peerstore, RelayInfo};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::RelayError;
use crate::pulse::PulseFn;

/// Guards the refresh algorithm so concurrent triggers degrade to a
/// single attempt (§5: "single-flight mutex via `TryLock`").
#[derive(Default)]
pub struct SingleFlight(Mutex<()>);

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Run the seven-step relay refresh algorithm (§4.D). Returns once a
/// circuit address has been observed in the peerstore, or
/// [`RelayError::PollDeadlineElapsed`] if `poll_deadline` passes first.
///
/// Holds `guard` for the duration; a second concurrent call observes
/// [`RelayError::AlreadyRecovering`] and returns immediately instead of
/// queuing behind the first.
pub async fn refresh(
    guard: &SingleFlight,
    node: &GoopNode,
    peerstore: &Arc<Peerstore>,
    relay: &RelayInfo,
    pulse: Option<&Arc<dyn PulseFn>>,
) -> Result<(), RelayError> {
    let _permit = guard.0.try_lock().map_err(|_| RelayError::AlreadyRecovering)?;

    // 1. Close every existing connection to the relay peer.
    node.disconnect(relay.relay_id).await;

    // 2. Wait cleanup-delay so the relay releases the reservation slot.
    sleep(relay.cleanup_delay).await;

    // 3. Clear dial backoff toward the relay.
    peerstore.clear_backoff_hint(relay.relay_id);

    // 4. Re-add relay addresses to the peerstore with a 10-minute TTL
    //    (§9(c): keep the 10-minute path, not the 2-minute one).
    peerstore.add_addrs(relay.relay_id, relay.addrs.clone(), goop_transport::CIRCUIT_ADDR_TTL);

    // Best-effort: ask the rendezvous directory to nudge the relay on
    // our behalf in parallel with the direct dial below, in case the
    // relay is only reachable for us via that side channel (§6 `PulseFn`).
    if let Some(pulse) = pulse {
        if let Err(e) = pulse.pulse(relay.relay_id).await {
            tracing::debug!(relay = %relay.relay_id, error = %e, "directory pulse failed, continuing with direct dial");
        }
    }

    // 5. Dial the relay under connect-timeout.
    let connect = tokio::time::timeout(
        relay.connect_timeout,
        node.open_stream(relay.relay_id, goop_transport::PROTOCOL_RELAY_REFRESH),
    )
    .await;
    match connect {
        Ok(Ok(_streams)) => {}
        Ok(Err(e)) => return Err(RelayError::ConnectFailed(e.into())),
        Err(_) => return Err(RelayError::ConnectFailed(anyhow::anyhow!("relay connect timed out"))),
    }

    // 6. Request a direct reservation independent of auto-relay's own
    //    timer, so failure reasons stay observable — realized here by
    //    polling `home_relay`/circuit-event state in step 7 rather than
    //    trusting the endpoint's own relay retry loop.

    // 7. Poll every 500ms for a circuit address up to poll-deadline.
    let poll_interval = Duration::from_millis(500);
    let deadline = tokio::time::Instant::now() + relay.poll_deadline;
    let mut events = node.circuit_events();
    loop {
        if peerstore.has_circuit_addr(&relay.relay_id) {
            tracing::info!(relay = %relay.relay_id, "relay reservation recovered");
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(RelayError::PollDeadlineElapsed);
        }
        tokio::select! {
            event = events.recv() => {
                if matches!(event, Ok(goop_transport::CircuitEvent::Gained)) {
                    tracing::info!(relay = %relay.relay_id, "relay reservation recovered");
                    return Ok(());
                }
            }
            _ = sleep(poll_interval) => {}
        }
    }
}
