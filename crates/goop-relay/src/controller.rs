use std::time::{Duration, Instant};

/// Relay Controller state (§4.D's four-state table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    NoCircuit,
    Acquiring,
    Healthy,
    Recovering,
}

/// Events the controller reacts to. Timers (`grace elapsed`, `tick`) are
/// driven by the caller rather than owned here, same as the transport
/// host's path watcher feeding events rather than polling internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    /// A relay peer was supplied at construction time.
    Init,
    CircuitGained,
    CircuitLost,
    /// Periodic tick, fired on some fixed cadence by the caller.
    Tick,
    /// An inbound relay-refresh pulse (§4.D, §6 `PulseFn`).
    InboundPulse,
    RefreshAcquired,
    RefreshDeadlineElapsed,
}

/// What the caller should do in response to a transition. Pure and
/// side-effect-free — the controller never performs IO itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    ConnectAndSubscribe,
    LogAcquired,
    RemainAcquiring,
    RunRefresh,
    /// Clear dial backoff toward the relay and refresh the peerstore
    /// entry, without necessarily running the full refresh algorithm.
    NudgePeerstore,
    ScheduleRetryAfter(Duration),
    None,
}

/// Pure state machine for the circuit-relay lifecycle. IO (dialing,
/// peerstore mutation, the refresh algorithm itself) lives in
/// [`crate::refresh`]; this type only decides what should happen next.
pub struct RelayController {
    state: RelayState,
    recovery_grace: Duration,
    /// When the circuit was first observed lost while Healthy; used to
    /// decide whether `recovery_grace` has elapsed on the next tick.
    lost_since: Option<Instant>,
}

impl RelayController {
    pub fn new(recovery_grace: Duration) -> Self {
        Self {
            state: RelayState::NoCircuit,
            recovery_grace,
            lost_since: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn handle(&mut self, event: RelayEvent) -> RelayAction {
        use RelayEvent::*;
        use RelayState::*;

        match (self.state, event) {
            (NoCircuit, Init) => {
                self.state = Acquiring;
                RelayAction::ConnectAndSubscribe
            }
            (Acquiring, CircuitGained) => {
                self.state = Healthy;
                RelayAction::LogAcquired
            }
            (Acquiring, RefreshAcquired) => {
                self.state = Healthy;
                RelayAction::LogAcquired
            }
            (Acquiring, Tick) => RelayAction::RemainAcquiring,

            (Healthy, CircuitLost) => {
                self.lost_since = Some(Instant::now());
                // Stay Healthy until recovery_grace elapses (checked on
                // the next Tick); transition happens there.
                RelayAction::None
            }
            (Healthy, Tick) => {
                if let Some(lost_since) = self.lost_since {
                    if lost_since.elapsed() >= self.recovery_grace {
                        self.lost_since = None;
                        self.state = Recovering;
                        return RelayAction::RunRefresh;
                    }
                }
                RelayAction::None
            }
            (Healthy, InboundPulse) => {
                // Nudge always; only escalate to a background refresh if
                // still lacking circuit (caller tells us via lost_since).
                if self.lost_since.is_some() {
                    self.state = Recovering;
                    RelayAction::RunRefresh
                } else {
                    RelayAction::NudgePeerstore
                }
            }
            (Healthy, CircuitGained) => {
                self.lost_since = None;
                RelayAction::None
            }

            (Recovering, RefreshAcquired) => {
                self.state = Healthy;
                RelayAction::LogAcquired
            }
            (Recovering, RefreshDeadlineElapsed) => {
                self.state = NoCircuit;
                RelayAction::ScheduleRetryAfter(Duration::from_secs(30))
            }
            (Recovering, InboundPulse) => RelayAction::NudgePeerstore,

            (NoCircuit, Tick) => {
                self.state = Acquiring;
                RelayAction::ConnectAndSubscribe
            }

            _ => RelayAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_starts_acquiring() {
        let mut c = RelayController::new(Duration::from_millis(10));
        assert_eq!(c.handle(RelayEvent::Init), RelayAction::ConnectAndSubscribe);
        assert_eq!(c.state(), RelayState::Acquiring);
    }

    #[test]
    fn acquiring_to_healthy_on_circuit_gained() {
        let mut c = RelayController::new(Duration::from_millis(10));
        c.handle(RelayEvent::Init);
        assert_eq!(c.handle(RelayEvent::CircuitGained), RelayAction::LogAcquired);
        assert_eq!(c.state(), RelayState::Healthy);
    }

    #[test]
    fn acquiring_to_healthy_on_refresh_acquired() {
        let mut c = RelayController::new(Duration::from_millis(10));
        c.handle(RelayEvent::Init);
        assert_eq!(c.handle(RelayEvent::RefreshAcquired), RelayAction::LogAcquired);
        assert_eq!(c.state(), RelayState::Healthy);
    }

    #[test]
    fn healthy_runs_refresh_after_grace_elapses() {
        let mut c = RelayController::new(Duration::from_millis(5));
        c.handle(RelayEvent::Init);
        c.handle(RelayEvent::CircuitGained);

        assert_eq!(c.handle(RelayEvent::CircuitLost), RelayAction::None);
        assert_eq!(c.state(), RelayState::Healthy);

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(c.handle(RelayEvent::Tick), RelayAction::RunRefresh);
        assert_eq!(c.state(), RelayState::Recovering);
    }

    #[test]
    fn recovering_deadline_schedules_retry_and_resets_to_no_circuit() {
        let mut c = RelayController::new(Duration::from_millis(5));
        c.handle(RelayEvent::Init);
        c.handle(RelayEvent::CircuitGained);
        c.handle(RelayEvent::CircuitLost);
        std::thread::sleep(Duration::from_millis(10));
        c.handle(RelayEvent::Tick);
        assert_eq!(c.state(), RelayState::Recovering);

        let action = c.handle(RelayEvent::RefreshDeadlineElapsed);
        assert_eq!(action, RelayAction::ScheduleRetryAfter(Duration::from_secs(30)));
        assert_eq!(c.state(), RelayState::NoCircuit);
    }

    #[test]
    fn inbound_pulse_while_healthy_with_circuit_only_nudges() {
        let mut c = RelayController::new(Duration::from_secs(5));
        c.handle(RelayEvent::Init);
        c.handle(RelayEvent::CircuitGained);
        assert_eq!(c.handle(RelayEvent::InboundPulse), RelayAction::NudgePeerstore);
        assert_eq!(c.state(), RelayState::Healthy);
    }
}
