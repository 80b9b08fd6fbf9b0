//! Three-state sync phase machine.
//!
//! ```text
//! WAITING --connect_established--> POSITIONING --start_play--> PLAYING
//!    ^                                                            |
//!    +------------------- disconnect_or_reset (any) --------------+
//! ```

use contracts::SyncPhase;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// Phase trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Peer became reachable
    ConnectEstablished,
    /// Play was requested
    StartPlay,
    /// Peer lost or reset requested
    DisconnectOrReset,
}

impl Transition {
    /// Phase reached from `from`; unlisted pairs leave the phase unchanged
    pub fn apply(self, from: SyncPhase) -> SyncPhase {
        match (self, from) {
            (Self::ConnectEstablished, SyncPhase::Waiting) => SyncPhase::Positioning,
            (Self::StartPlay, SyncPhase::Positioning) => SyncPhase::Playing,
            (Self::DisconnectOrReset, _) => SyncPhase::Waiting,
            (_, unchanged) => unchanged,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectEstablished => "connect_established",
            Self::StartPlay => "start_play",
            Self::DisconnectOrReset => "disconnect_or_reset",
        }
    }
}

/// Sync state machine
///
/// The phase lives in a `watch` channel: every transition is computed and
/// committed under the channel's lock, and observers can subscribe to changes.
#[derive(Debug)]
pub struct SyncStateMachine {
    name: String,
    phase: watch::Sender<SyncPhase>,
    transitions: AtomicU64,
    returns_to_waiting: AtomicU64,
}

impl SyncStateMachine {
    /// Create a machine in WAITING
    pub fn new(name: impl Into<String>) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Waiting);
        Self {
            name: name.into(),
            phase,
            transitions: AtomicU64::new(0),
            returns_to_waiting: AtomicU64::new(0),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Real phase changes so far
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Changes that ended in WAITING (peer lost or reset)
    pub fn returns_to_waiting(&self) -> u64 {
        self.returns_to_waiting.load(Ordering::Relaxed)
    }

    /// WAITING -> POSITIONING
    pub fn connect_established(&self) -> SyncPhase {
        self.fire(Transition::ConnectEstablished)
    }

    /// POSITIONING -> PLAYING
    pub fn start_play(&self) -> SyncPhase {
        self.fire(Transition::StartPlay)
    }

    /// any -> WAITING
    pub fn disconnect_or_reset(&self) -> SyncPhase {
        self.fire(Transition::DisconnectOrReset)
    }

    /// Apply a trigger atomically, returning the resulting phase
    pub fn fire(&self, transition: Transition) -> SyncPhase {
        let mut from = SyncPhase::Waiting;
        let mut to = SyncPhase::Waiting;
        let changed = self.phase.send_if_modified(|phase| {
            from = *phase;
            to = transition.apply(from);
            *phase = to;
            from != to
        });

        if changed {
            self.transitions.fetch_add(1, Ordering::Relaxed);
            if to == SyncPhase::Waiting {
                self.returns_to_waiting.fetch_add(1, Ordering::Relaxed);
            }
            info!(
                node = %self.name,
                trigger = transition.as_str(),
                from = %from,
                to = %to,
                "Phase changed"
            );
            observability::record_phase_transition(from, to);
        } else {
            debug!(
                node = %self.name,
                trigger = transition.as_str(),
                phase = %to,
                "Trigger ignored"
            );
        }
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SyncPhase; 3] = [SyncPhase::Waiting, SyncPhase::Positioning, SyncPhase::Playing];

    #[test]
    fn transition_table() {
        use SyncPhase::*;
        use Transition::*;

        let expected = [
            (ConnectEstablished, Waiting, Positioning),
            (ConnectEstablished, Positioning, Positioning),
            (ConnectEstablished, Playing, Playing),
            (StartPlay, Waiting, Waiting),
            (StartPlay, Positioning, Playing),
            (StartPlay, Playing, Playing),
            (DisconnectOrReset, Waiting, Waiting),
            (DisconnectOrReset, Positioning, Waiting),
            (DisconnectOrReset, Playing, Waiting),
        ];
        for (trigger, from, to) in expected {
            assert_eq!(trigger.apply(from), to, "{trigger:?} from {from}");
        }
    }

    #[test]
    fn triggers_are_idempotent() {
        for trigger in [
            Transition::ConnectEstablished,
            Transition::StartPlay,
            Transition::DisconnectOrReset,
        ] {
            for from in ALL {
                let once = trigger.apply(from);
                assert_eq!(trigger.apply(once), once);
            }
        }
    }

    #[test]
    fn machine_walks_the_full_cycle() {
        let machine = SyncStateMachine::new("test");
        assert_eq!(machine.phase(), SyncPhase::Waiting);

        // play before connect is a no-op
        assert_eq!(machine.start_play(), SyncPhase::Waiting);
        assert_eq!(machine.connect_established(), SyncPhase::Positioning);
        assert_eq!(machine.start_play(), SyncPhase::Playing);
        assert_eq!(machine.connect_established(), SyncPhase::Playing);
        assert_eq!(machine.disconnect_or_reset(), SyncPhase::Waiting);
    }

    #[test]
    fn only_real_changes_are_counted() {
        let machine = SyncStateMachine::new("test");
        machine.start_play();
        machine.disconnect_or_reset();
        assert_eq!(machine.transition_count(), 0);

        machine.connect_established();
        machine.connect_established();
        machine.start_play();
        machine.disconnect_or_reset();
        machine.connect_established();
        machine.disconnect_or_reset();
        assert_eq!(machine.transition_count(), 5);
        assert_eq!(machine.returns_to_waiting(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_only_real_changes() {
        let machine = SyncStateMachine::new("test");
        let mut rx = machine.subscribe();

        machine.start_play();
        assert!(!rx.has_changed().unwrap());

        machine.connect_established();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SyncPhase::Positioning);
    }

    #[test]
    fn concurrent_triggers_leave_a_valid_phase() {
        let machine = std::sync::Arc::new(SyncStateMachine::new("test"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let machine = std::sync::Arc::clone(&machine);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        match i % 3 {
                            0 => machine.connect_established(),
                            1 => machine.start_play(),
                            _ => machine.disconnect_or_reset(),
                        };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(ALL.contains(&machine.phase()));
    }
}
