//! Client callback registry.
//!
//! One event sink per client identity. Each registration carries a serial
//! number and a cancellation token: the liveness monitor spawned for it
//! reports `(client, serial)` when the sink's receiving side goes away, and
//! the removal only applies if that registration is still the current one.

use std::collections::HashMap;

use perspective_types::{ClientId, PerspectiveState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Where a registered client receives lifecycle events.
///
/// The receiving half belongs to the client. Dropping it is how the client
/// goes away, and is what the liveness monitor watches for.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PerspectiveState>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PerspectiveState>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PerspectiveState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Deliver one event. Never blocks; fails only if the client is gone.
    fn deliver(&self, state: PerspectiveState) -> bool {
        self.tx.send(state).is_ok()
    }

    /// Resolves once the client has dropped its receiver.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
struct Registration {
    sink: EventSink,
    serial: u64,
    liveness: CancellationToken,
}

/// A newly inserted registration, for wiring up its liveness monitor.
#[derive(Debug)]
pub struct Registered {
    pub serial: u64,
    pub liveness: CancellationToken,
    /// An earlier registration for the same client was replaced.
    pub replaced: bool,
}

/// Registered event sinks keyed by client identity.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: HashMap<ClientId, Registration>,
    next_serial: u64,
}

impl CallbackRegistry {
    /// Register `sink` for `client`, replacing any earlier registration.
    pub fn insert(&mut self, client: ClientId, sink: EventSink) -> Registered {
        self.next_serial += 1;
        let serial = self.next_serial;
        let liveness = CancellationToken::new();

        let previous = self.entries.insert(
            client,
            Registration {
                sink,
                serial,
                liveness: liveness.clone(),
            },
        );
        if let Some(previous) = &previous {
            previous.liveness.cancel();
        }

        Registered {
            serial,
            liveness,
            replaced: previous.is_some(),
        }
    }

    /// Remove the registration for `client` if it is still the one created
    /// with `serial`. Returns whether anything was removed.
    pub fn remove_if_current(&mut self, client: ClientId, serial: u64) -> bool {
        match self.entries.get(&client) {
            Some(entry) if entry.serial == serial => {
                self.remove(client);
                true
            }
            _ => false,
        }
    }

    fn remove(&mut self, client: ClientId) {
        if let Some(entry) = self.entries.remove(&client) {
            entry.liveness.cancel();
        }
    }

    /// Deliver `state` to every registered sink.
    ///
    /// A sink that cannot be reached is treated as a dead client and
    /// removed; delivery to the others carries on. Returns the removed
    /// clients.
    pub fn dispatch(&mut self, state: PerspectiveState) -> Vec<ClientId> {
        let dead: Vec<ClientId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.sink.deliver(state))
            .map(|(client, _)| *client)
            .collect();

        for client in &dead {
            debug!(client = %client, %state, "failed to dispatch event, dropping callback");
            self.remove(*client);
        }
        dead
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.liveness.cancel();
        }
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.entries.contains_key(&client)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reaches_every_sink() {
        let mut registry = CallbackRegistry::default();
        let (a, mut rx_a) = EventSink::channel();
        let (b, mut rx_b) = EventSink::channel();
        registry.insert(ClientId(1), a);
        registry.insert(ClientId(2), b);

        assert!(registry.dispatch(PerspectiveState::Starting).is_empty());
        assert_eq!(rx_a.try_recv().unwrap(), PerspectiveState::Starting);
        assert_eq!(rx_b.try_recv().unwrap(), PerspectiveState::Starting);
    }

    #[test]
    fn unreachable_sink_is_removed_and_others_still_served() {
        let mut registry = CallbackRegistry::default();
        let (dead, rx_dead) = EventSink::channel();
        let (alive, mut rx_alive) = EventSink::channel();
        let dead_reg = registry.insert(ClientId(1), dead);
        registry.insert(ClientId(2), alive);
        drop(rx_dead);

        let removed = registry.dispatch(PerspectiveState::Running);
        assert_eq!(removed, vec![ClientId(1)]);
        assert!(dead_reg.liveness.is_cancelled());
        assert!(!registry.contains(ClientId(1)));
        assert_eq!(rx_alive.try_recv().unwrap(), PerspectiveState::Running);

        // Later dispatches neither touch nor report the removed client.
        assert!(registry.dispatch(PerspectiveState::Stopping).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregistration_replaces_and_cancels_previous_monitor() {
        let mut registry = CallbackRegistry::default();
        let (first, mut rx_first) = EventSink::channel();
        let (second, mut rx_second) = EventSink::channel();

        let first_reg = registry.insert(ClientId(7), first);
        assert!(!first_reg.replaced);
        let second_reg = registry.insert(ClientId(7), second);
        assert!(second_reg.replaced);
        assert!(first_reg.liveness.is_cancelled());
        assert!(!second_reg.liveness.is_cancelled());
        assert_eq!(registry.len(), 1);

        registry.dispatch(PerspectiveState::Starting);
        assert!(rx_first.try_recv().is_err());
        assert_eq!(rx_second.try_recv().unwrap(), PerspectiveState::Starting);
    }

    #[test]
    fn stale_removal_does_not_touch_replacement() {
        let mut registry = CallbackRegistry::default();
        let (first, _rx_first) = EventSink::channel();
        let (second, _rx_second) = EventSink::channel();
        let first_reg = registry.insert(ClientId(7), first);
        let second_reg = registry.insert(ClientId(7), second);

        assert!(!registry.remove_if_current(ClientId(7), first_reg.serial));
        assert!(registry.contains(ClientId(7)));
        assert!(registry.remove_if_current(ClientId(7), second_reg.serial));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_cancels_all_monitors() {
        let mut registry = CallbackRegistry::default();
        let (sink, _rx) = EventSink::channel();
        let reg = registry.insert(ClientId(3), sink);
        registry.clear();
        assert!(reg.liveness.is_cancelled());
        assert!(registry.is_empty());
    }
}
