//! Worker registry
//!
//! The coordinator's list of known worker endpoints and their connection
//! state. Entries are created by discovery (or an explicit host list),
//! promoted to Connected by the dispatch loop's connect step, and demoted
//! on read or write failure. A Disconnected worker stays in the registry
//! and is retried on the next scheduling pass.

use std::net::SocketAddr;

/// Connection state of a known worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Learned from discovery, never connected yet
    Discovered,
    /// Live TCP connection held by the dispatch loop
    Connected,
    /// Connection lost; eligible for reconnection
    Disconnected,
}

/// A known worker endpoint
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub endpoint: SocketAddr,
    pub state: ConnectionState,
    /// Back-reference to the task currently assigned to this worker
    /// (bookkeeping, not ownership). At most one at a time.
    pub in_flight: Option<usize>,
}

/// Registry of all workers known to the coordinator
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerEntry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker endpoint, deduplicating by IP address.
    ///
    /// Returns true if the endpoint was new. Receiving the same worker's
    /// discovery acknowledgement twice must not create two entries.
    pub fn register(&mut self, endpoint: SocketAddr) -> bool {
        if self.workers.iter().any(|w| w.endpoint.ip() == endpoint.ip()) {
            return false;
        }

        self.workers.push(WorkerEntry {
            endpoint,
            state: ConnectionState::Discovered,
            in_flight: None,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&WorkerEntry> {
        self.workers.get(id)
    }

    /// Endpoint of a registered worker. Ids come from this registry and
    /// are never removed, so indexing holds.
    pub fn endpoint(&self, id: usize) -> SocketAddr {
        self.workers[id].endpoint
    }

    /// Worker ids that are not currently Connected
    pub fn unconnected(&self) -> Vec<usize> {
        self.workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.state != ConnectionState::Connected)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn mark_connected(&mut self, id: usize) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.state = ConnectionState::Connected;
        }
    }

    /// Demote a worker on read or write failure, clearing its in-flight
    /// back-reference. The task itself keeps its state; reassignment is
    /// driven entirely by the task table.
    pub fn mark_disconnected(&mut self, id: usize) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.state = ConnectionState::Disconnected;
            worker.in_flight = None;
        }
    }

    pub fn set_in_flight(&mut self, id: usize, task_id: Option<usize>) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.in_flight = task_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> SocketAddr {
        format!("{}:{}", ip, port).parse().unwrap()
    }

    #[test]
    fn test_register_dedupes_by_ip() {
        let mut registry = WorkerRegistry::new();
        assert!(registry.register(addr("10.0.1.10", 9999)));
        assert!(!registry.register(addr("10.0.1.10", 9999)));
        // Same IP on a different source port is still the same worker
        assert!(!registry.register(addr("10.0.1.10", 4242)));
        assert!(registry.register(addr("10.0.1.11", 9999)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_state_transitions() {
        let mut registry = WorkerRegistry::new();
        registry.register(addr("10.0.1.10", 9999));
        assert_eq!(registry.get(0).unwrap().state, ConnectionState::Discovered);

        registry.mark_connected(0);
        assert_eq!(registry.get(0).unwrap().state, ConnectionState::Connected);
        assert!(registry.unconnected().is_empty());

        registry.mark_disconnected(0);
        assert_eq!(
            registry.get(0).unwrap().state,
            ConnectionState::Disconnected
        );
        assert_eq!(registry.unconnected(), vec![0]);
    }

    #[test]
    fn test_disconnect_clears_in_flight() {
        let mut registry = WorkerRegistry::new();
        registry.register(addr("10.0.1.10", 9999));
        registry.mark_connected(0);
        registry.set_in_flight(0, Some(7));
        assert_eq!(registry.get(0).unwrap().in_flight, Some(7));

        registry.mark_disconnected(0);
        assert_eq!(registry.get(0).unwrap().in_flight, None);
    }
}
