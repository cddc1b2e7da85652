//! Routing tables shared by the routers
//!
//! [`BackendSet`] owns every backend of a router exactly once; lifecycle
//! operations iterate it, however many write routes reference a backend.
//! [`RoutingTable`] adds the configuration-driven write routes and the two
//! read tiers on top of it.

use crate::core::logging::QueueLogger;
use crate::core::watchdog::{Checked, WatchdogRelay};
use crate::event::{Command, Event};
use crate::queue::cursor::{CursorPosition, Tiers};
use crate::queue::error::QueueResult;
use crate::queue::traits::SubQueue;
use regex::Regex;
use std::collections::HashMap;

/// Read priority of the sub-queues read after every prioritized one
pub const NOT_PRIORITIZED: i64 = -1;

/// Index of a backend in its [`BackendSet`]
pub type BackendId = usize;

/// Backends owned by a router, each stored once
#[derive(Default)]
pub struct BackendSet {
    backends: Vec<Box<dyn SubQueue>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a backend
    pub fn add(&mut self, backend: Box<dyn SubQueue>) -> BackendId {
        self.backends.push(backend);
        self.backends.len() - 1
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get_mut(&mut self, id: BackendId) -> &mut dyn SubQueue {
        self.backends[id].as_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|backend| backend.name().to_string())
            .collect()
    }

    /// Sum of the backend counts
    pub fn count(&mut self, relay: &WatchdogRelay) -> QueueResult<usize> {
        let mut count = 0;
        for backend in self.backends.iter_mut() {
            relay.set_active();
            count += backend.count()?;
        }
        Ok(count)
    }

    pub fn clear(&mut self, relay: &WatchdogRelay) -> QueueResult<()> {
        for backend in self.backends.iter_mut() {
            relay.set_active();
            backend.clear()?;
        }
        Ok(())
    }

    /// Vacuum every backend; true if at least one of them vacuumed
    pub fn vacuum_if_needed(
        &mut self,
        relay: &WatchdogRelay,
        logger: &QueueLogger,
    ) -> QueueResult<bool> {
        let mut vacuum_performed = false;
        for backend in self.backends.iter_mut() {
            relay.set_active();
            match backend.vacuum_if_needed() {
                Ok(performed) => vacuum_performed |= performed,
                Err(e) => {
                    log::error!(
                        target: logger.target(),
                        "Vacuum of {} failed: {}",
                        backend.name(),
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(vacuum_performed)
    }

    pub fn close(&mut self, relay: &WatchdogRelay) -> QueueResult<()> {
        for backend in self.backends.iter_mut() {
            relay.set_active();
            backend.close()?;
        }
        Ok(())
    }

    pub fn delete(&mut self, relay: &WatchdogRelay) -> QueueResult<()> {
        for backend in self.backends.iter_mut() {
            relay.set_active();
            backend.delete()?;
        }
        Ok(())
    }

    /// Dispose every backend, whatever the failures of the others
    ///
    /// Failures are logged and returned so callers can inspect them; they
    /// never stop the loop.
    pub fn dispose(&mut self, relay: &WatchdogRelay, logger: &QueueLogger) -> Vec<String> {
        let mut failures = Vec::new();
        for backend in self.backends.iter_mut() {
            relay.set_active();
            if let Err(e) = backend.dispose() {
                log::warn!(
                    target: logger.target(),
                    "Dispose of {} failed: {}",
                    backend.name(),
                    e
                );
                failures.push(format!("{}: {}", backend.name(), e));
            }
        }
        failures
    }
}

/// Write candidate of a command
#[derive(Debug, Clone)]
pub struct WriteRoute {
    pub priority: i64,
    pub key_filter: Regex,
    pub backend: BackendId,
}

/// Write routes and read tiers of a configuration-driven router
#[derive(Default)]
pub struct RoutingTable {
    backends: BackendSet,
    write_routes: HashMap<Command, Vec<WriteRoute>>,
    prioritized: Vec<(i64, BackendId)>,
    unprioritized: Vec<BackendId>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backend(&mut self, backend: Box<dyn SubQueue>) -> BackendId {
        self.backends.add(backend)
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut BackendSet {
        &mut self.backends
    }

    /// Register a write candidate for a command
    ///
    /// The candidate goes after every existing one with a priority lower or
    /// equal to its own, so equal priorities keep their declaration order.
    pub fn add_write_route(
        &mut self,
        command: Command,
        priority: i64,
        key_filter: Regex,
        backend: BackendId,
    ) {
        let routes = self.write_routes.entry(command).or_default();
        let index = routes
            .iter()
            .position(|route| route.priority > priority)
            .unwrap_or(routes.len());
        routes.insert(
            index,
            WriteRoute {
                priority,
                key_filter,
                backend,
            },
        );
    }

    /// Register the read position of a backend
    ///
    /// Negative priorities go to the unprioritized tier, in declaration
    /// order; the others are sorted by ascending priority.
    pub fn add_read_position(&mut self, read_priority: i64, backend: BackendId) {
        if read_priority < 0 {
            self.unprioritized.push(backend);
        } else {
            let index = self
                .prioritized
                .iter()
                .position(|(priority, _)| *priority > read_priority)
                .unwrap_or(self.prioritized.len());
            self.prioritized.insert(index, (read_priority, backend));
        }
    }

    /// Backend receiving an event, if any
    ///
    /// The first candidate of the event command whose key filter matches the
    /// event key wins.
    pub fn resolve_write(&self, event: &Event) -> Option<BackendId> {
        let key = event.routing_key();
        self.write_routes
            .get(&event.command)?
            .iter()
            .find(|route| route.key_filter.is_match(key))
            .map(|route| route.backend)
    }

    pub fn write_routes(&self, command: Command) -> &[WriteRoute] {
        self.write_routes
            .get(&command)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn write_route_count(&self) -> usize {
        self.write_routes.values().map(Vec::len).sum()
    }

    pub fn tiers(&self) -> Tiers {
        Tiers::new(self.prioritized.len(), self.unprioritized.len())
    }

    /// Backend read at a cursor position
    pub fn read_backend(&self, position: CursorPosition) -> BackendId {
        match position {
            CursorPosition::Prioritized(i) => self.prioritized[i].1,
            CursorPosition::Unprioritized(j) => self.unprioritized[j],
        }
    }

    /// Backends in read traversal order
    pub fn read_order(&self) -> Vec<BackendId> {
        self.prioritized
            .iter()
            .map(|(_, backend)| *backend)
            .chain(self.unprioritized.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::MemoryQueue;
    use chrono::Utc;

    fn table_with_backends(n: usize) -> RoutingTable {
        let mut table = RoutingTable::new();
        for _ in 0..n {
            table.add_backend(Box::new(MemoryQueue::new()));
        }
        table
    }

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn test_write_routes_are_stable_by_priority() {
        let mut table = table_with_backends(4);
        table.add_write_route(Command::CncValue, 1, regex(".*"), 0);
        table.add_write_route(Command::CncValue, 0, regex(".*"), 1);
        table.add_write_route(Command::CncValue, 1, regex(".*"), 2);
        table.add_write_route(Command::CncValue, 0, regex(".*"), 3);

        let order: Vec<BackendId> = table
            .write_routes(Command::CncValue)
            .iter()
            .map(|route| route.backend)
            .collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert_eq!(table.write_route_count(), 4);
    }

    #[test]
    fn test_first_matching_key_filter_wins() {
        let mut table = table_with_backends(2);
        table.add_write_route(Command::CncValue, 1, regex(".*"), 1);
        table.add_write_route(Command::CncValue, 0, regex("Feed.*"), 0);

        let feed = Event::cnc_value(1, 0, Utc::now(), "Feedrate", serde_json::json!(1));
        let speed = Event::cnc_value(1, 0, Utc::now(), "SpindleSpeed", serde_json::json!(1));
        assert_eq!(table.resolve_write(&feed), Some(0));
        assert_eq!(table.resolve_write(&speed), Some(1));
    }

    #[test]
    fn test_absent_key_is_matched_as_empty_string() {
        let mut table = table_with_backends(2);
        table.add_write_route(Command::CncAlarm, 0, regex(".+"), 0);
        table.add_write_route(Command::CncAlarm, 1, regex("^$"), 1);

        let alarm = Event::alarm(1, 0, Utc::now(), serde_json::Value::Null);
        assert_eq!(table.resolve_write(&alarm), Some(1));
    }

    #[test]
    fn test_unroutable_events() {
        let mut table = table_with_backends(1);
        table.add_write_route(Command::CncValue, 0, regex("^Feed"), 0);

        let mode = Event::machine_mode(1, 0, Utc::now(), 2);
        let speed = Event::cnc_value(1, 0, Utc::now(), "SpindleSpeed", serde_json::json!(1));
        assert_eq!(table.resolve_write(&mode), None);
        assert_eq!(table.resolve_write(&speed), None);
    }

    #[test]
    fn test_read_tiers() {
        let mut table = table_with_backends(4);
        table.add_read_position(NOT_PRIORITIZED, 0);
        table.add_read_position(5, 1);
        table.add_read_position(1, 2);
        table.add_read_position(NOT_PRIORITIZED, 3);

        assert_eq!(table.tiers(), Tiers::new(2, 2));
        assert_eq!(table.read_order(), vec![2, 1, 0, 3]);
        assert_eq!(table.read_backend(CursorPosition::Prioritized(0)), 2);
        assert_eq!(table.read_backend(CursorPosition::Unprioritized(1)), 3);
    }
}
