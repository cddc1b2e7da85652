//! Fixed-schema router
//!
//! The routing table is hard-wired by a [`FixedSchema`] rather than read from
//! configuration: each command goes to a fixed backend, and value commands
//! may be split further by field key. Reads go round-robin over the backends
//! in creation order, starting from the last productive one.

use crate::builtin_backend;
use crate::core::logging::QueueLogger;
use crate::core::watchdog::{Checked, CheckedCaller, WatchdogRelay};
use crate::event::{Command, Event};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::memory::MEMORY_QUEUE_TYPE;
use crate::queue::registry::BackendRegistry;
use crate::queue::routing::{BackendId, BackendSet};
use crate::queue::traits::{MachineIdentity, MultiQueue, SubQueue};
use std::collections::HashMap;
use std::sync::Arc;

/// Type name of [`FixedSchemaRouter`] with the [`StandardCncSchema`] layout
pub const FIXED_QUEUE_TYPE: &str = "fixed";

builtin_backend!(FIXED_QUEUE_TYPE, |registry| {
    let registry = Arc::new(registry.clone());
    Ok(Box::new(FixedSchemaRouter::standard(MachineIdentity::default(), registry)) as Box<dyn SubQueue>)
});

/// Backends and routes of a fixed-schema router
#[derive(Default)]
pub struct FixedRoutes {
    backends: BackendSet,
    by_command: HashMap<Command, BackendId>,
    by_key: HashMap<Command, HashMap<String, BackendId>>,
}

impl FixedRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backend(&mut self, backend: Box<dyn SubQueue>) -> BackendId {
        self.backends.add(backend)
    }

    /// Send every event of `command` to `backend`, unless a key route matches
    pub fn route(&mut self, command: Command, backend: BackendId) {
        self.by_command.insert(command, backend);
    }

    /// Send the events of `command` with exactly this key to `backend`
    pub fn route_key(&mut self, command: Command, key: &str, backend: BackendId) {
        self.by_key
            .entry(command)
            .or_default()
            .insert(key.to_string(), backend);
    }

    pub fn resolve(&self, event: &Event) -> Option<BackendId> {
        self.by_key
            .get(&event.command)
            .and_then(|keys| keys.get(event.routing_key()))
            .or_else(|| self.by_command.get(&event.command))
            .copied()
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut BackendSet {
        &mut self.backends
    }
}

/// Hard-wired layout of a [`FixedSchemaRouter`]
pub trait FixedSchema: Send {
    /// Create the backends and declare the routes
    fn build(&self, routes: &mut FixedRoutes) -> QueueResult<()>;
}

/// Standard layout of a CNC acquisition
///
/// In read order:
/// - machine mode and machine module activity
/// - stamps, actions, detection time stamps, variable sets and milestones
/// - one backend per declared value field
/// - the values of any other field
/// - alarms
#[derive(Debug, Clone)]
pub struct StandardCncSchema {
    registry: Arc<BackendRegistry>,
    queue_type: String,
    value_fields: Vec<String>,
}

impl StandardCncSchema {
    /// Layout whose backends are all memory queues
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            queue_type: MEMORY_QUEUE_TYPE.to_string(),
            value_fields: Vec::new(),
        }
    }

    /// Backend type name used for every backend
    pub fn with_queue_type(mut self, queue_type: &str) -> Self {
        self.queue_type = queue_type.to_string();
        self
    }

    /// Give a field its own value backend
    pub fn with_value_field(mut self, field: &str) -> Self {
        if !self.value_fields.iter().any(|f| f == field) {
            self.value_fields.push(field.to_string());
        }
        self
    }
}

impl FixedSchema for StandardCncSchema {
    fn build(&self, routes: &mut FixedRoutes) -> QueueResult<()> {
        let mode = routes.add_backend(self.registry.create(&self.queue_type)?);
        routes.route(Command::MachineMode, mode);
        routes.route(Command::MachineModuleActivity, mode);

        let events = routes.add_backend(self.registry.create(&self.queue_type)?);
        for command in [
            Command::Stamp,
            Command::Action,
            Command::DetectionTimeStamp,
            Command::CncVariableSet,
            Command::SequenceMilestone,
        ] {
            routes.route(command, events);
        }

        for field in &self.value_fields {
            let values = routes.add_backend(self.registry.create(&self.queue_type)?);
            routes.route_key(Command::CncValue, field, values);
            routes.route_key(Command::StopCncValue, field, values);
        }

        let other_values = routes.add_backend(self.registry.create(&self.queue_type)?);
        routes.route(Command::CncValue, other_values);
        routes.route(Command::StopCncValue, other_values);

        let alarms = routes.add_backend(self.registry.create(&self.queue_type)?);
        routes.route(Command::CncAlarm, alarms);

        Ok(())
    }
}

/// Router with a hard-wired routing table
pub struct FixedSchemaRouter {
    name: String,
    owner: MachineIdentity,
    logger: QueueLogger,
    schema: Box<dyn FixedSchema>,
    relay: Arc<WatchdogRelay>,
    routes: FixedRoutes,
    current: usize,
    initialized: bool,
}

impl std::fmt::Debug for FixedSchemaRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedSchemaRouter")
            .field("owner", &self.owner)
            .field("initialized", &self.initialized)
            .field("backends", &self.routes.backends().names())
            .field("current", &self.current)
            .finish()
    }
}

impl FixedSchemaRouter {
    pub fn new(owner: MachineIdentity, schema: Box<dyn FixedSchema>) -> Self {
        Self {
            name: format!("fixed.{}", owner),
            owner,
            logger: QueueLogger::new(module_path!(), owner),
            schema,
            relay: Arc::new(WatchdogRelay::new()),
            routes: FixedRoutes::new(),
            current: 0,
            initialized: false,
        }
    }

    /// Router laid out by [`StandardCncSchema`]
    pub fn standard(owner: MachineIdentity, registry: Arc<BackendRegistry>) -> Self {
        Self::new(owner, Box::new(StandardCncSchema::new(registry)))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.routes.backends().names()
    }

    pub fn set_active(&self) {
        self.relay.set_active();
    }

    pub fn pause_check(&self) {
        self.relay.pause_check();
    }

    pub fn resume_check(&self) {
        self.relay.resume_check();
    }

    /// Create the backends of the schema; later calls do nothing
    pub fn initialize(&mut self) -> QueueResult<()> {
        if self.initialized {
            return Ok(());
        }

        let mut routes = FixedRoutes::new();
        self.schema.build(&mut routes).inspect_err(|e| {
            log::error!(
                target: self.logger.target(),
                "Couldn't build the fixed routing table: {}",
                e
            )
        })?;

        for id in 0..routes.backends().len() {
            let backend = routes.backends_mut().get_mut(id);
            backend.set_owner(self.owner);
            if let Some(checked_caller) = backend.as_checked_caller() {
                checked_caller.set_checked_caller(self.relay.clone());
            }
        }

        log::debug!(
            target: self.logger.target(),
            "Fixed routing table with {} backends",
            routes.backends().len()
        );

        self.routes = routes;
        self.current = 0;
        self.initialized = true;
        Ok(())
    }

    /// Round-robin from the current backend until one yields a result
    fn read<T>(
        &mut self,
        operation: &str,
        mut take: impl FnMut(&mut dyn SubQueue) -> QueueResult<Option<T>>,
    ) -> QueueResult<Option<T>> {
        let total = self.routes.backends().len();
        for i in 0..total {
            let index = (self.current + i) % total;
            self.relay.set_active();
            match take(self.routes.backends_mut().get_mut(index)) {
                Ok(Some(result)) => {
                    self.current = index;
                    return Ok(Some(result));
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!(
                        target: self.logger.target(),
                        "{}: unexpected error from backend at index {}: {}",
                        operation,
                        index,
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(None)
    }
}

impl SubQueue for FixedSchemaRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_owner(&mut self, owner: MachineIdentity) {
        self.owner = owner;
        self.name = format!("fixed.{}", owner);
        self.logger = QueueLogger::new(module_path!(), owner);
        for id in 0..self.routes.backends().len() {
            self.routes.backends_mut().get_mut(id).set_owner(owner);
        }
    }

    fn enqueue(&mut self, event: Event) -> QueueResult<()> {
        self.initialize()?;

        match self.routes.resolve(&event) {
            Some(id) => self.routes.backends_mut().get_mut(id).enqueue(event),
            None => {
                log::warn!(
                    target: self.logger.target(),
                    "No queue for storing {}",
                    event
                );
                Ok(())
            }
        }
    }

    fn count(&mut self) -> QueueResult<usize> {
        self.initialize()?;
        self.routes.backends_mut().count(&self.relay)
    }

    fn clear(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.routes.backends_mut().clear(&self.relay)?;
        self.current = 0;
        Ok(())
    }

    fn dequeue(&mut self) -> QueueResult<Event> {
        self.initialize()?;

        let event = self.read("dequeue", |backend| match backend.dequeue() {
            Ok(event) => Ok(Some(event)),
            Err(e) if e.is_empty() => Ok(None),
            Err(e) => Err(e),
        })?;
        event.ok_or(QueueError::Empty)
    }

    fn peek(&mut self, n: usize) -> QueueResult<Vec<Event>> {
        self.initialize()?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let events = self.read("peek", |backend| {
            let events = backend.peek(n)?;
            Ok((!events.is_empty()).then_some(events))
        })?;
        Ok(events.unwrap_or_default())
    }

    fn unsafe_dequeue(&mut self, n: usize) -> QueueResult<()> {
        self.initialize()?;
        if self.routes.backends().is_empty() {
            return Err(QueueError::Empty);
        }
        self.routes
            .backends_mut()
            .get_mut(self.current)
            .unsafe_dequeue(n)
    }

    fn vacuum_if_needed(&mut self) -> QueueResult<bool> {
        self.initialize()?;
        self.routes
            .backends_mut()
            .vacuum_if_needed(&self.relay, &self.logger)
    }

    fn close(&mut self) -> QueueResult<()> {
        self.routes.backends_mut().close(&self.relay)
    }

    fn delete(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.routes.backends_mut().delete(&self.relay)
    }

    fn dispose(&mut self) -> QueueResult<()> {
        let failures = self.routes.backends_mut().dispose(&self.relay, &self.logger);
        if !failures.is_empty() {
            log::warn!(
                target: self.logger.target(),
                "{} backend(s) failed to dispose",
                failures.len()
            );
        }
        Ok(())
    }

    fn as_checked_caller(&mut self) -> Option<&mut dyn CheckedCaller> {
        Some(self)
    }
}

impl MultiQueue for FixedSchemaRouter {
    fn current_queue_index(&mut self) -> QueueResult<usize> {
        self.initialize()?;
        Ok(self.current)
    }

    fn move_next_queue(&mut self) -> QueueResult<()> {
        self.initialize()?;
        let total = self.routes.backends().len();
        if total > 0 {
            self.current = (self.current + 1) % total;
        }
        Ok(())
    }

    fn reset(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.current = 0;
        Ok(())
    }
}

impl CheckedCaller for FixedSchemaRouter {
    fn set_checked_caller(&mut self, caller: Arc<dyn Checked>) {
        self.relay.set_upstream(caller);
    }
}
