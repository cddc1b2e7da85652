//! Configuration-driven router
//!
//! The routing table is built on first use from the sub-queue blocks of a
//! [`ListConfigReader`]. Each block is resolved through three layers, most
//! specific first: the block itself, the built-in defaults below, then the
//! process-wide configuration.
//!
//! | key                | default | meaning                                        |
//! |--------------------|---------|------------------------------------------------|
//! | `QueueType`        | memory  | backend type name in the [`BackendRegistry`]   |
//! | `commandfilter`    | (all)   | commands written to the backend, pipe separated|
//! | `regexfieldfilter` | `.*`    | regular expression matched against event keys  |
//! | `writepriority`    | 0       | lower priorities are tried first on write      |
//! | `readpriority`     | -1      | lower priorities are read first, -1 last       |
//!
//! A block with its own sub-queue list configures a nested router of type
//! [`CONFIGURABLE_QUEUE_TYPE`].

use crate::builtin_backend;
use crate::config::{
    ConfigReader, Configurable, ListConfigReader, ListConfigurable, MemoryConfigReader,
    MultiConfigReader, QUEUE_TYPE_KEY, SUB_QUEUE_LIST_KEY,
};
use crate::core::logging::QueueLogger;
use crate::core::watchdog::{Checked, CheckedCaller, WatchdogRelay};
use crate::event::{Command, Event};
use crate::queue::cursor::ReadCursor;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::memory::MEMORY_QUEUE_TYPE;
use crate::queue::registry::BackendRegistry;
use crate::queue::routing::{RoutingTable, NOT_PRIORITIZED};
use crate::queue::traits::{MachineIdentity, MultiQueue, SubQueue};
use regex::Regex;
use std::sync::Arc;

/// Type name of [`ConfigurableRouter`] in the [`BackendRegistry`]
pub const CONFIGURABLE_QUEUE_TYPE: &str = "configurable";

builtin_backend!(CONFIGURABLE_QUEUE_TYPE, |registry| {
    let registry = Arc::new(registry.clone());
    Ok(Box::new(ConfigurableRouter::new(MachineIdentity::default(), registry)) as Box<dyn SubQueue>)
});

pub const COMMAND_FILTER_KEY: &str = "commandfilter";
pub const FIELD_FILTER_KEY: &str = "regexfieldfilter";
pub const WRITE_PRIORITY_KEY: &str = "writepriority";
pub const READ_PRIORITY_KEY: &str = "readpriority";

/// Built-in defaults of a sub-queue block
pub fn default_sub_queue_config() -> MemoryConfigReader {
    MemoryConfigReader::new()
        .with(QUEUE_TYPE_KEY, MEMORY_QUEUE_TYPE)
        .with(COMMAND_FILTER_KEY, "")
        .with(FIELD_FILTER_KEY, ".*")
        .with(WRITE_PRIORITY_KEY, 0)
        .with(READ_PRIORITY_KEY, NOT_PRIORITIZED)
}

/// Resolved settings of one sub-queue block
#[derive(Debug, Clone)]
pub struct SubQueueSettings {
    pub queue_type: String,
    pub commands: Vec<Command>,
    pub key_filter: Regex,
    pub write_priority: i64,
    pub read_priority: i64,
}

impl SubQueueSettings {
    pub fn from_config(reader: &dyn ConfigReader) -> QueueResult<Self> {
        let queue_type = reader.get_string(QUEUE_TYPE_KEY)?;
        let commands = Command::parse_filter(&reader.get_string(COMMAND_FILTER_KEY)?)?;
        let pattern = reader.get_string(FIELD_FILTER_KEY)?;
        let key_filter = Regex::new(&pattern)
            .map_err(|source| QueueError::InvalidFieldFilter { pattern, source })?;

        Ok(Self {
            queue_type,
            commands,
            key_filter,
            write_priority: reader.get_int(WRITE_PRIORITY_KEY)?,
            read_priority: reader.get_int(READ_PRIORITY_KEY)?,
        })
    }
}

/// Router whose sub-queues are declared in configuration
pub struct ConfigurableRouter {
    name: String,
    owner: MachineIdentity,
    logger: QueueLogger,
    registry: Arc<BackendRegistry>,
    list_config: Option<Arc<dyn ListConfigReader>>,
    process_config: Arc<dyn ConfigReader>,
    relay: Arc<WatchdogRelay>,
    table: RoutingTable,
    cursor: ReadCursor,
    initialized: bool,
}

impl std::fmt::Debug for ConfigurableRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurableRouter")
            .field("owner", &self.owner)
            .field("initialized", &self.initialized)
            .field("backends", &self.table.backends().names())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl ConfigurableRouter {
    /// Create an empty router; sub-queues are built on first use
    pub fn new(owner: MachineIdentity, registry: Arc<BackendRegistry>) -> Self {
        Self {
            name: format!("configurable.{}", owner),
            owner,
            logger: QueueLogger::new(module_path!(), owner),
            registry,
            list_config: None,
            process_config: Arc::new(MemoryConfigReader::new()),
            relay: Arc::new(WatchdogRelay::new()),
            table: RoutingTable::new(),
            cursor: ReadCursor::new(),
            initialized: false,
        }
    }

    /// Lowest precedence configuration layer of every sub-queue block
    pub fn set_process_config_reader(&mut self, reader: Arc<dyn ConfigReader>) {
        self.process_config = reader;
    }

    pub fn owner(&self) -> MachineIdentity {
        self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    /// Signal the supervising thread is still active
    pub fn set_active(&self) {
        self.relay.set_active();
    }

    pub fn pause_check(&self) {
        self.relay.pause_check();
    }

    pub fn resume_check(&self) {
        self.relay.resume_check();
    }

    /// Build the routing table; later calls do nothing
    ///
    /// A sub-queue that cannot be configured or created aborts the whole
    /// initialization, which is retried on the next call.
    pub fn initialize(&mut self) -> QueueResult<()> {
        if self.initialized {
            return Ok(());
        }

        let blocks = match &self.list_config {
            Some(list_config) => list_config.configs(SUB_QUEUE_LIST_KEY)?,
            None => {
                log::warn!(
                    target: self.logger.target(),
                    "No sub-queue configuration set, every event will be dropped"
                );
                Vec::new()
            }
        };

        let defaults: Arc<dyn ConfigReader> = Arc::new(default_sub_queue_config());
        let mut table = RoutingTable::new();
        for (index, block) in blocks.into_iter().enumerate() {
            if let Err(e) = self.add_sub_queue(&mut table, index, block, &defaults) {
                table.backends_mut().dispose(&self.relay, &self.logger);
                return Err(e);
            }
        }

        self.table = table;
        self.cursor = ReadCursor::new();
        self.initialized = true;
        Ok(())
    }

    /// Create one sub-queue from its block and register its routes
    fn add_sub_queue(
        &self,
        table: &mut RoutingTable,
        index: usize,
        block: Arc<dyn ConfigReader>,
        defaults: &Arc<dyn ConfigReader>,
    ) -> QueueResult<()> {
        let nested = block.clone().as_list_config_reader();
        let config: Arc<dyn ConfigReader> = Arc::new(
            MultiConfigReader::new()
                .with(block)
                .with(defaults.clone())
                .with(self.process_config.clone()),
        );

        let settings = SubQueueSettings::from_config(config.as_ref()).inspect_err(|e| {
            log::error!(
                target: self.logger.target(),
                "Invalid configuration of sub-queue #{}: {}",
                index,
                e
            )
        })?;

        let mut backend = self.registry.create(&settings.queue_type).inspect_err(|e| {
            log::error!(
                target: self.logger.target(),
                "Couldn't create sub-queue #{} of type {}: {}",
                index,
                settings.queue_type,
                e
            )
        })?;

        backend.set_owner(self.owner);
        if let Some(checked_caller) = backend.as_checked_caller() {
            checked_caller.set_checked_caller(self.relay.clone());
        }
        if let Some(configurable) = backend.as_configurable() {
            configurable.set_config_reader(config.clone());
        }
        if let (Some(list_configurable), Some(nested)) = (backend.as_list_configurable(), nested) {
            list_configurable.set_list_config_reader(nested);
        }

        let id = table.add_backend(backend);
        for command in &settings.commands {
            table.add_write_route(
                *command,
                settings.write_priority,
                settings.key_filter.clone(),
                id,
            );
        }
        table.add_read_position(settings.read_priority, id);

        log::debug!(
            target: self.logger.target(),
            "Sub-queue #{} ({}): commands={:?} field filter={} write priority={} read priority={}",
            index,
            settings.queue_type,
            settings.commands,
            settings.key_filter,
            settings.write_priority,
            settings.read_priority
        );
        Ok(())
    }

    /// Try sub-queues from the cursor position until one yields a result
    ///
    /// The cursor parks on the productive sub-queue. Every sub-queue is tried
    /// at most once per call.
    fn traverse<T>(
        &mut self,
        operation: &str,
        mut take: impl FnMut(&mut dyn SubQueue) -> QueueResult<Option<T>>,
    ) -> QueueResult<Option<T>> {
        let tiers = self.table.tiers();
        let total = tiers.total();
        let mut visited = vec![false; total];
        let mut visited_count = 0;

        for _ in 0..2 * total {
            if visited_count == total {
                break;
            }
            let Some(position) = self.cursor.position(tiers) else {
                break;
            };

            let index = position.logical_index(tiers);
            if !visited[index] {
                visited[index] = true;
                visited_count += 1;

                let id = self.table.read_backend(position);
                self.relay.set_active();
                match take(self.table.backends_mut().get_mut(id)) {
                    Ok(Some(result)) => return Ok(Some(result)),
                    Ok(None) => {}
                    Err(e) => {
                        log::error!(
                            target: self.logger.target(),
                            "{}: unexpected error from sub-queue at index {}: {}",
                            operation,
                            index,
                            e
                        );
                        return Err(e);
                    }
                }
            }

            self.cursor.advance(tiers);
        }

        Ok(None)
    }
}

impl SubQueue for ConfigurableRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_owner(&mut self, owner: MachineIdentity) {
        self.owner = owner;
        self.name = format!("configurable.{}", owner);
        self.logger = QueueLogger::new(module_path!(), owner);
        for id in 0..self.table.backends().len() {
            self.table.backends_mut().get_mut(id).set_owner(owner);
        }
    }

    /// Write the event to the first matching sub-queue
    ///
    /// Events no sub-queue is configured for are dropped with a warning.
    fn enqueue(&mut self, event: Event) -> QueueResult<()> {
        self.initialize()?;

        match self.table.resolve_write(&event) {
            Some(id) => self.table.backends_mut().get_mut(id).enqueue(event),
            None => {
                log::warn!(
                    target: self.logger.target(),
                    "No queues configured for storing {}",
                    event
                );
                Ok(())
            }
        }
    }

    fn count(&mut self) -> QueueResult<usize> {
        self.initialize()?;
        self.table.backends_mut().count(&self.relay)
    }

    fn clear(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.table.backends_mut().clear(&self.relay)?;
        self.cursor.rewind();
        Ok(())
    }

    fn dequeue(&mut self) -> QueueResult<Event> {
        self.initialize()?;

        let event = self.traverse("dequeue", |backend| match backend.dequeue() {
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

        let events = self.traverse("peek", |backend| {
            let events = backend.peek(n)?;
            Ok((!events.is_empty()).then_some(events))
        })?;
        Ok(events.unwrap_or_default())
    }

    fn unsafe_dequeue(&mut self, n: usize) -> QueueResult<()> {
        self.initialize()?;

        let position = self
            .cursor
            .position(self.table.tiers())
            .ok_or(QueueError::Empty)?;
        let id = self.table.read_backend(position);
        self.table.backends_mut().get_mut(id).unsafe_dequeue(n)
    }

    fn vacuum_if_needed(&mut self) -> QueueResult<bool> {
        self.initialize()?;
        self.table
            .backends_mut()
            .vacuum_if_needed(&self.relay, &self.logger)
    }

    fn close(&mut self) -> QueueResult<()> {
        self.table.backends_mut().close(&self.relay)
    }

    fn delete(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.table.backends_mut().delete(&self.relay)
    }

    fn dispose(&mut self) -> QueueResult<()> {
        let failures = self.table.backends_mut().dispose(&self.relay, &self.logger);
        if !failures.is_empty() {
            log::warn!(
                target: self.logger.target(),
                "{} sub-queue(s) failed to dispose: {}",
                failures.len(),
                failures.join("; ")
            );
        }
        Ok(())
    }

    fn as_checked_caller(&mut self) -> Option<&mut dyn CheckedCaller> {
        Some(self)
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn as_list_configurable(&mut self) -> Option<&mut dyn ListConfigurable> {
        Some(self)
    }
}

impl MultiQueue for ConfigurableRouter {
    fn current_queue_index(&mut self) -> QueueResult<usize> {
        self.initialize()?;
        Ok(self.cursor.logical_index(self.table.tiers()))
    }

    fn move_next_queue(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.cursor.advance(self.table.tiers());
        Ok(())
    }

    fn reset(&mut self) -> QueueResult<()> {
        self.initialize()?;
        self.cursor.reset();
        Ok(())
    }
}

impl CheckedCaller for ConfigurableRouter {
    fn set_checked_caller(&mut self, caller: Arc<dyn Checked>) {
        self.relay.set_upstream(caller);
    }
}

impl ListConfigurable for ConfigurableRouter {
    fn set_list_config_reader(&mut self, reader: Arc<dyn ListConfigReader>) {
        self.list_config = Some(reader);
    }
}

impl Configurable for ConfigurableRouter {
    fn set_config_reader(&mut self, reader: Arc<dyn ConfigReader>) {
        self.set_process_config_reader(reader);
    }
}
