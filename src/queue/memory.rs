//! In-memory FIFO backend

use crate::builtin_backend;
use crate::config::{ConfigReader, Configurable};
use crate::core::watchdog::{Checked, CheckedCaller};
use crate::event::Event;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::{MachineIdentity, SubQueue};
use std::collections::VecDeque;
use std::sync::Arc;

/// Type name of [`MemoryQueue`] in the backend registry
pub const MEMORY_QUEUE_TYPE: &str = "memory";

/// Configuration key limiting the number of stored events
pub const MAX_SIZE_KEY: &str = "maxsize";

builtin_backend!(MEMORY_QUEUE_TYPE, |_| {
    Ok(Box::new(MemoryQueue::new()) as Box<dyn SubQueue>)
});

/// Events kept in a `VecDeque`; nothing survives the process
#[derive(Default)]
pub struct MemoryQueue {
    name: String,
    owner: MachineIdentity,
    events: VecDeque<Event>,
    max_size: Option<usize>,
    closed: bool,
    checked_caller: Option<Arc<dyn Checked>>,
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("len", &self.events.len())
            .field("max_size", &self.max_size)
            .field("closed", &self.closed)
            .finish()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            name: MEMORY_QUEUE_TYPE.to_string(),
            ..Default::default()
        }
    }

    /// Memory queue holding at most `max_size` events
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..Self::new()
        }
    }

    pub fn owner(&self) -> MachineIdentity {
        self.owner
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn set_active(&self) {
        if let Some(caller) = &self.checked_caller {
            caller.set_active();
        }
    }
}

impl SubQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_owner(&mut self, owner: MachineIdentity) {
        self.owner = owner;
        self.name = format!("{}.{}", MEMORY_QUEUE_TYPE, owner);
    }

    fn enqueue(&mut self, event: Event) -> QueueResult<()> {
        if self.closed {
            return Err(QueueError::Closed {
                queue: self.name.clone(),
            });
        }
        if let Some(max_size) = self.max_size {
            if self.events.len() >= max_size {
                return Err(QueueError::QueueFull { max_size });
            }
        }
        self.events.push_back(event);
        Ok(())
    }

    fn count(&mut self) -> QueueResult<usize> {
        Ok(self.events.len())
    }

    fn clear(&mut self) -> QueueResult<()> {
        self.set_active();
        self.events.clear();
        Ok(())
    }

    fn dequeue(&mut self) -> QueueResult<Event> {
        self.events.pop_front().ok_or(QueueError::Empty)
    }

    fn peek(&mut self, n: usize) -> QueueResult<Vec<Event>> {
        Ok(self.events.iter().take(n).cloned().collect())
    }

    fn unsafe_dequeue(&mut self, n: usize) -> QueueResult<()> {
        let n = n.min(self.events.len());
        self.events.drain(..n);
        Ok(())
    }

    fn vacuum_if_needed(&mut self) -> QueueResult<bool> {
        let capacity = self.events.capacity();
        if capacity > 16 && self.events.len() < capacity / 4 {
            self.set_active();
            self.events.shrink_to_fit();
            log::debug!(
                "{}: released spare capacity ({} -> {})",
                self.name,
                capacity,
                self.events.capacity()
            );
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn close(&mut self) -> QueueResult<()> {
        self.closed = true;
        Ok(())
    }

    fn delete(&mut self) -> QueueResult<()> {
        self.events = VecDeque::new();
        Ok(())
    }

    fn dispose(&mut self) -> QueueResult<()> {
        self.closed = true;
        self.events = VecDeque::new();
        Ok(())
    }

    fn as_checked_caller(&mut self) -> Option<&mut dyn CheckedCaller> {
        Some(self)
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }
}

impl CheckedCaller for MemoryQueue {
    fn set_checked_caller(&mut self, caller: Arc<dyn Checked>) {
        self.checked_caller = Some(caller);
    }
}

impl Configurable for MemoryQueue {
    fn set_config_reader(&mut self, reader: Arc<dyn ConfigReader>) {
        if !reader.contains(MAX_SIZE_KEY) {
            return;
        }
        match reader.get_int(MAX_SIZE_KEY) {
            Ok(max_size) if max_size > 0 => self.max_size = Some(max_size as usize),
            Ok(_) => self.max_size = None,
            Err(e) => log::warn!("{}: ignoring {}: {}", self.name, MAX_SIZE_KEY, e),
        }
    }
}
