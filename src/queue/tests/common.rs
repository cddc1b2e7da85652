//! Shared fixtures: a backend recording every call it receives

use crate::config::{MemoryConfigReader, QueueConfiguration, QUEUE_TYPE_KEY};
use crate::event::Event;
use crate::queue::configurable::ConfigurableRouter;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::registry::BackendRegistry;
use crate::queue::traits::{MachineIdentity, SubQueue};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const OWNER: MachineIdentity = MachineIdentity {
    machine_id: 7,
    machine_module_id: 2,
};

/// Calls received by the recording backends, as `label:operation`
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, label: &str, operation: &str) {
        self.0.lock().unwrap().push(format!("{}:{}", label, operation));
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// How many times `label` received `operation`
    pub fn count(&self, label: &str, operation: &str) -> usize {
        let call = format!("{}:{}", label, operation);
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

/// In-memory backend logging its calls, optionally failing some of them
pub struct RecordingQueue {
    label: String,
    events: VecDeque<Event>,
    log: CallLog,
    failing: Vec<&'static str>,
}

impl RecordingQueue {
    pub fn new(label: &str, log: CallLog, failing: Vec<&'static str>) -> Self {
        Self {
            label: label.to_string(),
            events: VecDeque::new(),
            log,
            failing,
        }
    }

    fn record(&self, operation: &'static str) -> QueueResult<()> {
        self.log.push(&self.label, operation);
        if self.failing.contains(&operation) {
            Err(QueueError::BackendOperationFailed {
                queue: self.label.clone(),
                operation: operation.to_string(),
                cause: "simulated failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl SubQueue for RecordingQueue {
    fn name(&self) -> &str {
        &self.label
    }

    fn set_owner(&mut self, _owner: MachineIdentity) {
        self.log.push(&self.label, "set_owner");
    }

    fn enqueue(&mut self, event: Event) -> QueueResult<()> {
        self.record("enqueue")?;
        self.events.push_back(event);
        Ok(())
    }

    fn count(&mut self) -> QueueResult<usize> {
        self.record("count")?;
        Ok(self.events.len())
    }

    fn clear(&mut self) -> QueueResult<()> {
        self.record("clear")?;
        self.events.clear();
        Ok(())
    }

    fn dequeue(&mut self) -> QueueResult<Event> {
        self.record("dequeue")?;
        self.events.pop_front().ok_or(QueueError::Empty)
    }

    fn peek(&mut self, n: usize) -> QueueResult<Vec<Event>> {
        self.record("peek")?;
        Ok(self.events.iter().take(n).cloned().collect())
    }

    fn unsafe_dequeue(&mut self, n: usize) -> QueueResult<()> {
        self.record("unsafe_dequeue")?;
        let n = n.min(self.events.len());
        self.events.drain(..n);
        Ok(())
    }

    fn vacuum_if_needed(&mut self) -> QueueResult<bool> {
        self.record("vacuum")?;
        Ok(self.label.ends_with("vacuumed"))
    }

    fn close(&mut self) -> QueueResult<()> {
        self.record("close")
    }

    fn delete(&mut self) -> QueueResult<()> {
        self.record("delete")
    }

    fn dispose(&mut self) -> QueueResult<()> {
        self.record("dispose")
    }
}

/// Registry where each label is a backend type creating a recording queue
pub fn recording_registry(
    log: &CallLog,
    labels: &[&'static str],
    failing: &[&'static str],
) -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtins();
    for label in labels {
        let log = log.clone();
        let failing = failing.to_vec();
        let label = *label;
        registry.register(label, move |_| {
            Ok(Box::new(RecordingQueue::new(label, log.clone(), failing.clone())) as Box<dyn SubQueue>)
        });
    }
    registry
}

/// Sub-queue block
pub fn block(
    queue_type: &str,
    command_filter: &str,
    field_filter: &str,
    write_priority: i64,
    read_priority: i64,
) -> MemoryConfigReader {
    MemoryConfigReader::new()
        .with(QUEUE_TYPE_KEY, queue_type)
        .with("commandfilter", command_filter)
        .with("regexfieldfilter", field_filter)
        .with("writepriority", write_priority)
        .with("readpriority", read_priority)
}

/// Router over the given blocks, in declaration order
pub fn router(registry: BackendRegistry, blocks: Vec<MemoryConfigReader>) -> ConfigurableRouter {
    let configuration = blocks
        .into_iter()
        .fold(QueueConfiguration::new(), |configuration, block| {
            configuration.with_sub_queue(block)
        });
    configuration.create_router(OWNER, Arc::new(registry))
}

pub fn mode(id: i64) -> Event {
    Event::machine_mode(OWNER.machine_id, OWNER.machine_module_id, Utc::now(), id)
}

pub fn alarm(code: &str) -> Event {
    Event::alarm(
        OWNER.machine_id,
        OWNER.machine_module_id,
        Utc::now(),
        serde_json::json!(code),
    )
}

pub fn value(field: &str, value: i64) -> Event {
    Event::cnc_value(
        OWNER.machine_id,
        OWNER.machine_module_id,
        Utc::now(),
        field,
        serde_json::json!(value),
    )
}

pub fn action(name: &str) -> Event {
    Event::action(
        OWNER.machine_id,
        OWNER.machine_module_id,
        Utc::now(),
        name,
        serde_json::Value::Null,
    )
}
