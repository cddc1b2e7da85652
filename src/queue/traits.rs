//! Traits for the queue system
//!
//! [`SubQueue`] is the contract every backend exposes to the routers, and
//! which the routers expose in turn so they can be nested. [`MultiQueue`]
//! adds the read cursor controls of a router.

use crate::config::{Configurable, ListConfigurable};
use crate::core::watchdog::CheckedCaller;
use crate::event::Event;
use crate::queue::error::{QueueError, QueueResult};
use std::fmt;

/// Machine and machine module owning a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MachineIdentity {
    pub machine_id: i32,
    pub machine_module_id: i32,
}

impl MachineIdentity {
    pub fn new(machine_id: i32, machine_module_id: i32) -> Self {
        Self {
            machine_id,
            machine_module_id,
        }
    }
}

impl fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.machine_id, self.machine_module_id)
    }
}

/// Queue of telemetry events
///
/// Emptiness is an ordinary outcome: [`SubQueue::dequeue`] returns
/// [`QueueError::Empty`] and [`SubQueue::peek`] an empty vector. Any other
/// error means the backend itself failed.
pub trait SubQueue: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Propagate the owning machine identity
    fn set_owner(&mut self, owner: MachineIdentity);

    /// Append an event
    fn enqueue(&mut self, event: Event) -> QueueResult<()>;

    /// Number of stored events
    fn count(&mut self) -> QueueResult<usize>;

    /// Remove every stored event
    fn clear(&mut self) -> QueueResult<()>;

    /// Remove and return the first event
    fn dequeue(&mut self) -> QueueResult<Event>;

    /// Return up to `n` events without removing them
    fn peek(&mut self, n: usize) -> QueueResult<Vec<Event>>;

    /// Remove `n` events without checking they are available
    ///
    /// Only call this after a peek or dequeue made sure of it.
    fn unsafe_dequeue(&mut self, n: usize) -> QueueResult<()>;

    /// Vacuum the storage if needed; returns true if a vacuum occurred
    fn vacuum_if_needed(&mut self) -> QueueResult<bool>;

    fn close(&mut self) -> QueueResult<()>;

    /// Delete the storage of the queue
    fn delete(&mut self) -> QueueResult<()>;

    /// Release every resource held by the queue
    fn dispose(&mut self) -> QueueResult<()>;

    /// Return the first event without removing it
    fn peek_one(&mut self) -> QueueResult<Event> {
        self.peek(1)?.into_iter().next().ok_or(QueueError::Empty)
    }

    fn unsafe_dequeue_one(&mut self) -> QueueResult<()> {
        self.unsafe_dequeue(1)
    }

    /// Liveness relay capability, if the queue accepts a supervisor
    fn as_checked_caller(&mut self) -> Option<&mut dyn CheckedCaller> {
        None
    }

    /// Configuration capability, if the queue accepts external settings
    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    /// Sub-queue list capability, if the queue is built from nested blocks
    fn as_list_configurable(&mut self) -> Option<&mut dyn ListConfigurable> {
        None
    }
}

/// Queue made of several sub-queues read through a cursor
pub trait MultiQueue: SubQueue {
    /// Position of the cursor in the read traversal order
    fn current_queue_index(&mut self) -> QueueResult<usize>;

    /// Move the cursor to the next sub-queue, wrapping around
    fn move_next_queue(&mut self) -> QueueResult<()>;

    /// Move the cursor back to the first sub-queue
    fn reset(&mut self) -> QueueResult<()>;
}
