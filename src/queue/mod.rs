//! Multi-Queue Routing Component
//!
//! Routes the telemetry events of one machine module to several sub-queues
//! and reads them back through a single queue interface.
//!
//! # Overview
//!
//! - **Write routing**: each event goes to the first sub-queue, in write
//!   priority order, accepting its command and matching its key
//! - **Read traversal**: prioritized sub-queues are drained first, then the
//!   unprioritized ones round-robin
//! - **Cursor parking**: after a successful read the cursor stays on the
//!   productive sub-queue, so a later `unsafe_dequeue` removes exactly what
//!   was read
//! - **Lifecycle fan-out**: count, clear, vacuum, close, delete and dispose
//!   reach each sub-queue exactly once
//!
//! # Architecture
//!
//! ```text
//!            enqueue(event)                      dequeue / peek
//!                  │                                   ▲
//!                  ▼                                   │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Router                               │
//! │  write routes: command -> [(priority, key filter, backend)] │
//! │  read tiers:   prioritized ++ unprioritized  + cursor       │
//! └──────┬───────────────────┬───────────────────┬──────────────┘
//!        ▼                   ▼                   ▼
//!   ┌─────────┐         ┌─────────┐         ┌─────────┐
//!   │ backend │         │ backend │         │ backend │   (SubQueue)
//!   └─────────┘         └─────────┘         └─────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use cncqueue::config::QueueConfiguration;
//! use cncqueue::queue::{BackendRegistry, MachineIdentity, SubQueue};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let configuration = QueueConfiguration::load_default(None)?;
//! let registry = Arc::new(BackendRegistry::with_builtins());
//! let mut router = configuration.create_router(MachineIdentity::new(1, 0), registry);
//!
//! let event = cncqueue::Event::machine_mode(1, 0, chrono::Utc::now(), 2);
//! router.enqueue(event)?;
//! while let Ok(event) = router.dequeue() {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod configurable;
pub mod cursor;
pub mod error;
pub mod fixed;
pub mod memory;
pub mod registry;
pub mod routing;
pub mod traits;

pub use configurable::{ConfigurableRouter, SubQueueSettings, CONFIGURABLE_QUEUE_TYPE};
pub use error::{QueueError, QueueResult};
pub use fixed::{FixedRoutes, FixedSchema, FixedSchemaRouter, StandardCncSchema, FIXED_QUEUE_TYPE};
pub use memory::MemoryQueue;
pub use registry::BackendRegistry;
pub use traits::{MachineIdentity, MultiQueue, SubQueue};

#[cfg(test)]
mod tests;
