//! Buffering and routing of CNC telemetry events across several sub-queues.
//!
//! A CNC monitoring agent produces machine modes, activities, alarms, stamps
//! and field values that are buffered locally before an uplink consumer
//! drains them. The [`queue`] module fans a single logical event stream out
//! across a set of independently implemented backends on write, and fans the
//! backends back into one stream on read.

pub mod config;
pub mod core;
pub mod event;
pub mod queue;

pub use event::{Command, Event};
