//! Test modules for the routers
//!
//! Tests are organized by functional area: write routing, read traversal,
//! lifecycle fan-out and liveness relaying.

mod common;
mod lifecycle;
mod watchdog;
