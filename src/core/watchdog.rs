//! Liveness relay towards an external watchdog
//!
//! A supervised thread must signal regularly that it is still alive. Queue
//! routers may spend a while touching each of their backends, so they relay
//! these signals between every backend call. The chain is one level deep: a
//! router forwards to whichever supervisor registered with it, and registers
//! its own relay with the backends that accept one.

use std::sync::{Arc, RwLock};

/// Component that can be told the supervised thread is still alive
pub trait Checked: Send + Sync {
    /// Signal the thread is still active
    fn set_active(&self);

    /// Pause the liveness check, before a known long operation
    fn pause_check(&self);

    /// Resume the liveness check
    fn resume_check(&self);
}

/// Component accepting an upstream supervisor
pub trait CheckedCaller {
    fn set_checked_caller(&mut self, caller: Arc<dyn Checked>);
}

/// Forwards liveness signals to an optional upstream supervisor
#[derive(Default)]
pub struct WatchdogRelay {
    upstream: RwLock<Option<Arc<dyn Checked>>>,
}

impl std::fmt::Debug for WatchdogRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogRelay")
            .field("has_upstream", &self.has_upstream())
            .finish()
    }
}

impl WatchdogRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the supervisor signals are forwarded to
    pub fn set_upstream(&self, upstream: Arc<dyn Checked>) {
        if let Ok(mut guard) = self.upstream.write() {
            *guard = Some(upstream);
        }
    }

    pub fn has_upstream(&self) -> bool {
        self.upstream
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn forward(&self, signal: impl FnOnce(&dyn Checked)) {
        let upstream = match self.upstream.read() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if let Some(upstream) = upstream {
            signal(upstream.as_ref());
        }
    }
}

impl Checked for WatchdogRelay {
    fn set_active(&self) {
        self.forward(|upstream| upstream.set_active());
    }

    fn pause_check(&self) {
        self.forward(|upstream| upstream.pause_check());
    }

    fn resume_check(&self) {
        self.forward(|upstream| upstream.resume_check());
    }
}

/// Supervisor counting the signals it receives
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingSupervisor {
    pub active: std::sync::atomic::AtomicUsize,
    pub paused: std::sync::atomic::AtomicUsize,
    pub resumed: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl CountingSupervisor {
    pub fn active_count(&self) -> usize {
        self.active.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Checked for CountingSupervisor {
    fn set_active(&self) {
        self.active
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn pause_check(&self) {
        self.paused
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn resume_check(&self) {
        self.resumed
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
