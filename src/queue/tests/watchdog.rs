//! Tests for liveness relaying through the routers

#[cfg(test)]
mod tests {
    use crate::core::watchdog::{CheckedCaller, CountingSupervisor};
    use crate::queue::fixed::FixedSchemaRouter;
    use crate::queue::memory::MEMORY_QUEUE_TYPE;
    use crate::queue::registry::BackendRegistry;
    use crate::queue::tests::common::*;
    use crate::queue::traits::SubQueue;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn test_router_signals_between_backends() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = router(
            BackendRegistry::with_builtins(),
            vec![
                block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1),
                block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1),
                block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1),
            ],
        );
        router.set_checked_caller(supervisor.clone());

        router.count().unwrap();
        assert!(supervisor.active_count() >= 3);
    }

    #[test]
    fn test_backends_signal_through_router() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = router(
            BackendRegistry::with_builtins(),
            vec![block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1)],
        );
        router.initialize().unwrap();

        // Registered after the backends were created: the relay is shared
        router.set_checked_caller(supervisor.clone());
        let before = supervisor.active_count();
        router.clear().unwrap();

        // Once from the router loop, once from the memory queue itself
        assert_eq!(supervisor.active_count() - before, 2);
    }

    fn empty_memory_router(backends: usize) -> crate::queue::configurable::ConfigurableRouter {
        let blocks = (0..backends)
            .map(|_| block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1))
            .collect();
        router(BackendRegistry::with_builtins(), blocks)
    }

    #[test]
    fn test_traversal_signals_for_each_empty_backend() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = empty_memory_router(4);
        router.set_checked_caller(supervisor.clone());
        router.initialize().unwrap();

        let before = supervisor.active_count();
        assert!(router.dequeue().unwrap_err().is_empty());
        assert!(supervisor.active_count() - before >= 4);

        let before = supervisor.active_count();
        assert!(router.peek(2).unwrap().is_empty());
        assert!(supervisor.active_count() - before >= 4);
    }

    #[test]
    fn test_vacuum_signals_for_each_backend() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = empty_memory_router(3);
        router.set_checked_caller(supervisor.clone());
        router.initialize().unwrap();

        let before = supervisor.active_count();
        assert!(!router.vacuum_if_needed().unwrap());
        assert!(supervisor.active_count() - before >= 3);
    }

    #[test]
    fn test_close_delete_and_dispose_signal_for_each_backend() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = empty_memory_router(3);
        router.set_checked_caller(supervisor.clone());
        router.initialize().unwrap();

        let before = supervisor.active_count();
        router.close().unwrap();
        assert!(supervisor.active_count() - before >= 3);

        let before = supervisor.active_count();
        router.delete().unwrap();
        assert!(supervisor.active_count() - before >= 3);

        let before = supervisor.active_count();
        router.dispose().unwrap();
        assert!(supervisor.active_count() - before >= 3);
    }

    #[test]
    fn test_fixed_router_signals_for_each_backend() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router =
            FixedSchemaRouter::standard(OWNER, Arc::new(BackendRegistry::with_builtins()));
        router.set_checked_caller(supervisor.clone());
        router.initialize().unwrap();
        let backends = router.backend_names().len();
        assert!(backends > 0);

        let before = supervisor.active_count();
        assert!(!router.vacuum_if_needed().unwrap());
        assert!(supervisor.active_count() - before >= backends);

        let before = supervisor.active_count();
        assert!(router.peek(1).unwrap().is_empty());
        assert!(supervisor.active_count() - before >= backends);

        let before = supervisor.active_count();
        router.dispose().unwrap();
        assert!(supervisor.active_count() - before >= backends);
    }

    #[test]
    fn test_pause_and_resume_are_forwarded() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router = router(BackendRegistry::with_builtins(), Vec::new());
        router.set_checked_caller(supervisor.clone());

        router.pause_check();
        router.resume_check();
        router.set_active();

        assert_eq!(supervisor.paused.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.resumed.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.active_count(), 1);
    }

    #[test]
    fn test_fixed_router_relays_signals() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let mut router =
            FixedSchemaRouter::standard(OWNER, Arc::new(BackendRegistry::with_builtins()));
        router.set_checked_caller(supervisor.clone());

        assert!(router.dequeue().unwrap_err().is_empty());
        assert!(supervisor.active_count() > 0);
    }

    #[test]
    fn test_nested_router_shares_supervisor() {
        let supervisor = Arc::new(CountingSupervisor::default());
        let inner = router(
            BackendRegistry::with_builtins(),
            vec![block(MEMORY_QUEUE_TYPE, "", ".*", 0, -1)],
        );
        let mut outer: Box<dyn SubQueue> = Box::new(inner);
        outer
            .as_checked_caller()
            .expect("routers accept a supervisor")
            .set_checked_caller(supervisor.clone());

        outer.enqueue(mode(1)).unwrap();
        outer.clear().unwrap();
        assert!(supervisor.active_count() > 0);
    }
}
