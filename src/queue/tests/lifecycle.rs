//! Tests for lifecycle fan-out over the sub-queues

#[cfg(test)]
mod tests {
    use crate::queue::error::QueueError;
    use crate::queue::tests::common::*;
    use crate::queue::traits::{MachineIdentity, SubQueue};

    const OPERATIONS: [&str; 6] = ["count", "clear", "vacuum", "close", "delete", "dispose"];

    fn run_lifecycle(router: &mut dyn SubQueue) {
        router.count().unwrap();
        router.clear().unwrap();
        router.vacuum_if_needed().unwrap();
        router.close().unwrap();
        router.delete().unwrap();
        router.dispose().unwrap();
    }

    #[test]
    fn test_shared_backend_is_touched_once() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["shared", "other"], &[]);
        let mut router = router(
            registry,
            vec![
                // One backend behind three write routes
                block("shared", "MachineMode|CncAlarm|Action", ".*", 0, 0),
                block("other", "CncValue", ".*", 1, -1),
            ],
        );

        run_lifecycle(&mut router);

        for operation in OPERATIONS {
            assert_eq!(log.count("shared", operation), 1, "shared:{}", operation);
            assert_eq!(log.count("other", operation), 1, "other:{}", operation);
        }
        println!("✓ Each backend received each lifecycle call once");
    }

    #[test]
    fn test_count_sums_backends() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["a", "b"], &[]);
        let mut router = router(
            registry,
            vec![block("a", "MachineMode", ".*", 0, -1), block("b", "", ".*", 1, -1)],
        );

        router.enqueue(mode(1)).unwrap();
        router.enqueue(alarm("E01")).unwrap();
        router.enqueue(alarm("E02")).unwrap();
        assert_eq!(router.count().unwrap(), 3);
    }

    #[test]
    fn test_vacuum_result_is_any_backend() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["plain", "vacuumed", "idle"], &[]);
        let mut router = router(
            registry,
            vec![
                block("plain", "", ".*", 0, -1),
                block("vacuumed", "", ".*", 0, -1),
                block("idle", "", ".*", 0, -1),
            ],
        );

        assert!(router.vacuum_if_needed().unwrap());
        assert_eq!(log.count("idle", "vacuum"), 1);
    }

    #[test]
    fn test_dispose_failure_does_not_stop_others() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["first", "second", "third"], &["dispose"]);
        let mut router = router(
            registry,
            vec![
                block("first", "", ".*", 0, -1),
                block("second", "", ".*", 0, -1),
                block("third", "", ".*", 0, -1),
            ],
        );
        router.initialize().unwrap();

        assert!(router.dispose().is_ok());
        for label in ["first", "second", "third"] {
            assert_eq!(log.count(label, "dispose"), 1, "{}", label);
        }
    }

    #[test]
    fn test_close_failure_is_propagated() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["failing"], &["close", "delete", "vacuum"]);
        let mut router = router(registry, vec![block("failing", "", ".*", 0, -1)]);
        router.initialize().unwrap();

        match router.close() {
            Err(QueueError::BackendOperationFailed { queue, operation, .. }) => {
                assert_eq!(queue, "failing");
                assert_eq!(operation, "close");
            }
            other => panic!("Expected BackendOperationFailed, got {:?}", other),
        }
        assert!(router.delete().is_err());
        assert!(router.vacuum_if_needed().is_err());
    }

    #[test]
    fn test_close_and_dispose_before_first_use() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["lazy"], &[]);
        let mut router = router(registry, vec![block("lazy", "", ".*", 0, -1)]);

        router.close().unwrap();
        router.dispose().unwrap();
        assert!(log.calls().is_empty());
        assert!(!router.is_initialized());
    }

    #[test]
    fn test_backends_receive_owner() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["a", "b"], &[]);
        let mut router = router(
            registry,
            vec![block("a", "", ".*", 0, -1), block("b", "", ".*", 0, -1)],
        );
        router.initialize().unwrap();

        assert_eq!(log.calls(), vec!["a:set_owner", "b:set_owner"]);
        assert_eq!(router.owner(), OWNER);
    }

    #[test]
    fn test_new_owner_reaches_existing_backends() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["a", "b"], &[]);
        let mut router = router(
            registry,
            vec![block("a", "", ".*", 0, -1), block("b", "", ".*", 0, -1)],
        );
        router.initialize().unwrap();

        let owner = MachineIdentity::new(9, 4);
        router.set_owner(owner);

        assert_eq!(log.count("a", "set_owner"), 2);
        assert_eq!(log.count("b", "set_owner"), 2);
        assert_eq!(router.owner(), owner);
        assert_eq!(router.name(), "configurable.9.4");
    }

    #[test]
    fn test_failed_initialization_disposes_created_backends() {
        let log = CallLog::default();
        let registry = recording_registry(&log, &["a", "b"], &[]);
        let mut router = router(
            registry,
            vec![
                block("a", "", ".*", 0, -1),
                block("b", "", ".*", 0, -1),
                block("sqlite", "", ".*", 0, -1),
            ],
        );

        match router.initialize() {
            Err(QueueError::BackendNotFound { type_name }) => assert_eq!(type_name, "sqlite"),
            other => panic!("Expected BackendNotFound, got {:?}", other),
        }
        assert_eq!(log.count("a", "dispose"), 1);
        assert_eq!(log.count("b", "dispose"), 1);
        assert!(!router.is_initialized());
        assert!(router.routing_table().backends().is_empty());
    }
}
