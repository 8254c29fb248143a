//! Object Registry Tests
//!
//! ## Test Scopes
//! - **Definition parsing**: id validation, type and name accessors.
//! - **Desired tasks**: append order, first-match removal, peek.
//! - **Registry**: duplicates, pagination, severing assignments.

#[cfg(test)]
mod tests {
    use crate::error::ControlError;
    use crate::objects::registry::ObjectRegistry;
    use crate::objects::types::{ManagedObject, ObjectStatus, task_name, task_preview};
    use serde_json::json;

    fn object(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "type": "rtsp",
            "name": format!("cam-{}", id),
            "data": {"url": "rtsp://127.0.0.1/test", "tcp_enable": 0}
        })
    }

    fn task(name: &str, preview: &str) -> serde_json::Value {
        json!({"task": name, "params": {"preview": preview, "record": "none"}})
    }

    // ============================================================
    // DEFINITION PARSING
    // ============================================================

    #[test]
    fn test_object_from_blob() {
        let obj = ManagedObject::from_blob(&object(99)).unwrap();

        assert_eq!(obj.id, 99);
        assert_eq!(obj.object_type(), Some("rtsp"));
        assert_eq!(obj.name(), "cam-99");
        assert_eq!(obj.status, ObjectStatus::Stopped);
        assert!(obj.assigned_worker.is_none());
        assert!(obj.desired_tasks.is_empty());
    }

    #[test]
    fn test_object_id_must_be_positive_integer() {
        let invalid = [
            json!({"id": 0}),
            json!({"id": -3}),
            json!({"id": "7"}),
            json!({"type": "rtsp"}),
        ];
        for raw in invalid {
            let result = ManagedObject::from_blob(&raw);
            assert!(matches!(result, Err(ControlError::Malformed(_))), "accepted {}", raw);
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ObjectStatus::Stopped.code(), 0);
        assert_eq!(ObjectStatus::Running.code(), 1);
    }

    // ============================================================
    // DESIRED TASKS
    // ============================================================

    #[test]
    fn test_tasks_keep_insertion_order() {
        let mut obj = ManagedObject::from_blob(&object(1)).unwrap();
        obj.add_task(task("yolov3", "hls"));
        obj.add_task(task("facenet", "none"));

        let names: Vec<&str> = obj.desired_tasks.iter().filter_map(task_name).collect();
        assert_eq!(names, vec!["yolov3", "facenet"]);
        assert_eq!(task_preview(obj.peek_task().unwrap()), Some("hls"));
    }

    #[test]
    fn test_remove_missing_task_leaves_list_unchanged() {
        let mut obj = ManagedObject::from_blob(&object(1)).unwrap();
        obj.add_task(task("yolov3", "hls"));
        let before = obj.desired_tasks.clone();

        assert!(!obj.remove_task("facenet"));
        assert_eq!(obj.desired_tasks, before);
    }

    #[test]
    fn test_remove_task_removes_first_match_only() {
        let mut obj = ManagedObject::from_blob(&object(1)).unwrap();
        obj.add_task(task("yolov3", "hls"));
        obj.add_task(task("facenet", "none"));
        obj.add_task(task("yolov3", "http-flv"));

        assert!(obj.remove_task("yolov3"));

        assert_eq!(obj.desired_tasks, vec![task("facenet", "none"), task("yolov3", "http-flv")]);
    }

    #[test]
    fn test_peek_empty() {
        let obj = ManagedObject::from_blob(&object(1)).unwrap();
        assert!(obj.peek_task().is_none());
    }

    // ============================================================
    // REGISTRY
    // ============================================================

    #[test]
    fn test_registry_rejects_duplicate_id() {
        let registry = ObjectRegistry::new();
        registry.add(&object(5)).unwrap();

        assert!(matches!(registry.add(&object(5)), Err(ControlError::Duplicate(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_task_operations_on_unknown_object() {
        let registry = ObjectRegistry::new();

        assert!(matches!(
            registry.add_task(3, task("yolov3", "hls")),
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(registry.remove_task(3, "yolov3"), Err(ControlError::NotFound(_))));
        assert!(registry.peek_task(3).is_none());
    }

    #[test]
    fn test_registry_task_round() {
        let registry = ObjectRegistry::new();
        registry.add(&object(5)).unwrap();

        registry.add_task(5, task("yolov3", "hls")).unwrap();
        assert_eq!(registry.peek_task(5), Some(task("yolov3", "hls")));

        assert!(!registry.remove_task(5, "facenet").unwrap());
        assert!(registry.remove_task(5, "yolov3").unwrap());
        assert!(registry.peek_task(5).is_none());
    }

    #[test]
    fn test_pagination_window_and_total() {
        let registry = ObjectRegistry::new();
        for id in 1..=10 {
            registry.add(&object(id)).unwrap();
        }

        let (window, total) = registry.page(5, 3);

        assert_eq!(total, 10);
        // Positions 5, 6, 7 hold ids 6, 7, 8
        assert_eq!(window.iter().map(|o| o.id).collect::<Vec<_>>(), vec![6, 7, 8]);
    }

    #[test]
    fn test_pagination_past_end() {
        let registry = ObjectRegistry::new();
        for id in 1..=4 {
            registry.add(&object(id)).unwrap();
        }

        let (tail, total) = registry.page(3, 10);
        assert_eq!(total, 4);
        assert_eq!(tail.len(), 1);

        let (empty, total) = registry.page(20, 3);
        assert_eq!(total, 4);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_clear_worker_severs_only_that_worker() {
        let registry = ObjectRegistry::new();
        for id in 1..=3 {
            registry.add(&object(id)).unwrap();
        }
        registry.set_assignment(1, Some("10.0.0.1".to_string()));
        registry.set_assignment(2, Some("10.0.0.2".to_string()));
        registry.set_assignment(3, Some("10.0.0.1".to_string()));

        let cleared = registry.clear_worker("10.0.0.1");

        assert_eq!(cleared, vec![1, 3]);
        assert!(registry.lookup(1).unwrap().assigned_worker.is_none());
        assert_eq!(registry.lookup(2).unwrap().assigned_worker.as_deref(), Some("10.0.0.2"));
    }
}
