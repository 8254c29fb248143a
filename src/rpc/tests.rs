//! RPC Module Tests
//!
//! Validates acknowledgement parsing and the typed client against the scripted
//! transport.

#[cfg(test)]
mod tests {
    use crate::rpc::client::WorkerClient;
    use crate::rpc::mock::{Method, MockWorkerRpc};
    use crate::rpc::protocol::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(3);

    // ============================================================
    // ACK PARSING
    // ============================================================

    #[test]
    fn test_status_initialized_flag() {
        let fresh = json!({"code": 0, "data": {"system_init": 0}});
        let running = json!({"code": 0, "data": {"system_init": 1}});

        assert!(!WorkerStatus::from_ack(&fresh).initialized);
        assert!(WorkerStatus::from_ack(&running).initialized);
    }

    #[test]
    fn test_status_without_flag_counts_as_initialized() {
        // Only an explicit 0 means "restarted"
        assert!(WorkerStatus::from_ack(&json!({"code": 0})).initialized);
        assert!(WorkerStatus::from_ack(&serde_json::Value::Null).initialized);
    }

    #[test]
    fn test_load_from_ack() {
        assert_eq!(load_from_ack(&json!({"data": {"load": 12.5}})), Some(12.5));
        assert_eq!(load_from_ack(&json!({"data": {"load": -1.0}})), None);
        assert_eq!(load_from_ack(&json!({"data": {}})), None);
        assert_eq!(load_from_ack(&json!("garbage")), None);
    }

    #[test]
    fn test_object_ids_skip_negative_and_missing() {
        let body = json!({"data": {"obj": [{"id": 4}, {"id": -2}, {"name": "x"}, {"id": 9}]}});
        assert_eq!(object_ids_from_ack(&body), vec![4, 9]);
        assert!(object_ids_from_ack(&json!({"data": {}})).is_empty());
    }

    #[test]
    fn test_rejection_from_ack() {
        assert_eq!(rejection_from_ack(&json!({"code": 0, "data": {}})), None);
        assert_eq!(rejection_from_ack(&json!({"data": {}})), None);
        assert_eq!(
            rejection_from_ack(&json!({"code": -1, "msg": "no such task"})),
            Some("code -1: no such task".to_string())
        );
    }

    #[test]
    fn test_worker_addr_url() {
        let addr = WorkerAddr::new("10.0.0.5", 8082);
        assert_eq!(addr.url(ENDPOINT_STATUS), "http://10.0.0.5:8082/api/system/status");
        assert_eq!(add_object_path("rtsp"), "/api/obj/add/rtsp");
    }

    // ============================================================
    // TYPED CLIENT
    // ============================================================

    #[tokio::test]
    async fn test_client_unreachable_worker_is_error() {
        let mock = MockWorkerRpc::new();
        let client = WorkerClient::new(Arc::new(mock.clone()));
        let addr = WorkerAddr::new("10.0.0.1", 8082);

        let result = client.status(&addr, TIMEOUT).await;

        assert!(result.is_err());
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(mock.calls()[0].method, Method::Get);
    }

    #[tokio::test]
    async fn test_client_add_object_reports_load() {
        let mock = MockWorkerRpc::new();
        mock.worker_up("10.0.0.1", 7.0);
        let client = WorkerClient::new(Arc::new(mock.clone()));
        let addr = WorkerAddr::new("10.0.0.1", 8082);
        let params = json!({"id": 3, "type": "rtsp"});

        let load = client.add_object(&addr, "rtsp", &params, TIMEOUT).await.unwrap();

        assert_eq!(load, Some(7.0));
        let calls = mock.calls_to("10.0.0.1", "/api/obj/add/rtsp");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Some(params));
    }

    #[tokio::test]
    async fn test_client_task_command_body() {
        let mock = MockWorkerRpc::new();
        mock.worker_up("10.0.0.1", 1.0);
        let client = WorkerClient::new(Arc::new(mock.clone()));
        let addr = WorkerAddr::new("10.0.0.1", 8082);

        let cmd = TaskCommand {
            id: 42,
            data: json!({"task": "yolov3", "params": {"preview": "hls"}}),
        };
        client.start_task(&addr, &cmd, TIMEOUT).await.unwrap();

        let calls = mock.calls_to("10.0.0.1", ENDPOINT_START_TASK);
        assert_eq!(
            calls[0].body,
            Some(json!({"id": 42, "data": {"task": "yolov3", "params": {"preview": "hls"}}}))
        );
    }
}
