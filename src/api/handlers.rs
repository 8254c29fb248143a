use super::protocol::*;
use crate::cluster::master::ClusterMaster;
use crate::cluster::types::TaskDispatch;
use crate::error::{ControlError, ControlResult};
use crate::objects::types::task_name;
use crate::persistence::StateStore;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
};
use serde_json::{Value, json};
use std::sync::Arc;

type Reply = (StatusCode, Json<ApiResponse>);

fn reply(op: &str, result: ControlResult<Value>) -> Reply {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                tracing::error!("{} failed: {}", op, e);
            } else {
                tracing::warn!("{} rejected: {}", op, e);
            }
            (status, Json(ApiResponse::from_error(&e)))
        }
    }
}

fn dispatch_view(dispatch: &TaskDispatch) -> Value {
    match dispatch {
        TaskDispatch::Sent { worker_ip } => json!({"dispatch": "sent", "worker": worker_ip}),
        TaskDispatch::Deferred { reason } => json!({"dispatch": "deferred", "reason": reason}),
        TaskDispatch::Unreachable { ip, reason } => {
            json!({"dispatch": "unreachable", "worker": ip, "reason": reason})
        }
    }
}

// --- System ---

pub async fn handle_login(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Json(req): Json<LoginRequest>,
) -> Reply {
    let result = match (req.username, req.password) {
        (Some(user), Some(password))
            if user == master.config.admin_user && password == master.config.admin_password =>
        {
            Ok(json!({ "username": user }))
        }
        (Some(_), Some(_)) => Err(ControlError::Unauthorized),
        _ => Err(ControlError::Malformed(
            "get username or password failed".to_string(),
        )),
    };

    reply("login", result)
}

pub async fn handle_logout() -> Reply {
    reply("logout", Ok(Value::Null))
}

pub async fn handle_set_output(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(sink): Json<Value>,
) -> Reply {
    let result: ControlResult<Value> = async {
        if !sink.is_object() {
            return Err(ControlError::Malformed("output must be an object".to_string()));
        }

        let delivered = master.set_output(sink.clone()).await;
        store.set_output(&sink).await?;

        tracing::info!("Output sink updated, pushed to {} worker(s)", delivered);
        Ok(json!({ "delivered": delivered }))
    }
    .await;

    reply("set output", result)
}

pub async fn handle_system_info(Extension(master): Extension<Arc<ClusterMaster>>) -> Reply {
    let info = SystemInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        output: master.output_summary(),
    };

    reply("system info", Ok(json!(info)))
}

// --- Workers ---

pub async fn handle_add_slave(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(raw): Json<Value>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let worker = master.register_worker(&raw).await?;
        store.upsert_slave(&worker.ip, &raw).await?;

        tracing::info!(
            "Worker {} added ({})",
            worker.addr(),
            if worker.is_alive() { "alive" } else { "dead" }
        );
        Ok(json!(WorkerView::from(&worker)))
    }
    .await;

    reply("add slave", result)
}

pub async fn handle_del_slave(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(req): Json<SlaveIpRequest>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let ip = req
            .ip
            .ok_or_else(|| ControlError::Malformed("get ip failed".to_string()))?;

        master.deregister_worker(&ip)?;
        store.delete_slave(&ip).await?;

        tracing::info!("Worker {} removed", ip);
        Ok(Value::Null)
    }
    .await;

    reply("del slave", result)
}

pub async fn handle_slave_status(Extension(master): Extension<Arc<ClusterMaster>>) -> Reply {
    let workers: Vec<WorkerView> = master.slaves.list().iter().map(WorkerView::from).collect();

    reply("slave status", Ok(json!({ "slave": workers })))
}

// --- Objects ---

pub async fn handle_add_object(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Path(object_type): Path<String>,
    Json(mut raw): Json<Value>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let Some(map) = raw.as_object_mut() else {
            return Err(ControlError::Malformed("object must be a JSON object".to_string()));
        };
        map.insert("type".to_string(), Value::String(object_type));

        let object = master.add_object(&raw)?;
        store.upsert_object(object.id, &object.raw_params).await?;

        tracing::info!("Object {} added", object.id);
        let worker = object
            .assigned_worker
            .as_deref()
            .and_then(|ip| master.slaves.lookup(ip));
        Ok(json!(ObjectView::new(
            &object,
            worker.as_ref(),
            master.config.preview_http_port
        )))
    }
    .await;

    reply("add object", result)
}

pub async fn handle_del_object(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(req): Json<ObjectIdRequest>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let id = req
            .id
            .ok_or_else(|| ControlError::Malformed("get id failed".to_string()))?;

        master.delete_object(id).await?;
        store.delete_object(id).await?;

        tracing::info!("Object {} deleted", id);
        Ok(Value::Null)
    }
    .await;

    reply("del object", result)
}

pub async fn handle_object_status(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Query(query): Query<ObjectStatusQuery>,
) -> Reply {
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let (window, total) = master.objects.page(offset, limit);

    let objects: Vec<ObjectView> = window
        .iter()
        .filter(|o| match &query.object_type {
            Some(wanted) => o.object_type() == Some(wanted.as_str()),
            None => true,
        })
        .map(|o| {
            let worker = o
                .assigned_worker
                .as_deref()
                .and_then(|ip| master.slaves.lookup(ip));
            ObjectView::new(o, worker.as_ref(), master.config.preview_http_port)
        })
        .collect();

    reply("object status", Ok(json!({ "total": total, "obj": objects })))
}

// --- Tasks ---

fn task_request(req: TaskRequest) -> ControlResult<(i64, Value, String)> {
    let (Some(id), Some(data)) = (req.id, req.data) else {
        return Err(ControlError::Malformed("get id or task params failed".to_string()));
    };
    let name = task_name(&data)
        .map(str::to_string)
        .ok_or_else(|| ControlError::Malformed("get task name failed".to_string()))?;

    Ok((id, data, name))
}

/// Records the task as desired and starts it. The stored task list is updated
/// even when the worker did not answer; the reconciler retries from there.
pub async fn handle_start_task(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(req): Json<TaskRequest>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let (id, data, name) = task_request(req)?;

        let dispatch = master.start_task(id, data.clone()).await?;
        store.push_task(id, &data).await?;

        tracing::info!("Task {} of object {}: {:?}", name, id, dispatch);
        let view = dispatch_view(&dispatch);
        dispatch.into_result()?;
        Ok(view)
    }
    .await;

    reply("start task", result)
}

pub async fn handle_stop_task(
    Extension(master): Extension<Arc<ClusterMaster>>,
    Extension(store): Extension<Arc<dyn StateStore>>,
    Json(req): Json<TaskRequest>,
) -> Reply {
    let result: ControlResult<Value> = async {
        let (id, data, name) = task_request(req)?;

        let outcome = master.stop_task(id, data).await;
        // Removed from the desired list in every outcome but NotFound/Malformed
        if !matches!(
            outcome,
            Err(ControlError::NotFound(_)) | Err(ControlError::Malformed(_))
        ) {
            store.pull_task(id, &name).await?;
        }

        let dispatch = outcome?;
        tracing::info!("Task {} of object {} stopped: {:?}", name, id, dispatch);
        let view = dispatch_view(&dispatch);
        dispatch.into_result()?;
        Ok(view)
    }
    .await;

    reply("stop task", result)
}

pub async fn handle_task_support(Extension(master): Extension<Arc<ClusterMaster>>) -> Reply {
    let tasks: Vec<CatalogEntry> = master
        .catalog
        .names
        .iter()
        .map(|name| CatalogEntry {
            name: name.clone(),
            disabled: false,
        })
        .collect();

    reply("task support", Ok(json!({ "tasks": tasks })))
}
