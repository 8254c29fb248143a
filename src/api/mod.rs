//! Control-Plane HTTP Module
//!
//! The operator-facing REST surface of the master. Handlers validate the
//! request, call into `ClusterMaster`, then mirror the change to the
//! `StateStore` so a restarted master can replay it.

pub mod handlers;
pub mod protocol;

use crate::cluster::master::ClusterMaster;
use crate::persistence::StateStore;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use handlers::*;
use protocol::*;
use std::sync::Arc;

pub fn router(master: Arc<ClusterMaster>, store: Arc<dyn StateStore>) -> Router {
    Router::new()
        .route(ROUTE_LOGIN, post(handle_login))
        .route(ROUTE_LOGOUT, post(handle_logout))
        .route(ROUTE_SET_OUTPUT, post(handle_set_output))
        .route(ROUTE_SYSTEM_INFO, get(handle_system_info))
        .route(ROUTE_SLAVE_ADD, post(handle_add_slave))
        .route(ROUTE_SLAVE_DEL, post(handle_del_slave))
        .route(ROUTE_SLAVE_STATUS, get(handle_slave_status))
        .route(ROUTE_OBJECT_ADD, post(handle_add_object))
        .route(ROUTE_OBJECT_DEL, post(handle_del_object))
        .route(ROUTE_OBJECT_STATUS, get(handle_object_status))
        .route(ROUTE_TASK_START, post(handle_start_task))
        .route(ROUTE_TASK_STOP, post(handle_stop_task))
        .route(ROUTE_TASK_SUPPORT, get(handle_task_support))
        .layer(Extension(master))
        .layer(Extension(store))
}
