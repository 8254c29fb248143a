use clap::Parser;
use media_cluster::api;
use media_cluster::cluster::master::ClusterMaster;
use media_cluster::config::{MasterConfig, TaskCatalog};
use media_cluster::persistence::StateStore;
use media_cluster::persistence::json_store::JsonFileStore;
use media_cluster::rpc::client::WorkerClient;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MasterConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    tracing::info!("Starting master on {}", config.bind);

    // 1. Static task catalog and persisted state:
    let catalog = TaskCatalog::load_or_empty(&config.task_catalog);
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::open(&config.state_file).await?);
    let state = store.load().await?;

    // 2. Cluster core:
    let bind_addr = config.bind;
    let startup_delay = config.startup_delay();
    let master = ClusterMaster::new(config, catalog, WorkerClient::http());

    // 3. Replay persisted workers and objects once workers had time to come up:
    tracing::info!(
        "Replaying {} worker(s) and {} object(s) in {:?}",
        state.slaves.len(),
        state.objects.len(),
        startup_delay
    );
    tokio::time::sleep(startup_delay).await;
    master.restore(state).await;

    // 4. Health monitor and task reconciler:
    master.clone().start().await;

    // 5. HTTP control plane:
    let app = api::router(master, store);

    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
