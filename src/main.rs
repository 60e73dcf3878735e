use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use memvault::api;
use memvault::api::auth_middleware::AuthState;
use memvault::cluster::{ClusterManager, ClusterWorkers, NodeService, NodesFile};
use memvault::config::{self, Config};
use memvault::rpc::RpcServer;
use memvault::server::ServerHandle;
use memvault::storage::{CleanupWorker, ShardedStore};
use memvault::wal::{self, Wal, WalConfig, WalManager};

#[derive(Parser, Debug)]
#[command(name = "memvault", about = "Sharded in-memory key-value store")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config/config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let wal = if config.wal_enabled {
        Wal::Durable(WalManager::open(WalConfig {
            path: PathBuf::from(&config.wal_path),
            buffer_size: config.wal_buffer_size,
            flush_interval: Duration::from_secs(config.wal_flush_interval),
        })?)
    } else {
        info!("wal disabled, running without durability");
        Wal::Disabled
    };

    let store = Arc::new(ShardedStore::new(config.shard_count, wal));

    if config.wal_enabled {
        let applied = wal::recover_from_wal(&store, Path::new(&config.wal_path)).await?;
        info!(records = applied, "wal replay complete");
    }

    let mut cleanup = CleanupWorker::new(
        store.clone(),
        Duration::from_secs(config.cleanup_interval.max(1)),
    );
    let _cleanup_task = cleanup.start();

    let rpc_addr = config::listen_addr(&config.rpc_port)?;
    let rpc_server = RpcServer::bind(rpc_addr, store.clone()).await?;
    info!(%rpc_addr, "starting rpc server");
    let rpc_handle = tokio::spawn(rpc_server.serve());

    let auth = AuthState {
        enabled: config.auth_enabled,
        token: config.auth_token.clone(),
    };

    let http_addr = config::listen_addr(&config.http_port)?;
    let http_handle = tokio::spawn(api::rest::serve(http_addr, store.clone(), auth.clone()));

    let (cluster_handle, cluster_workers) = if config.cluster_enabled {
        info!("running in cluster mode");

        let nodes_file = Arc::new(NodesFile::new(&config.nodes_file));
        let manager = Arc::new(ClusterManager::new(
            &config.nodes_file,
            Duration::from_secs(config.heartbeat_interval.max(1)),
            Duration::from_secs(config.config_check_interval.max(1)),
        ));

        let membership = nodes_file.load()?;
        for address in &membership.nodes {
            if manager.ping_node(address).await {
                manager.add_node(address);
            } else {
                tracing::warn!(%address, "listed node unreachable at startup");
            }
        }

        let service = Arc::new(NodeService::new(
            manager.clone(),
            &args.config,
            config.replica_count,
        ));
        let workers = ClusterWorkers::start(manager);

        let cluster_addr = config::listen_addr(&config.cluster_port)?;
        let state = api::cluster::ClusterApiState {
            service,
            nodes_file,
        };
        let handle = tokio::spawn(api::cluster::serve(cluster_addr, state, auth.clone()));

        (Some(handle), Some(workers))
    } else {
        info!("running as standalone server");
        (None, None)
    };

    info!(
        http = %config.http_port,
        rpc = %config.rpc_port,
        "memvault ready"
    );

    ServerHandle {
        store,
        cleanup,
        http_handle,
        rpc_handle,
        cluster_handle,
        cluster_workers,
    }
    .wait_for_shutdown()
    .await;

    Ok(())
}
