//! Node lifecycle: wires the transport, ring, store and job layers together
//! behind an explicit `start(config) -> handle` / `handle.shutdown()` pair.
//! There are no process-wide globals; everything a subsystem needs travels in
//! an `Arc`.

use crate::chord::ChordService;
use crate::config::Config;
use crate::jobs::{JobCoordinator, JobExecutor, TaskProcessor};
use crate::object_store::ObjectStore;
use crate::ring::PeerHandle;
use crate::rpc::{RpcClient, RpcServer};
use crate::store::KvStore;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

/// Everything the RPC dispatcher and the HTTP handlers need from the node.
pub struct NodeContext {
    pub config: Config,
    pub chord: Arc<ChordService>,
    pub store: Arc<KvStore>,
    pub jobs: Arc<JobCoordinator>,
    pub object_store: Arc<dyn ObjectStore>,
}

/// A running node. Dropping the handle does not stop the node; call
/// `shutdown` to stop the maintenance loops, workers and listener.
pub struct NodeHandle {
    pub ctx: Arc<NodeContext>,
    pub rpc_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeHandle {
    pub fn endpoint(&self) -> String {
        self.ctx.chord.local().endpoint.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Boots a node: binds the peer listener, assembles the subsystems, joins the
/// ring and starts the maintenance loops and the worker pool.
pub async fn start(
    config: Config,
    object_store: Arc<dyn ObjectStore>,
    processor: Arc<dyn TaskProcessor>,
) -> Result<NodeHandle> {
    config.validate()?;

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("binding peer listener on port {}", config.listen_port))?;
    let rpc_addr = listener.local_addr()?;
    let endpoint = format!("{}:{}", config.host, rpc_addr.port());
    let local = PeerHandle::from_endpoint(endpoint);
    tracing::info!("node {} listening on {}", local, rpc_addr);

    let rpc = RpcClient::new(Duration::from_millis(config.rpc_timeout_ms));
    let store = Arc::new(KvStore::new());
    let chord = ChordService::new(local.clone(), &config, rpc.clone(), store.clone());

    let (queue_tx, queue_rx) = mpsc::channel(config.job_queue_depth);
    let jobs = JobCoordinator::new(local, chord.clone(), store.clone(), rpc.clone(), queue_tx);
    let executor = JobExecutor::new(
        jobs.clone(),
        object_store.clone(),
        processor,
        config.worker_count(),
    );

    let ctx = Arc::new(NodeContext {
        config,
        chord: chord.clone(),
        store,
        jobs,
        object_store,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // peers may call back during the join handshake, so listen first
    RpcServer::start(listener, ctx.clone(), shutdown_rx.clone());
    chord.join().await?;
    chord.start(shutdown_rx.clone());
    executor.start(queue_rx, shutdown_rx);

    Ok(NodeHandle {
        ctx,
        rpc_addr,
        shutdown_tx,
    })
}
