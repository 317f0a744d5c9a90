use chord_cluster::config::Config;
use chord_cluster::http;
use chord_cluster::jobs::PipelineProcessor;
use chord_cluster::node;
use chord_cluster::object_store::HttpObjectStore;

use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::parse();
    tracing::info!(
        "starting chord-cluster node (rpc {}:{}, http port {})",
        config.host,
        config.listen_port,
        config.http_port
    );

    let object_store = Arc::new(HttpObjectStore::new(config.object_store_endpoint.clone()));
    tracing::info!("object store at {}", object_store.endpoint());
    let processor = Arc::new(PipelineProcessor::new(std::env::temp_dir().join("chord-cluster")));

    let http_port = config.http_port;
    let handle = node::start(config, object_store, processor).await?;

    let app = http::router(handle.ctx.clone());
    let http_listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await?;
    tracing::info!("http api on {}", http_listener.local_addr()?);

    tokio::select! {
        served = axum::serve(http_listener, app) => {
            served?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            handle.shutdown();
        }
    }

    Ok(())
}
