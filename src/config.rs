use crate::ring::RING_BITS;

use anyhow::ensure;
use clap::Parser;

/// Runtime configuration of one node.
///
/// Every knob has a working default so `chord-cluster` with no arguments
/// forms a fresh single-node ring on the standard ports.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Peer-to-peer job execution over a Chord DHT")]
pub struct Config {
    /// host:port of an existing ring member; absent forms a new ring
    #[arg(long)]
    pub bootstrap_node: Option<String>,

    /// Hostname advertised to peers (must be reachable from them)
    #[arg(long, default_value_t = default_host())]
    pub host: String,

    /// Peer RPC listen port; 0 picks an ephemeral port
    #[arg(long, default_value_t = 6501)]
    pub listen_port: u16,

    /// HTTP API listen port
    #[arg(long, default_value_t = 8001)]
    pub http_port: u16,

    /// host:port of the bucket-oriented object store
    #[arg(long, default_value = "localhost:9000")]
    pub object_store_endpoint: String,

    /// Successor-list width r (failure resilience)
    #[arg(long, default_value_t = 4)]
    pub successor_list_r: u8,

    #[arg(long, default_value_t = 1000)]
    pub t_stabilize_ms: u64,

    #[arg(long, default_value_t = 500)]
    pub t_fix_fingers_ms: u64,

    #[arg(long, default_value_t = 1000)]
    pub t_check_predecessor_ms: u64,

    /// Per-RPC deadline; RPCs double as failure probes, so keep it short
    #[arg(long, default_value_t = 500)]
    pub rpc_timeout_ms: u64,

    /// Number of job workers; 0 selects the CPU count
    #[arg(long, default_value_t = 0)]
    pub worker_pool_size: usize,

    /// High-water mark of the pending-job queue
    #[arg(long, default_value_t = 256)]
    pub job_queue_depth: usize,

    /// Ring width in bits; informational, must match the build
    #[arg(long, default_value_t = RING_BITS)]
    pub hash_width_m: usize,

    /// Form a singleton ring instead of retrying when the bootstrap node is
    /// unreachable at startup
    #[arg(long)]
    pub bootstrap_fallback_singleton: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.hash_width_m == RING_BITS,
            "hash_width_m {} does not match this build's ring width {}; all peers must agree",
            self.hash_width_m,
            RING_BITS
        );
        ensure!(self.successor_list_r >= 1, "successor_list_r must be at least 1");
        ensure!(self.job_queue_depth >= 1, "job_queue_depth must be at least 1");
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        if self.worker_pool_size > 0 {
            self.worker_pool_size
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_node: None,
            host: default_host(),
            listen_port: 6501,
            http_port: 8001,
            object_store_endpoint: "localhost:9000".to_string(),
            successor_list_r: 4,
            t_stabilize_ms: 1000,
            t_fix_fingers_ms: 500,
            t_check_predecessor_ms: 1000,
            rpc_timeout_ms: 500,
            worker_pool_size: 0,
            job_queue_depth: 256,
            hash_width_m: RING_BITS,
            bootstrap_fallback_singleton: false,
        }
    }
}

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_port, 6501);
        assert_eq!(config.http_port, 8001);
        assert_eq!(config.successor_list_r, 4);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_mismatched_ring_width_rejected() {
        let config = Config {
            hash_width_m: 160,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
