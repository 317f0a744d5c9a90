use super::protocol::{self, Frame, Reply, Request};
use crate::error::RpcError;
use crate::ring::PeerHandle;

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

/// One pooled connection to a remote peer: an outbox drained by a writer task
/// and the correlation table the reader task resolves replies through.
struct Connection {
    outbox: mpsc::Sender<Frame>,
    pending: Arc<DashMap<u64, oneshot::Sender<Frame>>>,
}

/// Request/reply transport between peers.
///
/// One TCP connection per remote endpoint, opened on demand and dropped on
/// the first failure; the next call redials. Replies are matched to callers
/// by correlation id, so many tasks can share a connection concurrently.
/// The transport never retries: the chord engine and the job coordinator own
/// that decision.
pub struct RpcClient {
    connections: Arc<DashMap<String, Arc<Connection>>>,
    next_correlation: AtomicU64,
    default_deadline: Duration,
}

impl RpcClient {
    pub fn new(default_deadline: Duration) -> Arc<Self> {
        Arc::new(Self {
            connections: Arc::new(DashMap::new()),
            next_correlation: AtomicU64::new(1),
            default_deadline,
        })
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    pub async fn call_default(&self, peer: &PeerHandle, request: Request) -> Result<Reply, RpcError> {
        self.call(peer, request, self.default_deadline).await
    }

    /// Sends `request` to `peer` and awaits the correlated reply within
    /// `deadline`.
    pub async fn call(
        &self,
        peer: &PeerHandle,
        request: Request,
        deadline: Duration,
    ) -> Result<Reply, RpcError> {
        // the deadline covers dialing too: a blackholed peer must not hang
        // the caller past its budget
        let conn = match tokio::time::timeout(deadline, self.connection(&peer.endpoint)).await {
            Ok(conn) => conn?,
            Err(_) => return Err(RpcError::Timeout(deadline.as_millis() as u64)),
        };

        let correlation_id = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        let frame = protocol::encode_request(correlation_id, &request)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        conn.pending.insert(correlation_id, reply_tx);

        if conn.outbox.send(frame).await.is_err() {
            conn.pending.remove(&correlation_id);
            self.connections.remove(&peer.endpoint);
            return Err(RpcError::Unreachable(peer.endpoint.clone()));
        }

        let reply_frame = match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(frame)) => frame,
            // reader task died before answering: the peer went away
            Ok(Err(_)) => {
                self.connections.remove(&peer.endpoint);
                return Err(RpcError::Unreachable(peer.endpoint.clone()));
            }
            Err(_) => {
                conn.pending.remove(&correlation_id);
                return Err(RpcError::Timeout(deadline.as_millis() as u64));
            }
        };

        protocol::decode_reply(request.kind(), &reply_frame)
    }

    async fn connection(&self, endpoint: &str) -> Result<Arc<Connection>, RpcError> {
        if let Some(conn) = self.connections.get(endpoint) {
            if !conn.outbox.is_closed() {
                return Ok(conn.clone());
            }
            drop(conn);
            self.connections.remove(endpoint);
        }

        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|e| RpcError::Unreachable(format!("{endpoint}: {e}")))?;
        let _ = stream.set_nodelay(true);
        let (mut read_half, mut write_half) = stream.into_split();

        let (outbox_tx, mut outbox_rx) = mpsc::channel::<Frame>(64);
        let pending: Arc<DashMap<u64, oneshot::Sender<Frame>>> = Arc::new(DashMap::new());

        // Writer task: outbox -> socket.
        let writer_endpoint = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(frame) = outbox_rx.recv().await {
                if let Err(e) = protocol::write_frame(&mut write_half, &frame).await {
                    tracing::debug!("write to {} failed: {}", writer_endpoint, e);
                    break;
                }
            }
        });

        // Reader task: socket -> pending callers. On any read failure the
        // connection is evicted and every waiting caller observes its oneshot
        // closing, which maps to Unreachable.
        let conn = Arc::new(Connection {
            outbox: outbox_tx,
            pending: pending.clone(),
        });
        self.connections.insert(endpoint.to_string(), conn.clone());

        let reader_endpoint = endpoint.to_string();
        let connections = self.connections.clone();
        let pooled = Arc::downgrade(&conn);
        tokio::spawn(async move {
            loop {
                match protocol::read_frame(&mut read_half).await {
                    Ok(frame) => {
                        if let Some((_, caller)) = pending.remove(&frame.correlation_id) {
                            let _ = caller.send(frame);
                        } else {
                            tracing::debug!(
                                "dropping uncorrelated frame {:#04x} from {}",
                                frame.kind,
                                reader_endpoint
                            );
                        }
                    }
                    Err(e) => {
                        tracing::debug!("connection to {} closed: {}", reader_endpoint, e);
                        break;
                    }
                }
            }
            pending.clear();
            // evict the pooled entry unless a redial already replaced it
            connections.remove_if(&reader_endpoint, |_, existing| {
                pooled
                    .upgrade()
                    .map(|conn| Arc::ptr_eq(existing, &conn))
                    .unwrap_or(true)
            });
        });

        Ok(conn)
    }
}
