use super::protocol::{self, Frame, Reply, Request};
use crate::error::{JobError, StoreError};
use crate::node::NodeContext;
use crate::store::owns_key;

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

/// Accepts peer connections and dispatches their frames into the node.
///
/// Each request is handled on its own task so a slow lookup never blocks the
/// other traffic multiplexed onto the same connection; correlation ids keep
/// the replies sorted out on the caller's side.
pub struct RpcServer;

impl RpcServer {
    pub fn start(
        listener: TcpListener,
        ctx: Arc<NodeContext>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!("peer connected from {}", addr);
                            let ctx = ctx.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, ctx, shutdown).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!("accept failed: {}", e);
                        }
                    },
                    _ = shutdown.changed() => {
                        tracing::info!("rpc listener shutting down");
                        break;
                    }
                }
            }
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    ctx: Arc<NodeContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let _ = stream.set_nodelay(true);
    let (mut read_half, mut write_half) = stream.into_split();

    let (reply_tx, mut reply_rx) = mpsc::channel::<Frame>(64);

    tokio::spawn(async move {
        while let Some(frame) = reply_rx.recv().await {
            if let Err(e) = protocol::write_frame(&mut write_half, &frame).await {
                tracing::debug!("reply write failed: {}", e);
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            read = protocol::read_frame(&mut read_half) => match read {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!("peer connection closed: {}", e);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        };

        let ctx = ctx.clone();
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            let correlation_id = frame.correlation_id;
            let reply_frame = match handle_frame(&ctx, frame).await {
                Ok(frame) => frame,
                Err((code, message)) => protocol::encode_error(correlation_id, code, message),
            };
            let _ = reply_tx.send(reply_frame).await;
        });
    }
}

async fn handle_frame(ctx: &NodeContext, frame: Frame) -> Result<Frame, (u16, String)> {
    let request = protocol::decode_request(&frame)
        .map_err(|e| (protocol::ERR_BAD_REQUEST, e.to_string()))?;
    let request_kind = request.kind();
    let reply = dispatch(ctx, request).await?;
    protocol::encode_reply(frame.correlation_id, request_kind, &reply)
        .map_err(|e| (protocol::ERR_INTERNAL, e.to_string()))
}

async fn dispatch(ctx: &NodeContext, request: Request) -> Result<Reply, (u16, String)> {
    match request {
        Request::Ping => Ok(Reply::Pong),

        Request::FindSuccessor { id } => match ctx.chord.find_successor(id).await {
            Ok(peer) => Ok(Reply::Successor(peer)),
            Err(e) => Err((protocol::ERR_LOOKUP, e.to_string())),
        },

        Request::GetPredecessor => Ok(Reply::Predecessor(ctx.chord.predecessor().await)),

        Request::GetSuccessorList => Ok(Reply::SuccessorList(ctx.chord.successor_list().await)),

        Request::Notify { peer } => {
            ctx.chord.handle_notify(peer).await;
            Ok(Reply::Notified)
        }

        Request::Put { record } => {
            let predecessor = ctx.chord.predecessor().await;
            let local = ctx.chord.local();
            if !owns_key(record.key, predecessor.as_ref(), local) {
                let expected = ctx
                    .chord
                    .find_successor(record.key)
                    .await
                    .map_err(|e| (protocol::ERR_LOOKUP, e.to_string()))?;
                let rejection = StoreError::NotOwner {
                    expected: expected.clone(),
                };
                tracing::debug!("refusing put for {}: {}", record.key, rejection);
                return Err((protocol::ERR_NOT_OWNER, expected.endpoint));
            }
            // version 0 is a routed client write: the owner assigns the next
            // version; anything else is a replica/handoff carrying history
            let version = if record.version == 0 {
                ctx.store.local_put(record.key, record.value)
            } else {
                match ctx.store.accept_replica(record) {
                    Ok(version) => version,
                    // stale replicas are routine: ack with the kept version
                    Err(StoreError::VersionStale { current, .. }) => current,
                    Err(e) => return Err((protocol::ERR_INTERNAL, e.to_string())),
                }
            };
            Ok(Reply::PutAck { version })
        }

        Request::Get { key } => Ok(Reply::Value(ctx.store.local_get(key))),

        Request::TransferRange { lo, hi } => Ok(Reply::Records(ctx.store.records_in_arc(lo, hi))),

        Request::SubmitJob { record } => {
            let predecessor = ctx.chord.predecessor().await;
            let local = ctx.chord.local();
            if !owns_key(record.job_id, predecessor.as_ref(), local) {
                let expected = ctx
                    .chord
                    .find_successor(record.job_id)
                    .await
                    .map_err(|e| (protocol::ERR_LOOKUP, e.to_string()))?;
                return Err((protocol::ERR_NOT_OWNER, expected.endpoint));
            }
            match ctx.jobs.accept_local(record) {
                Ok((job_id, state)) => Ok(Reply::JobAccepted { job_id, state }),
                Err(JobError::Overloaded) => {
                    Err((protocol::ERR_OVERLOADED, JobError::Overloaded.to_string()))
                }
                Err(e) => Err((protocol::ERR_INTERNAL, e.to_string())),
            }
        }

        Request::JobStatus { job_id } => Ok(Reply::Job(ctx.jobs.local_status(job_id))),

        Request::ListJobs => Ok(Reply::Jobs(ctx.jobs.list_local_jobs())),
    }
}
