//! Peer Wire Protocol
//!
//! Length-prefixed frames over TCP: a 4-byte big-endian length, then a payload
//! of `correlation_id: u64 (BE) | kind: u8 | body`. Bodies are bincode. A
//! reply carries the request's correlation id with `kind | 0x80`; error
//! replies use the reserved kind `0xFF` with a `{code, message}` body.

use crate::error::RpcError;
use crate::jobs::types::{JobRecord, JobState, JobStatusView, JobSummary};
use crate::ring::{Identifier, PeerHandle};
use crate::store::Record;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Frames larger than this are refused as corrupt before any allocation.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub const KIND_PING: u8 = 0x01;
pub const KIND_FIND_SUCCESSOR: u8 = 0x02;
pub const KIND_GET_PREDECESSOR: u8 = 0x03;
pub const KIND_GET_SUCCESSOR_LIST: u8 = 0x04;
pub const KIND_NOTIFY: u8 = 0x05;
pub const KIND_PUT: u8 = 0x06;
pub const KIND_GET: u8 = 0x07;
pub const KIND_TRANSFER_RANGE: u8 = 0x08;
pub const KIND_SUBMIT_JOB: u8 = 0x09;
pub const KIND_JOB_STATUS: u8 = 0x0A;
pub const KIND_LIST_JOBS: u8 = 0x0B;

pub const KIND_REPLY_FLAG: u8 = 0x80;
pub const KIND_ERROR: u8 = 0xFF;

// Error-frame codes.
pub const ERR_NOT_OWNER: u16 = 1;
pub const ERR_BAD_REQUEST: u16 = 2;
pub const ERR_INTERNAL: u16 = 3;
pub const ERR_OVERLOADED: u16 = 4;
pub const ERR_UNKNOWN_TASK: u16 = 5;
pub const ERR_LOOKUP: u16 = 6;

/// One frame on the wire, after the length prefix is stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub correlation_id: u64,
    pub kind: u8,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Ping,
    FindSuccessor { id: Identifier },
    GetPredecessor,
    GetSuccessorList,
    Notify { peer: PeerHandle },
    Put { record: Record },
    Get { key: Identifier },
    TransferRange { lo: Identifier, hi: Identifier },
    SubmitJob { record: JobRecord },
    JobStatus { job_id: Identifier },
    ListJobs,
}

impl Request {
    pub fn kind(&self) -> u8 {
        match self {
            Request::Ping => KIND_PING,
            Request::FindSuccessor { .. } => KIND_FIND_SUCCESSOR,
            Request::GetPredecessor => KIND_GET_PREDECESSOR,
            Request::GetSuccessorList => KIND_GET_SUCCESSOR_LIST,
            Request::Notify { .. } => KIND_NOTIFY,
            Request::Put { .. } => KIND_PUT,
            Request::Get { .. } => KIND_GET,
            Request::TransferRange { .. } => KIND_TRANSFER_RANGE,
            Request::SubmitJob { .. } => KIND_SUBMIT_JOB,
            Request::JobStatus { .. } => KIND_JOB_STATUS,
            Request::ListJobs => KIND_LIST_JOBS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reply {
    Pong,
    Successor(PeerHandle),
    Predecessor(Option<PeerHandle>),
    SuccessorList(Vec<PeerHandle>),
    Notified,
    /// The version now stored under the key, whether the write applied or an
    /// equal-or-newer copy was already present.
    PutAck { version: u64 },
    Value(Option<Record>),
    Records(Vec<Record>),
    JobAccepted { job_id: Identifier, state: JobState },
    Job(JobStatusView),
    Jobs(Vec<JobSummary>),
}

/// Body of a `KIND_ERROR` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

pub fn encode_request(correlation_id: u64, request: &Request) -> Result<Frame, RpcError> {
    let body = bincode::serialize(request)
        .map_err(|e| RpcError::FrameCorrupt(format!("encode request: {e}")))?;
    Ok(Frame {
        correlation_id,
        kind: request.kind(),
        body,
    })
}

pub fn encode_reply(correlation_id: u64, request_kind: u8, reply: &Reply) -> Result<Frame, RpcError> {
    let body = bincode::serialize(reply)
        .map_err(|e| RpcError::FrameCorrupt(format!("encode reply: {e}")))?;
    Ok(Frame {
        correlation_id,
        kind: request_kind | KIND_REPLY_FLAG,
        body,
    })
}

pub fn encode_error(correlation_id: u64, code: u16, message: impl Into<String>) -> Frame {
    let body = bincode::serialize(&ErrorBody {
        code,
        message: message.into(),
    })
    .unwrap_or_default();
    Frame {
        correlation_id,
        kind: KIND_ERROR,
        body,
    }
}

pub fn decode_request(frame: &Frame) -> Result<Request, RpcError> {
    let request: Request = bincode::deserialize(&frame.body)
        .map_err(|e| RpcError::FrameCorrupt(format!("decode request: {e}")))?;
    if request.kind() != frame.kind {
        return Err(RpcError::FrameCorrupt(format!(
            "kind byte {:#04x} does not match body {:#04x}",
            frame.kind,
            request.kind()
        )));
    }
    Ok(request)
}

/// Decodes the frame answering a request of `request_kind`: a typed reply, a
/// remote error, or a corrupt-frame failure.
pub fn decode_reply(request_kind: u8, frame: &Frame) -> Result<Reply, RpcError> {
    if frame.kind == KIND_ERROR {
        let err: ErrorBody = bincode::deserialize(&frame.body)
            .map_err(|e| RpcError::FrameCorrupt(format!("decode error body: {e}")))?;
        return Err(RpcError::Remote {
            code: err.code,
            message: err.message,
        });
    }
    if frame.kind != request_kind | KIND_REPLY_FLAG {
        return Err(RpcError::FrameCorrupt(format!(
            "reply kind {:#04x} for request kind {:#04x}",
            frame.kind, request_kind
        )));
    }
    bincode::deserialize(&frame.body)
        .map_err(|e| RpcError::FrameCorrupt(format!("decode reply: {e}")))
}

/// Writes `4-byte BE length | correlation_id | kind | body`.
pub async fn write_frame<W>(stream: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let len = (8 + 1 + frame.body.len()) as u32;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&frame.correlation_id.to_be_bytes()).await?;
    stream.write_all(&[frame.kind]).await?;
    stream.write_all(&frame.body).await?;
    stream.flush().await
}

/// Reads one length-prefixed frame; refuses oversized or truncated payloads.
pub async fn read_frame<R>(stream: &mut R) -> std::io::Result<Frame>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len < 9 || len > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {len} out of bounds"),
        ));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;

    let mut correlation_bytes = [0u8; 8];
    correlation_bytes.copy_from_slice(&payload[..8]);
    Ok(Frame {
        correlation_id: u64::from_be_bytes(correlation_bytes),
        kind: payload[8],
        body: payload[9..].to_vec(),
    })
}
