use crate::error::JobError;
use crate::ring::{Identifier, hash_id};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The processing pipelines a job can request. Parsed from the submitted task
/// name; the legacy spellings from the radar toolkit are accepted alongside
/// the canonical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Fit,
    Despeckle,
    Combine,
    CombineGrid,
    MakeGrid,
    MapGrid,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Fit => "fit",
            TaskKind::Despeckle => "despeckle",
            TaskKind::Combine => "combine",
            TaskKind::CombineGrid => "combine_grid",
            TaskKind::MakeGrid => "make_grid",
            TaskKind::MapGrid => "map_grid",
        }
    }
}

impl FromStr for TaskKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fit" | "fitacf" => Ok(TaskKind::Fit),
            "despeckle" | "despeck" => Ok(TaskKind::Despeckle),
            "combine" => Ok(TaskKind::Combine),
            "combine_grid" => Ok(TaskKind::CombineGrid),
            "make_grid" => Ok(TaskKind::MakeGrid),
            "map_grid" | "map_grd" => Ok(TaskKind::MapGrid),
            other => Err(JobError::UnknownTask(other.to_string())),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job. `Running` carries the progress percentage
/// reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running(u8),
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running(_) => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Unknown => "unknown",
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            JobState::Running(pct) => Some(*pct),
            JobState::Succeeded => Some(100),
            _ => None,
        }
    }
}

/// A job submission as it arrives over HTTP or RPC. `params` is the free-form
/// argument string handed to the processor; for the pipeline processor its
/// first token names the source object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub task: String,
    pub source_bucket: String,
    pub dest_bucket: String,
    #[serde(default)]
    pub params: String,
}

/// The job descriptor stored in the DHT under `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Identifier,
    pub task: TaskKind,
    pub source_bucket: String,
    pub dest_bucket: String,
    pub params: String,
    pub submitted_at: u64,
    pub state: JobState,
    pub result: Option<String>,
    pub error: Option<String>,
    pub assigned_peer: Option<Identifier>,
}

impl JobRecord {
    pub fn new(task: TaskKind, request: &JobRequest) -> Self {
        let job_id = job_id_for(
            task,
            &request.source_bucket,
            &request.dest_bucket,
            &request.params,
        );
        Self {
            job_id,
            task,
            source_bucket: request.source_bucket.clone(),
            dest_bucket: request.dest_bucket.clone(),
            params: request.params.clone(),
            submitted_at: now_ms(),
            state: JobState::Pending,
            result: None,
            error: None,
            assigned_peer: None,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.job_id,
            task: self.task,
            state: self.state,
            submitted_at: self.submitted_at,
        }
    }
}

/// The externally visible view of a job, as returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub state: JobState,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl JobStatusView {
    pub fn unknown() -> Self {
        Self {
            state: JobState::Unknown,
            result: None,
            error: None,
        }
    }
}

/// Compact listing entry for dashboards and ring-wide aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Identifier,
    pub task: TaskKind,
    pub state: JobState,
    pub submitted_at: u64,
}

/// Deterministic job identity: identical submissions hash to the same key and
/// deduplicate on the owning peer. Fields are NUL-separated so adjacent
/// fields cannot collide by concatenation.
pub fn job_id_for(task: TaskKind, source_bucket: &str, dest_bucket: &str, params: &str) -> Identifier {
    let mut buf = Vec::new();
    for part in [task.as_str(), source_bucket, dest_bucket, params] {
        buf.extend_from_slice(part.as_bytes());
        buf.push(0);
    }
    hash_id(&buf)
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
