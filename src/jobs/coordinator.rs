use super::types::{
    JobRecord, JobRequest, JobState, JobStatusView, JobSummary, TaskKind,
};
use crate::chord::ChordService;
use crate::error::{JobError, RpcError};
use crate::ring::{Identifier, PeerHandle};
use crate::rpc::protocol::{ERR_NOT_OWNER, ERR_OVERLOADED};
use crate::rpc::{Reply, Request, RpcClient};
use crate::store::KvStore;

use std::sync::Arc;
use tokio::sync::mpsc;

/// Routes jobs to their owning peer and maintains the local job table.
///
/// Jobs are ordinary DHT records whose value is the JSON-encoded
/// `JobRecord`, so handoff and replication treat them like any other key.
/// Identity is the content hash of the submission, which is what makes
/// concurrent duplicate submissions collapse onto one execution.
pub struct JobCoordinator {
    local: PeerHandle,
    chord: Arc<ChordService>,
    store: Arc<KvStore>,
    rpc: Arc<RpcClient>,
    queue_tx: mpsc::Sender<Identifier>,
}

impl JobCoordinator {
    pub fn new(
        local: PeerHandle,
        chord: Arc<ChordService>,
        store: Arc<KvStore>,
        rpc: Arc<RpcClient>,
        queue_tx: mpsc::Sender<Identifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local,
            chord,
            store,
            rpc,
            queue_tx,
        })
    }

    // ============================================================
    // Submission
    // ============================================================

    /// Submits a job: resolves the owner of its key and either accepts it
    /// locally or forwards it. A `NotOwner` rejection (stale routing) is
    /// re-routed once to the peer the rejecting node named.
    pub async fn submit(&self, request: JobRequest) -> Result<(Identifier, JobState), JobError> {
        let task: TaskKind = request.task.parse()?;
        let record = JobRecord::new(task, &request);
        let job_id = record.job_id;

        let owner = self.chord.find_successor(job_id).await?;
        tracing::debug!("job {} owned by {}", job_id, owner.endpoint);

        let mut target = owner;
        let mut rerouted = false;
        loop {
            if target.id == self.local.id {
                return self.accept_local(record);
            }
            match self
                .rpc
                .call_default(
                    &target,
                    Request::SubmitJob {
                        record: record.clone(),
                    },
                )
                .await
            {
                Ok(Reply::JobAccepted { job_id, state }) => return Ok((job_id, state)),
                Ok(other) => {
                    return Err(JobError::Transport(RpcError::FrameCorrupt(format!(
                        "unexpected submit reply: {other:?}"
                    ))));
                }
                Err(RpcError::Remote { code, message }) if code == ERR_NOT_OWNER && !rerouted => {
                    tracing::debug!("submit re-routed from {} to {}", target.endpoint, message);
                    target = PeerHandle::from_endpoint(message);
                    rerouted = true;
                }
                Err(RpcError::Remote { code, .. }) if code == ERR_OVERLOADED => {
                    return Err(JobError::Overloaded);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Accepts a job this node owns. A duplicate of a pending, running or
    /// succeeded job is a no-op returning the existing state; a failed one is
    /// a legal re-attempt and resets to pending.
    pub fn accept_local(&self, mut record: JobRecord) -> Result<(Identifier, JobState), JobError> {
        let job_id = record.job_id;

        let previous = self.load_job(job_id);
        if let Some(existing) = &previous {
            match existing.state {
                JobState::Pending | JobState::Running(_) | JobState::Succeeded => {
                    tracing::debug!(
                        "job {} already {}, coalescing submit",
                        job_id,
                        existing.state.name()
                    );
                    return Ok((job_id, existing.state));
                }
                JobState::Failed | JobState::Unknown => {
                    tracing::info!("re-attempting job {} after failure", job_id);
                }
            }
        }

        record.state = JobState::Pending;
        record.result = None;
        record.error = None;
        record.assigned_peer = Some(self.local.id);
        self.store_job(&record);

        if self.queue_tx.try_send(job_id).is_err() {
            // roll the table back so a rejected submit leaves no orphaned
            // pending record behind
            match previous {
                Some(prev) => self.store_job(&prev),
                None => {
                    self.store.local_delete(job_id);
                }
            }
            return Err(JobError::Overloaded);
        }

        tracing::info!("job {} queued ({})", job_id, record.task);
        Ok((job_id, JobState::Pending))
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Status of a job, routed to its owning peer. A peer with no record
    /// answers `Unknown`; clients are expected to retry around handoff
    /// windows.
    pub async fn status(&self, job_id: Identifier) -> Result<JobStatusView, JobError> {
        let owner = self.chord.find_successor(job_id).await?;
        if owner.id == self.local.id {
            return Ok(self.local_status(job_id));
        }
        match self
            .rpc
            .call_default(&owner, Request::JobStatus { job_id })
            .await
        {
            Ok(Reply::Job(view)) => Ok(view),
            Ok(other) => Err(JobError::Transport(RpcError::FrameCorrupt(format!(
                "unexpected status reply: {other:?}"
            )))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn local_status(&self, job_id: Identifier) -> JobStatusView {
        match self.load_job(job_id) {
            Some(record) => JobStatusView {
                state: record.state,
                result: record.result,
                error: record.error,
            },
            None => JobStatusView::unknown(),
        }
    }

    pub fn list_local_jobs(&self) -> Vec<JobSummary> {
        self.store
            .all_records()
            .into_iter()
            .filter_map(|record| serde_json::from_slice::<JobRecord>(&record.value).ok())
            .map(|job| job.summary())
            .collect()
    }

    /// Ring-wide job listing: the local table plus a `list_jobs` fan-out over
    /// every distinct known peer, deduped by job id.
    pub async fn all_jobs(&self) -> Vec<JobSummary> {
        let mut jobs = self.list_local_jobs();
        for peer in self.chord.known_peers().await {
            match self.rpc.call_default(&peer, Request::ListJobs).await {
                Ok(Reply::Jobs(remote)) => {
                    for job in remote {
                        if !jobs.iter().any(|j| j.job_id == job.job_id) {
                            jobs.push(job);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("list_jobs from {} failed: {}", peer.endpoint, e);
                }
            }
        }
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    // ============================================================
    // Executor-side record updates
    // ============================================================

    /// Claims a pending job for execution. Only the `Pending -> Running(0)`
    /// transition succeeds, so a job id that was enqueued twice still runs
    /// once.
    pub fn claim(&self, job_id: Identifier) -> Option<JobRecord> {
        let mut record = self.load_job(job_id)?;
        if record.state != JobState::Pending {
            return None;
        }
        record.state = JobState::Running(0);
        self.store_job(&record);
        Some(record)
    }

    pub fn record_progress(&self, job_id: Identifier, pct: u8) {
        if let Some(mut record) = self.load_job(job_id) {
            if matches!(record.state, JobState::Running(_)) {
                record.state = JobState::Running(pct.min(100));
                self.store_job(&record);
            }
        }
    }

    /// Writes the terminal state of a finished job. Ownership may have moved
    /// while the job ran; execution is never migrated, so the final state is
    /// routed to the current owner and the stale local copy dropped.
    pub async fn publish_final(&self, record: JobRecord) {
        let job_id = record.job_id;
        let owner = match self.chord.find_successor(job_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!("routing final state of {} failed ({}), keeping local", job_id, e);
                self.store_job(&record);
                return;
            }
        };

        if owner.id == self.local.id {
            self.store_job(&record);
            return;
        }

        tracing::info!(
            "job {} finished after ownership moved to {}",
            job_id,
            owner.endpoint
        );
        let value = match serde_json::to_vec(&record) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("encoding job {} failed: {}", job_id, e);
                return;
            }
        };
        let put = Request::Put {
            record: crate::store::Record {
                key: job_id,
                value,
                version: 0, // the new owner assigns its own version
            },
        };
        match self.rpc.call_default(&owner, put).await {
            Ok(Reply::PutAck { .. }) => {
                self.store.local_delete(job_id);
            }
            Ok(other) => {
                tracing::warn!("final put of {} got unexpected reply: {:?}", job_id, other);
                self.store_job(&record);
            }
            Err(e) => {
                tracing::warn!("final put of {} failed ({}), keeping local", job_id, e);
                self.store_job(&record);
            }
        }
    }

    // ============================================================
    // Job table plumbing
    // ============================================================

    pub fn store_job(&self, record: &JobRecord) {
        match serde_json::to_vec(record) {
            Ok(value) => {
                self.store.local_put(record.job_id, value);
            }
            Err(e) => {
                tracing::error!("encoding job {} failed: {}", record.job_id, e);
            }
        }
    }

    pub fn load_job(&self, job_id: Identifier) -> Option<JobRecord> {
        self.store
            .local_get(job_id)
            .and_then(|record| serde_json::from_slice(&record.value).ok())
    }
}
