use super::types::TaskKind;
use crate::error::JobError;
use crate::object_store::{Artifact, ObjectStore};
use crate::ring::hash_id;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback handed to processors; each call rewrites the job record
/// as `Running(pct)`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// The external processing contract. Implementations read their input from
/// the source bucket, write their output to the destination bucket and return
/// a handle to the produced artifact. `params` is a free-form argument
/// string owned by the processor.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn execute(
        &self,
        task: TaskKind,
        source_bucket: &str,
        dest_bucket: &str,
        params: &str,
        objects: Arc<dyn ObjectStore>,
        progress: ProgressFn,
    ) -> Result<Artifact, JobError>;
}

/// Runs the radar-toolkit command pipelines, staging blobs through a scratch
/// directory. The first token of `params` names the source object; the rest
/// is appended to the command line of tasks that take extra arguments.
pub struct PipelineProcessor {
    scratch_dir: PathBuf,
}

impl PipelineProcessor {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }
}

#[async_trait]
impl TaskProcessor for PipelineProcessor {
    async fn execute(
        &self,
        task: TaskKind,
        source_bucket: &str,
        dest_bucket: &str,
        params: &str,
        objects: Arc<dyn ObjectStore>,
        progress: ProgressFn,
    ) -> Result<Artifact, JobError> {
        let mut parts = params.split_whitespace();
        let Some(object) = parts.next() else {
            return Err(JobError::ArtifactUnavailable(
                "params must name the source object".to_string(),
            ));
        };
        let extra = parts.collect::<Vec<_>>().join(" ");

        let data = objects
            .get_object(source_bucket, object)
            .await
            .map_err(|e| JobError::ArtifactUnavailable(e.to_string()))?;
        progress(10);

        let stem = hash_id(format!("{source_bucket}/{object}").as_bytes());
        let input = self.scratch_dir.join(format!("{stem}.in"));
        let output = self.scratch_dir.join(format!("{stem}.out"));

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| JobError::ExecutorFailed(e.to_string()))?;
        tokio::fs::write(&input, &data)
            .await
            .map_err(|e| JobError::ExecutorFailed(e.to_string()))?;

        let command = command_line(task, &input, &output, &extra);
        tracing::debug!("running: {}", command);
        let status = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .status()
            .await
            .map_err(|e| JobError::ExecutorFailed(e.to_string()))?;
        if !status.success() {
            let _ = tokio::fs::remove_file(&input).await;
            let _ = tokio::fs::remove_file(&output).await;
            return Err(JobError::ExecutorFailed(format!(
                "`{command}` exited with {status}"
            )));
        }
        progress(80);

        let produced = tokio::fs::read(&output)
            .await
            .map_err(|e| JobError::ExecutorFailed(e.to_string()))?;
        objects
            .put_object(dest_bucket, object, produced)
            .await
            .map_err(|e| JobError::ArtifactUnavailable(e.to_string()))?;

        let _ = tokio::fs::remove_file(&input).await;
        let _ = tokio::fs::remove_file(&output).await;
        progress(100);

        Ok(Artifact {
            url: format!("{dest_bucket}/{object}"),
        })
    }
}

fn command_line(task: TaskKind, input: &Path, output: &Path, extra: &str) -> String {
    let input = input.display();
    let output = output.display();
    match task {
        TaskKind::Fit => format!("make_fit -fitacf3 {input} > {output}"),
        TaskKind::Despeckle => format!("fit_speck_removal {input} > {output}"),
        TaskKind::Combine => format!("cat {input} > {output}"),
        TaskKind::CombineGrid => format!("combine_grid {input} > {output}"),
        TaskKind::MakeGrid => format!("make_grid {input} {extra} > {output}"),
        TaskKind::MapGrid => format!(
            "map_grd {input} | map_addhmb | map_addimf {extra} | map_addmodel | map_fit > {output}"
        ),
    }
}

/// Completes immediately; the test double for the executor pipeline.
pub struct InstantProcessor;

#[async_trait]
impl TaskProcessor for InstantProcessor {
    async fn execute(
        &self,
        _task: TaskKind,
        _source_bucket: &str,
        dest_bucket: &str,
        params: &str,
        _objects: Arc<dyn ObjectStore>,
        progress: ProgressFn,
    ) -> Result<Artifact, JobError> {
        let object = params.split_whitespace().next().unwrap_or("artifact");
        progress(100);
        Ok(Artifact {
            url: format!("{dest_bucket}/{object}"),
        })
    }
}
