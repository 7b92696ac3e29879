//! Job state for the asynchronous pipeline.

use dashmap::DashMap;
use tokio::sync::watch;

/// The four reported checkpoints of a running pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Building the attribute query.
    Preparing,
    /// Talking to the attribute authority.
    QueryingAuthority,
    /// Building the guard request from the authority's response.
    PreparingGuardRequest,
    /// Talking to the guard.
    QueryingGuard,
}

impl PipelineStage {
    /// Approximate progress for this checkpoint.
    #[must_use]
    pub const fn percent(&self) -> u8 {
        match self {
            Self::Preparing => 0,
            Self::QueryingAuthority => 25,
            Self::PreparingGuardRequest => 50,
            Self::QueryingGuard => 75,
        }
    }

    /// Human-readable progress label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Preparing => "Preparing attribute request",
            Self::QueryingAuthority => "Communicating with attribute authority",
            Self::PreparingGuardRequest => "Preparing guard request",
            Self::QueryingGuard => "Communicating with guard",
        }
    }
}

/// Where the browser goes once attributes have been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRedirect {
    /// The guard's podder URL with the session appended.
    pub url: String,
}

/// Observable job state.
///
/// The progress value alone never indicates success or failure: callers
/// check [`JobStatus::is_completed`] and then inspect the result.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// The worker has not started yet.
    Pending,
    /// The worker is at this checkpoint.
    Running(PipelineStage),
    /// The pipeline finished; the browser should follow the redirect.
    Done(HandoffRedirect),
    /// The pipeline failed terminally.
    Failed(String),
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    /// Progress for display, if the job is still running.
    #[must_use]
    pub const fn percent(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Running(stage) => Some(stage.percent()),
            _ => None,
        }
    }
}

/// One observed snapshot of a job.
pub type JobSnapshot = JobStatus;

/// Handle for polling a spawned job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub(crate) receiver: watch::Receiver<JobSnapshot>,
}

impl JobHandle {
    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot change; returns `None` once the worker
    /// is gone.
    pub async fn changed(&mut self) -> Option<JobSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow().clone())
    }
}

pub(crate) fn job_channel() -> (watch::Sender<JobSnapshot>, JobHandle) {
    let (tx, rx) = watch::channel(JobStatus::Pending);
    (tx, JobHandle { receiver: rx })
}

/// In-flight jobs, addressed by the engine session key.
///
/// A job is created per inbound assertion handoff and discarded once a
/// completed result has been consumed by the polling caller.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobHandle>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a job under the engine session key.
    pub fn insert(&self, engine_session_id: &str, handle: JobHandle) {
        self.jobs.insert(engine_session_id.to_string(), handle);
    }

    /// The current snapshot for a session's job, discarding the job once a
    /// terminal snapshot has been handed out.
    #[must_use]
    pub fn poll(&self, engine_session_id: &str) -> Option<JobSnapshot> {
        let snapshot = self.jobs.get(engine_session_id)?.snapshot();
        if snapshot.is_completed() {
            self.jobs.remove(engine_session_id);
        }
        Some(snapshot)
    }
}
