//! Per-run status, with at most one running job of each kind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{OrganiseError, Result};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Organise,
    Transfer,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organise => write!(f, "Organisation"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum JobState {
    Running,
    Succeeded,
    CompletedWithWarnings,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub id: RunId,
    pub kind: JobKind,
    #[serde(flatten)]
    pub state: JobState,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    next_id: AtomicU64,
    organise_running: AtomicBool,
    transfer_running: AtomicBool,
    runs: Mutex<BTreeMap<RunId, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, kind: JobKind) -> &AtomicBool {
        match kind {
            JobKind::Organise => &self.organise_running,
            JobKind::Transfer => &self.transfer_running,
        }
    }

    fn runs(&self) -> MutexGuard<'_, BTreeMap<RunId, JobStatus>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `kind` and register a running job.
    ///
    /// # Errors
    /// `OrganiseError::Busy` while another job of the same kind is running.
    pub fn begin(&self, kind: JobKind, message: impl Into<String>) -> Result<JobHandle<'_>> {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrganiseError::Busy(kind))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.runs().insert(
            id,
            JobStatus {
                id,
                kind,
                state: JobState::Running,
                message: message.into(),
            },
        );
        Ok(JobHandle {
            registry: self,
            id,
            kind,
            finished: false,
        })
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    pub fn status(&self, id: RunId) -> Option<JobStatus> {
        self.runs().get(&id).cloned()
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.runs().values().cloned().collect()
    }

    fn record(&self, id: RunId, state: JobState, message: Option<String>) -> Option<JobStatus> {
        let mut runs = self.runs();
        let status = runs.get_mut(&id)?;
        status.state = state;
        if let Some(message) = message {
            status.message = message;
        }
        Some(status.clone())
    }
}

/// A claimed job. Dropping it releases the claim.
pub struct JobHandle<'a> {
    registry: &'a JobRegistry,
    id: RunId,
    kind: JobKind,
    finished: bool,
}

impl JobHandle<'_> {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn update(&self, message: impl Into<String>) {
        self.registry
            .record(self.id, JobState::Running, Some(message.into()));
    }

    /// Record the terminal state and release the claim.
    pub fn finish(mut self, state: JobState, message: impl Into<String>) -> Option<JobStatus> {
        self.finished = true;
        self.registry.record(self.id, state, Some(message.into()))
    }
}

impl Drop for JobHandle<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.record(
                self.id,
                JobState::Failed("abandoned before completion".to_string()),
                None,
            );
        }
        self.registry.flag(self.kind).store(false, Ordering::Release);
    }
}
