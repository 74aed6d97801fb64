//! Job coordinator: the single authority for starting, tracking and
//! completing slot jobs.
//!
//! Guarantees:
//! - at most one outstanding job per slot;
//! - exactly one agent call per slot per clear cycle;
//! - a slot never stays in progress after its job ends, whatever the exit
//!   path (success, agent error, panic, dropped future);
//! - agent failures become the slot's displayable result and never affect
//!   other slots.
//!
//! Slots are independent. Upstream results are read when a job starts and
//! read as empty strings when absent; nothing waits for them.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::slot::{SlotKind, SlotSpec};
use super::state::{is_path_component, ProjectContext, SessionState, SlotStatus};
use crate::agent::Agent;
use crate::error::SessionError;
use crate::prompts::PromptInputs;

/// What `trigger` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The slot was idle and is now queued.
    Started,
    /// A job for the slot is already queued or running.
    AlreadyPending,
    /// The slot already has a result; clear first to rerun.
    AlreadyCompleted,
}

/// Handle to one user session's state.
///
/// Cheap to clone; clones share the same state. The lock is never held
/// across an agent call, so views stay readable while jobs run.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different GitHub organization for reference-project prompts.
    pub fn with_reference_org(self, org: impl Into<String>) -> Self {
        self.write().reference_org = org.into();
        self
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the project context.
    ///
    /// Re-initializing replaces the name and requirements and keeps any
    /// results already produced.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidInput`] if either value is blank, or if the
    /// project name cannot serve as a file name.
    pub fn initialize(
        &self,
        project_name: &str,
        requirements_text: &str,
    ) -> Result<(), SessionError> {
        if project_name.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "project name must not be empty".to_string(),
            ));
        }
        if !is_path_component(project_name.trim()) {
            return Err(SessionError::InvalidInput(format!(
                "project name '{}' must not contain path separators",
                project_name.trim()
            )));
        }
        if requirements_text.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "requirements text must not be empty".to_string(),
            ));
        }

        let context = ProjectContext::new(project_name, requirements_text);
        info!(project = %context.project_name, "Project initialized");
        self.write().context = Some(context);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.read().context.is_some()
    }

    pub fn context(&self) -> Option<ProjectContext> {
        self.read().context.clone()
    }

    /// Request a job for `slot`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] before the project is initialized;
    /// no slot is touched in that case.
    pub fn trigger(&self, slot: SlotKind) -> Result<TriggerOutcome, SessionError> {
        let mut state = self.write();
        if state.context.is_none() {
            return Err(SessionError::NotInitialized);
        }

        let record = state.slot_mut(slot);
        let outcome = match record.status {
            SlotStatus::Done(_) => TriggerOutcome::AlreadyCompleted,
            SlotStatus::Queued | SlotStatus::Running => TriggerOutcome::AlreadyPending,
            SlotStatus::Idle => {
                record.status = SlotStatus::Queued;
                TriggerOutcome::Started
            }
        };

        info!(slot = %slot, ?outcome, "Slot triggered");
        Ok(outcome)
    }

    /// Execute the queued job for `slot` and store its result.
    ///
    /// Returns the stored result. An agent failure is returned as
    /// `"<Capability> failed: <message>"`, exactly as stored.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] without a project context,
    /// [`SessionError::NotPending`] unless the slot is queued.
    pub async fn run_pending(
        &self,
        slot: SlotKind,
        agent: &dyn Agent,
    ) -> Result<String, SessionError> {
        self.run_with_spec(slot.spec(), agent).await
    }

    pub(crate) async fn run_with_spec(
        &self,
        spec: SlotSpec,
        agent: &dyn Agent,
    ) -> Result<String, SessionError> {
        let slot = spec.kind;
        let (inputs, epoch) = {
            let mut state = self.write();
            let context = state.context.as_ref().ok_or(SessionError::NotInitialized)?;
            if state.slot(slot).status != SlotStatus::Queued {
                return Err(SessionError::NotPending(slot));
            }

            let mut inputs =
                PromptInputs::new(&context.project_name, &context.requirements_text)
                    .with_reference_org(state.reference_org.clone());
            for &upstream in spec.upstream {
                let text = state.slot(upstream).status.result().unwrap_or_default();
                inputs = with_upstream(inputs, upstream, text);
            }

            state.slot_mut(slot).status = SlotStatus::Running;
            (inputs, state.epoch)
        };

        // Armed before anything else can unwind past a Running slot.
        let guard = RunGuard {
            session: self,
            slot,
            epoch,
            finished: false,
        };
        let prompt = (spec.invoker)(&inputs);
        let job_id = Uuid::new_v4();

        let result = async {
            info!(prompt_chars = prompt.len(), "Job started");
            let started = Instant::now();
            let text = match agent.invoke(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Agent call failed");
                    spec.failure_message(&e.to_string())
                }
            };
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                result_chars = text.len(),
                "Job finished"
            );
            text
        }
        .instrument(info_span!("slot_job", slot = %slot, job = %job_id))
        .await;

        guard.finish(result.clone());
        Ok(result)
    }

    /// Trigger `slot` and, if that started a job, run it.
    ///
    /// Returns the slot's result, or `None` when a job for the slot was
    /// already in progress elsewhere.
    pub async fn trigger_and_run(
        &self,
        slot: SlotKind,
        agent: &dyn Agent,
    ) -> Result<Option<String>, SessionError> {
        match self.trigger(slot)? {
            TriggerOutcome::Started => self.run_pending(slot, agent).await.map(Some),
            TriggerOutcome::AlreadyPending => Ok(None),
            TriggerOutcome::AlreadyCompleted => Ok(self.result(slot)),
        }
    }

    /// Reset every slot and the project context. No partial clear exists.
    pub fn clear_all(&self) {
        self.write().clear();
        info!("Session cleared");
    }

    pub fn is_pending(&self, slot: SlotKind) -> bool {
        self.read().slot(slot).status.is_pending()
    }

    pub fn has_result(&self, slot: SlotKind) -> bool {
        self.read().slot(slot).status.result().is_some()
    }

    pub fn result(&self, slot: SlotKind) -> Option<String> {
        self.read().slot(slot).status.result().map(str::to_string)
    }

    /// Upstream slots of `slot` that have no result yet.
    pub fn missing_upstream(&self, slot: SlotKind) -> Vec<SlotKind> {
        let state = self.read();
        slot.spec()
            .upstream
            .iter()
            .copied()
            .filter(|&upstream| state.slot(upstream).status.result().is_none())
            .collect()
    }
}

fn with_upstream(inputs: PromptInputs, upstream: SlotKind, text: &str) -> PromptInputs {
    match upstream {
        SlotKind::SimilarProjects => inputs.with_similar_projects(text),
        SlotKind::RepositoryStructure => inputs.with_repository_structure(text),
        other => {
            warn!(slot = %other, "Slot is not readable as upstream context");
            inputs
        }
    }
}

/// Ends a running job on every exit path.
///
/// `finish` stores the result; dropping an unfinished guard (panic or a
/// dropped future) returns the slot to `Idle`. Either way the update only
/// applies if the session has not been cleared since the job started.
struct RunGuard<'a> {
    session: &'a Session,
    slot: SlotKind,
    epoch: u64,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(mut self, result: String) {
        self.finished = true;
        self.settle(SlotStatus::Done(result));
    }

    fn settle(&self, status: SlotStatus) {
        let mut state = self.session.write();
        if state.epoch != self.epoch {
            info!(slot = %self.slot, "Session cleared while job ran, discarding result");
            return;
        }

        let record = state.slot_mut(self.slot);
        if record.status == SlotStatus::Running {
            record.completed_at = matches!(status, SlotStatus::Done(_)).then(Utc::now);
            record.status = status;
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(slot = %self.slot, "Job ended without a result, slot reset");
            self.settle(SlotStatus::Idle);
        }
    }
}
