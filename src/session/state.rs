//! Per-session state: project context plus one status per slot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::slot::{SlotKind, SLOT_COUNT};
use crate::prompts::DEFAULT_REFERENCE_ORG;

/// Lifecycle of one slot.
///
/// A single enum value holds both the progress flag and the result, so the
/// two can never disagree: `Queued` and `Running` are "in progress",
/// `Done` carries the result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Idle,
    /// Triggered, waiting for `run_pending`.
    Queued,
    /// The agent call is in flight.
    Running,
    Done(String),
}

impl SlotStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotStatus::Queued | SlotStatus::Running)
    }

    pub fn result(&self) -> Option<&str> {
        match self {
            SlotStatus::Done(text) => Some(text),
            _ => None,
        }
    }
}

/// Whether `name` can be used as a single file or directory name.
pub(crate) fn is_path_component(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]))
}

/// Shared read-only input for every slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    /// Used for export filenames.
    pub project_name: String,
    pub requirements_text: String,
}

impl ProjectContext {
    pub(crate) fn new(project_name: &str, requirements_text: &str) -> Self {
        Self {
            project_name: project_name.trim().to_string(),
            requirements_text: requirements_text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SlotRecord {
    pub(crate) status: SlotStatus,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

/// Everything one user session owns.
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    /// `None` until the project is initialized.
    pub(crate) context: Option<ProjectContext>,
    slots: [SlotRecord; SLOT_COUNT],
    /// Bumped by every clear; late results from an older cycle are dropped.
    pub(crate) epoch: u64,
    pub(crate) reference_org: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            context: None,
            slots: Default::default(),
            epoch: 0,
            reference_org: DEFAULT_REFERENCE_ORG.to_string(),
        }
    }
}

impl SessionState {
    pub(crate) fn slot(&self, kind: SlotKind) -> &SlotRecord {
        &self.slots[kind.index()]
    }

    pub(crate) fn slot_mut(&mut self, kind: SlotKind) -> &mut SlotRecord {
        &mut self.slots[kind.index()]
    }

    /// Reset every slot and the project context.
    pub(crate) fn clear(&mut self) {
        self.context = None;
        self.slots = Default::default();
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags() {
        assert!(!SlotStatus::Idle.is_pending());
        assert!(SlotStatus::Queued.is_pending());
        assert!(SlotStatus::Running.is_pending());
        assert!(!SlotStatus::Done(String::new()).is_pending());

        assert_eq!(SlotStatus::Done("x".into()).result(), Some("x"));
        assert_eq!(SlotStatus::Running.result(), None);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut state = SessionState::default();
        state.context = Some(ProjectContext::new(" acme ", "text"));
        state.slot_mut(SlotKind::Cost).status = SlotStatus::Done("x".into());
        state.slot_mut(SlotKind::Requirements).status = SlotStatus::Running;

        state.clear();

        assert!(state.context.is_none());
        assert_eq!(state.epoch, 1);
        for kind in SlotKind::ALL {
            assert_eq!(state.slot(kind).status, SlotStatus::Idle);
            assert!(state.slot(kind).completed_at.is_none());
        }
    }

    #[test]
    fn test_project_name_is_trimmed() {
        let ctx = ProjectContext::new("  acme\n", "  keep  ");
        assert_eq!(ctx.project_name, "acme");
        assert_eq!(ctx.requirements_text, "  keep  ");
    }
}
