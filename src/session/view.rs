//! Read-only projection of session state for display and export.
//!
//! Nothing here mutates the session. The display layer calls
//! [`Session::render_view`] whenever it redraws; a job that is still running
//! simply keeps reporting [`SlotView::InProgress`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::coordinator::Session;
use super::slot::SlotKind;
use super::state::SlotStatus;
use crate::error::SessionError;

/// Markers that introduce a draw.io document, in order of preference.
const DIAGRAM_MARKERS: [&str; 2] = ["<?xml", "<mxfile"];

/// What the display layer should show for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SlotView {
    /// Nothing requested yet.
    Idle,
    InProgress,
    Completed(String),
}

impl From<&SlotStatus> for SlotView {
    fn from(status: &SlotStatus) -> Self {
        match status {
            SlotStatus::Idle => SlotView::Idle,
            SlotStatus::Queued | SlotStatus::Running => SlotView::InProgress,
            SlotStatus::Done(text) => SlotView::Completed(text.clone()),
        }
    }
}

/// A downloadable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: String,
    /// The stored result, unmodified.
    pub content: String,
    pub media_type: &'static str,
}

/// A completed result laid out for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderedResult<'a> {
    Text(&'a str),
    /// Architecture result carrying a draw.io document.
    WithDiagram { prose: &'a str, diagram_xml: &'a str },
}

/// Split architecture text at the first diagram marker.
///
/// `<?xml` is preferred over `<mxfile` when both occur. The XML part runs
/// from the marker to the end of the text.
pub fn split_diagram(text: &str) -> Option<(&str, &str)> {
    DIAGRAM_MARKERS
        .iter()
        .find_map(|marker| text.find(marker))
        .map(|at| text.split_at(at))
}

/// Lay out a slot's result for display. Only architecture results are split.
pub fn render_result(slot: SlotKind, text: &str) -> RenderedResult<'_> {
    if slot == SlotKind::Architecture {
        if let Some((prose, diagram_xml)) = split_diagram(text) {
            return RenderedResult::WithDiagram { prose, diagram_xml };
        }
    }
    RenderedResult::Text(text)
}

/// Per-slot line of the status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub slot: SlotKind,
    pub capability: &'static str,
    pub view: SlotView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Overview of the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub project_name: Option<String>,
    pub slots: Vec<SlotSummary>,
}

impl SessionSummary {
    pub fn completed(&self) -> impl Iterator<Item = SlotKind> + '_ {
        self.slots
            .iter()
            .filter(|s| matches!(s.view, SlotView::Completed(_)))
            .map(|s| s.slot)
    }

    pub fn in_progress(&self) -> impl Iterator<Item = SlotKind> + '_ {
        self.slots
            .iter()
            .filter(|s| s.view == SlotView::InProgress)
            .map(|s| s.slot)
    }
}

impl Session {
    pub fn render_view(&self, slot: SlotKind) -> SlotView {
        SlotView::from(&self.read().slot(slot).status)
    }

    /// The download triple for a slot's result.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoResult`] while the slot has no result.
    pub fn export(&self, slot: SlotKind) -> Result<Export, SessionError> {
        let state = self.read();
        let content = state
            .slot(slot)
            .status
            .result()
            .ok_or(SessionError::NoResult(slot))?;
        let context = state.context.as_ref().ok_or(SessionError::NotInitialized)?;
        let format = slot.spec().export;

        Ok(Export {
            filename: format.filename(&context.project_name),
            content: content.to_string(),
            media_type: format.media_type,
        })
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.read();
        SessionSummary {
            project_name: state.context.as_ref().map(|c| c.project_name.clone()),
            slots: SlotKind::ALL
                .into_iter()
                .map(|slot| {
                    let record = state.slot(slot);
                    SlotSummary {
                        slot,
                        capability: slot.spec().capability,
                        view: SlotView::from(&record.status),
                        completed_at: record.completed_at,
                    }
                })
                .collect(),
        }
    }
}
