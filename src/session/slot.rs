//! The closed set of analysis slots.
//!
//! Every slot kind carries its capability label, the prompt builder that
//! produces its agent call, the upstream slots whose results it may read,
//! and its export format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;
use crate::prompts::{self, PromptInputs};

/// Builds the agent prompt for one slot.
pub type PromptInvoker = fn(&PromptInputs) -> String;

/// Media type used for prose exports.
pub const MEDIA_MARKDOWN: &str = "text/markdown";

/// Media type used for code exports.
pub const MEDIA_PLAIN_TEXT: &str = "text/plain";

/// Number of slot kinds.
pub const SLOT_COUNT: usize = 8;

/// A named, independently triggerable unit of analysis work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    SimilarProjects,
    Requirements,
    Architecture,
    RepositoryStructure,
    TypescriptCdk,
    PythonCdk,
    Cost,
    Documentation,
}

impl SlotKind {
    /// All slots, in display order.
    pub const ALL: [SlotKind; SLOT_COUNT] = [
        SlotKind::SimilarProjects,
        SlotKind::Requirements,
        SlotKind::Architecture,
        SlotKind::RepositoryStructure,
        SlotKind::TypescriptCdk,
        SlotKind::PythonCdk,
        SlotKind::Cost,
        SlotKind::Documentation,
    ];

    /// Stable snake_case name of the slot.
    pub fn name(self) -> &'static str {
        match self {
            SlotKind::SimilarProjects => "similar_projects",
            SlotKind::Requirements => "requirements",
            SlotKind::Architecture => "architecture",
            SlotKind::RepositoryStructure => "repository_structure",
            SlotKind::TypescriptCdk => "typescript_cdk",
            SlotKind::PythonCdk => "python_cdk",
            SlotKind::Cost => "cost",
            SlotKind::Documentation => "documentation",
        }
    }

    /// Position of the slot in [`SlotKind::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Registry entry for this slot.
    pub fn spec(self) -> SlotSpec {
        match self {
            SlotKind::SimilarProjects => SlotSpec {
                kind: self,
                capability: "Similar projects research",
                invoker: prompts::similar_projects_prompt,
                upstream: &[],
                export: ExportFormat::markdown("similar_projects"),
            },
            SlotKind::Requirements => SlotSpec {
                kind: self,
                capability: "Requirements analysis",
                invoker: prompts::requirements_prompt,
                upstream: &[],
                export: ExportFormat::markdown("requirements"),
            },
            SlotKind::Architecture => SlotSpec {
                kind: self,
                capability: "Architecture analysis",
                invoker: prompts::architecture_prompt,
                upstream: &[SlotKind::SimilarProjects],
                export: ExportFormat::markdown("architecture"),
            },
            SlotKind::RepositoryStructure => SlotSpec {
                kind: self,
                capability: "Repository structure analysis",
                invoker: prompts::repository_structure_prompt,
                upstream: &[],
                export: ExportFormat::markdown("repository_structure"),
            },
            SlotKind::TypescriptCdk => SlotSpec {
                kind: self,
                capability: "TypeScript CDK generation",
                invoker: prompts::typescript_cdk_prompt,
                upstream: &[SlotKind::SimilarProjects, SlotKind::RepositoryStructure],
                export: ExportFormat::plain_text("cdk", "ts"),
            },
            SlotKind::PythonCdk => SlotSpec {
                kind: self,
                capability: "Python CDK generation",
                invoker: prompts::python_cdk_prompt,
                upstream: &[SlotKind::SimilarProjects, SlotKind::RepositoryStructure],
                export: ExportFormat::plain_text("cdk", "py"),
            },
            SlotKind::Cost => SlotSpec {
                kind: self,
                capability: "Cost analysis",
                invoker: prompts::cost_prompt,
                upstream: &[],
                export: ExportFormat::markdown("costs"),
            },
            SlotKind::Documentation => SlotSpec {
                kind: self,
                capability: "Documentation generation",
                invoker: prompts::documentation_prompt,
                upstream: &[SlotKind::SimilarProjects],
                export: ExportFormat::markdown("docs"),
            },
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SlotKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SessionError::UnknownSlot(s.to_string()))
    }
}

/// How a slot's result is offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Filename suffix after `{project_name}_`.
    pub suffix: &'static str,
    /// File extension without the dot.
    pub extension: &'static str,
    pub media_type: &'static str,
}

impl ExportFormat {
    const fn markdown(suffix: &'static str) -> Self {
        Self {
            suffix,
            extension: "md",
            media_type: MEDIA_MARKDOWN,
        }
    }

    const fn plain_text(suffix: &'static str, extension: &'static str) -> Self {
        Self {
            suffix,
            extension,
            media_type: MEDIA_PLAIN_TEXT,
        }
    }

    /// `{project_name}_{suffix}.{extension}`
    pub fn filename(&self, project_name: &str) -> String {
        format!("{}_{}.{}", project_name, self.suffix, self.extension)
    }
}

/// Registry entry for one slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub kind: SlotKind,
    /// Human-readable capability, used in failure messages.
    pub capability: &'static str,
    pub invoker: PromptInvoker,
    /// Slots whose results are read as optional context.
    pub upstream: &'static [SlotKind],
    pub export: ExportFormat,
}

impl SlotSpec {
    /// Displayable result for a failed agent call.
    pub fn failure_message(&self, message: &str) -> String {
        format!("{} failed: {}", self.capability, message)
    }
}

/// Look up a slot by name.
///
/// # Errors
///
/// Returns [`SessionError::UnknownSlot`] for any name outside the fixed set.
pub fn slot_spec(name: &str) -> Result<SlotSpec, SessionError> {
    name.parse::<SlotKind>().map(SlotKind::spec)
}
