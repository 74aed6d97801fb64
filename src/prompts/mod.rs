//! Prompt templates for the analysis slots and the chat front end.
//!
//! Templates are plain `&str` constants with `{placeholder}` markers that the
//! builder functions fill in. Each slot has exactly one builder; the slot
//! registry stores it as the slot's invoker.
//!
//! - [`slots`] - one template per analysis slot
//! - [`analysis`] - the agent system prompt, tool-use prompts and the
//!   complete-analysis prompt

pub mod analysis;
pub mod slots;

pub use analysis::{
    build_complete_analysis_prompt, build_tool_use_prompt, AGENT_SYSTEM_PROMPT,
    FINAL_ANSWER_PROMPT, TOOL_USE_ACK,
};
pub use slots::{
    architecture_prompt, cost_prompt, documentation_prompt, python_cdk_prompt,
    repository_structure_prompt, requirements_prompt, similar_projects_prompt,
    typescript_cdk_prompt,
};

/// Default GitHub organization searched for reference projects.
pub const DEFAULT_REFERENCE_ORG: &str = "ASUCICREPO";

/// Everything a slot prompt may read.
///
/// Upstream results that have not been produced yet are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInputs {
    pub project_name: String,
    pub requirements_text: String,
    /// GitHub organization holding the reference projects.
    pub reference_org: String,
    pub similar_projects: String,
    pub repository_structure: String,
}

impl PromptInputs {
    /// Inputs with no upstream context and the default reference org.
    pub fn new(project_name: impl Into<String>, requirements_text: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            requirements_text: requirements_text.into(),
            reference_org: DEFAULT_REFERENCE_ORG.to_string(),
            similar_projects: String::new(),
            repository_structure: String::new(),
        }
    }

    pub fn with_reference_org(mut self, org: impl Into<String>) -> Self {
        self.reference_org = org.into();
        self
    }

    pub fn with_similar_projects(mut self, text: impl Into<String>) -> Self {
        self.similar_projects = text.into();
        self
    }

    pub fn with_repository_structure(mut self, text: impl Into<String>) -> Self {
        self.repository_structure = text.into();
        self
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "project_name" => Some(&self.project_name),
            "requirements" => Some(&self.requirements_text),
            "reference_org" => Some(&self.reference_org),
            "similar_projects" => Some(&self.similar_projects),
            "repository_structure" => Some(&self.repository_structure),
            _ => None,
        }
    }

    /// Substitute placeholders in a single pass.
    ///
    /// Substituted values are never rescanned, so user text containing
    /// `{project_name}` and the like is passed through verbatim. Unknown
    /// `{...}` sequences (code samples in templates) are left alone.
    pub(crate) fn fill(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.requirements_text.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}').and_then(|close| {
                self.lookup(&after[..close])
                    .map(|value| (close, value))
            }) {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}
