//! Free-form chat loop with one-shot complete analyses.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{info, warn};

use super::commands::DEFAULT_PROJECT_NAME;
use crate::agent::Agent;
use crate::error::AgentError;
use crate::export::save_project_analysis;
use crate::prompts::build_complete_analysis_prompt;

const ANALYZE_PREFIX: &str = "analyze:";
const PROJECT_PREFIX: &str = "project:";

/// One classified chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    /// `analyze: <requirements>`; the project name is asked next.
    Analyze(String),
    /// `project: <name>`; the requirements are asked next.
    Project(String),
    Question(String),
    Empty,
}

impl ChatInput {
    pub fn classify(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Empty;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            return ChatInput::Exit;
        }
        if let Some(rest) = line.strip_prefix(ANALYZE_PREFIX) {
            return ChatInput::Analyze(rest.trim().to_string());
        }
        if let Some(rest) = line.strip_prefix(PROJECT_PREFIX) {
            return ChatInput::Project(rest.trim().to_string());
        }
        ChatInput::Question(line.to_string())
    }
}

/// Run a complete analysis of a requirements document.
pub async fn run_complete_analysis(
    agent: &dyn Agent,
    requirements: &str,
) -> Result<String, AgentError> {
    agent
        .invoke(&build_complete_analysis_prompt(requirements))
        .await
}

pub struct Chat {
    agent: Arc<dyn Agent>,
    projects_dir: PathBuf,
}

impl Chat {
    pub fn new(agent: Arc<dyn Agent>, projects_dir: PathBuf) -> Self {
        Self {
            agent,
            projects_dir,
        }
    }

    /// Read lines until an exit word or end of input.
    pub async fn run<R>(&mut self, reader: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = prompt_line(&mut lines, "\n> ").await? {
            match ChatInput::classify(&line) {
                ChatInput::Exit => break,
                ChatInput::Empty => {}
                ChatInput::Analyze(requirements) if requirements.is_empty() => {
                    println!("Please provide requirements after '{}'", ANALYZE_PREFIX);
                }
                ChatInput::Analyze(requirements) => {
                    let name = prompt_line(&mut lines, "Project name: ")
                        .await?
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
                    self.analyze(&name, &requirements).await;
                }
                ChatInput::Project(name) if name.is_empty() => {
                    println!("Please provide a project name after '{}'", PROJECT_PREFIX);
                }
                ChatInput::Project(name) => {
                    let prompt = format!("Paste requirements for {}:\n", name);
                    let requirements = prompt_line(&mut lines, &prompt).await?.unwrap_or_default();
                    if requirements.trim().is_empty() {
                        println!("No requirements given, nothing to analyze.");
                    } else {
                        self.analyze(&name, &requirements).await;
                    }
                }
                ChatInput::Question(question) => match self.agent.invoke(&question).await {
                    Ok(answer) => println!("\n{}", answer),
                    Err(e) => println!("\nAgent error: {}", e),
                },
            }
        }
        Ok(())
    }

    /// Analyze, print and save. Failures are reported and the loop goes on.
    async fn analyze(&self, project_name: &str, requirements: &str) {
        info!(project = %project_name, "Analyzing project requirements");
        let analysis = match run_complete_analysis(self.agent.as_ref(), requirements).await {
            Ok(analysis) => analysis,
            Err(e) => {
                println!("\nAnalysis failed: {}", e);
                return;
            }
        };

        println!("\nANALYSIS FOR {}:\n{}", project_name.to_uppercase(), analysis);

        match save_project_analysis(&self.projects_dir, project_name, &analysis).await {
            Ok(path) => println!("\n✓ Analysis saved to {}", path.display()),
            Err(e) => {
                warn!(project = %project_name, error = %e, "Failed to save analysis");
                println!("\nCould not save analysis: {}", e);
            }
        }
    }
}

async fn prompt_line<R>(lines: &mut Lines<R>, prompt: &str) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::COMPLETE_ANALYSIS_FILE;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records prompts and answers with a fixed text.
    #[derive(Default)]
    struct RecordingAgent {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        async fn invoke(&self, prompt: &str) -> Result<String, AgentError> {
            self.prompts
                .lock()
                .expect("lock not poisoned")
                .push(prompt.to_string());
            Ok("# Complete analysis".to_string())
        }
    }

    #[test]
    fn test_classify_lines() {
        assert_eq!(ChatInput::classify("BYE"), ChatInput::Exit);
        assert_eq!(ChatInput::classify("  quit "), ChatInput::Exit);
        assert_eq!(
            ChatInput::classify("analyze:  Build a PDF uploader"),
            ChatInput::Analyze("Build a PDF uploader".to_string())
        );
        assert_eq!(
            ChatInput::classify("project: acme"),
            ChatInput::Project("acme".to_string())
        );
        assert_eq!(
            ChatInput::classify("What is Lambda?"),
            ChatInput::Question("What is Lambda?".to_string())
        );
        // Prefixes are case-sensitive.
        assert_eq!(
            ChatInput::classify("Analyze: x"),
            ChatInput::Question("Analyze: x".to_string())
        );
        assert_eq!(ChatInput::classify(""), ChatInput::Empty);
    }

    #[tokio::test]
    async fn test_analyze_defaults_project_name_and_saves() {
        let temp = TempDir::new().expect("temp dir");
        let agent = Arc::new(RecordingAgent::default());
        let mut chat = Chat::new(agent.clone(), temp.path().to_path_buf());

        chat.run("analyze: Build a PDF uploader\n\nexit\n".as_bytes())
            .await
            .expect("chat runs");

        let saved = temp.path().join("new-project").join(COMPLETE_ANALYSIS_FILE);
        assert_eq!(
            std::fs::read_to_string(saved).expect("saved"),
            "# Complete analysis"
        );
        let prompts = agent.prompts.lock().expect("lock not poisoned");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Build a PDF uploader"));
    }

    #[tokio::test]
    async fn test_project_command_reads_requirements() {
        let temp = TempDir::new().expect("temp dir");
        let agent = Arc::new(RecordingAgent::default());
        let mut chat = Chat::new(agent.clone(), temp.path().to_path_buf());

        chat.run("project: acme\nA chatbot for advisors\nWhat is S3?\n".as_bytes())
            .await
            .expect("chat runs");

        assert!(temp.path().join("acme").join(COMPLETE_ANALYSIS_FILE).exists());
        let prompts = agent.prompts.lock().expect("lock not poisoned");
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1], "What is S3?");
    }

    #[tokio::test]
    async fn test_empty_analyze_does_not_call_agent() {
        let temp = TempDir::new().expect("temp dir");
        let agent = Arc::new(RecordingAgent::default());
        let mut chat = Chat::new(agent.clone(), temp.path().to_path_buf());

        chat.run("analyze:\nbye\n".as_bytes()).await.expect("chat runs");
        assert!(agent.prompts.lock().expect("lock not poisoned").is_empty());
    }
}
