//! CLI command definitions for cdp-console.
//!
//! Three entry points share one agent configuration: the interactive slot
//! console, a one-shot complete analysis, and a free-form chat loop.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{info, warn};

use super::chat::{run_complete_analysis, Chat};
use super::console::Console;
use crate::agent::{Agent, LazyAgent};
use crate::config::ConsoleConfig;
use crate::export::save_project_analysis;
use crate::session::Session;

/// Project name used when none is given.
pub const DEFAULT_PROJECT_NAME: &str = "new-project";

/// Project analysis console: requirements in, architecture, CDK code, costs and docs out.
#[derive(Parser)]
#[command(name = "cdp-console")]
#[command(about = "Analyze project requirements with an LLM agent, one slot at a time")]
#[command(version)]
#[command(
    long_about = "cdp-console turns a project requirements document into similar-project research, requirements analysis, an architecture with a draw.io diagram, repository structure, TypeScript and Python CDK code, a cost analysis and documentation.\n\nExample usage:\n  cdp-console console --project acme --requirements ./two-pager.md\n  cdp-console analyze --project acme --requirements ./two-pager.md"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Interactive session: trigger, inspect and export analysis slots.
    #[command(alias = "ui")]
    Console(ConsoleArgs),

    /// Run one complete analysis and save it under the projects directory.
    Analyze(AnalyzeArgs),

    /// Chat with the agent (`analyze:`, `project:` or free questions).
    Chat(ChatArgs),
}

/// Agent and endpoint options shared by every subcommand.
///
/// Unset options fall back to the environment (see [`ConsoleConfig::from_env`]).
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AgentArgs {
    /// OpenAI-compatible API base URL.
    #[arg(long)]
    pub api_base: Option<String>,

    /// API key (can also be set via LITELLM_API_KEY or OPENROUTER_API_KEY env var).
    #[arg(long, env = "LITELLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// LLM model to use.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0-2.0).
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Completion token limit.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// GitHub organization searched for similar projects.
    #[arg(long)]
    pub reference_org: Option<String>,

    /// Do not start any tool connector.
    #[arg(long)]
    pub no_connectors: bool,

    /// YAML file listing the MCP servers to start.
    #[arg(long)]
    pub connectors_file: Option<PathBuf>,

    /// Connector handshake and tool call timeout in seconds.
    #[arg(long)]
    pub connector_timeout: Option<u64>,

    /// Tool calls allowed per agent invocation.
    #[arg(long)]
    pub max_tool_steps: Option<usize>,
}

/// Arguments for `cdp-console console`.
#[derive(Parser, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub agent: AgentArgs,

    /// Initialize the session with this project name.
    #[arg(short = 'p', long, requires = "requirements")]
    pub project: Option<String>,

    /// Requirements document used with --project.
    #[arg(short = 'r', long)]
    pub requirements: Option<PathBuf>,

    /// Directory for `export` when none is given.
    #[arg(short = 'o', long, default_value = ".")]
    pub export_dir: PathBuf,
}

/// Arguments for `cdp-console analyze`.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub agent: AgentArgs,

    /// Project name; the analysis lands in <projects-dir>/<project>/.
    #[arg(short = 'p', long, default_value = DEFAULT_PROJECT_NAME)]
    pub project: String,

    /// Requirements document, or "-" for stdin.
    #[arg(short = 'r', long)]
    pub requirements: PathBuf,

    /// Root directory for saved analyses.
    #[arg(long, env = "CDP_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Print the analysis without saving it.
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for `cdp-console chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub agent: AgentArgs,

    /// Root directory for saved analyses.
    #[arg(long, env = "CDP_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Console(args) => run_console_command(args).await,
        Commands::Analyze(args) => run_analyze_command(args).await,
        Commands::Chat(args) => run_chat_command(args).await,
    }
}

/// Environment configuration with CLI overrides applied.
pub fn load_config(args: &AgentArgs) -> anyhow::Result<ConsoleConfig> {
    apply_overrides(ConsoleConfig::from_env()?, args)
}

/// Apply the CLI flags that were set on top of `config`.
pub fn apply_overrides(
    mut config: ConsoleConfig,
    args: &AgentArgs,
) -> anyhow::Result<ConsoleConfig> {

    if let Some(api_base) = &args.api_base {
        config = config.with_api_base(api_base.clone());
    }
    if let Some(api_key) = args.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        config = config.with_api_key(api_key.clone());
    }
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(org) = &args.reference_org {
        config = config.with_reference_org(org.clone());
    }
    if args.no_connectors {
        config = config.with_connectors_enabled(false);
    }
    if let Some(path) = &args.connectors_file {
        config = config.with_connector_file(path.clone());
    }
    if let Some(secs) = args.connector_timeout {
        config = config.with_connector_timeout(Duration::from_secs(secs));
    }
    if let Some(steps) = args.max_tool_steps {
        config = config.with_max_tool_steps(steps);
    }

    config.validate()?;
    Ok(config)
}

async fn read_requirements(path: &Path) -> anyhow::Result<String> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?
    };

    if text.trim().is_empty() {
        anyhow::bail!("Requirements document is empty");
    }
    Ok(text)
}

// ============================================================================
// Console Command Implementation
// ============================================================================

async fn run_console_command(args: ConsoleArgs) -> anyhow::Result<()> {
    let config = load_config(&args.agent)?;
    let lazy = Arc::new(config.build_agent()?);
    let agent: Arc<dyn Agent> = lazy.clone();

    let session = Session::new().with_reference_org(config.reference_org.clone());
    if let (Some(project), Some(path)) = (&args.project, &args.requirements) {
        let requirements = read_requirements(path).await?;
        session.initialize(project, &requirements)?;
        info!(project = %project, "Session initialized");
    }

    println!("cdp-console: model {}", config.model);
    println!("Type 'help' for commands.");

    let mut console = Console::new(session, agent, args.export_dir);
    let stdin = BufReader::new(tokio::io::stdin());
    let result = console.run(stdin).await;

    console.abort_jobs().await;
    lazy.shutdown().await;
    result
}

// ============================================================================
// Analyze Command Implementation
// ============================================================================

async fn run_analyze_command(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.agent)?;
    if let Some(dir) = &args.projects_dir {
        config = config.with_projects_dir(dir.clone());
    }

    let requirements = read_requirements(&args.requirements).await?;
    let agent = config.build_agent()?;

    info!(project = %args.project, model = %config.model, "Analyzing project requirements");
    let result = run_complete_analysis(&agent, &requirements).await;
    agent.shutdown().await;
    let analysis = result?;

    println!("{}", analysis);

    if args.no_save {
        return Ok(());
    }
    match save_project_analysis(&config.projects_dir, &args.project, &analysis).await {
        Ok(path) => {
            println!("\n✓ Analysis saved to {}", path.display());
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Failed to save analysis");
            Err(e.into())
        }
    }
}

// ============================================================================
// Chat Command Implementation
// ============================================================================

async fn run_chat_command(args: ChatArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.agent)?;
    if let Some(dir) = &args.projects_dir {
        config = config.with_projects_dir(dir.clone());
    }

    let lazy = Arc::new(config.build_agent()?);
    let agent = lazy.get().await;
    if agent.is_degraded() {
        println!("No tool connectors available, continuing with the model alone.");
    } else {
        println!(
            "Connected: {} ({} tools)",
            agent.connector_names().join(", "),
            agent.tool_count()
        );
    }

    println!("Commands:");
    println!("- 'analyze: <requirements>'");
    println!("- 'project: <project-name>'");
    println!("- Any other line is a question for the agent");
    println!("- 'exit' to quit");

    let mut chat = Chat::new(lazy.clone(), config.projects_dir.clone());
    let result = chat.run(BufReader::new(tokio::io::stdin())).await;

    lazy.shutdown().await;
    println!("Goodbye.");
    result
}
