//! Interactive slot console.
//!
//! Each `run <slot>` triggers the slot and spawns its job in the background,
//! so `status` and `show` keep working while the agent is busy.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::export::export_slot;
use crate::session::{render_result, RenderedResult, Session, SlotKind, SlotView, TriggerOutcome};

/// Line that ends a pasted requirements document.
const END_OF_TEXT: &str = ".";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Set the project; requirements come from a file or the following lines.
    Init {
        project_name: String,
        requirements_file: Option<PathBuf>,
    },
    Run(SlotKind),
    Show(SlotKind),
    Export {
        slot: SlotKind,
        dir: Option<PathBuf>,
    },
    Status,
    Slots,
    /// Block until every background job has finished.
    Wait,
    Clear,
    Help,
    Quit,
    Empty,
}

impl ConsoleCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(ConsoleCommand::Empty);
        };
        let args: Vec<&str> = words.collect();

        let slot_arg = |usage: &str| -> anyhow::Result<SlotKind> {
            let name = args
                .first()
                .ok_or_else(|| anyhow::anyhow!("usage: {}", usage))?;
            Ok(name.parse::<SlotKind>()?)
        };

        let parsed = match command.to_lowercase().as_str() {
            "init" => {
                let project_name = args
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("usage: init <project-name> [requirements-file]"))?;
                ConsoleCommand::Init {
                    project_name: project_name.to_string(),
                    requirements_file: args.get(1).map(PathBuf::from),
                }
            }
            "run" => ConsoleCommand::Run(slot_arg("run <slot>")?),
            "show" => ConsoleCommand::Show(slot_arg("show <slot>")?),
            "export" => ConsoleCommand::Export {
                slot: slot_arg("export <slot> [dir]")?,
                dir: args.get(1).map(PathBuf::from),
            },
            "status" => ConsoleCommand::Status,
            "slots" => ConsoleCommand::Slots,
            "wait" => ConsoleCommand::Wait,
            "clear" => ConsoleCommand::Clear,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => anyhow::bail!("Unknown command '{}'. Type 'help' for commands.", other),
        };
        Ok(parsed)
    }
}

/// The console loop and its background jobs.
pub struct Console {
    session: Session,
    agent: Arc<dyn Agent>,
    export_dir: PathBuf,
    jobs: JoinSet<()>,
}

impl Console {
    pub fn new(session: Session, agent: Arc<dyn Agent>, export_dir: PathBuf) -> Self {
        Self {
            session,
            agent,
            export_dir,
            jobs: JoinSet::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read commands until `quit` or end of input.
    pub async fn run<R>(&mut self, reader: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let command = match ConsoleCommand::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            if command == ConsoleCommand::Quit {
                break;
            }
            if let Err(e) = self.execute(command, &mut lines).await {
                println!("Error: {}", e);
            }
        }
        Ok(())
    }

    /// Execute one command. `lines` supplies pasted requirements for `init`.
    pub async fn execute<R>(
        &mut self,
        command: ConsoleCommand,
        lines: &mut Lines<R>,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        match command {
            ConsoleCommand::Init {
                project_name,
                requirements_file,
            } => {
                let requirements = match requirements_file {
                    Some(path) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                        anyhow::anyhow!("Failed to read {}: {}", path.display(), e)
                    })?,
                    None => {
                        println!("Paste the requirements, then a line with a single '{END_OF_TEXT}':");
                        read_until_terminator(lines).await?
                    }
                };
                self.session.initialize(&project_name, &requirements)?;
                println!("✓ Project '{}' initialized", project_name.trim());
            }
            ConsoleCommand::Run(slot) => self.start(slot)?,
            ConsoleCommand::Show(slot) => self.show(slot),
            ConsoleCommand::Export { slot, dir } => {
                let dir = dir.unwrap_or_else(|| self.export_dir.clone());
                let path = export_slot(&self.session, slot, &dir).await?;
                println!("✓ {} written to {}", slot, path.display());
            }
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Slots => {
                for slot in SlotKind::ALL {
                    println!("  {:<22} {}", slot.name(), slot.spec().capability);
                }
            }
            ConsoleCommand::Wait => self.wait().await,
            ConsoleCommand::Clear => {
                self.session.clear_all();
                println!("✓ Session cleared");
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Quit | ConsoleCommand::Empty => {}
        }
        Ok(())
    }

    /// Trigger `slot` and spawn its job if one was started.
    pub fn start(&mut self, slot: SlotKind) -> anyhow::Result<()> {
        let missing = self.session.missing_upstream(slot);

        match self.session.trigger(slot)? {
            TriggerOutcome::Started => {
                if !missing.is_empty() {
                    let names: Vec<&str> = missing.iter().map(|s| s.name()).collect();
                    println!(
                        "Hint: run {} first for better results.",
                        names.join(" and ")
                    );
                }

                let session = self.session.clone();
                let agent = Arc::clone(&self.agent);
                self.jobs.spawn(async move {
                    match session.run_pending(slot, agent.as_ref()).await {
                        Ok(_) => println!("\n✓ {} finished (show {})", slot.spec().capability, slot),
                        Err(e) => debug!(slot = %slot, error = %e, "Job not run"),
                    }
                });
                println!("Agent is working on {}...", slot);
            }
            TriggerOutcome::AlreadyPending => println!("{} is already in progress.", slot),
            TriggerOutcome::AlreadyCompleted => {
                println!("{} already has a result; use 'show {}' or 'clear'.", slot, slot)
            }
        }
        Ok(())
    }

    /// Wait for every spawned job.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.jobs.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Background job ended abnormally");
            }
        }
    }

    /// Abort jobs still running; their slots return to idle.
    pub async fn abort_jobs(&mut self) {
        if !self.jobs.is_empty() {
            println!("Stopping {} running job(s)", self.jobs.len());
        }
        self.jobs.abort_all();
        while self.jobs.join_next().await.is_some() {}
    }

    fn show(&self, slot: SlotKind) {
        match self.session.render_view(slot) {
            SlotView::Idle => println!("Nothing yet. Use 'run {}' to start.", slot),
            SlotView::InProgress => println!("Agent is still working on {}...", slot),
            SlotView::Completed(text) => match render_result(slot, &text) {
                RenderedResult::Text(text) => println!("{}", text),
                RenderedResult::WithDiagram { prose, diagram_xml } => {
                    println!("{}", prose);
                    println!("### Draw.io Architecture Diagram\n");
                    println!("{}", diagram_xml);
                    println!("\nPaste the XML above into draw.io to view the diagram.");
                }
            },
        }
    }

    fn print_status(&self) {
        let summary = self.session.summary();
        match &summary.project_name {
            Some(name) => println!("Project: {}", name),
            None => println!("Project: (not initialized, use 'init')"),
        }
        for line in &summary.slots {
            let state = match line.view {
                SlotView::Idle => "-".to_string(),
                SlotView::InProgress => "in progress".to_string(),
                SlotView::Completed(_) => match line.completed_at {
                    Some(at) => format!("done {}", at.format("%H:%M:%S")),
                    None => "done".to_string(),
                },
            };
            println!("  {:<22} {}", line.slot.name(), state);
        }
    }
}

async fn read_until_terminator<R>(lines: &mut Lines<R>) -> anyhow::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut text = String::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == END_OF_TEXT {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

fn print_help() {
    println!("Commands:");
    println!("  init <project> [file]   set the project (paste requirements if no file)");
    println!("  run <slot>              start a slot in the background");
    println!("  show <slot>             display a slot");
    println!("  export <slot> [dir]     write a slot's result to disk");
    println!("  status                  show all slots");
    println!("  slots                   list slot names");
    println!("  wait                    wait for running slots");
    println!("  clear                   reset the session");
    println!("  quit                    leave");
}
