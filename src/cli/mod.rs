//! Command-line interface for cdp-console.
//!
//! Provides the interactive slot console, one-shot analysis and chat commands.

mod chat;
mod commands;
mod console;

pub use chat::{run_complete_analysis, Chat, ChatInput};
pub use commands::{
    apply_overrides, load_config, parse_cli, run, run_with_cli, AgentArgs, Cli, Commands, DEFAULT_PROJECT_NAME,
};
pub use console::{Console, ConsoleCommand};
