//! cdp-console: project analysis console driven by an LLM agent.
//!
//! A requirements document goes in; eight independently triggered analysis
//! slots come out (similar projects, requirements, architecture with a
//! draw.io diagram, repository structure, TypeScript and Python CDK code,
//! cost analysis and documentation). Each slot's result can be displayed
//! and exported.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod llm;
pub mod prompts;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigError, ConsoleConfig};
pub use error::{AgentError, ExportError, LlmError, SessionError};
pub use session::{Export, Session, SlotKind, SlotView};
