//! Per-user analysis session.
//!
//! A [`Session`] owns one project context and eight result slots. Slots are
//! triggered independently, run through an [`Agent`](crate::agent::Agent)
//! and rendered as idle, in progress or completed.
//!
//! ```ignore
//! let session = Session::new();
//! session.initialize("acme", requirements)?;
//! session.trigger_and_run(SlotKind::Requirements, &agent).await?;
//! let export = session.export(SlotKind::Requirements)?;
//! ```

mod coordinator;
mod slot;
mod state;
mod view;

pub use coordinator::{Session, TriggerOutcome};
pub use slot::{
    slot_spec, ExportFormat, PromptInvoker, SlotKind, SlotSpec, MEDIA_MARKDOWN, MEDIA_PLAIN_TEXT,
    SLOT_COUNT,
};
pub(crate) use state::is_path_component;
pub use state::{ProjectContext, SlotStatus};
pub use view::{
    render_result, split_diagram, Export, RenderedResult, SessionSummary, SlotSummary, SlotView,
};
