//! End-to-end session flows against scripted agents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use cdp_console::agent::Agent;
use cdp_console::error::{AgentError, SessionError};
use cdp_console::export::write_export;
use cdp_console::session::{
    render_result, RenderedResult, Session, SlotKind, SlotView, TriggerOutcome,
};

/// Answers per slot, keyed by a marker found in the prompt.
struct ScriptedAgent {
    answers: HashMap<&'static str, Result<&'static str, &'static str>>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn new(answers: &[(&'static str, Result<&'static str, &'static str>)]) -> Self {
        Self {
            answers: answers.iter().cloned().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .iter()
            .find(|(marker, _)| prompt.contains(*marker))
            .map(|(_, answer)| *answer)
            .unwrap_or(Ok("generic answer"));
        answer
            .map(str::to_string)
            .map_err(|msg| AgentError::InvocationFailed(msg.to_string()))
    }
}

/// Blocks every call until released.
struct GatedAgent {
    gate: Notify,
    entered: Notify,
}

#[async_trait]
impl Agent for GatedAgent {
    async fn invoke(&self, _prompt: &str) -> Result<String, AgentError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok("late result".to_string())
    }
}

fn acme_session() -> Session {
    let session = Session::new();
    session
        .initialize("acme", "Build a PDF question-answering app")
        .expect("valid input");
    session
}

#[tokio::test]
async fn test_acme_requirements_export() {
    let session = acme_session();
    let agent = ScriptedAgent::new(&[("Build a PDF", Ok("- Req A\n- Req B"))]);

    assert_eq!(
        session.trigger(SlotKind::Requirements),
        Ok(TriggerOutcome::Started)
    );
    assert_eq!(
        session.render_view(SlotKind::Requirements),
        SlotView::InProgress
    );

    session
        .run_pending(SlotKind::Requirements, &agent)
        .await
        .expect("queued");

    let export = session.export(SlotKind::Requirements).expect("has result");
    assert_eq!(export.filename, "acme_requirements.md");
    assert_eq!(export.content, "- Req A\n- Req B");
    assert_eq!(export.media_type, "text/markdown");
}

#[tokio::test]
async fn test_trigger_before_initialize_changes_nothing() {
    let session = Session::new();
    for slot in SlotKind::ALL {
        assert_eq!(session.trigger(slot), Err(SessionError::NotInitialized));
    }
    for slot in SlotKind::ALL {
        assert_eq!(session.render_view(slot), SlotView::Idle);
    }
}

#[tokio::test]
async fn test_architecture_splits_but_exports_whole() {
    const ARCHITECTURE: &str = "## Architecture\nAPI Gateway, Lambda, S3.\n<?xml version=\"1.0\"?>\n<mxfile><diagram name=\"p\"/></mxfile>";
    let session = acme_session();
    let agent = ScriptedAgent::new(&[("draw.io", Ok(ARCHITECTURE))]);

    session
        .trigger_and_run(SlotKind::Architecture, &agent)
        .await
        .expect("initialized");

    let SlotView::Completed(text) = session.render_view(SlotKind::Architecture) else {
        panic!("architecture should be completed");
    };
    match render_result(SlotKind::Architecture, &text) {
        RenderedResult::WithDiagram { prose, diagram_xml } => {
            assert!(!prose.trim().is_empty());
            assert!(diagram_xml.starts_with("<?xml"));
            assert!(diagram_xml.ends_with("</mxfile>"));
        }
        other => panic!("expected a diagram, got {other:?}"),
    }

    let export = session.export(SlotKind::Architecture).expect("has result");
    assert_eq!(export.content, ARCHITECTURE);
    assert_eq!(export.filename, "acme_architecture.md");
}

#[tokio::test]
async fn test_failed_cost_call_is_displayed_as_result() {
    let session = acme_session();
    let agent = ScriptedAgent::new(&[("cost", Err("timeout"))]);

    let result = session
        .trigger_and_run(SlotKind::Cost, &agent)
        .await
        .expect("initialized");

    assert_eq!(result.as_deref(), Some("Cost analysis failed: timeout"));
    assert_eq!(
        session.render_view(SlotKind::Cost),
        SlotView::Completed("Cost analysis failed: timeout".to_string())
    );
    assert!(!session.is_pending(SlotKind::Cost));
}

#[tokio::test]
async fn test_retrigger_is_noop_until_clear() {
    let session = acme_session();
    let agent = ScriptedAgent::new(&[]);

    session
        .trigger_and_run(SlotKind::Documentation, &agent)
        .await
        .expect("initialized");
    assert_eq!(
        session.trigger(SlotKind::Documentation),
        Ok(TriggerOutcome::AlreadyCompleted)
    );
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);

    session.clear_all();
    assert!(!session.is_initialized());
    for slot in SlotKind::ALL {
        assert_eq!(session.render_view(slot), SlotView::Idle);
    }
    assert_eq!(
        session.export(SlotKind::Documentation),
        Err(SessionError::NoResult(SlotKind::Documentation))
    );
}

#[tokio::test]
async fn test_slots_progress_independently() {
    let session = acme_session();
    let gated = Arc::new(GatedAgent {
        gate: Notify::new(),
        entered: Notify::new(),
    });

    session.trigger(SlotKind::TypescriptCdk).expect("initialized");
    let job = {
        let session = session.clone();
        let agent = Arc::clone(&gated);
        tokio::spawn(async move {
            session
                .run_pending(SlotKind::TypescriptCdk, agent.as_ref())
                .await
        })
    };
    gated.entered.notified().await;

    // Another slot completes while the first is still in flight.
    let quick = ScriptedAgent::new(&[]);
    session
        .trigger_and_run(SlotKind::Requirements, &quick)
        .await
        .expect("initialized");
    assert!(session.has_result(SlotKind::Requirements));
    assert_eq!(
        session.render_view(SlotKind::TypescriptCdk),
        SlotView::InProgress
    );
    assert_eq!(
        session.trigger(SlotKind::TypescriptCdk),
        Ok(TriggerOutcome::AlreadyPending)
    );

    let summary = session.summary();
    assert_eq!(summary.in_progress().collect::<Vec<_>>(), [SlotKind::TypescriptCdk]);
    assert_eq!(summary.completed().collect::<Vec<_>>(), [SlotKind::Requirements]);

    gated.gate.notify_one();
    let result = job.await.expect("job not panicked").expect("queued");
    assert_eq!(result, "late result");
    assert_eq!(
        session.render_view(SlotKind::TypescriptCdk),
        SlotView::Completed("late result".to_string())
    );
}

#[tokio::test]
async fn test_clear_during_run_discards_late_result() {
    let session = acme_session();
    let gated = Arc::new(GatedAgent {
        gate: Notify::new(),
        entered: Notify::new(),
    });

    session.trigger(SlotKind::PythonCdk).expect("initialized");
    let job = {
        let session = session.clone();
        let agent = Arc::clone(&gated);
        tokio::spawn(async move { session.run_pending(SlotKind::PythonCdk, agent.as_ref()).await })
    };
    gated.entered.notified().await;

    session.clear_all();
    session.initialize("acme-2", "new requirements").expect("valid input");

    gated.gate.notify_one();
    job.await.expect("job not panicked").expect("was queued");

    assert_eq!(session.render_view(SlotKind::PythonCdk), SlotView::Idle);
    assert!(!session.has_result(SlotKind::PythonCdk));
}

#[tokio::test]
async fn test_upstream_hint_and_context() {
    let session = acme_session();
    assert_eq!(
        session.missing_upstream(SlotKind::PythonCdk),
        [SlotKind::SimilarProjects, SlotKind::RepositoryStructure]
    );

    let agent = ScriptedAgent::new(&[("GitHub", Ok("acme-like repos"))]);
    session
        .trigger_and_run(SlotKind::SimilarProjects, &agent)
        .await
        .expect("initialized");
    assert_eq!(
        session.missing_upstream(SlotKind::PythonCdk),
        [SlotKind::RepositoryStructure]
    );
}

#[tokio::test]
async fn test_export_written_byte_for_byte() {
    let temp = tempfile::TempDir::new().expect("temp dir");
    let session = acme_session();
    let code = "import * as cdk from 'aws-cdk-lib';\n\nexport class AcmeStack extends cdk.Stack {}\n";
    let agent = ScriptedAgent::new(&[("TypeScript", Ok(code))]);

    session
        .trigger_and_run(SlotKind::TypescriptCdk, &agent)
        .await
        .expect("initialized");
    let export = session.export(SlotKind::TypescriptCdk).expect("has result");
    let path = write_export(temp.path(), &export).await.expect("written");

    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("acme_cdk.ts"));
    assert_eq!(std::fs::read(&path).expect("readable"), code.as_bytes());
}
