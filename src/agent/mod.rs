//! The external agent collaborator.
//!
//! The session core only sees the [`Agent`] trait: one prompt in, one text
//! response out, or an [`AgentError`]. [`LlmAgent`] implements it on top of
//! an [`LlmProvider`], running a tool loop over the connected MCP servers:
//! the model may answer with a JSON tool call, the call is executed and its
//! output fed back, until the model answers in prose or the step limit is
//! reached. [`LazyAgent`] builds one on first use, starting the tool
//! connectors exactly once per process and sharing the result with every
//! session.
//!
//! ```ignore
//! use cdp_console::agent::{Agent, LazyAgent, AgentSettings};
//!
//! let agent = LazyAgent::new(provider, AgentSettings::default(), connectors);
//! let answer = agent.invoke("Summarize these requirements").await?;
//! ```

pub mod connectors;
pub mod tools;

pub use connectors::{
    connect_all, default_connector_specs, load_connector_specs, parse_connector_specs,
    Connection, ConnectorError, ConnectorSet, ConnectorSpec, McpServerConnector, ToolConnector,
    ToolHandle, ToolSpec,
};
pub use tools::{JsonToolCallParser, ToolCall, ToolCallParser};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts::{build_tool_use_prompt, AGENT_SYSTEM_PROMPT, FINAL_ANSWER_PROMPT, TOOL_USE_ACK};

/// Default number of tool calls per invocation.
pub const DEFAULT_MAX_TOOL_STEPS: usize = 10;

/// Opaque analysis agent: one prompt in, one text response out.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Generation settings for [`LlmAgent`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model identifier; empty uses the provider's default.
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Tool calls allowed before a final answer is demanded.
    pub max_tool_steps: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: AGENT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }
}

impl AgentSettings {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature (clamped to 0.0-2.0).
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_tool_steps(mut self, max_tool_steps: usize) -> Self {
        self.max_tool_steps = max_tool_steps;
        self
    }
}

/// Agent backed by an LLM provider.
pub struct LlmAgent {
    provider: Arc<dyn LlmProvider>,
    settings: AgentSettings,
    connectors: ConnectorSet,
    parser: Box<dyn ToolCallParser>,
}

impl LlmAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: AgentSettings,
        connectors: ConnectorSet,
    ) -> Self {
        Self {
            provider,
            settings,
            connectors,
            parser: Box::new(JsonToolCallParser),
        }
    }

    /// Names of the tool connectors that started.
    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors
            .connections()
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn tool_count(&self) -> usize {
        self.connectors.tool_count()
    }

    /// True when no tool connector is available.
    pub fn is_degraded(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Stop the connector processes.
    pub async fn shutdown(&self) {
        self.connectors.shutdown().await;
    }

    async fn generate(&self, conversation: &[Message]) -> Result<String, AgentError> {
        let mut request =
            GenerationRequest::new(self.settings.model.clone(), conversation.to_vec());
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.provider.generate(request).await?;
        debug!(
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Agent call completed"
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or(AgentError::EmptyResponse)
    }

    /// JSON description of every advertised tool.
    fn tool_catalogue(&self) -> String {
        let tools: Vec<Value> = self
            .connectors
            .tools()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_default()
    }

    /// Run one tool call and phrase its outcome for the model.
    async fn execute_tool(&self, call: ToolCall) -> String {
        match self.connectors.call_tool(&call.name, call.arguments).await {
            Ok(output) => format!("Tool '{}' succeeded:\n{}", call.name, output),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Tool '{}' error: {}", call.name, e)
            }
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError> {
        let mut conversation = vec![Message::system(self.settings.system_prompt.clone())];

        if self.connectors.tool_count() == 0 {
            conversation.push(Message::user(prompt));
            return self.generate(&conversation).await;
        }

        conversation.push(Message::user(build_tool_use_prompt(&self.tool_catalogue())));
        conversation.push(Message::assistant(TOOL_USE_ACK));
        conversation.push(Message::user(prompt));

        for step in 0..self.settings.max_tool_steps {
            let text = self.generate(&conversation).await?;
            let Some(call) = self.parser.parse(&text) else {
                return Ok(text);
            };

            debug!(step, tool = %call.name, "Agent requested tool");
            let observation = self.execute_tool(call).await;
            conversation.push(Message::assistant(text));
            conversation.push(Message::user(observation));
        }

        info!(
            steps = self.settings.max_tool_steps,
            "Tool step limit reached, requesting final answer"
        );
        conversation.push(Message::user(FINAL_ANSWER_PROMPT));
        self.generate(&conversation).await
    }
}

/// An [`LlmAgent`] constructed on first use and shared afterwards.
pub struct LazyAgent {
    provider: Arc<dyn LlmProvider>,
    settings: AgentSettings,
    connectors: Vec<Box<dyn ToolConnector>>,
    cell: OnceCell<Arc<LlmAgent>>,
}

impl LazyAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: AgentSettings,
        connectors: Vec<Box<dyn ToolConnector>>,
    ) -> Self {
        Self {
            provider,
            settings,
            connectors,
            cell: OnceCell::new(),
        }
    }

    /// The shared agent, starting the connectors on the first call.
    ///
    /// Connector failures never fail this call; the agent is built with
    /// whatever subset started.
    pub async fn get(&self) -> Arc<LlmAgent> {
        self.cell
            .get_or_init(|| async {
                let connectors = connect_all(&self.connectors).await;
                info!(
                    servers = connectors.len(),
                    tools = connectors.tool_count(),
                    "Agent ready"
                );
                Arc::new(LlmAgent::new(
                    Arc::clone(&self.provider),
                    self.settings.clone(),
                    connectors,
                ))
            })
            .await
            .clone()
    }

    /// Whether the agent has been constructed yet.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Stop connector processes, if the agent was ever built.
    pub async fn shutdown(&self) {
        if let Some(agent) = self.cell.get() {
            agent.shutdown().await;
        }
    }
}

#[async_trait]
impl Agent for LazyAgent {
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError> {
        self.get().await.invoke(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn response(content: Option<String>) -> GenerationResponse {
        let choices = match content {
            Some(content) => vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            None => Vec::new(),
        };
        GenerationResponse {
            id: "mock-id".to_string(),
            model: "mock-model".to_string(),
            choices,
            usage: Usage::default(),
        }
    }

    /// Records requests and replies with a fixed answer.
    struct MockLlmProvider {
        response: Option<String>,
        requests: StdMutex<Vec<GenerationRequest>>,
    }

    impl MockLlmProvider {
        fn new(response: Option<&str>) -> Self {
            Self {
                response: response.map(str::to_string),
                requests: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.requests.lock().expect("lock not poisoned").push(request);
            Ok(response(self.response.clone()))
        }
    }

    /// Replies from a queue, one answer per request.
    struct ScriptedProvider {
        replies: StdMutex<VecDeque<String>>,
        requests: StdMutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: StdMutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().expect("lock not poisoned").clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.requests.lock().expect("lock not poisoned").push(request);
            let reply = self.replies.lock().expect("lock not poisoned").pop_front();
            Ok(response(reply))
        }
    }

    /// A GitHub-like connector answering repository searches.
    struct RepoSearchHandle {
        calls: Arc<StdMutex<Vec<Value>>>,
    }

    #[async_trait]
    impl ToolHandle for RepoSearchHandle {
        async fn call_tool(
            &mut self,
            name: &str,
            arguments: Value,
        ) -> Result<String, ConnectorError> {
            assert_eq!(name, "search_repositories");
            self.calls.lock().expect("lock not poisoned").push(arguments);
            Ok("aws-samples/pdf-qa-bedrock (412 stars)".to_string())
        }
    }

    fn github_connectors(calls: &Arc<StdMutex<Vec<Value>>>) -> ConnectorSet {
        let mut tool = ToolSpec::new("search_repositories", "Search GitHub repositories");
        tool.input_schema = json!({"type": "object", "properties": {"query": {"type": "string"}}});
        ConnectorSet::from_connections(vec![Connection::new("GitHub", vec![tool])
            .with_handle(Box::new(RepoSearchHandle {
                calls: calls.clone(),
            }))])
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn generate(&self, _: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            Err(LlmError::RateLimited("slow down".to_string()))
        }
    }

    struct CountingConnector(Arc<AtomicUsize>);

    #[async_trait]
    impl ToolConnector for CountingConnector {
        fn name(&self) -> &str {
            "Counting"
        }

        async fn connect(&self) -> Result<Connection, ConnectorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Connection::new("Counting", vec![ToolSpec::new("tool", "")]))
        }
    }

    #[tokio::test]
    async fn test_llm_agent_sends_system_and_user_messages() {
        let provider = Arc::new(MockLlmProvider::new(Some("- Req A")));
        let settings = AgentSettings::default()
            .with_model("test-model")
            .with_temperature(5.0)
            .with_max_tokens(256);
        let agent = LlmAgent::new(provider.clone(), settings, ConnectorSet::empty());

        let answer = agent.invoke("Analyze").await.expect("mock succeeds");
        assert_eq!(answer, "- Req A");
        assert!(agent.is_degraded());

        let requests = provider.requests.lock().expect("lock not poisoned");
        let request = &requests[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.messages[0], Message::system(AGENT_SYSTEM_PROMPT));
        assert_eq!(request.messages[1], Message::user("Analyze"));
    }

    #[tokio::test]
    async fn test_llm_agent_without_choices_is_error() {
        let agent = LlmAgent::new(
            Arc::new(MockLlmProvider::new(None)),
            AgentSettings::default(),
            ConnectorSet::empty(),
        );
        assert!(matches!(
            agent.invoke("x").await,
            Err(AgentError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_provider_error_message_is_preserved() {
        let agent = LlmAgent::new(
            Arc::new(FailingProvider),
            AgentSettings::default(),
            ConnectorSet::empty(),
        );
        let err = agent.invoke("x").await.unwrap_err();
        assert_eq!(err.to_string(), "Rate limited: slow down");
    }

    #[tokio::test]
    async fn test_lazy_agent_connects_once() {
        let connects = Arc::new(AtomicUsize::new(0));
        let lazy = LazyAgent::new(
            Arc::new(MockLlmProvider::new(Some("ok"))),
            AgentSettings::default(),
            vec![Box::new(CountingConnector(connects.clone()))],
        );
        assert!(!lazy.is_initialized());

        assert_eq!(lazy.invoke("a").await.expect("ok"), "ok");
        assert_eq!(lazy.invoke("b").await.expect("ok"), "ok");

        let agent = lazy.get().await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(agent.connector_names(), ["Counting"]);
        assert_eq!(agent.tool_count(), 1);
        assert!(lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_tool_result_reaches_final_answer() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"tool": "search_repositories", "arguments": {"query": "pdf question answering"}}"#,
            "Closest match: aws-samples/pdf-qa-bedrock.",
        ]));
        let agent = LlmAgent::new(
            provider.clone(),
            AgentSettings::default(),
            github_connectors(&calls),
        );

        let answer = agent.invoke("Find similar projects").await.expect("ok");
        assert_eq!(answer, "Closest match: aws-samples/pdf-qa-bedrock.");
        assert_eq!(
            calls.lock().expect("lock not poisoned").as_slice(),
            [json!({"query": "pdf question answering"})]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let catalogue = &requests[0].messages[1].content;
        assert!(catalogue.contains("search_repositories"));
        assert!(catalogue.contains("\"query\""));
        assert_eq!(requests[0].messages[3], Message::user("Find similar projects"));

        let observation = requests[1].messages.last().expect("observation");
        assert_eq!(
            observation,
            &Message::user(
                "Tool 'search_repositories' succeeded:\naws-samples/pdf-qa-bedrock (412 stars)"
            )
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"tool": "delete_repository", "arguments": {}}"#,
            "done",
        ]));
        let agent = LlmAgent::new(
            provider.clone(),
            AgentSettings::default(),
            github_connectors(&calls),
        );

        assert_eq!(agent.invoke("x").await.expect("ok"), "done");
        assert!(calls.lock().expect("lock not poisoned").is_empty());
        let requests = provider.requests();
        let observation = &requests[1].messages.last().expect("observation").content;
        assert_eq!(
            observation,
            "Tool 'delete_repository' error: No connector provides tool 'delete_repository'"
        );
    }

    #[tokio::test]
    async fn test_step_limit_demands_final_answer() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let call = r#"{"tool": "search_repositories", "arguments": {"query": "again"}}"#;
        let provider = Arc::new(ScriptedProvider::new(&[call, call, "summary"]));
        let agent = LlmAgent::new(
            provider.clone(),
            AgentSettings::default().with_max_tool_steps(2),
            github_connectors(&calls),
        );

        assert_eq!(agent.invoke("x").await.expect("ok"), "summary");
        assert_eq!(calls.lock().expect("lock not poisoned").len(), 2);
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[2].messages.last(),
            Some(&Message::user(FINAL_ANSWER_PROMPT))
        );
    }
}
