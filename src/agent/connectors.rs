//! MCP tool connectors.
//!
//! Each connector launches an MCP server over stdio, performs the
//! `initialize` / `tools/list` handshake and then serves `tools/call`
//! requests for the agent's tool loop. Connectors that fail to start are
//! logged and skipped; an agent with zero connectors is still usable.
//!
//! The default connector set matches the servers the console was designed
//! around (AWS documentation, CDK, cost analysis, diagrams and GitHub). A
//! YAML file can replace it:
//!
//! ```yaml
//! connectors:
//!   - name: AWS Docs
//!     command: uvx
//!     args: ["awslabs.aws-documentation-mcp-server@latest"]
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// MCP protocol revision announced during `initialize`.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Errors that can occur while starting a tool connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Server closed the connection")]
    Closed,

    #[error("RPC error from server: {0}")]
    Rpc(String),

    #[error("Malformed server message: {0}")]
    Protocol(String),

    #[error("No connector provides tool '{0}'")]
    UnknownTool(String),

    #[error("Tool reported an error: {0}")]
    ToolFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid connector file: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Launch description for one MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    /// Display name (e.g. "AWS Docs").
    pub name: String,
    /// Executable to launch.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ConnectorSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConnectorFile {
    connectors: Vec<ConnectorSpec>,
}

/// Default MCP servers.
pub fn default_connector_specs() -> Vec<ConnectorSpec> {
    vec![
        ConnectorSpec::new("AWS Docs", "uvx", &["awslabs.aws-documentation-mcp-server@latest"]),
        ConnectorSpec::new("AWS CDK", "uvx", &["awslabs.cdk-mcp-server@latest"]),
        ConnectorSpec::new("AWS Cost", "uvx", &["awslabs.cost-analysis-mcp-server@latest"]),
        ConnectorSpec::new("AWS Diagram", "uvx", &["awslabs.aws-diagram-mcp-server@latest"]),
        ConnectorSpec::new("GitHub", "npx", &["-y", "@modelcontextprotocol/server-github"]),
    ]
}

/// Parse connector specs from YAML text.
pub fn parse_connector_specs(yaml: &str) -> Result<Vec<ConnectorSpec>, ConnectorError> {
    let file: ConnectorFile = serde_yaml::from_str(yaml)?;
    Ok(file.connectors)
}

/// Load connector specs from a YAML file.
pub fn load_connector_specs(path: &Path) -> Result<Vec<ConnectorSpec>, ConnectorError> {
    let yaml = std::fs::read_to_string(path)?;
    parse_connector_specs(&yaml)
}

/// A tool advertised by a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments.
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({"type": "object"}),
        }
    }
}

/// Live channel to a started connector.
#[async_trait]
pub trait ToolHandle: Send {
    /// Execute one tool and return its text output.
    async fn call_tool(&mut self, name: &str, arguments: Value)
        -> Result<String, ConnectorError>;

    /// Release the connector's resources.
    async fn shutdown(&mut self) {}
}

/// A started connector.
pub struct Connection {
    pub name: String,
    pub tools: Vec<ToolSpec>,
    handle: Option<Mutex<Box<dyn ToolHandle>>>,
}

impl Connection {
    /// A connection that advertises tools but cannot execute them.
    pub fn new(name: impl Into<String>, tools: Vec<ToolSpec>) -> Self {
        Self {
            name: name.into(),
            tools,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: Box<dyn ToolHandle>) -> Self {
        self.handle = Some(Mutex::new(handle));
        self
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name == name)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ConnectorError> {
        let handle = self.handle.as_ref().ok_or(ConnectorError::Closed)?;
        handle.lock().await.call_tool(name, arguments).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("live", &self.handle.is_some())
            .finish()
    }
}

/// Something that can be started to provide tools to the agent.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Display name used in logs and status output.
    fn name(&self) -> &str;

    /// Start the connector and list its tools.
    async fn connect(&self) -> Result<Connection, ConnectorError>;
}

/// Connectors that started successfully.
#[derive(Debug, Default)]
pub struct ConnectorSet {
    connections: Vec<Connection>,
}

impl ConnectorSet {
    /// No connectors; the degraded mode.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_connections(connections: Vec<Connection>) -> Self {
        Self { connections }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn tool_count(&self) -> usize {
        self.connections.iter().map(|c| c.tools.len()).sum()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Every advertised tool, in connector order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolSpec> + '_ {
        self.connections.iter().flat_map(|c| c.tools.iter())
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.connections.iter().any(|c| c.has_tool(name))
    }

    /// Route a tool call to the connector that advertised the tool.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<String, ConnectorError> {
        let connection = self
            .connections
            .iter()
            .find(|c| c.has_tool(name))
            .ok_or_else(|| ConnectorError::UnknownTool(name.to_string()))?;
        debug!(connector = %connection.name, tool = name, "Calling tool");
        connection.call_tool(name, arguments).await
    }

    /// Stop every connector.
    pub async fn shutdown(&self) {
        for connection in &self.connections {
            if let Some(handle) = &connection.handle {
                handle.lock().await.shutdown().await;
            }
        }
    }
}

/// Start every connector concurrently, keeping the ones that succeed.
pub async fn connect_all(connectors: &[Box<dyn ToolConnector>]) -> ConnectorSet {
    let attempts = connectors.iter().map(|connector| async move {
        info!(connector = connector.name(), "Connecting to MCP server");
        (connector.name().to_string(), connector.connect().await)
    });

    let mut connections = Vec::new();
    for (name, outcome) in futures::future::join_all(attempts).await {
        match outcome {
            Ok(connection) => {
                info!(connector = %name, tools = connection.tools.len(), "MCP server connected");
                connections.push(connection);
            }
            Err(e) => {
                warn!(connector = %name, error = %e, "MCP server unavailable, continuing without it");
            }
        }
    }

    if connections.is_empty() && !connectors.is_empty() {
        warn!("No MCP servers available, running in basic mode");
    }

    ConnectorSet { connections }
}

/// Connector for an MCP server spoken to over the child's stdio.
pub struct McpServerConnector {
    spec: ConnectorSpec,
    timeout: Duration,
}

impl McpServerConnector {
    /// `timeout` bounds the handshake and every tool call.
    pub fn new(spec: ConnectorSpec, timeout: Duration) -> Self {
        Self { spec, timeout }
    }

    /// Boxed connectors for a list of specs.
    pub fn from_specs(specs: Vec<ConnectorSpec>, timeout: Duration) -> Vec<Box<dyn ToolConnector>> {
        specs
            .into_iter()
            .map(|spec| Box::new(McpServerConnector::new(spec, timeout)) as Box<dyn ToolConnector>)
            .collect()
    }
}

#[async_trait]
impl ToolConnector for McpServerConnector {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn connect(&self) -> Result<Connection, ConnectorError> {
        let mut child = Command::new(&self.spec.command)
            .args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConnectorError::Spawn {
                command: self.spec.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ConnectorError::Closed)?;
        let stdout = child.stdout.take().ok_or(ConnectorError::Closed)?;
        let mut rpc = StdioRpc::new(stdin, stdout);

        let tools = with_timeout(self.timeout, rpc.handshake()).await?;

        let process = McpProcess {
            child,
            rpc,
            timeout: self.timeout,
        };
        Ok(Connection::new(self.spec.name.clone(), tools).with_handle(Box::new(process)))
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ConnectorError>>,
) -> Result<T, ConnectorError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ConnectorError::Timeout {
            seconds: limit.as_secs(),
        })?
}

/// A running MCP server and its open stdio channel.
struct McpProcess {
    child: Child,
    rpc: StdioRpc,
    timeout: Duration,
}

#[async_trait]
impl ToolHandle for McpProcess {
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String, ConnectorError> {
        let result = with_timeout(
            self.timeout,
            self.rpc.request("tools/call", json!({"name": name, "arguments": arguments})),
        )
        .await?;
        tool_call_text(&result)
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop MCP server");
        }
    }
}

/// Newline-delimited JSON-RPC over a child's stdin/stdout.
struct StdioRpc {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl StdioRpc {
    fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            stdin,
            lines: BufReader::new(stdout).lines(),
            next_id: 1,
        }
    }

    async fn handshake(&mut self) -> Result<Vec<ToolSpec>, ConnectorError> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "cdp-console", "version": env!("CARGO_PKG_VERSION")},
            }),
        )
        .await?;
        self.notify("notifications/initialized").await?;

        let listed = self.request("tools/list", json!({})).await?;
        tool_specs(&listed)
    }

    async fn send(&mut self, message: &Value) -> Result<(), ConnectorError> {
        let mut line = message.to_string();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str) -> Result<(), ConnectorError> {
        self.send(&json!({"jsonrpc": "2.0", "method": method}))
            .await
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, ConnectorError> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await?;

        loop {
            let line = self.lines.next_line().await?.ok_or(ConnectorError::Closed)?;
            // Servers may interleave notifications and stray log lines.
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            if message.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            return response_result(message);
        }
    }
}

fn response_result(mut message: Value) -> Result<Value, ConnectorError> {
    if let Some(error) = message.get("error") {
        let text = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ConnectorError::Rpc(text));
    }

    message
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ConnectorError::Protocol("response has neither result nor error".into()))
}

fn tool_specs(listed: &Value) -> Result<Vec<ToolSpec>, ConnectorError> {
    let tools = listed
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| ConnectorError::Protocol("tools/list result has no tools array".into()))?;

    Ok(tools
        .iter()
        .filter_map(|tool| serde_json::from_value::<ToolSpec>(tool.clone()).ok())
        .collect())
}

/// Text content of a `tools/call` result.
fn tool_call_text(result: &Value) -> Result<String, ConnectorError> {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(ConnectorError::ToolFailed(text));
    }
    Ok(text)
}
