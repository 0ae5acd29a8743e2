//! In-process upstream server and harness for proxy integration tests.
//!
//! The fixture counts every request that reaches it so tests can prove blocked
//! requests never leave the proxy.

#![allow(dead_code)]

use mcp_filter::{connect_io, Filter, ProxySession, SessionEnd, UpstreamClientHandler};
use rmcp::model::*;
use rmcp::service::{NotificationContext, RequestContext, RunningService};
use rmcp::{ClientHandler, ErrorData as McpError, RoleClient, RoleServer, ServerHandler, ServiceExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Cursor separating the two pages of the fixture's tool list.
pub const SECOND_PAGE: &str = "page-2";

/// Header the HTTP fixture records when present.
pub const TRACE_HEADER: &str = "x-filter-test";

#[derive(Clone, Default)]
pub struct FixtureServer {
    pub tool_calls: Arc<AtomicUsize>,
    pub prompt_gets: Arc<AtomicUsize>,
    pub resource_reads: Arc<AtomicUsize>,
    pub list_requests: Arc<AtomicUsize>,
    pub seen_headers: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    pub fn prompt_gets(&self) -> usize {
        self.prompt_gets.load(Ordering::SeqCst)
    }

    pub fn resource_reads(&self) -> usize {
        self.resource_reads.load(Ordering::SeqCst)
    }

    pub fn list_requests(&self) -> usize {
        self.list_requests.load(Ordering::SeqCst)
    }

    pub fn seen_headers(&self) -> Vec<String> {
        self.seen_headers.lock().unwrap().clone()
    }

    fn record_headers(&self, context: &RequestContext<RoleServer>) {
        if let Some(parts) = context.extensions.get::<http::request::Parts>() {
            if let Some(value) = parts.headers.get(TRACE_HEADER) {
                let value = value.to_str().unwrap_or_default().to_string();
                self.seen_headers.lock().unwrap().push(value);
            }
        }
    }
}

fn tool(name: &str) -> Tool {
    Tool::new(
        name.to_string(),
        format!("Fixture tool {}", name),
        Arc::new(serde_json::Map::new()),
    )
}

fn from_wire<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, McpError> {
    serde_json::from_value(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

impl ServerHandler for FixtureServer {
    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        self.list_requests.fetch_add(1, Ordering::SeqCst);
        self.record_headers(&context);

        let cursor = request.and_then(|r| r.cursor);
        match cursor.as_deref() {
            None => {
                let mut page = ListToolsResult::with_all_items(vec![
                    tool("browser_navigate"),
                    tool("browser_close"),
                    tool("browser_snapshot"),
                ]);
                page.next_cursor = Some(SECOND_PAGE.into());
                Ok(page)
            }
            Some(SECOND_PAGE) => Ok(ListToolsResult::with_all_items(vec![
                tool("file_read"),
                tool("debug_dump"),
                tool("fail_tool"),
                tool("announce"),
            ])),
            Some(other) => Err(McpError::invalid_params(
                format!("Unknown cursor: {}", other),
                None,
            )),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);

        match &*request.name {
            // Never answers; only the end of the session resolves the caller.
            "hang" => std::future::pending().await,
            "fail_tool" => Err(McpError::invalid_params(
                "fail_tool always fails",
                Some(json!({"reason": "fixture"})),
            )),
            "announce" => {
                context
                    .peer
                    .notify_tool_list_changed()
                    .await
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                Ok(CallToolResult::success(vec![Content::text("announced")]))
            }
            name => {
                let args = request
                    .arguments
                    .map(|a| serde_json::Value::Object(a).to_string())
                    .unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "called {} {}",
                    name, args
                ))]))
            }
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult::with_all_items(vec![
            Prompt::new("summarize", Some("Summarize text"), None),
            Prompt::new("secret_prompt", Some("Internal only"), None),
        ]))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompt_gets.fetch_add(1, Ordering::SeqCst);
        from_wire(json!({
            "description": format!("Prompt {}", request.name),
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": format!("body of {}", request.name)}
            }]
        }))
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(vec![
            RawResource::new("file:///readme.md", "readme").no_annotation(),
            RawResource::new("file:///secrets.txt", "secrets").no_annotation(),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.resource_reads.fetch_add(1, Ordering::SeqCst);
        let text = format!("contents of {}", request.uri);
        from_wire(json!({
            "contents": [{"uri": request.uri, "text": text}]
        }))
    }

    fn get_info(&self) -> ServerInfo {
        let mut capabilities = ServerCapabilities::default();
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(true),
        });
        capabilities.prompts = Some(PromptsCapability {
            list_changed: Some(false),
        });
        capabilities.resources = Some(ResourcesCapability {
            subscribe: Some(false),
            list_changed: Some(false),
        });
        ServerInfo::new(capabilities)
            .with_protocol_version(ProtocolVersion::default())
            .with_server_info(Implementation::new("fixture-server", "0.0.1"))
            .with_instructions("Fixture server instructions")
    }
}

/// Downstream test client that records tool list-changed notifications.
#[derive(Clone)]
pub struct RecordingClient {
    list_changed_tx: mpsc::UnboundedSender<()>,
}

impl RecordingClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (list_changed_tx, rx) = mpsc::unbounded_channel();
        (Self { list_changed_tx }, rx)
    }
}

impl ClientHandler for RecordingClient {
    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        let _ = self.list_changed_tx.send(());
    }
}

pub fn read_params(uri: &str) -> ReadResourceRequestParams {
    serde_json::from_value(json!({ "uri": uri })).unwrap()
}

pub fn call_params(name: &str) -> CallToolRequestParams {
    let mut params = CallToolRequestParams::new(name.to_string());
    params.arguments = json!({"url": "https://example.com"}).as_object().cloned();
    params
}

pub fn prompt_params(name: &str) -> GetPromptRequestParams {
    GetPromptRequestParams::new(name)
}

/// How a test ends the proxy session.
#[derive(Debug, Clone, Copy)]
pub enum Ending {
    Shutdown,
    UpstreamLoss,
}

/// Upstream fixture, running proxy session and connected downstream client.
pub struct Harness {
    pub fixture: FixtureServer,
    pub client: RunningService<RoleClient, RecordingClient>,
    pub notifications: mpsc::UnboundedReceiver<()>,
    pub upstream_server: RunningService<RoleServer, FixtureServer>,
    pub session_state: tokio::sync::watch::Receiver<mcp_filter::SessionState>,
    shutdown: Option<oneshot::Sender<()>>,
    session: JoinHandle<SessionEnd>,
}

impl Harness {
    pub async fn start(filter: Filter) -> Harness {
        let fixture = FixtureServer::default();

        let (upstream_near, upstream_far) = tokio::io::duplex(64 * 1024);
        let server_task = tokio::spawn({
            let fixture = fixture.clone();
            async move { fixture.serve(tokio::io::split(upstream_far)).await }
        });

        let (handler, notifications_rx) = UpstreamClientHandler::new();
        let (reader, writer) = tokio::io::split(upstream_near);
        let upstream = connect_io(reader, writer, handler).await.unwrap();
        let upstream_server = server_task.await.unwrap().unwrap();

        let (downstream_near, downstream_far) = tokio::io::duplex(64 * 1024);
        let session_task = tokio::spawn(ProxySession::start_with_upstream(
            Arc::new(filter),
            upstream,
            notifications_rx,
            tokio::io::split(downstream_far),
        ));

        let (recording, notifications) = RecordingClient::new();
        let client = recording
            .serve(tokio::io::split(downstream_near))
            .await
            .unwrap();
        let session = session_task.await.unwrap().unwrap();
        let session_state = session.subscribe_state();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let session = tokio::spawn(session.run(async move {
            let _ = shutdown_rx.await;
        }));

        Harness {
            fixture,
            client,
            notifications,
            upstream_server,
            session_state,
            shutdown: Some(shutdown_tx),
            session,
        }
    }

    pub async fn shutdown(self) -> SessionEnd {
        self.end_keeping_client(Ending::Shutdown).await.0
    }

    /// Stop the upstream fixture and wait for the session to notice.
    pub async fn kill_upstream(self) -> SessionEnd {
        self.end_keeping_client(Ending::UpstreamLoss).await.0
    }

    /// End the session and hand back the downstream client, which has not
    /// disconnected from its side.
    pub async fn end_keeping_client(
        self,
        ending: Ending,
    ) -> (SessionEnd, RunningService<RoleClient, RecordingClient>) {
        let Harness {
            client,
            upstream_server,
            mut shutdown,
            session,
            ..
        } = self;
        match ending {
            Ending::Shutdown => {
                if let Some(tx) = shutdown.take() {
                    let _ = tx.send(());
                }
            }
            Ending::UpstreamLoss => {
                let _ = upstream_server.cancel().await;
            }
        }
        (session.await.unwrap(), client)
    }

    /// Disconnect the downstream client and wait for the session to notice.
    pub async fn disconnect_client(self) -> SessionEnd {
        let Harness {
            client,
            session,
            shutdown: _shutdown,
            ..
        } = self;
        let _ = client.cancel().await;
        session.await.unwrap()
    }

    pub fn tool_names(tools: &[Tool]) -> Vec<String> {
        tools.iter().map(|t| t.name.to_string()).collect()
    }
}
