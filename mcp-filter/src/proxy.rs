//! FilteringProxy - serves the downstream client on behalf of the upstream server
//!
//! List requests are forwarded upstream unchanged and the response is filtered.
//! Tool calls and prompt fetches are checked against the filter first and refused
//! without contacting upstream when the name is excluded. Everything else is
//! relayed as-is, including resource reads by URI, which are never filtered.

use crate::filter::Filter;
use rmcp::model::*;
use rmcp::service::{RequestContext, ServiceError};
use rmcp::{ErrorData as McpError, Peer, RoleClient, RoleServer, ServerHandler};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Name presented to downstream clients
pub const PROXY_NAME: &str = "mcp-filter";

/// The kind of capability a downstream request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tool,
    Prompt,
}

impl CapabilityKind {
    fn label(self) -> &'static str {
        match self {
            CapabilityKind::Tool => "Tool",
            CapabilityKind::Prompt => "Prompt",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Tool => write!(f, "tool"),
            CapabilityKind::Prompt => write!(f, "prompt"),
        }
    }
}

/// The error returned to the caller for a hidden capability
pub fn blocked_error(kind: CapabilityKind, name: &str) -> McpError {
    McpError::invalid_request(
        format!("{} '{}' is blocked by filter configuration", kind.label(), name),
        Some(json!({
            "kind": kind.to_string(),
            "name": name,
        })),
    )
}

/// Server handler sitting between one downstream client and one upstream server
#[derive(Clone)]
pub struct FilteringProxy {
    filter: Arc<Filter>,
    upstream: Peer<RoleClient>,
    upstream_info: Option<ServerInfo>,
}

impl FilteringProxy {
    pub fn new(
        filter: Arc<Filter>,
        upstream: Peer<RoleClient>,
        upstream_info: Option<ServerInfo>,
    ) -> Self {
        Self {
            filter,
            upstream,
            upstream_info,
        }
    }

    /// Refuse the request if `name` is excluded
    fn check_allowed(&self, kind: CapabilityKind, name: &str) -> Result<(), McpError> {
        if self.filter.should_exclude(name) {
            tracing::warn!("Blocked {} '{}' (filter mode: {})", kind, name, self.filter.mode());
            return Err(blocked_error(kind, name));
        }
        Ok(())
    }

    /// Upstream protocol errors pass through untouched; anything else becomes an
    /// internal error naming the operation.
    fn relay_error(op: &str, e: ServiceError) -> McpError {
        match e {
            ServiceError::McpError(error) => error,
            other => {
                tracing::error!("Upstream {} failed: {}", op, other);
                McpError::internal_error(format!("Upstream {} failed: {}", op, other), None)
            }
        }
    }

    fn log_hidden(op: &str, before: usize, after: usize) {
        if before != after {
            tracing::debug!("{}: hid {} of {} items", op, before - after, before);
        }
    }

    fn implementation() -> Implementation {
        Implementation::new(PROXY_NAME, env!("CARGO_PKG_VERSION")).with_title("MCP Filter Proxy")
    }

    fn default_capabilities() -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default();
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });
        capabilities.prompts = Some(PromptsCapability {
            list_changed: Some(false),
        });
        capabilities.resources = Some(ResourcesCapability {
            subscribe: Some(false),
            list_changed: Some(false),
        });
        capabilities
    }
}

impl ServerHandler for FilteringProxy {
    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let mut result = self
            .upstream
            .list_tools(request)
            .await
            .map_err(|e| Self::relay_error("list_tools", e))?;

        let before = result.tools.len();
        result.tools = self.filter.filter_list(result.tools);
        Self::log_hidden("list_tools", before, result.tools.len());
        Ok(result)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.check_allowed(CapabilityKind::Tool, &request.name)?;

        tracing::debug!("Forwarding call_tool '{}'", request.name);
        self.upstream
            .call_tool(request)
            .await
            .map_err(|e| Self::relay_error("call_tool", e))
    }

    async fn list_prompts(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        let mut result = self
            .upstream
            .list_prompts(request)
            .await
            .map_err(|e| Self::relay_error("list_prompts", e))?;

        let before = result.prompts.len();
        result.prompts = self.filter.filter_list(result.prompts);
        Self::log_hidden("list_prompts", before, result.prompts.len());
        Ok(result)
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.check_allowed(CapabilityKind::Prompt, &request.name)?;

        tracing::debug!("Forwarding get_prompt '{}'", request.name);
        self.upstream
            .get_prompt(request)
            .await
            .map_err(|e| Self::relay_error("get_prompt", e))
    }

    async fn list_resources(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let mut result = self
            .upstream
            .list_resources(request)
            .await
            .map_err(|e| Self::relay_error("list_resources", e))?;

        let before = result.resources.len();
        result.resources = self.filter.filter_list(result.resources);
        Self::log_hidden("list_resources", before, result.resources.len());
        Ok(result)
    }

    // Reads address resources by URI, not name, so they are never filtered.
    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.upstream
            .read_resource(request)
            .await
            .map_err(|e| Self::relay_error("read_resource", e))
    }

    async fn list_resource_templates(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        self.upstream
            .list_resource_templates(request)
            .await
            .map_err(|e| Self::relay_error("list_resource_templates", e))
    }

    async fn subscribe(
        &self,
        request: SubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream
            .subscribe(request)
            .await
            .map_err(|e| Self::relay_error("subscribe", e))
    }

    async fn unsubscribe(
        &self,
        request: UnsubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream
            .unsubscribe(request)
            .await
            .map_err(|e| Self::relay_error("unsubscribe", e))
    }

    async fn complete(
        &self,
        request: CompleteRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CompleteResult, McpError> {
        self.upstream
            .complete(request)
            .await
            .map_err(|e| Self::relay_error("complete", e))
    }

    async fn set_level(
        &self,
        request: SetLevelRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.upstream
            .set_level(request)
            .await
            .map_err(|e| Self::relay_error("set_level", e))
    }

    fn get_info(&self) -> ServerInfo {
        let (protocol_version, capabilities, instructions) = match &self.upstream_info {
            Some(info) => (
                info.protocol_version.clone(),
                info.capabilities.clone(),
                info.instructions.clone(),
            ),
            None => (ProtocolVersion::default(), Self::default_capabilities(), None),
        };

        let mut info = ServerInfo::new(capabilities)
            .with_protocol_version(protocol_version)
            .with_server_info(Self::implementation());
        info.instructions = instructions;
        info
    }
}
