//! Upstream connection factory
//!
//! [`connect_upstream`] turns a [`TransportConfig`] into a connected, initialized
//! client session. Every transport variant ends up as the same [`Upstream`]
//! value so the rest of the proxy never looks at the variant again.

use crate::config::{header_map, Header, TransportConfig};
use crate::error::{FilterError, Result};
use crate::notification::UpstreamClientHandler;
use rmcp::model::ServerInfo;
use rmcp::service::{QuitReason, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{Peer, RoleClient, ServiceExt};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A connected upstream server
pub struct Upstream {
    service: RunningService<RoleClient, UpstreamClientHandler>,
    cancel: CancellationToken,
    /// Child process for stdio upstreams, killed when dropped
    child: Option<Child>,
}

impl Upstream {
    /// Handle for sending requests upstream
    pub fn peer(&self) -> Peer<RoleClient> {
        self.service.peer().clone()
    }

    /// What the upstream reported during the handshake
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.service.peer_info().cloned()
    }

    /// Token that stops the upstream service loop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the upstream connection to end
    pub async fn waiting(mut self) -> std::result::Result<QuitReason, tokio::task::JoinError> {
        let reason = self.service.waiting().await;
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Upstream process already gone: {}", e);
            }
        }
        reason
    }
}

/// Connect to the upstream server described by `config`
pub async fn connect_upstream(
    config: &TransportConfig,
    handler: UpstreamClientHandler,
) -> Result<Upstream> {
    match config {
        TransportConfig::Stdio { command, args } => connect_stdio(command, args, handler).await,
        TransportConfig::Http { url, headers } => {
            connect_streamable_http(url, headers, handler, "http").await
        }
        TransportConfig::Sse { url, headers } => {
            tracing::warn!(
                "SSE transport is deprecated as of protocol version 2024-11-05; \
                 connecting to {} with the streamable HTTP client",
                url
            );
            connect_streamable_http(url, headers, handler, "sse").await
        }
    }
}

async fn connect_stdio(
    command: &str,
    args: &[String],
    handler: UpstreamClientHandler,
) -> Result<Upstream> {
    tracing::info!("Spawning upstream server: {} {}", command, args.join(" "));

    // Environment is inherited; stderr goes straight to ours.
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| FilterError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| FilterError::upstream_connect("stdio", "child stdin unavailable"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| FilterError::upstream_connect("stdio", "child stdout unavailable"))?;

    let cancel = CancellationToken::new();
    let service = handler
        .serve_with_ct((stdout, stdin), cancel.clone())
        .await
        .map_err(|e| FilterError::upstream_connect("stdio", e))?;

    Ok(Upstream {
        service,
        cancel,
        child: Some(child),
    })
}

async fn connect_streamable_http(
    url: &Url,
    headers: &[Header],
    handler: UpstreamClientHandler,
    label: &str,
) -> Result<Upstream> {
    tracing::info!("Connecting to upstream server at {}", url);

    let client = reqwest::Client::builder()
        .default_headers(header_map(headers)?)
        .build()
        .map_err(|e| FilterError::upstream_connect(label, e))?;
    let transport = StreamableHttpClientTransport::with_client(
        client,
        StreamableHttpClientTransportConfig::with_uri(url.to_string()),
    );

    let cancel = CancellationToken::new();
    let service = handler
        .serve_with_ct(transport, cancel.clone())
        .await
        .map_err(|e| FilterError::upstream_connect(label, e))?;

    Ok(Upstream {
        service,
        cancel,
        child: None,
    })
}

/// Connect over an already established byte stream pair
///
/// Used for in-process upstreams such as test fixtures.
pub async fn connect_io<R, W>(
    reader: R,
    writer: W,
    handler: UpstreamClientHandler,
) -> Result<Upstream>
where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    let cancel = CancellationToken::new();
    let service = handler
        .serve_with_ct((reader, writer), cancel.clone())
        .await
        .map_err(|e| FilterError::upstream_connect("io", e))?;

    Ok(Upstream {
        service,
        cancel,
        child: None,
    })
}
