//! Proxy session lifecycle
//!
//! A session pairs one downstream client with one upstream server for the life
//! of the process. It ends the first time either side goes away or shutdown is
//! requested, and is never re-established.

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::filter::Filter;
use crate::notification::{spawn_relay, UpstreamClientHandler, UpstreamNotification};
use crate::proxy::FilteringProxy;
use crate::transport::{connect_upstream, Upstream};
use rmcp::service::RunningService;
use rmcp::transport::IntoTransport;
use rmcp::{RoleServer, ServiceExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Terminated,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The downstream client disconnected
    DownstreamClosed,
    /// The upstream server exited or the connection dropped
    UpstreamClosed,
    /// The shutdown future completed
    Shutdown,
}

impl SessionEnd {
    /// Whether the process should report failure
    pub fn is_failure(self) -> bool {
        matches!(self, SessionEnd::UpstreamClosed)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::DownstreamClosed => write!(f, "downstream client disconnected"),
            SessionEnd::UpstreamClosed => write!(f, "upstream server disconnected"),
            SessionEnd::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// A running proxy between one client and one upstream server
pub struct ProxySession {
    upstream: Upstream,
    downstream: RunningService<RoleServer, FilteringProxy>,
    downstream_cancel: CancellationToken,
    relay: JoinHandle<()>,
    relay_cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl ProxySession {
    /// Connect to the configured upstream and serve `transport` downstream
    pub async fn start<T, E, A>(config: &FilterConfig, transport: T) -> Result<Self>
    where
        T: IntoTransport<RoleServer, E, A> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let filter = Arc::new(config.filter());
        let (handler, notifications) = UpstreamClientHandler::new();

        let upstream = connect_upstream(&config.transport, handler).await?;
        tracing::info!(
            "Connected to upstream ({}): {}",
            config.transport.kind(),
            config.transport.describe()
        );

        Self::start_with_upstream(filter, upstream, notifications, transport).await
    }

    /// Serve `transport` downstream in front of an already connected upstream
    pub async fn start_with_upstream<T, E, A>(
        filter: Arc<Filter>,
        upstream: Upstream,
        notifications: broadcast::Receiver<UpstreamNotification>,
        transport: T,
    ) -> Result<Self>
    where
        T: IntoTransport<RoleServer, E, A> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let proxy = FilteringProxy::new(filter.clone(), upstream.peer(), upstream.server_info());

        let downstream_cancel = CancellationToken::new();
        let downstream = match proxy.serve_with_ct(transport, downstream_cancel.clone()).await {
            Ok(service) => service,
            Err(e) => {
                upstream.cancellation_token().cancel();
                return Err(FilterError::DownstreamServe {
                    details: e.to_string(),
                });
            }
        };

        let relay_cancel = CancellationToken::new();
        let relay = spawn_relay(
            notifications,
            downstream.peer().clone(),
            relay_cancel.clone(),
        );

        let (state, _) = watch::channel(SessionState::Connected);
        tracing::info!("Proxy session connected ({} filter)", filter.mode());

        Ok(Self {
            upstream,
            downstream,
            downstream_cancel,
            relay,
            relay_cancel,
            state,
        })
    }

    /// Observe state changes, including the final transition to Terminated
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run until either side disconnects or `shutdown` completes
    pub async fn run<F>(self, shutdown: F) -> SessionEnd
    where
        F: Future<Output = ()>,
    {
        let ProxySession {
            upstream,
            downstream,
            downstream_cancel,
            relay,
            relay_cancel,
            state,
        } = self;
        let upstream_cancel = upstream.cancellation_token();

        let end = tokio::select! {
            reason = downstream.waiting() => {
                tracing::debug!("Downstream service stopped: {:?}", reason);
                SessionEnd::DownstreamClosed
            }
            reason = upstream.waiting() => {
                tracing::debug!("Upstream service stopped: {:?}", reason);
                SessionEnd::UpstreamClosed
            }
            _ = shutdown => SessionEnd::Shutdown,
        };

        state.send_replace(SessionState::Terminated);

        // Whichever side is still alive gets torn down so pending requests fail.
        downstream_cancel.cancel();
        upstream_cancel.cancel();
        relay_cancel.cancel();
        if let Err(e) = relay.await {
            tracing::debug!("Notification relay task ended abnormally: {}", e);
        }

        match end {
            SessionEnd::UpstreamClosed => tracing::error!("Session ended: {}", end),
            _ => tracing::info!("Session ended: {}", end),
        }
        end
    }
}
