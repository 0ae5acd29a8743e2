//! Relaying upstream notifications to the downstream client
//!
//! The upstream-facing client handler captures server notifications into a
//! broadcast channel. Once the downstream side is serving, a relay task drains
//! the channel and re-emits each notification on the downstream peer.

use rmcp::model::*;
use rmcp::service::NotificationContext;
use rmcp::{ClientHandler, Peer, RoleClient, RoleServer};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the notification channel between upstream and downstream
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Notification received from the upstream server
#[derive(Debug, Clone)]
pub enum UpstreamNotification {
    Progress(ProgressNotificationParam),
    Log(LoggingMessageNotificationParam),
    ResourceUpdated(ResourceUpdatedNotificationParam),
    ResourceListChanged,
    ToolListChanged,
    PromptListChanged,
}

impl UpstreamNotification {
    /// Protocol method name, for logs
    pub fn method(&self) -> &'static str {
        match self {
            UpstreamNotification::Progress(_) => "notifications/progress",
            UpstreamNotification::Log(_) => "notifications/message",
            UpstreamNotification::ResourceUpdated(_) => "notifications/resources/updated",
            UpstreamNotification::ResourceListChanged => "notifications/resources/list_changed",
            UpstreamNotification::ToolListChanged => "notifications/tools/list_changed",
            UpstreamNotification::PromptListChanged => "notifications/prompts/list_changed",
        }
    }

    async fn deliver(self, peer: &Peer<RoleServer>) -> Result<(), rmcp::service::ServiceError> {
        match self {
            UpstreamNotification::Progress(params) => peer.notify_progress(params).await,
            UpstreamNotification::Log(params) => peer.notify_logging_message(params).await,
            UpstreamNotification::ResourceUpdated(params) => {
                peer.notify_resource_updated(params).await
            }
            UpstreamNotification::ResourceListChanged => peer.notify_resource_list_changed().await,
            UpstreamNotification::ToolListChanged => peer.notify_tool_list_changed().await,
            UpstreamNotification::PromptListChanged => peer.notify_prompt_list_changed().await,
        }
    }
}

/// Client handler used for the upstream connection
#[derive(Clone)]
pub struct UpstreamClientHandler {
    notification_tx: broadcast::Sender<UpstreamNotification>,
}

impl UpstreamClientHandler {
    /// Create the handler together with the receiver that will feed the relay.
    ///
    /// The receiver must be created before the handshake so nothing sent during
    /// startup is dropped.
    pub fn new() -> (Self, broadcast::Receiver<UpstreamNotification>) {
        let (notification_tx, notification_rx) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        (Self { notification_tx }, notification_rx)
    }

    fn capture(&self, notification: UpstreamNotification) {
        tracing::debug!("Captured upstream notification: {}", notification.method());
        let _ = self.notification_tx.send(notification);
    }
}

impl ClientHandler for UpstreamClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::new(
            ClientCapabilities::default(),
            Implementation::new("mcp-filter-client", env!("CARGO_PKG_VERSION"))
                .with_title("MCP Filter Client"),
        )
        .with_protocol_version(ProtocolVersion::default())
    }

    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        self.capture(UpstreamNotification::Progress(params));
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        self.capture(UpstreamNotification::Log(params));
    }

    async fn on_resource_updated(
        &self,
        params: ResourceUpdatedNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        self.capture(UpstreamNotification::ResourceUpdated(params));
    }

    async fn on_resource_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.capture(UpstreamNotification::ResourceListChanged);
    }

    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.capture(UpstreamNotification::ToolListChanged);
    }

    async fn on_prompt_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.capture(UpstreamNotification::PromptListChanged);
    }
}

/// Forward captured notifications to the downstream peer until cancelled or the
/// channel closes.
pub fn spawn_relay(
    mut notifications: broadcast::Receiver<UpstreamNotification>,
    downstream: Peer<RoleServer>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => break,
                received = notifications.recv() => received,
            };

            match notification {
                Ok(notification) => {
                    let method = notification.method();
                    if let Err(e) = notification.deliver(&downstream).await {
                        tracing::warn!("Failed to relay {} downstream: {}", method, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} upstream notifications (relay lagging)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("Notification relay stopped");
    })
}
