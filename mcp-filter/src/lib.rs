//! # mcp-filter
//!
//! A rule-driven proxy that sits between an MCP client and one upstream MCP
//! server and controls which tools, prompts and resources the client can see
//! and use.
//!
//! ## Rules
//!
//! Rules are `*` glob patterns tagged include or exclude, evaluated in order;
//! the first rule whose pattern matches a name decides. With no matching rule
//! the default depends on the rule set: if any include rule exists everything
//! unmatched is hidden, otherwise everything unmatched is visible.
//!
//! ```
//! use mcp_filter::{Filter, Rule};
//!
//! let filter = Filter::new(vec![
//!     Rule::exclude("browser_close"),
//!     Rule::include("browser_*"),
//! ]);
//!
//! assert!(!filter.should_exclude("browser_navigate"));
//! assert!(filter.should_exclude("browser_close"));
//! assert!(filter.should_exclude("file_read"));
//! ```
//!
//! ## Sessions
//!
//! [`ProxySession`] connects to the upstream described by a [`FilterConfig`],
//! serves the downstream client through [`FilteringProxy`], and relays upstream
//! notifications until either side goes away.

pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod notification;
pub mod pattern;
pub mod proxy;
pub mod session;
pub mod transport;

pub use config::{FilterConfig, Header, TransportConfig, TransportKind};
pub use error::{FilterError, Result};
pub use filter::{Decision, Filter, FilterMode, NamedItem, Rule, RuleKind};
pub use logging::Pretty;
pub use notification::{UpstreamClientHandler, UpstreamNotification};
pub use pattern::{matches, Pattern};
pub use proxy::{blocked_error, CapabilityKind, FilteringProxy};
pub use session::{ProxySession, SessionEnd, SessionState};
pub use transport::{connect_io, connect_upstream, Upstream};
