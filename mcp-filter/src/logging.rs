//! Logging helpers
//!
//! All output goes through `tracing`. The protocol owns stdout when serving over
//! stdio, so subscribers must be configured to write to stderr.

use serde::Serialize;
use std::fmt;

/// Renders a filter or proxy configuration as YAML for debug logs.
///
/// Header values are redacted by their own `Serialize` impl, so a whole
/// [`FilterConfig`](crate::FilterConfig) is safe to dump.
///
/// ```
/// use mcp_filter::{FilterConfig, Header, Pretty, Rule, TransportConfig};
///
/// let transport = TransportConfig::http(
///     "https://mcp.example.com/mcp",
///     vec![Header::parse("Authorization: Bearer s3cret").unwrap()],
/// )
/// .unwrap();
/// let config = FilterConfig::new(vec![Rule::exclude("browser_close")], transport);
///
/// let rendered = Pretty(&config).to_string();
/// assert!(rendered.contains("browser_close"));
/// assert!(!rendered.contains("s3cret"));
/// ```
///
/// The output starts on a fresh line. If YAML serialization fails the value's
/// `Debug` form is printed instead.
pub struct Pretty<T>(pub T);

impl<T: Serialize + fmt::Debug> fmt::Display for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_yaml_ng::to_string(&self.0) {
            Ok(yaml) => write!(f, "\n{}", yaml),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + fmt::Debug> fmt::Debug for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
