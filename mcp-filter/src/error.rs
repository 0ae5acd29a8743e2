//! Error types for mcp-filter
//!
//! Startup and channel failures are reported through [`FilterError`]. Requests
//! refused because a capability is hidden are not errors of this type; they are
//! answered on the wire with a protocol error and the session carries on.

use thiserror::Error;

/// Result type for mcp-filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// The startup configuration is malformed or incomplete
    #[error("{message}")]
    InvalidConfig { message: String },

    /// A custom HTTP header could not be parsed or encoded
    #[error("Invalid header '{header}': {reason}")]
    InvalidHeader { header: String, reason: String },

    /// The upstream subprocess could not be started
    #[error("Failed to spawn upstream command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The handshake with the upstream server failed
    #[error("Failed to connect to upstream server ({transport}): {details}")]
    UpstreamConnect { transport: String, details: String },

    /// The downstream side could not be served
    #[error("Failed to serve downstream client: {details}")]
    DownstreamServe { details: String },
}

impl FilterError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_header(header: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            header: header.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream_connect(transport: impl Into<String>, details: impl ToString) -> Self {
        Self::UpstreamConnect {
            transport: transport.into(),
            details: details.to_string(),
        }
    }

    /// True for errors caused by what the user asked for rather than by the
    /// upstream server, including a command that cannot be started
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FilterError::InvalidConfig { .. }
                | FilterError::InvalidHeader { .. }
                | FilterError::Spawn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FilterError::invalid_config("No upstream specified");
        assert_eq!(err.to_string(), "No upstream specified");
        assert!(err.is_config_error());

        let err = FilterError::invalid_header("Bad", "missing ':' separator");
        assert_eq!(err.to_string(), "Invalid header 'Bad': missing ':' separator");
        assert!(err.is_config_error());

        let err = FilterError::upstream_connect("stdio", "connection closed");
        assert_eq!(
            err.to_string(),
            "Failed to connect to upstream server (stdio): connection closed"
        );
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_spawn_error_names_command() {
        let err = FilterError::Spawn {
            command: "missing-binary".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("missing-binary"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_config_error());
    }

    #[test]
    fn test_runtime_failures_are_not_config_errors() {
        let err = FilterError::DownstreamServe {
            details: "client hung up".to_string(),
        };
        assert!(!err.is_config_error());
    }
}
