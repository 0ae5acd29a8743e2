//! Startup configuration
//!
//! [`FilterConfig`] is the validated result of command-line parsing: the ordered
//! rule set plus a description of how to reach the upstream server. Nothing in
//! here performs IO.

use crate::error::{FilterError, Result};
use crate::filter::{Filter, Rule};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A custom header sent with every upstream HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    /// Parse a `Name: Value` string. Splits on the first colon and trims both sides.
    pub fn parse(raw: &str) -> Result<Self> {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| FilterError::invalid_header(raw, "expected 'Name: Value'"))?;
        let name = name.trim();
        let value = value.trim();

        if name.is_empty() {
            return Err(FilterError::invalid_header(raw, "header name is empty"));
        }
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FilterError::invalid_header(raw, e.to_string()))?;
        HeaderValue::from_str(value).map_err(|e| FilterError::invalid_header(raw, e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

impl FromStr for Header {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Values may carry credentials, so only names reach the logs.
impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Header", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("value", "<redacted>")?;
        state.end()
    }
}

/// Build a header map for an HTTP client
pub fn header_map(headers: &[Header]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| FilterError::invalid_header(&header.name, e.to_string()))?;
        let value = HeaderValue::from_str(&header.value)
            .map_err(|e| FilterError::invalid_header(&header.name, e.to_string()))?;
        map.append(name, value);
    }
    Ok(map)
}

/// How to reach the upstream server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a subprocess and talk over its stdin/stdout
    Stdio { command: String, args: Vec<String> },
    /// Streamable HTTP endpoint
    Http { url: Url, headers: Vec<Header> },
    /// Legacy event-stream endpoint
    Sse { url: Url, headers: Vec<Header> },
}

impl TransportConfig {
    /// Stdio transport from a command line, program first
    pub fn stdio(command_line: Vec<String>) -> Result<Self> {
        let mut parts = command_line.into_iter();
        let command = parts
            .next()
            .filter(|command| !command.is_empty())
            .ok_or_else(|| FilterError::invalid_config("Stdio transport requires a command"))?;
        Ok(TransportConfig::Stdio {
            command,
            args: parts.collect(),
        })
    }

    pub fn http(url: &str, headers: Vec<Header>) -> Result<Self> {
        Ok(TransportConfig::Http {
            url: parse_url(url, "HTTP")?,
            headers,
        })
    }

    pub fn sse(url: &str, headers: Vec<Header>) -> Result<Self> {
        Ok(TransportConfig::Sse {
            url: parse_url(url, "SSE")?,
            headers,
        })
    }

    /// Short label used in logs and errors
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Stdio { .. } => TransportKind::Stdio,
            TransportConfig::Http { .. } => TransportKind::Http,
            TransportConfig::Sse { .. } => TransportKind::Sse,
        }
    }

    /// Human readable upstream location
    pub fn describe(&self) -> String {
        match self {
            TransportConfig::Stdio { command, args } if args.is_empty() => command.clone(),
            TransportConfig::Stdio { command, args } => format!("{} {}", command, args.join(" ")),
            TransportConfig::Http { url, .. } | TransportConfig::Sse { url, .. } => url.to_string(),
        }
    }
}

fn parse_url(raw: &str, label: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|_| FilterError::invalid_config(format!("Invalid {} URL: {}", label, raw)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FilterError::invalid_config(format!(
            "Invalid {} URL: {} (unsupported scheme '{}')",
            label, raw, scheme
        ))),
    }
}

/// Transport variant without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
            TransportKind::Sse => write!(f, "sse"),
        }
    }
}

/// Complete startup configuration for a proxy session
#[derive(Debug, Clone, Serialize)]
pub struct FilterConfig {
    pub rules: Vec<Rule>,
    pub transport: TransportConfig,
}

impl FilterConfig {
    pub fn new(rules: Vec<Rule>, transport: TransportConfig) -> Self {
        Self { rules, transport }
    }

    /// The rule evaluator for this configuration
    pub fn filter(&self) -> Filter {
        Filter::new(self.rules.clone())
    }
}
