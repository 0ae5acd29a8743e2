//! Command-line definition for `mcp-filter`.
//!
//! Include and exclude rules are separate repeatable options; their relative
//! order on the command line is the evaluation order, so it is recovered from
//! clap's argument indices rather than from the two value lists.

use clap::{ArgMatches, Parser, ValueEnum};
use mcp_filter::{FilterConfig, FilterError, Header, Rule, TransportConfig};

/// Upstream transport selected with `--transport`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Spawn the command after `--` and talk over its stdin/stdout
    Stdio,
    /// Streamable HTTP endpoint at --upstream-url
    Http,
    /// Legacy event-stream endpoint at --upstream-url (deprecated)
    Sse,
}

impl std::fmt::Display for TransportArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportArg::Stdio => write!(f, "stdio"),
            TransportArg::Http => write!(f, "http"),
            TransportArg::Sse => write!(f, "sse"),
        }
    }
}

/// MCP Filter
///
/// Proxy an MCP server and control which tools, prompts and resources the
/// client can see. Rules are evaluated in command-line order; the first
/// matching rule wins.
#[derive(Parser, Debug)]
#[command(name = "mcp-filter")]
#[command(version)]
#[command(about = "Filtering proxy for MCP servers")]
pub struct Cli {
    /// Hide names matching PATTERN (repeatable, `*` matches any run of characters)
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Show only names matching PATTERN (repeatable); any include rule hides everything unmatched
    #[arg(short = 'i', long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,

    /// URL of an HTTP or SSE upstream server
    #[arg(long = "upstream-url", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Upstream transport (default: stdio with a command, http with a URL)
    #[arg(short = 't', long = "transport", value_enum)]
    pub transport: Option<TransportArg>,

    /// Extra header for HTTP/SSE upstream requests (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub header: Vec<String>,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Upstream server command and arguments
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Shown after a configuration error.
pub const USAGE_EXAMPLES: &str = "\
Examples:
  mcp-filter -e 'browser_close' -- npx @playwright/mcp@latest
  mcp-filter -i 'browser_*' -e 'browser_close' -- node server.js
  mcp-filter --upstream-url http://localhost:3000/mcp -e 'debug_*'
  mcp-filter --upstream-url https://mcp.example.com/mcp -H 'Authorization: Bearer TOKEN' -i 'read_*'";

impl Cli {
    /// Build the validated session configuration.
    ///
    /// `matches` must be the matches this `Cli` was parsed from; they carry the
    /// argument positions used to interleave include and exclude rules.
    pub fn to_config(&self, matches: &ArgMatches) -> mcp_filter::Result<FilterConfig> {
        let rules = ordered_rules(matches);
        let transport = self.transport_config()?;
        Ok(FilterConfig::new(rules, transport))
    }

    fn transport_config(&self) -> mcp_filter::Result<TransportConfig> {
        match (&self.upstream_url, self.command.is_empty()) {
            (Some(_), false) => Err(FilterError::invalid_config(
                "Cannot specify both --upstream-url and an upstream command",
            )),
            (None, true) => Err(FilterError::invalid_config(
                "No upstream specified. Provide --upstream-url <URL> or a command after --",
            )),
            (None, false) => {
                if let Some(transport) = self.transport.filter(|t| *t != TransportArg::Stdio) {
                    return Err(FilterError::invalid_config(format!(
                        "--transport {} requires --upstream-url",
                        transport
                    )));
                }
                if !self.header.is_empty() {
                    return Err(FilterError::invalid_config(
                        "--header requires --upstream-url",
                    ));
                }
                TransportConfig::stdio(self.command.clone())
            }
            (Some(url), true) => {
                let headers = self
                    .header
                    .iter()
                    .map(|raw| Header::parse(raw))
                    .collect::<mcp_filter::Result<Vec<_>>>()?;
                match self.transport.unwrap_or(TransportArg::Http) {
                    TransportArg::Http => TransportConfig::http(url, headers),
                    TransportArg::Sse => TransportConfig::sse(url, headers),
                    TransportArg::Stdio => Err(FilterError::invalid_config(
                        "--transport stdio requires a command after --, not --upstream-url",
                    )),
                }
            }
        }
    }
}

/// Include and exclude rules in the order they appeared.
fn ordered_rules(matches: &ArgMatches) -> Vec<Rule> {
    let mut positioned: Vec<(usize, Rule)> = Vec::new();
    collect_rules(matches, "include", Rule::include, &mut positioned);
    collect_rules(matches, "exclude", Rule::exclude, &mut positioned);
    positioned.sort_by_key(|(index, _)| *index);
    positioned.into_iter().map(|(_, rule)| rule).collect()
}

fn collect_rules(
    matches: &ArgMatches,
    id: &str,
    make: fn(String) -> Rule,
    out: &mut Vec<(usize, Rule)>,
) {
    if let (Some(indices), Some(values)) = (matches.indices_of(id), matches.get_many::<String>(id))
    {
        out.extend(indices.zip(values).map(|(index, value)| (index, make(value.clone()))));
    }
}
