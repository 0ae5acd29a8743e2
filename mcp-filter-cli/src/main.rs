//! mcp-filter - filtering proxy for MCP servers.
//!
//! Serves an MCP client on stdin/stdout and forwards to one upstream server,
//! hiding and blocking the tools, prompts and resources the rules exclude.
//!
//! Exit codes:
//! - 0: Client disconnected or shutdown signal received
//! - 1: Configuration error, upstream connection failure, or upstream lost

use clap::{CommandFactory, FromArgMatches};
use mcp_filter::{FilterConfig, Pretty, ProxySession};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, USAGE_EXAMPLES};

const ERROR_EXIT_CODE: i32 = 1;

#[tokio::main]
async fn main() {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    // stdout carries the protocol, so logs go to stderr only
    let filter = if cli.debug {
        EnvFilter::new("mcp_filter=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.to_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("{}", USAGE_EXAMPLES);
            std::process::exit(ERROR_EXIT_CODE);
        }
    };

    let exit_code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ERROR_EXIT_CODE
        }
    };
    std::process::exit(exit_code);
}

async fn run(config: FilterConfig) -> anyhow::Result<i32> {
    log_startup_summary(&config);

    let session = match ProxySession::start(&config, rmcp::transport::stdio()).await {
        Ok(session) => session,
        Err(e) if e.is_config_error() => {
            tracing::error!("{}", e);
            eprintln!("{}", USAGE_EXAMPLES);
            return Ok(ERROR_EXIT_CODE);
        }
        Err(e) => return Err(e.into()),
    };
    let end = session.run(shutdown_signal()).await;

    Ok(if end.is_failure() { ERROR_EXIT_CODE } else { 0 })
}

fn log_startup_summary(config: &FilterConfig) {
    tracing::info!(
        "Starting mcp-filter v{} ({} upstream: {})",
        env!("CARGO_PKG_VERSION"),
        config.transport.kind(),
        config.transport.describe()
    );

    if config.rules.is_empty() {
        tracing::info!("No filter rules configured; all capabilities pass through");
    } else {
        tracing::info!(count = config.rules.len(), "Filter rules (first match wins):");
        for (position, rule) in config.rules.iter().enumerate() {
            tracing::info!("  {}. {}", position + 1, rule);
        }
    }

    if config.filter().is_mixed() {
        tracing::info!(
            "Both include and exclude rules are set: rules apply in command-line order \
             and names matching no rule are hidden"
        );
    }

    tracing::debug!("Configuration: {}", Pretty(config));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
