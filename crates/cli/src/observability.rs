//! Tracing subscriber wiring for the `phoebe` binary.
//!
//! Logs go to stderr so stdout carries only the JSON result of the command.

use anyhow::Context;
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
pub fn init(format: LogFormat, default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(default_level)))
        .context("invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}

fn filter_directive(level: &str) -> String {
    format!("warn,phoebe_client={level},phoebe_server_api={level},phoebe_protocol={level},phoebe={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_parses() {
        assert!(EnvFilter::try_new(filter_directive("debug")).is_ok());
    }
}
