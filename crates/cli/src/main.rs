//! `phoebe`: command-line access to a PHOEBE server.
//!
//! This binary is the composition root for the workspace:
//!
//! 1. **Parse configuration**: global flags, each backed by a `PHOEBE_*`
//!    environment variable. There is no config file.
//! 2. **Wire observability**: install a `tracing-subscriber` (text or JSON)
//!    on stderr. All spans and events emitted by the library crates flow
//!    through it.
//! 3. **Dispatch**: run exactly one facade call and print its JSON result on
//!    stdout. Any error exits non-zero with the typed error message.

mod observability;

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use phoebe_client::{
    AuthToken, ClientConfig, CommandArgs, PhoebeClient, Registration, SessionId, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
use serde_json::Value;

use crate::observability::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "phoebe", version, about = "Drive a remote PHOEBE server")]
struct Cli {
    /// Server hostname.
    #[arg(long, env = "PHOEBE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Server port.
    #[arg(long, env = "PHOEBE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Request timeout in seconds.
    #[arg(long, env = "PHOEBE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Bearer token sent with every request.
    #[arg(long, env = "PHOEBE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log output format (stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the server's authentication mode.
    AuthConfig,
    /// Log in and print the issued token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PHOEBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new account and print the issued token.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PHOEBE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Show the user behind the current token.
    Me,
    /// List sessions visible to the current identity.
    Sessions,
    /// Start a session and print its descriptor.
    StartSession {
        /// Optional JSON metadata sent as the request body.
        #[arg(long)]
        metadata: Option<String>,
    },
    /// End a session.
    EndSession { session_id: String },
    /// Show per-session memory usage.
    Memory,
    /// Show worker port allocation.
    PortStatus,
    /// Send one command to an existing session.
    Send {
        #[arg(long)]
        session: String,
        /// Server command name, e.g. `get_value`.
        command: String,
        /// Arguments as `key=value`; values are parsed as JSON, falling back
        /// to a plain string.
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init(cli.log_format, &cli.log_level)?;

    let config = ClientConfig::default()
        .with_host(cli.host.clone())
        .with_port(cli.port)
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_token(cli.token.clone().and_then(AuthToken::new));
    let client = PhoebeClient::new(config)?;
    tracing::debug!(host = %cli.host, port = cli.port, "client configured");

    let output = run(&client, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(client: &PhoebeClient, command: Command) -> anyhow::Result<Value> {
    let value = match command {
        Command::AuthConfig => serde_json::to_value(client.get_auth_config().await?)?,
        Command::Login { email, password } => {
            serde_json::to_value(client.login(&email, &password).await?)?
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let registration = Registration::new(email, password).with_name(first_name, last_name);
            serde_json::to_value(client.register(&registration).await?)?
        }
        Command::Me => serde_json::to_value(client.get_me().await?)?,
        Command::Sessions => client.get_sessions().await?,
        Command::StartSession { metadata } => {
            let metadata = metadata
                .map(|m| serde_json::from_str::<Value>(&m))
                .transpose()
                .context("--metadata is not valid JSON")?;
            serde_json::to_value(client.start_session(metadata).await?)?
        }
        Command::EndSession { session_id } => {
            let Some(id) = SessionId::new(session_id) else {
                bail!("session id must not be empty");
            };
            client.end_session(Some(id)).await?.unwrap_or(Value::Null)
        }
        Command::Memory => client.get_memory_usage().await?,
        Command::PortStatus => client.get_port_status().await?,
        Command::Send {
            session,
            command,
            args,
        } => {
            client.set_session_id(SessionId::new(session));
            client.execute(&command, parse_args(&args)?).await?
        }
    };
    Ok(value)
}

/// Parses `key=value` pairs into command arguments.
fn parse_args(pairs: &[String]) -> anyhow::Result<CommandArgs> {
    let mut args = CommandArgs::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("argument {pair:?} is not of the form key=value");
        };
        if key.is_empty() {
            bail!("argument {pair:?} has an empty key");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        args.insert_value(key, value);
    }
    Ok(args)
}
