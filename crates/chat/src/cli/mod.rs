pub mod inspect;
pub mod run;

use clap::{Parser, Subcommand};

use mh_domain::config::Config;

/// mcphub: an LLM chat host for MCP servers.
#[derive(Debug, Parser)]
#[command(name = "mcphub", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a single message and print the model's answer.
    ///
    /// `@doc` mentions and `/prompt doc` commands are expanded when a
    /// document server is configured.
    Run {
        /// The message to send.
        message: String,
        /// Model override (e.g. "claude-3-5-sonnet-latest").
        #[arg(long)]
        model: Option<String>,
        /// Print the whole conversation as JSON instead of the answer text.
        #[arg(long)]
        json: bool,
    },
    /// List the tools of every connected server, in dispatch order.
    Tools {
        #[arg(long)]
        json: bool,
    },
    /// List the prompts offered by the document server.
    Prompts,
    /// Print version information.
    Version,
}

/// Load the config named by `MCPHUB_CONFIG` (default `mcphub.toml`).
/// A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("MCPHUB_CONFIG").unwrap_or_else(|_| "mcphub.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        tracing::debug!(path = config_path, "config file not found, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
