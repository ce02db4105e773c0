use clap::Parser;
use tracing_subscriber::EnvFilter;

use mh_chat::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run { message, model, json }) => {
            init_cli_tracing();
            let (config, _) = mh_chat::cli::load_config()?;
            mh_chat::cli::run::run(config, message, model, json).await
        }
        Some(Command::Tools { json }) => {
            init_cli_tracing();
            let (config, _) = mh_chat::cli::load_config()?;
            mh_chat::cli::inspect::tools(config, json).await
        }
        Some(Command::Prompts) => {
            init_cli_tracing();
            let (config, _) = mh_chat::cli::load_config()?;
            mh_chat::cli::inspect::prompts(config).await
        }
        Some(Command::Version) | None => {
            println!("mcphub {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Log to stderr so stdout stays clean for answers; quiet unless
/// `RUST_LOG` says otherwise.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
