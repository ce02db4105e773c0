//! `mcphub run`: one-shot execution.
//!
//! Boots the runtime, answers a single message (running tools as the model
//! asks for them), prints the answer and shuts every server down.

use mh_domain::config::Config;

use crate::bootstrap::{self, Runtime};

/// Answer `message` and print the result to stdout.
pub async fn run(
    config: Config,
    message: String,
    model: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let provider = bootstrap::build_provider(&config)?;
    let runtime = Runtime::start(config, Some(provider)).await?;

    let outcome = answer(&runtime, &message, model, json_output).await;
    runtime.shutdown().await;

    println!("{}", outcome?);
    Ok(())
}

async fn answer(
    runtime: &Runtime,
    message: &str,
    model: Option<String>,
    json_output: bool,
) -> anyhow::Result<String> {
    let mut chat = runtime.chat(model)?;
    let text = chat.run(message).await?;
    if json_output {
        let out = serde_json::json!({
            "answer": text,
            "messages": chat.messages(),
        });
        Ok(serde_json::to_string_pretty(&out)?)
    } else {
        Ok(text)
    }
}
